//! Persistence collaborators.
//!
//! The pipeline only needs four operations from storage; [`ArticleStore`]
//! names them and [`MemoryStore`] implements them in-process.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::article::Article;
use crate::{LongreaderError, Result};

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }
    };
}

uuid_id!(
    /// Identifier of a stored article.
    ArticleId
);
uuid_id!(
    /// Identifier of a user's saved-article link.
    UserArticleId
);
uuid_id!(
    /// Internal user identifier.
    UserId
);

/// A registered caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    /// Identity assigned by the calling platform.
    pub external_id: String,
    #[serde(with = "time::serde::rfc3339")]
    pub registered_at: OffsetDateTime,
}

/// Storage operations the orchestrator depends on.
#[async_trait]
pub trait ArticleStore: Send + Sync {
    /// Finds the user with `external_id`, registering them on first sight.
    async fn get_or_create_user(&self, external_id: &str) -> Result<User>;

    async fn insert_article(&self, article: &Article) -> Result<ArticleId>;

    async fn insert_user_article_link(&self, user_id: UserId, article_id: ArticleId) -> Result<UserArticleId>;

    /// Number of links the user created at or after `since`.
    async fn count_user_saves_since(&self, user_id: UserId, since: OffsetDateTime) -> Result<u64>;
}

#[derive(Debug, Clone)]
struct SavedLink {
    user_id: UserId,
    article_id: ArticleId,
    saved_at: OffsetDateTime,
}

#[derive(Debug, Default)]
struct Tables {
    users: HashMap<String, User>,
    articles: HashMap<ArticleId, Article>,
    links: Vec<SavedLink>,
}

/// In-process [`ArticleStore`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>> {
        self.tables.lock().map_err(|_| LongreaderError::Storage("store lock poisoned".to_string()))
    }

    /// Looks up a stored article.
    pub fn article(&self, id: ArticleId) -> Option<Article> {
        self.lock().ok()?.articles.get(&id).cloned()
    }

    pub fn article_count(&self) -> usize {
        self.lock().map(|t| t.articles.len()).unwrap_or(0)
    }

    pub fn link_count(&self) -> usize {
        self.lock().map(|t| t.links.len()).unwrap_or(0)
    }

    /// Article ids saved by a user, oldest first.
    pub fn saved_by(&self, user_id: UserId) -> Vec<ArticleId> {
        self.lock()
            .map(|t| t.links.iter().filter(|l| l.user_id == user_id).map(|l| l.article_id).collect())
            .unwrap_or_default()
    }

    /// Records a link with an explicit timestamp.
    pub fn insert_link_at(&self, user_id: UserId, article_id: ArticleId, saved_at: OffsetDateTime) -> Result<UserArticleId> {
        let id = UserArticleId::new();
        self.lock()?.links.push(SavedLink { user_id, article_id, saved_at });
        Ok(id)
    }
}

#[async_trait]
impl ArticleStore for MemoryStore {
    async fn get_or_create_user(&self, external_id: &str) -> Result<User> {
        let mut tables = self.lock()?;
        let user = tables.users.entry(external_id.to_string()).or_insert_with(|| {
            tracing::info!("Registering user {}", external_id);
            User { id: UserId::new(), external_id: external_id.to_string(), registered_at: OffsetDateTime::now_utc() }
        });
        Ok(user.clone())
    }

    async fn insert_article(&self, article: &Article) -> Result<ArticleId> {
        let id = ArticleId::new();
        self.lock()?.articles.insert(id, article.clone());
        Ok(id)
    }

    async fn insert_user_article_link(&self, user_id: UserId, article_id: ArticleId) -> Result<UserArticleId> {
        if !self.lock()?.articles.contains_key(&article_id) {
            return Err(LongreaderError::Storage(format!("unknown article {}", article_id)));
        }
        self.insert_link_at(user_id, article_id, OffsetDateTime::now_utc())
    }

    async fn count_user_saves_since(&self, user_id: UserId, since: OffsetDateTime) -> Result<u64> {
        let tables = self.lock()?;
        let count = tables.links.iter().filter(|l| l.user_id == user_id && l.saved_at >= since).count();
        Ok(count as u64)
    }
}
