//! Request orchestration.
//!
//! [`ParserService::handle_parse_request`] runs one parse request through the
//! pipeline stages in order:
//!
//! `received → quota-checked → fetched → extracted → normalized → assembled → persisted`
//!
//! A failing stage short-circuits with its error; nothing is written to the
//! store unless every stage before `persisted` succeeded.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use time::{OffsetDateTime, Time};
use url::Url;

use crate::article::{Article, assemble};
use crate::config::ParserConfig;
use crate::debug::DebugDump;
use crate::error::ErrorKind;
use crate::extract::{ExtractConfig, extract};
use crate::fetch::Fetcher;
use crate::normalize::separate_paragraphs;
use crate::store::{ArticleId, ArticleStore, UserArticleId};
use crate::{LongreaderError, Result};

/// Progress of a single parse request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseStage {
    Received,
    QuotaChecked,
    Fetched,
    Extracted,
    Normalized,
    Assembled,
    Persisted,
}

impl ParseStage {
    pub fn as_str(self) -> &'static str {
        match self {
            ParseStage::Received => "received",
            ParseStage::QuotaChecked => "quota-checked",
            ParseStage::Fetched => "fetched",
            ParseStage::Extracted => "extracted",
            ParseStage::Normalized => "normalized",
            ParseStage::Assembled => "assembled",
            ParseStage::Persisted => "persisted",
        }
    }
}

impl fmt::Display for ParseStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a successful parse request.
#[derive(Debug, Clone, Serialize)]
pub struct ParseOutcome {
    pub article_id: ArticleId,
    pub user_article_id: UserArticleId,
    pub url: String,
    #[serde(skip)]
    pub article: Article,
}

/// Runs parse requests against a store and a fetcher.
///
/// Shared behind an `Arc` by the server; holds no per-request state.
pub struct ParserService {
    store: Arc<dyn ArticleStore>,
    fetcher: Arc<dyn Fetcher>,
    config: ParserConfig,
    debug: Option<DebugDump>,
}

impl ParserService {
    pub fn new(store: Arc<dyn ArticleStore>, fetcher: Arc<dyn Fetcher>, config: ParserConfig) -> Self {
        let debug = config.dev_mode.then(|| DebugDump::new(config.debug_dir.clone()));
        Self { store, fetcher, config, debug }
    }

    /// Service fetching over HTTP with the configured [`crate::FetchConfig`].
    #[cfg(feature = "fetch")]
    pub fn with_http(store: Arc<dyn ArticleStore>, config: ParserConfig) -> Result<Self> {
        let fetcher = crate::fetch::HttpFetcher::new(config.fetch.clone())?;
        Ok(Self::new(store, Arc::new(fetcher), config))
    }

    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    /// Parses `url` on behalf of `caller_id` and saves the result.
    ///
    /// # Errors
    ///
    /// [`LongreaderError::QuotaExceeded`] when the caller already saved
    /// `daily_limit` articles today (checked before fetching), otherwise
    /// whatever the failing stage reported.
    pub async fn handle_parse_request(&self, url: &str, caller_id: &str) -> Result<ParseOutcome> {
        let result = self.run_request(url, caller_id).await;
        if let Err(e) = &result {
            match e.kind() {
                ErrorKind::Unexpected => tracing::error!("Parsing {} failed: {:?}", url, e),
                _ => tracing::info!("Parsing {} failed: {}", url, e),
            }
        }
        result
    }

    async fn run_request(&self, url: &str, caller_id: &str) -> Result<ParseOutcome> {
        log_stage(url, ParseStage::Received);

        let user = self.store.get_or_create_user(caller_id).await?;
        let since = start_of_utc_day(OffsetDateTime::now_utc());
        let saved_today = self.store.count_user_saves_since(user.id, since).await?;
        if saved_today >= u64::from(self.config.daily_limit) {
            tracing::warn!("User {} reached the daily limit of {}", user.id, self.config.daily_limit);
            return Err(LongreaderError::QuotaExceeded { limit: self.config.daily_limit });
        }
        log_stage(url, ParseStage::QuotaChecked);

        let html = self.fetcher.fetch_html(url).await?;
        log_stage(url, ParseStage::Fetched);

        let article = process(&html, url, &self.config.extract)?;
        self.dump(url, &html, &article);

        let article_id = self.store.insert_article(&article).await?;
        let user_article_id = self.store.insert_user_article_link(user.id, article_id).await?;
        log_stage(url, ParseStage::Persisted);

        Ok(ParseOutcome { article_id, user_article_id, url: url.to_string(), article })
    }

    /// Fetches and parses `url` without quota checks or persistence.
    pub async fn parse_url(&self, url: &str) -> Result<Article> {
        let html = self.fetcher.fetch_html(url).await?;
        log_stage(url, ParseStage::Fetched);
        let article = process(&html, url, &self.config.extract)?;
        self.dump(url, &html, &article);
        Ok(article)
    }

    fn dump(&self, url: &str, html: &str, article: &Article) {
        if let Some(dump) = &self.debug
            && let Err(e) = dump.write(url, html, article)
        {
            tracing::warn!("Failed to write debug dump to {}: {}", dump.dir().display(), e);
        }
    }
}

/// Runs extraction, normalization and assembly on already-fetched HTML.
///
/// `url` becomes the article's source URL and the base for relative links.
pub fn parse_html(html: &str, url: &str, config: &ExtractConfig) -> Result<Article> {
    process(html, url, config)
}

fn process(html: &str, url: &str, config: &ExtractConfig) -> Result<Article> {
    let base_url = Url::parse(url).ok();
    let extraction = extract(html, base_url.as_ref(), config)?;
    log_stage(url, ParseStage::Extracted);

    let content = separate_paragraphs(&extraction.content);
    log_stage(url, ParseStage::Normalized);

    let article = assemble(&content, &extraction.title, &extraction.metadata, url);
    log_stage(url, ParseStage::Assembled);
    Ok(article)
}

fn log_stage(url: &str, stage: ParseStage) {
    tracing::debug!("{} -> {}", url, stage);
}

fn start_of_utc_day(now: OffsetDateTime) -> OffsetDateTime {
    now.to_offset(time::UtcOffset::UTC).replace_time(Time::MIDNIGHT)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use time::macros::datetime;

    use super::*;
    use crate::store::MemoryStore;

    const URL: &str = "https://example.com/post";

    const OG_PAGE: &str = r#"<html>
        <head>
            <title>Document Title</title>
            <meta property="og:title" content="Open Graph Title">
        </head>
        <body><article><h1>Open Graph Title</h1><p>Hello world.</p></article></body>
    </html>"#;

    /// Serves a fixed response and counts how often it was asked.
    struct CountingFetcher {
        response: fn() -> Result<String>,
        calls: AtomicUsize,
    }

    impl CountingFetcher {
        fn new(response: fn() -> Result<String>) -> Arc<Self> {
            Arc::new(Self { response, calls: AtomicUsize::new(0) })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Fetcher for CountingFetcher {
        async fn fetch_html(&self, _url: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            (self.response)()
        }
    }

    fn small_pages_config() -> ParserConfig {
        ParserConfig::builder().min_output_size(1).daily_limit(2).build()
    }

    #[test]
    fn test_parse_html_end_to_end() {
        let config = ExtractConfig { min_output_size: 1, ..Default::default() };
        let article = parse_html(OG_PAGE, URL, &config).unwrap();

        assert_eq!(article.title, "Open Graph Title");
        assert_eq!(article.content, "Hello world.");
        assert_eq!(article.short_description, "Hello world....");
        assert_eq!(article.metadata.reading_time, 1);
        assert_eq!(article.metadata.source_url, URL);
    }

    #[tokio::test]
    async fn test_handle_parse_request_persists_article() {
        let store = Arc::new(MemoryStore::new());
        let fetcher = CountingFetcher::new(|| Ok(OG_PAGE.to_string()));
        let service = ParserService::new(store.clone(), fetcher.clone(), small_pages_config());

        let outcome = service.handle_parse_request(URL, "reader-1").await.unwrap();

        assert_eq!(outcome.url, URL);
        assert_eq!(outcome.article.title, "Open Graph Title");
        assert_eq!(store.article(outcome.article_id), Some(outcome.article.clone()));
        assert_eq!(store.link_count(), 1);
        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test]
    async fn test_quota_exceeded_before_fetch() {
        let store = Arc::new(MemoryStore::new());
        let fetcher = CountingFetcher::new(|| Ok(OG_PAGE.to_string()));
        let service = ParserService::new(store.clone(), fetcher.clone(), small_pages_config());

        service.handle_parse_request(URL, "reader-1").await.unwrap();
        service.handle_parse_request(URL, "reader-1").await.unwrap();
        let err = service.handle_parse_request(URL, "reader-1").await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::QuotaExceeded);
        assert_eq!(err.kind().status(), 429);
        assert_eq!(fetcher.calls(), 2);
        assert_eq!(store.link_count(), 2);
    }

    #[tokio::test]
    async fn test_zero_limit_never_fetches() {
        let store = Arc::new(MemoryStore::new());
        let fetcher = CountingFetcher::new(|| Ok(OG_PAGE.to_string()));
        let config = ParserConfig::builder().daily_limit(0).build();
        let service = ParserService::new(store.clone(), fetcher.clone(), config);

        let err = service.handle_parse_request(URL, "reader-1").await.unwrap_err();

        assert!(matches!(err, LongreaderError::QuotaExceeded { limit: 0 }));
        assert_eq!(fetcher.calls(), 0);
        assert_eq!(store.article_count(), 0);
    }

    #[tokio::test]
    async fn test_quota_is_per_user() {
        let store = Arc::new(MemoryStore::new());
        let fetcher = CountingFetcher::new(|| Ok(OG_PAGE.to_string()));
        let config = ParserConfig::builder().min_output_size(1).daily_limit(1).build();
        let service = ParserService::new(store.clone(), fetcher.clone(), config);

        service.handle_parse_request(URL, "alice").await.unwrap();
        service.handle_parse_request(URL, "bob").await.unwrap();
        assert!(service.handle_parse_request(URL, "alice").await.is_err());
    }

    #[tokio::test]
    async fn test_saves_from_yesterday_do_not_count() {
        let store = Arc::new(MemoryStore::new());
        let fetcher = CountingFetcher::new(|| Ok(OG_PAGE.to_string()));
        let config = ParserConfig::builder().min_output_size(1).daily_limit(1).build();
        let service = ParserService::new(store.clone(), fetcher.clone(), config);

        let user = store.get_or_create_user("reader").await.unwrap();
        let article_id = store.insert_article(&parse_html(OG_PAGE, URL, &service.config().extract).unwrap()).await.unwrap();
        let yesterday = start_of_utc_day(OffsetDateTime::now_utc()) - time::Duration::seconds(1);
        store.insert_link_at(user.id, article_id, yesterday).unwrap();

        assert!(service.handle_parse_request(URL, "reader").await.is_ok());
    }

    #[tokio::test]
    async fn test_blocked_site_persists_nothing() {
        let store = Arc::new(MemoryStore::new());
        let fetcher = CountingFetcher::new(|| Err(LongreaderError::FetchBlocked { url: URL.to_string() }));
        let service = ParserService::new(store.clone(), fetcher.clone(), small_pages_config());

        let err = service.handle_parse_request(URL, "reader-1").await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::FetchBlocked);
        assert_eq!(err.kind().status(), 403);
        assert_eq!(store.article_count(), 0);
        assert_eq!(store.link_count(), 0);
    }

    #[tokio::test]
    async fn test_unprocessable_page_persists_nothing() {
        let store = Arc::new(MemoryStore::new());
        let fetcher = CountingFetcher::new(|| Ok("<html><body><div id=\"root\"></div></body></html>".to_string()));
        let service = ParserService::new(store.clone(), fetcher, ParserConfig::default());

        let err = service.handle_parse_request(URL, "reader-1").await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::UnprocessableContent);
        assert_eq!(store.article_count(), 0);
    }

    #[tokio::test]
    async fn test_parse_url_skips_quota_and_store() {
        let store = Arc::new(MemoryStore::new());
        let fetcher = CountingFetcher::new(|| Ok(OG_PAGE.to_string()));
        let config = ParserConfig::builder().min_output_size(1).daily_limit(0).build();
        let service = ParserService::new(store.clone(), fetcher, config);

        let article = service.parse_url(URL).await.unwrap();
        assert_eq!(article.title, "Open Graph Title");
        assert_eq!(store.article_count(), 0);
    }

    #[tokio::test]
    async fn test_dev_mode_writes_debug_dump() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = CountingFetcher::new(|| Ok(OG_PAGE.to_string()));
        let config = ParserConfig::builder().min_output_size(1).dev_mode(true).debug_dir(dir.path()).build();
        let service = ParserService::new(Arc::new(MemoryStore::new()), fetcher, config);

        service.handle_parse_request(URL, "reader-1").await.unwrap();

        assert!(dir.path().join("example-com-post.html").exists());
        assert!(dir.path().join("example-com-post.md").exists());
    }

    #[tokio::test]
    async fn test_failed_debug_dump_does_not_fail_request() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, "file in the way").unwrap();

        let fetcher = CountingFetcher::new(|| Ok(OG_PAGE.to_string()));
        let config = ParserConfig::builder().min_output_size(1).dev_mode(true).debug_dir(&blocker).build();
        let store = Arc::new(MemoryStore::new());
        let service = ParserService::new(store.clone(), fetcher, config);

        let outcome = service.handle_parse_request(URL, "reader-1").await.unwrap();
        assert_eq!(outcome.article.title, "Open Graph Title");
        assert_eq!(store.article_count(), 1);
        assert!(blocker.is_file());
    }

    #[test]
    fn test_start_of_utc_day() {
        assert_eq!(start_of_utc_day(datetime!(2024-03-05 17:45:12 UTC)), datetime!(2024-03-05 00:00:00 UTC));
        assert_eq!(start_of_utc_day(datetime!(2024-03-05 01:00:00 +3)), datetime!(2024-03-04 00:00:00 UTC));
    }

    #[test]
    fn test_stage_names() {
        assert_eq!(ParseStage::QuotaChecked.to_string(), "quota-checked");
        assert_eq!(ParseStage::Persisted.as_str(), "persisted");
    }
}
