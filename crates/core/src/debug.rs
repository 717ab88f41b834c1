use std::fs;
use std::path::{Path, PathBuf};

use crate::Result;
use crate::article::Article;
use crate::markdown::render_with_frontmatter;

const MAX_SLUG_CHARS: usize = 80;

/// Writes the raw HTML and rendered markdown of a parse to disk for inspection.
#[derive(Debug, Clone)]
pub struct DebugDump {
    dir: PathBuf,
}

impl DebugDump {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Writes `<slug>.html` and `<slug>.md`, creating the directory if needed.
    pub fn write(&self, url: &str, html: &str, article: &Article) -> Result<(PathBuf, PathBuf)> {
        fs::create_dir_all(&self.dir)?;

        let slug = slugify(url);
        let html_path = self.dir.join(format!("{slug}.html"));
        let markdown_path = self.dir.join(format!("{slug}.md"));

        fs::write(&html_path, html)?;
        fs::write(&markdown_path, render_with_frontmatter(article))?;

        tracing::debug!("Wrote debug dump {}", markdown_path.display());
        Ok((html_path, markdown_path))
    }
}

/// File-name-safe form of a URL without its scheme.
pub fn slugify(url: &str) -> String {
    let without_scheme = url.split_once("://").map_or(url, |(_, rest)| rest);
    let mut slug = String::with_capacity(without_scheme.len());
    for c in without_scheme.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.ends_with('-') {
            slug.push('-');
        }
    }

    let slug: String = slug.trim_matches('-').chars().take(MAX_SLUG_CHARS).collect();
    let slug = slug.trim_end_matches('-');
    if slug.is_empty() { "article".to_string() } else { slug.to_string() }
}
