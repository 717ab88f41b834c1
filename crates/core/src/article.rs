//! Article output type and assembly.
//!
//! This module defines the [`Article`] struct, the immutable result of the
//! pipeline, and [`assemble`], which turns extractor output into one.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::markdown::render_with_frontmatter;
use crate::metadata::{RawMetadata, parse_publish_date};
use crate::normalize::{remove_duplicate_title, remove_duplicate_title_from_description, strip_markdown};
use crate::{LongreaderError, Result};

/// Title used when neither the page nor the extractor provides one.
pub const UNTITLED: &str = "Untitled Article";

/// Description used when no text is left to describe the article.
pub const NO_DESCRIPTION: &str = "No description available";

/// Characters of stripped content used for a derived description.
pub const EXCERPT_CHARS: usize = 90;

/// Words read per minute when estimating reading time.
pub const WORDS_PER_MINUTE: usize = 300;

/// Output format options for Article rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Markdown content, optionally preceded by TOML frontmatter.
    Markdown,
    /// The whole article as JSON.
    Json,
}

/// Descriptive data attached to an [`Article`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleMetadata {
    /// The URL the article was fetched from.
    pub source_url: String,
    pub author: Option<String>,
    /// Publication time in UTC, RFC 3339 when serialized.
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub publish_date: Option<OffsetDateTime>,
    /// Estimated minutes to read, at least 1.
    pub reading_time: u32,
}

/// A cleaned, normalized article ready for offline reading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    pub title: String,
    /// Markdown body with paragraphs separated by one blank line.
    pub content: String,
    /// Plain-text summary, never starting with the title.
    pub short_description: String,
    pub metadata: ArticleMetadata,
}

impl Article {
    /// Renders the article in the requested format.
    pub fn to_format(&self, format: OutputFormat, frontmatter: bool) -> Result<String> {
        match format {
            OutputFormat::Markdown if frontmatter => Ok(render_with_frontmatter(self)),
            OutputFormat::Markdown => Ok(self.content.clone()),
            OutputFormat::Json => self.to_json().map(|v| v.to_string()),
        }
    }

    /// Gets the article as structured JSON.
    pub fn to_json(&self) -> Result<serde_json::Value> {
        serde_json::to_value(self).map_err(|e| LongreaderError::Unexpected(e.to_string()))
    }

    /// Number of whitespace-separated tokens in the content.
    pub fn word_count(&self) -> usize {
        word_count(&self.content)
    }
}

/// Count whitespace-separated tokens.
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Minutes needed to read `content`: one per started block of 300 words.
///
/// ```rust
/// use longreader_core::article::reading_time;
///
/// assert_eq!(reading_time(""), 1);
/// assert_eq!(reading_time(&"word ".repeat(600)), 3);
/// ```
pub fn reading_time(content: &str) -> u32 {
    let minutes = word_count(content) / WORDS_PER_MINUTE + 1;
    u32::try_from(minutes).unwrap_or(u32::MAX)
}

/// First [`EXCERPT_CHARS`] characters followed by `...`; empty text stays empty.
fn excerpt(plain: &str) -> String {
    if plain.is_empty() {
        return String::new();
    }
    let cut: String = plain.chars().take(EXCERPT_CHARS).collect();
    format!("{}...", cut.trim_end())
}

/// Combine normalized content, resolved title and raw metadata into an
/// [`Article`].
///
/// Never fails: every missing piece has a fallback.
pub fn assemble(content: &str, title: &str, raw: &RawMetadata, source_url: &str) -> Article {
    let title = match title.trim() {
        "" => UNTITLED.to_string(),
        t => t.to_string(),
    };

    let content = remove_duplicate_title(content, &title);
    let content_excerpt = excerpt(&strip_markdown(Some(&content)));

    let declared = raw
        .description
        .as_deref()
        .map(|d| strip_markdown(Some(d)))
        .filter(|d| !d.is_empty());

    let candidates = declared.into_iter().chain(std::iter::once(content_excerpt));
    let short_description = candidates
        .map(|d| remove_duplicate_title_from_description(&d, &title))
        .find(|d| !d.trim().is_empty())
        .unwrap_or_else(|| NO_DESCRIPTION.to_string());

    let metadata = ArticleMetadata {
        source_url: source_url.to_string(),
        author: raw.author.as_ref().map(|a| a.trim().to_string()).filter(|a| !a.is_empty()),
        publish_date: raw.date.as_deref().and_then(parse_publish_date),
        reading_time: reading_time(&content),
    };

    Article { title, content, short_description, metadata }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn raw(description: Option<&str>) -> RawMetadata {
        RawMetadata {
            title: Some("Extractor Title".to_string()),
            author: Some("Test Author".to_string()),
            description: description.map(str::to_string),
            date: Some("2023-01-01".to_string()),
        }
    }

    #[test]
    fn test_description_is_markdown_stripped() {
        let content = "This is the article content with some **markdown** and [links](https://example.com).";
        let article = assemble(
            content,
            "Test Article Title",
            &raw(Some("This is a **test** description with [link](https://example.com)")),
            "https://example.com",
        );

        assert_eq!(article.short_description, "This is a test description with link");
        assert_eq!(article.metadata.source_url, "https://example.com");
        assert_eq!(article.metadata.author.as_deref(), Some("Test Author"));
        assert_eq!(article.metadata.publish_date, Some(datetime!(2023-01-01 00:00:00 UTC)));
        assert!(article.metadata.reading_time > 0);
    }

    #[test]
    fn test_description_falls_back_to_content_excerpt() {
        let content = "This is the article content with some **markdown** and [links](https://example.com).";
        let article = assemble(content, "Test Article Title", &raw(None), "https://example.com");
        assert!(article.short_description.starts_with("This is the article content with some markdown and links"));
    }

    #[test]
    fn test_excerpt_is_truncated_with_ellipsis() {
        let content = "word ".repeat(100);
        let article = assemble(&content, "Title", &raw(None), "https://example.com");
        assert!(article.short_description.ends_with("..."));
        assert!(article.short_description.chars().count() <= EXCERPT_CHARS + 3);
    }

    #[test]
    fn test_short_excerpt_still_gets_ellipsis() {
        let article = assemble("A short body.", "Title", &raw(None), "https://example.com");
        assert_eq!(article.short_description, "A short body....");
    }

    #[test]
    fn test_title_removed_from_content_and_description() {
        let content = "# Test Article Title\n\nThe body of the piece.";
        let article = assemble(
            content,
            "Test Article Title",
            &raw(Some("Test Article Title: what this is about")),
            "https://example.com",
        );
        assert_eq!(article.content, "The body of the piece.");
        assert_eq!(article.short_description, "what this is about");
    }

    #[test]
    fn test_description_equal_to_title_uses_excerpt() {
        let article = assemble("Body text here.", "Same", &raw(Some("Same")), "https://example.com");
        assert_eq!(article.short_description, "Body text here....");
    }

    #[test]
    fn test_no_description_available() {
        let article = assemble("", "Title", &raw(None), "https://example.com");
        assert_eq!(article.short_description, NO_DESCRIPTION);
        assert_eq!(article.metadata.reading_time, 1);
    }

    #[test]
    fn test_blank_title_falls_back() {
        let article = assemble("Body", "   ", &RawMetadata::default(), "https://example.com");
        assert_eq!(article.title, UNTITLED);
        assert_eq!(article.metadata.author, None);
        assert_eq!(article.metadata.publish_date, None);
    }

    #[test]
    fn test_reading_time() {
        assert_eq!(reading_time(""), 1);
        assert_eq!(reading_time(&"word ".repeat(299)), 1);
        assert_eq!(reading_time(&"word ".repeat(300)), 2);
        assert_eq!(reading_time(&"word ".repeat(600)), 3);
    }

    #[test]
    fn test_json_round_trips_publish_date() {
        let article = assemble("Body", "Title", &raw(None), "https://example.com");
        let json = article.to_json().unwrap();
        assert_eq!(json["metadata"]["publish_date"], "2023-01-01T00:00:00Z");

        let back: Article = serde_json::from_value(json).unwrap();
        assert_eq!(back, article);
    }

    #[test]
    fn test_to_format() {
        let article = assemble("Body", "Title", &raw(None), "https://example.com");
        assert_eq!(article.to_format(OutputFormat::Markdown, false).unwrap(), "Body");
        assert!(article.to_format(OutputFormat::Markdown, true).unwrap().starts_with("+++"));
        assert!(article.to_format(OutputFormat::Json, false).unwrap().contains("\"title\":\"Title\""));
    }
}
