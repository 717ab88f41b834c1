//! Article fetching, readable-content extraction and markdown normalization.
//!
//! The pipeline runs strictly forward:
//!
//! URL → HTML ([`fetch`]) → content and raw metadata ([`extract`]) →
//! normalized markdown ([`normalize`]) → [`Article`] ([`article`]).
//!
//! [`ParserService`] sequences the stages for one request, checks the
//! caller's daily quota and hands the result to an [`ArticleStore`].
//!
//! # Example
//!
//! ```rust
//! use longreader_core::{ExtractConfig, parse_html};
//!
//! let body = "A long enough paragraph, with commas, to be treated as the article body. ".repeat(4);
//! let html = format!(
//!     r#"<html><head><meta property="og:title" content="Shared Title"></head>
//!        <body><article><h1>Shared Title</h1><p>{body}</p></article></body></html>"#
//! );
//!
//! let article = parse_html(&html, "https://example.com/post", &ExtractConfig::default()).unwrap();
//! assert_eq!(article.title, "Shared Title");
//! assert!(!article.content.starts_with("# Shared Title"));
//! ```

pub mod article;
pub mod config;
pub mod debug;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod markdown;
pub mod metadata;
pub mod normalize;
pub mod parse;
pub mod postprocess;
pub mod preprocess;
pub mod scoring;
pub mod service;
pub mod store;

pub use article::{Article, ArticleMetadata, OutputFormat, assemble, reading_time};
pub use config::{ParserConfig, ParserConfigBuilder};
pub use debug::DebugDump;
pub use error::{ErrorKind, LongreaderError, Result};
pub use extract::{ExtractConfig, Extraction, extract};
pub use fetch::{FetchConfig, Fetcher, fetch_file, fetch_stdin};
#[cfg(feature = "fetch")]
pub use fetch::{HttpFetcher, decode_body, fetch_url};
pub use markdown::{html_to_markdown, render_with_frontmatter};
pub use metadata::{RawMetadata, parse_publish_date};
pub use normalize::{
    normalize_title, remove_duplicate_title, remove_duplicate_title_from_description, separate_paragraphs,
    strip_markdown,
};
pub use parse::Document;
#[doc(hidden)]
pub use postprocess::{PostProcessConfig, postprocess_html};
#[doc(hidden)]
pub use preprocess::{PreprocessConfig, preprocess_html};
#[doc(hidden)]
pub use scoring::{ScoreConfig, base_tag_score, class_id_weight, link_density};
pub use service::{ParseOutcome, ParseStage, ParserService, parse_html};
pub use store::{ArticleId, ArticleStore, MemoryStore, User, UserArticleId, UserId};
