//! Error types for the parsing pipeline.
//!
//! Every stage returns [`LongreaderError`]. Callers usually only care about
//! its [`ErrorKind`], which maps onto the HTTP status reported to users, and
//! its [`LongreaderError::user_message`], which never leaks internals.
//!
//! # Example
//!
//! ```rust
//! use longreader_core::{ErrorKind, LongreaderError};
//!
//! let err = LongreaderError::QuotaExceeded { limit: 10 };
//! assert_eq!(err.kind(), ErrorKind::QuotaExceeded);
//! assert_eq!(err.kind().status(), 429);
//! ```

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for fetching, extraction and persistence.
#[derive(Error, Debug)]
pub enum LongreaderError {
    /// The origin answered 403, usually a bot-detection wall.
    #[error("Request to {url} was blocked by anti-scraping defenses")]
    FetchBlocked { url: String },

    /// The origin answered with a 5xx status.
    ///
    /// The pipeline never retries these; the caller owns the retry policy.
    #[error("Upstream server error: HTTP {status}")]
    Upstream { status: u16 },

    /// Any other failure to retrieve the page (non-2xx status, bad body).
    #[error("Failed to fetch URL: {0}")]
    FetchFailed(String),

    /// HTTP transport errors from reqwest.
    #[cfg(feature = "fetch")]
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Request timeout.
    #[error("Request timed out after {timeout} seconds")]
    Timeout { timeout: u64 },

    /// Invalid URL provided.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Extraction produced nothing usable.
    ///
    /// Typically the page is rendered client-side and needs a browser.
    #[error("Unprocessable content: {0}")]
    UnprocessableContent(String),

    /// The caller reached the daily save limit.
    #[error("Daily limit of {limit} articles reached")]
    QuotaExceeded { limit: u32 },

    /// File not found.
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// Local I/O errors (file and stdin input).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Persistence collaborator failures.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Invalid CSS selector or unparseable markup.
    #[error("HTML parsing failed: {0}")]
    HtmlParseError(String),

    /// Invalid configuration values.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Catch-all for anything the pipeline did not anticipate.
    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

/// Coarse classification of [`LongreaderError`], stable across variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    FetchBlocked,
    UpstreamError,
    FetchFailed,
    UnprocessableContent,
    QuotaExceeded,
    Unexpected,
}

impl ErrorKind {
    /// HTTP status reported to API callers.
    pub fn status(self) -> u16 {
        match self {
            ErrorKind::FetchBlocked => 403,
            ErrorKind::UpstreamError => 502,
            ErrorKind::FetchFailed => 400,
            ErrorKind::UnprocessableContent => 422,
            ErrorKind::QuotaExceeded => 429,
            ErrorKind::Unexpected => 500,
        }
    }

    /// Machine-readable name, used as the `error` field of API responses.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::FetchBlocked => "fetch_blocked",
            ErrorKind::UpstreamError => "upstream_error",
            ErrorKind::FetchFailed => "fetch_failed",
            ErrorKind::UnprocessableContent => "unprocessable_content",
            ErrorKind::QuotaExceeded => "quota_exceeded",
            ErrorKind::Unexpected => "unexpected",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl LongreaderError {
    /// Classifies this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            LongreaderError::FetchBlocked { .. } => ErrorKind::FetchBlocked,
            LongreaderError::Upstream { .. } => ErrorKind::UpstreamError,
            LongreaderError::FetchFailed(_)
            | LongreaderError::Timeout { .. }
            | LongreaderError::InvalidUrl(_)
            | LongreaderError::FileNotFound(_)
            | LongreaderError::Io(_) => ErrorKind::FetchFailed,
            #[cfg(feature = "fetch")]
            LongreaderError::HttpError(_) => ErrorKind::FetchFailed,
            LongreaderError::UnprocessableContent(_) => ErrorKind::UnprocessableContent,
            LongreaderError::QuotaExceeded { .. } => ErrorKind::QuotaExceeded,
            LongreaderError::Storage(_)
            | LongreaderError::HtmlParseError(_)
            | LongreaderError::ConfigError(_)
            | LongreaderError::Unexpected(_) => ErrorKind::Unexpected,
        }
    }

    /// Message safe to show to the end user.
    pub fn user_message(&self) -> String {
        match self.kind() {
            ErrorKind::FetchBlocked => {
                "This site blocks automated access, so the article could not be saved.".to_string()
            }
            ErrorKind::UpstreamError => "The site is having trouble right now. Please try again later.".to_string(),
            ErrorKind::FetchFailed => match self {
                LongreaderError::InvalidUrl(_) => "The link does not look like a valid web address.".to_string(),
                LongreaderError::Timeout { timeout } => {
                    format!("The site did not respond within {} seconds.", timeout)
                }
                _ => "The page could not be downloaded.".to_string(),
            },
            ErrorKind::UnprocessableContent => {
                "No readable article was found on this page. The site may need a browser with JavaScript to display it."
                    .to_string()
            }
            ErrorKind::QuotaExceeded => self.to_string(),
            ErrorKind::Unexpected => "Something went wrong while saving the article.".to_string(),
        }
    }
}

/// Result type alias for LongreaderError.
pub type Result<T> = std::result::Result<T, LongreaderError>;

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(LongreaderError::FetchBlocked { url: "https://example.com".into() }, 403)]
    #[case(LongreaderError::Upstream { status: 503 }, 502)]
    #[case(LongreaderError::FetchFailed("HTTP 404".into()), 400)]
    #[case(LongreaderError::Timeout { timeout: 30 }, 400)]
    #[case(LongreaderError::InvalidUrl("nope".into()), 400)]
    #[case(LongreaderError::UnprocessableContent("too short".into()), 422)]
    #[case(LongreaderError::QuotaExceeded { limit: 10 }, 429)]
    #[case(LongreaderError::Storage("down".into()), 500)]
    #[case(LongreaderError::Unexpected("boom".into()), 500)]
    fn test_status_mapping(#[case] err: LongreaderError, #[case] status: u16) {
        assert_eq!(err.kind().status(), status);
    }

    #[test]
    fn test_error_display() {
        let err = LongreaderError::InvalidUrl("not a url".to_string());
        assert!(err.to_string().contains("Invalid URL"));

        let err = LongreaderError::Upstream { status: 502 };
        assert!(err.to_string().contains("502"));
    }

    #[test]
    fn test_user_message_hides_internals() {
        let err = LongreaderError::Storage("connection refused to 10.0.0.3:27017".to_string());
        assert!(!err.user_message().contains("10.0.0.3"));

        let err = LongreaderError::UnprocessableContent("markdown output was 12 chars".to_string());
        assert!(err.user_message().contains("JavaScript"));
    }

    #[test]
    fn test_quota_message_mentions_limit() {
        let err = LongreaderError::QuotaExceeded { limit: 10 };
        assert!(err.user_message().contains("10"));
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(ErrorKind::FetchBlocked.to_string(), "fetch_blocked");
        assert_eq!(ErrorKind::QuotaExceeded.as_str(), "quota_exceeded");
    }
}
