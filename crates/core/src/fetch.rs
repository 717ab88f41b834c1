//! Content fetching from URLs, files, and stdin.
//!
//! Remote pages are fetched while impersonating a mobile browser, since many
//! publishers serve bot-blocking pages to anything that looks like a script.
//! Response bodies are decompressed by hand: some servers send gzip or Brotli
//! payloads with missing or wrong `Content-Encoding` headers.

use std::fs;
use std::path::PathBuf;

use async_trait::async_trait;

use crate::{LongreaderError, Result};

/// Mobile browser identities rotated per request.
pub const MOBILE_USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (iPhone; CPU iPhone OS 17_4 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Mobile/15E148 Safari/604.1",
    "Mozilla/5.0 (iPhone; CPU iPhone OS 16_6 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) CriOS/122.0.6261.89 Mobile/15E148 Safari/604.1",
    "Mozilla/5.0 (Linux; Android 14; Pixel 8) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0.6261.105 Mobile Safari/537.36",
    "Mozilla/5.0 (Linux; Android 13; SM-S918B) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0.6167.178 Mobile Safari/537.36",
    "Mozilla/5.0 (Linux; Android 14; SM-G991B) AppleWebKit/537.36 (KHTML, like Gecko) SamsungBrowser/24.0 Chrome/117.0.0.0 Mobile Safari/537.36",
    "Mozilla/5.0 (Android 14; Mobile; rv:123.0) Gecko/123.0 Firefox/123.0",
];

/// HTTP client configuration for fetching web pages.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Request timeout in seconds.
    pub timeout: u64,
    /// User-Agent strings; one is picked at random for each request.
    pub user_agents: Vec<String>,
    /// Maximum redirects followed before giving up.
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout: 30,
            user_agents: MOBILE_USER_AGENTS.iter().map(|ua| ua.to_string()).collect(),
            max_redirects: 10,
        }
    }
}

/// Source of raw HTML for a URL.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch_html(&self, url: &str) -> Result<String>;
}

#[cfg(feature = "fetch")]
pub use http::{HttpFetcher, decode_body, fetch_url};

#[cfg(feature = "fetch")]
mod http {
    use std::io::Read;
    use std::time::Duration;

    use async_trait::async_trait;
    use rand::seq::SliceRandom;
    use reqwest::{Client, StatusCode, header};
    use url::Url;

    use super::{FetchConfig, Fetcher, MOBILE_USER_AGENTS};
    use crate::{LongreaderError, Result};

    const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

    /// Markers that identify an already-decoded HTML payload.
    const HTML_MARKERS: &[&str] = &["<!doctype", "<html", "<head", "<body", "<meta", "<div", "<p"];

    /// Fetcher backed by one pooled `reqwest` client.
    #[derive(Debug, Clone)]
    pub struct HttpFetcher {
        client: Client,
        config: FetchConfig,
    }

    impl HttpFetcher {
        /// Builds the client: bounded redirects, request timeout, no
        /// transparent decompression.
        pub fn new(config: FetchConfig) -> Result<Self> {
            let client = Client::builder()
                .timeout(Duration::from_secs(config.timeout))
                .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
                .build()
                .map_err(LongreaderError::HttpError)?;
            Ok(Self { client, config })
        }

        fn pick_user_agent(&self) -> &str {
            self.config
                .user_agents
                .choose(&mut rand::thread_rng())
                .map(String::as_str)
                .unwrap_or(MOBILE_USER_AGENTS[0])
        }
    }

    #[async_trait]
    impl Fetcher for HttpFetcher {
        async fn fetch_html(&self, url: &str) -> Result<String> {
            let parsed_url = Url::parse(url).map_err(|e| LongreaderError::InvalidUrl(e.to_string()))?;
            if !matches!(parsed_url.scheme(), "http" | "https") {
                return Err(LongreaderError::InvalidUrl(format!(
                    "unsupported scheme '{}', expected http or https",
                    parsed_url.scheme()
                )));
            }

            let user_agent = self.pick_user_agent();
            tracing::debug!("Fetching {} as {}", parsed_url, user_agent);

            let response = self
                .client
                .get(parsed_url)
                .header(header::USER_AGENT, user_agent)
                .header(header::ACCEPT, "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8")
                .header(header::ACCEPT_LANGUAGE, "en-US,en;q=0.9")
                .header(header::ACCEPT_ENCODING, "gzip, deflate, br")
                .header(header::DNT, "1")
                .header(header::UPGRADE_INSECURE_REQUESTS, "1")
                .header("Sec-Fetch-Dest", "document")
                .header("Sec-Fetch-Mode", "navigate")
                .header("Sec-Fetch-Site", "none")
                .header("Sec-Fetch-User", "?1")
                .header("Sec-CH-UA-Mobile", "?1")
                .header("Sec-CH-UA-Platform", "\"Android\"")
                .header("Viewport-Width", "390")
                .header("Save-Data", "on")
                .send()
                .await
                .map_err(|e| {
                    if e.is_timeout() {
                        LongreaderError::Timeout { timeout: self.config.timeout }
                    } else {
                        LongreaderError::HttpError(e)
                    }
                })?;

            let status = response.status();
            if status == StatusCode::FORBIDDEN {
                tracing::warn!("Fetch blocked by {}", url);
                return Err(LongreaderError::FetchBlocked { url: url.to_string() });
            }
            if status.is_server_error() {
                return Err(LongreaderError::Upstream { status: status.as_u16() });
            }
            if !status.is_success() {
                return Err(LongreaderError::FetchFailed(format!("HTTP {}", status)));
            }

            let encoding = response
                .headers()
                .get(header::CONTENT_ENCODING)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            let bytes = response.bytes().await.map_err(|e| {
                if e.is_timeout() {
                    LongreaderError::Timeout { timeout: self.config.timeout }
                } else {
                    LongreaderError::HttpError(e)
                }
            })?;

            let html = decode_body(&bytes, encoding.as_deref());
            tracing::info!("Fetched {} ({} bytes, {} chars decoded)", url, bytes.len(), html.len());
            Ok(html)
        }
    }

    /// Fetches HTML content from a URL with a one-off client.
    pub async fn fetch_url(url: &str, config: &FetchConfig) -> Result<String> {
        HttpFetcher::new(config.clone())?.fetch_html(url).await
    }

    /// Turn a response body into text.
    ///
    /// Bodies that already look like HTML are returned as-is. Otherwise gzip
    /// magic bytes trigger gzip decoding and a `br` content encoding triggers
    /// Brotli decoding. Failures fall through to the lossy UTF-8 text of the
    /// raw bytes.
    pub fn decode_body(bytes: &[u8], content_encoding: Option<&str>) -> String {
        if looks_like_html(bytes) {
            return String::from_utf8_lossy(bytes).into_owned();
        }

        if bytes.starts_with(&GZIP_MAGIC) {
            let mut decoded = Vec::new();
            match flate2::read::GzDecoder::new(bytes).read_to_end(&mut decoded) {
                Ok(_) => return String::from_utf8_lossy(&decoded).into_owned(),
                Err(e) => tracing::warn!("Gzip decompression failed, using raw body: {}", e),
            }
        }

        let is_brotli = content_encoding.is_some_and(|enc| enc.split(',').any(|e| e.trim().eq_ignore_ascii_case("br")));
        if is_brotli {
            let mut decoded = Vec::new();
            match brotli::Decompressor::new(bytes, 4096).read_to_end(&mut decoded) {
                Ok(_) => return String::from_utf8_lossy(&decoded).into_owned(),
                Err(e) => tracing::warn!("Brotli decompression failed, using raw body: {}", e),
            }
        }

        String::from_utf8_lossy(bytes).into_owned()
    }

    fn looks_like_html(bytes: &[u8]) -> bool {
        let head = String::from_utf8_lossy(&bytes[..bytes.len().min(1024)]).to_lowercase();
        let head = head.trim_start_matches('\u{feff}').trim_start();
        head.starts_with('<') && HTML_MARKERS.iter().any(|marker| head.contains(marker))
    }

}

/// Reads HTML content from a local file.
///
/// Callers should validate and sanitize the path when accepting user input.
pub fn fetch_file(path: &str) -> Result<String> {
    let path_buf = PathBuf::from(path);

    if !path_buf.exists() {
        Err(LongreaderError::FileNotFound(path_buf))
    } else {
        fs::read_to_string(&path_buf).map_err(LongreaderError::from)
    }
}

/// Reads HTML content from standard input until EOF.
pub fn fetch_stdin() -> Result<String> {
    use std::io::{self, Read};

    let mut buffer = String::new();
    io::stdin().read_to_string(&mut buffer).map_err(LongreaderError::from)?;

    Ok(buffer)
}
