//! Service configuration.
//!
//! [`ParserConfig`] bundles the knobs of every pipeline stage. Build one with
//! [`ParserConfig::builder`] or read it from `LONGREADER_*` environment
//! variables with [`ParserConfig::from_env`].
//!
//! # Example
//!
//! ```rust
//! use longreader_core::ParserConfig;
//!
//! let config = ParserConfig::builder()
//!     .daily_limit(25)
//!     .fetch_timeout(10)
//!     .favor_precision(false)
//!     .build();
//!
//! assert_eq!(config.daily_limit, 25);
//! assert_eq!(config.fetch.timeout, 10);
//! assert!(!config.extract.favor_precision);
//! ```

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::extract::ExtractConfig;
use crate::fetch::FetchConfig;
use crate::{LongreaderError, Result};

pub const ENV_DAILY_LIMIT: &str = "LONGREADER_DAILY_LIMIT";
pub const ENV_FETCH_TIMEOUT: &str = "LONGREADER_FETCH_TIMEOUT";
pub const ENV_DEV_MODE: &str = "LONGREADER_DEV_MODE";
pub const ENV_DEBUG_DIR: &str = "LONGREADER_DEBUG_DIR";

/// Configuration for [`crate::ParserService`].
#[derive(Debug, Clone)]
pub struct ParserConfig {
    /// Articles a user may save per UTC day (default: 10).
    pub daily_limit: u32,

    /// HTTP fetch settings.
    pub fetch: FetchConfig,

    /// Content extraction settings.
    pub extract: ExtractConfig,

    /// Write raw HTML and rendered markdown for each parse (default: false).
    pub dev_mode: bool,

    /// Where debug dumps go (default: `debug_output`).
    pub debug_dir: PathBuf,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            daily_limit: 10,
            fetch: FetchConfig::default(),
            extract: ExtractConfig::default(),
            dev_mode: false,
            debug_dir: PathBuf::from("debug_output"),
        }
    }
}

impl ParserConfig {
    /// Creates a new builder for ParserConfig.
    pub fn builder() -> ParserConfigBuilder {
        ParserConfigBuilder::new()
    }

    /// Reads overrides from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`LongreaderError::ConfigError`] when a variable is set to a
    /// value that does not parse.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads overrides through `lookup`, starting from the defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut builder = Self::builder();

        if let Some(limit) = parse_var::<u32>(&lookup, ENV_DAILY_LIMIT)? {
            builder = builder.daily_limit(limit);
        }
        if let Some(timeout) = parse_var::<u64>(&lookup, ENV_FETCH_TIMEOUT)? {
            builder = builder.fetch_timeout(timeout);
        }
        if let Some(raw) = lookup(ENV_DEV_MODE) {
            builder = builder.dev_mode(parse_flag(ENV_DEV_MODE, &raw)?);
        }
        if let Some(dir) = lookup(ENV_DEBUG_DIR).filter(|d| !d.trim().is_empty()) {
            builder = builder.debug_dir(dir);
        }

        Ok(builder.build())
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T::Err: std::fmt::Display,
{
    lookup(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|e| LongreaderError::ConfigError(format!("{key}={raw:?}: {e}")))
        })
        .transpose()
}

fn parse_flag(key: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(LongreaderError::ConfigError(format!("{key}={raw:?}: expected a boolean"))),
    }
}

/// Builder for ParserConfig.
pub struct ParserConfigBuilder {
    config: ParserConfig,
}

impl ParserConfigBuilder {
    /// Creates a new builder with default values.
    pub fn new() -> Self {
        Self { config: ParserConfig::default() }
    }

    /// Sets the per-user daily save limit.
    pub fn daily_limit(mut self, value: u32) -> Self {
        self.config.daily_limit = value;
        self
    }

    /// Sets the HTTP timeout in seconds.
    pub fn fetch_timeout(mut self, seconds: u64) -> Self {
        self.config.fetch.timeout = seconds;
        self
    }

    /// Replaces the user-agent pool.
    pub fn user_agents(mut self, agents: Vec<String>) -> Self {
        self.config.fetch.user_agents = agents;
        self
    }

    /// Sets the extraction time budget.
    pub fn extract_timeout(mut self, value: Duration) -> Self {
        self.config.extract.timeout = value;
        self
    }

    /// Sets the minimum markdown length.
    pub fn min_output_size(mut self, value: usize) -> Self {
        self.config.extract.min_output_size = value;
        self
    }

    /// Chooses precision (drop page chrome aggressively) or recall.
    pub fn favor_precision(mut self, value: bool) -> Self {
        self.config.extract.favor_precision = value;
        self
    }

    pub fn include_images(mut self, value: bool) -> Self {
        self.config.extract.include_images = value;
        self
    }

    pub fn include_links(mut self, value: bool) -> Self {
        self.config.extract.include_links = value;
        self
    }

    pub fn include_tables(mut self, value: bool) -> Self {
        self.config.extract.include_tables = value;
        self
    }

    pub fn include_formatting(mut self, value: bool) -> Self {
        self.config.extract.include_formatting = value;
        self
    }

    /// Enables debug dumps.
    pub fn dev_mode(mut self, value: bool) -> Self {
        self.config.dev_mode = value;
        self
    }

    /// Sets the debug dump directory.
    pub fn debug_dir(mut self, value: impl Into<PathBuf>) -> Self {
        self.config.debug_dir = value.into();
        self
    }

    /// Builds the config.
    pub fn build(self) -> ParserConfig {
        self.config
    }
}

impl Default for ParserConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
