//! `AppConfig` struct and TOML loading.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use moviedex_api::tmdb::DEFAULT_LANGUAGE;
use moviedex_query::CacheConfig;
use serde::Deserialize;

/// Top-level application configuration.
#[derive(Debug, Deserialize, Default, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// TMDB request defaults.
    #[serde(default)]
    pub tmdb: TmdbSection,
    /// Query cache tuning.
    #[serde(default)]
    pub cache: CacheSection,
}

/// `[tmdb]` section.
#[derive(Debug, Deserialize, Default, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct TmdbSection {
    /// API base URL (default: `https://api.themoviedb.org/3/`).
    pub base_url: Option<String>,
    /// Default response language.
    pub language: Option<String>,
    /// Default region for popular listings.
    pub region: Option<String>,
    /// Per-request timeout in seconds. Unset means no timeout.
    pub timeout_secs: Option<u64>,
}

/// `[cache]` section. Unset fields keep the cache defaults.
#[derive(Debug, Deserialize, Default, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct CacheSection {
    /// Freshness window in seconds.
    pub stale_time_secs: Option<u64>,
    /// Unobserved entry lifetime in seconds.
    pub gc_time_secs: Option<u64>,
    /// Additional attempts after a failed fetch.
    pub retry_count: Option<u32>,
    /// Backoff unit in milliseconds.
    pub retry_delay_ms: Option<u64>,
}

impl AppConfig {
    /// Loads config from a TOML file. Returns default if file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("failed to parse {}", path.display()))
    }
}

impl TmdbSection {
    /// Picks the command-line language, then the configured one, then `en-US`.
    pub fn language_or_default(&self, arg: Option<String>) -> String {
        arg.or_else(|| self.language.clone())
            .unwrap_or_else(|| String::from(DEFAULT_LANGUAGE))
    }
}

impl CacheSection {
    /// Builds the cache configuration, filling unset fields with defaults.
    pub fn to_cache_config(&self) -> CacheConfig {
        let defaults = CacheConfig::default();
        CacheConfig {
            stale_time: self
                .stale_time_secs
                .map_or(defaults.stale_time, Duration::from_secs),
            gc_time: self
                .gc_time_secs
                .map_or(defaults.gc_time, Duration::from_secs),
            retry_count: self.retry_count.unwrap_or(defaults.retry_count),
            retry_delay: self
                .retry_delay_ms
                .map_or(defaults.retry_delay, Duration::from_millis),
        }
    }
}
