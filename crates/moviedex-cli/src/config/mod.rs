//! moviedex configuration.
//!
//! `config.toml` is optional and holds two sections: `[tmdb]` request
//! defaults (base URL, language, region, timeout) and `[cache]` tuning for
//! the query cache (stale and gc windows, retries). The API token is never
//! stored here; it comes from `TMDB_API_TOKEN`.

#[allow(clippy::module_inception)]
mod config;
mod paths;

#[allow(clippy::module_name_repetitions)]
pub use config::{AppConfig, CacheSection, TmdbSection};
pub use paths::resolve_config_path;
