//! Cache-wide defaults and per-query options.

use std::time::Duration;

/// Default freshness window.
const DEFAULT_STALE_TIME: Duration = Duration::from_secs(60);

/// Default time an unobserved entry is kept before it may be collected.
const DEFAULT_GC_TIME: Duration = Duration::from_secs(300);

/// Default number of additional attempts after a failed fetch.
const DEFAULT_RETRY_COUNT: u32 = 1;

/// Default backoff unit between attempts (multiplied by the attempt number).
const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Cache-wide defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    /// How long a successful result counts as fresh.
    pub stale_time: Duration,
    /// How long an entry without subscribers survives `collect_garbage`.
    pub gc_time: Duration,
    /// Additional attempts after the first failure.
    pub retry_count: u32,
    /// Backoff unit; attempt `n` waits `retry_delay * n`.
    pub retry_delay: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            stale_time: DEFAULT_STALE_TIME,
            gc_time: DEFAULT_GC_TIME,
            retry_count: DEFAULT_RETRY_COUNT,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }
}

/// Options for one subscription.
///
/// `retry_count` and `stale_time` fall back to [`CacheConfig`] when `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryOptions {
    /// When `false`, the query never fetches and reports `Idle`.
    pub enabled: bool,
    /// Keep showing the last data while a new result is being fetched.
    pub keep_previous_data: bool,
    /// Per-query retry override.
    pub retry_count: Option<u32>,
    /// Per-query freshness override.
    pub stale_time: Option<Duration>,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            keep_previous_data: false,
            retry_count: None,
            stale_time: None,
        }
    }
}

impl QueryOptions {
    /// Sets the enabled flag.
    #[must_use]
    pub const fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Sets the keep-previous-data flag.
    #[must_use]
    pub const fn keep_previous_data(mut self, keep: bool) -> Self {
        self.keep_previous_data = keep;
        self
    }

    /// Overrides the retry count.
    #[must_use]
    pub const fn retry_count(mut self, retry_count: u32) -> Self {
        self.retry_count = Some(retry_count);
        self
    }

    /// Overrides the freshness window.
    #[must_use]
    pub const fn stale_time(mut self, stale_time: Duration) -> Self {
        self.stale_time = Some(stale_time);
        self
    }
}
