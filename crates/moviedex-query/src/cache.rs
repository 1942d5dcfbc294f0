//! Query cache engine.
//!
//! One [`QueryCache`] is constructed per process and shared by cloning the
//! handle. Each [`QueryKey`] owns exactly one entry; the entry's state is
//! published through a `tokio::sync::watch` channel that every
//! [`Subscription`] reads from.
//!
//! Fetches run as detached Tokio tasks. Dropping a subscription never
//! cancels a fetch, so the result still lands in the cache for later
//! subscribers.

use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::future::BoxFuture;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::instrument;

use crate::error::ErrorInfo;
use crate::key::QueryKey;
use crate::options::{CacheConfig, QueryOptions};
use crate::state::{QueryState, QueryStatus, QueryValue, Snapshot};

/// Future produced by a [`Fetcher`].
pub type FetchFuture = BoxFuture<'static, Result<QueryValue, ErrorInfo>>;

/// Bound fetch function stored on an entry so it can be re-run on
/// invalidation or refetch.
pub type Fetcher = Arc<dyn Fn() -> FetchFuture + Send + Sync>;

/// Retry settings resolved for one entry.
#[derive(Debug, Clone, Copy)]
struct RetryPolicy {
    retry_count: u32,
    retry_delay: Duration,
}

/// Fetch function together with the parameters it fetches.
#[derive(Clone)]
struct BoundFetch {
    params_key: QueryKey,
    fetcher: Fetcher,
}

/// One cache record.
struct Entry {
    /// Distinguishes re-created entries for the same key.
    id: u64,
    /// Current state; receivers are handed out to subscribers.
    tx: watch::Sender<Snapshot>,
    /// Number of live subscriptions.
    subscribers: usize,
    /// Last fetch function registered by an enabled subscriber.
    fetch: Option<BoundFetch>,
    /// Parameters of the fetch in flight.
    in_flight: Option<QueryKey>,
    /// Retry settings of the last enabled subscriber.
    retry: RetryPolicy,
    /// Run another fetch as soon as the in-flight one completes.
    refetch_pending: bool,
    /// Last subscribe, unsubscribe or completed fetch.
    last_active: Instant,
}

impl Entry {
    fn new(id: u64, retry: RetryPolicy, now: Instant) -> Self {
        let (tx, _rx) = watch::channel(Snapshot::idle());
        Self {
            id,
            tx,
            subscribers: 0,
            fetch: None,
            in_flight: None,
            retry,
            refetch_pending: false,
            last_active: now,
        }
    }

    fn is_fetching(&self) -> bool {
        self.tx.borrow().is_fetching
    }

    /// Whether the cached data was fetched with other parameters.
    fn holds_other_params(&self, params_key: &QueryKey) -> bool {
        let snapshot = self.tx.borrow();
        snapshot.data.is_some() && snapshot.params_key.as_ref() != Some(params_key)
    }

    /// Whether a subscription should trigger a fetch.
    fn needs_fetch(&self, stale_time: Duration, now: Instant) -> bool {
        let snapshot = self.tx.borrow();
        if snapshot.is_fetching {
            return false;
        }
        match snapshot.status {
            QueryStatus::Idle | QueryStatus::Loading | QueryStatus::Error => true,
            QueryStatus::Success => {
                snapshot.is_invalidated
                    || snapshot
                        .updated_at
                        .is_none_or(|at| now.saturating_duration_since(at) >= stale_time)
            }
        }
    }
}

/// Read-only view of an entry's bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryInfo {
    /// Entry status.
    pub status: QueryStatus,
    /// Whether a successful result is cached.
    pub has_data: bool,
    /// Whether a fetch is in flight.
    pub is_fetching: bool,
    /// Whether the entry was invalidated since its last success.
    pub is_invalidated: bool,
    /// Number of live subscriptions.
    pub subscribers: usize,
    /// When the cached data was fetched.
    pub updated_at: Option<Instant>,
}

/// Aggregate counters over all entries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of entries.
    pub entries: usize,
    /// Entries with at least one subscriber.
    pub subscribed: usize,
    /// Entries with a fetch in flight.
    pub fetching: usize,
}

struct CacheInner {
    config: CacheConfig,
    entries: Mutex<HashMap<QueryKey, Entry>>,
    next_entry_id: AtomicU64,
}

/// Shared query cache handle.
///
/// Cloning is cheap; all clones refer to the same entries.
/// Methods that may start a fetch must be called from within a Tokio
/// runtime.
#[derive(Clone)]
#[allow(clippy::module_name_repetitions)]
pub struct QueryCache {
    inner: Arc<CacheInner>,
}

impl std::fmt::Debug for QueryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryCache")
            .field("config", &self.inner.config)
            .field("stats", &self.stats())
            .finish()
    }
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

impl QueryCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new(config: CacheConfig) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                config,
                entries: Mutex::new(HashMap::new()),
                next_entry_id: AtomicU64::new(0),
            }),
        }
    }

    /// Returns the cache-wide defaults.
    #[must_use]
    pub fn config(&self) -> &CacheConfig {
        &self.inner.config
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<QueryKey, Entry>> {
        self.inner
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn retry_policy(&self, options: &QueryOptions) -> RetryPolicy {
        RetryPolicy {
            retry_count: options.retry_count.unwrap_or(self.inner.config.retry_count),
            retry_delay: self.inner.config.retry_delay,
        }
    }

    /// Registers interest in `key`.
    ///
    /// Creates the entry on first use. When `options.enabled` is set and the
    /// entry has no fresh data (never fetched, failed, invalidated or older
    /// than the stale time), a fetch is started unless one is already in
    /// flight for this key.
    pub fn subscribe<T: Send + Sync + 'static>(
        &self,
        key: QueryKey,
        fetcher: Fetcher,
        options: QueryOptions,
    ) -> Subscription<T> {
        let params_key = key.clone();
        self.subscribe_with_params(key, params_key, fetcher, options)
    }

    /// Registers interest in `key` for the parameter set `params_key`.
    ///
    /// Like [`QueryCache::subscribe`], and additionally re-fetches when the
    /// cached data was produced by other parameters. That data stays
    /// readable, flagged as placeholder, until the new result lands.
    pub fn subscribe_with_params<T: Send + Sync + 'static>(
        &self,
        key: QueryKey,
        params_key: QueryKey,
        fetcher: Fetcher,
        options: QueryOptions,
    ) -> Subscription<T> {
        let now = Instant::now();
        let retry = self.retry_policy(&options);
        let mut entries = self.lock();
        let entry = entries.entry(key.clone()).or_insert_with(|| {
            tracing::debug!(key = %key, "creating cache entry");
            let id = self.inner.next_entry_id.fetch_add(1, Ordering::Relaxed);
            Entry::new(id, retry, now)
        });
        entry.subscribers = entry.subscribers.saturating_add(1);
        entry.last_active = now;

        if options.enabled {
            entry.fetch = Some(BoundFetch {
                params_key: params_key.clone(),
                fetcher,
            });
            entry.retry = retry;
            let stale_time = options.stale_time.unwrap_or(self.inner.config.stale_time);
            if entry.is_fetching() {
                if entry.in_flight.as_ref() != Some(&params_key) {
                    tracing::debug!(key = %key, params = %params_key, "queueing fetch for new parameters");
                    entry.refetch_pending = true;
                }
            } else if entry.needs_fetch(stale_time, now) || entry.holds_other_params(&params_key) {
                self.start_fetch(&key, entry);
            } else {
                tracing::debug!(key = %key, "serving from cache");
            }
        }

        let rx = entry.tx.subscribe();
        let entry_id = entry.id;
        drop(entries);

        Subscription {
            cache: self.clone(),
            key,
            entry_id,
            rx,
            params_key,
            keep_previous_data: options.keep_previous_data,
            _marker: PhantomData,
        }
    }

    /// Ends a subscription. Equivalent to dropping it.
    pub fn unsubscribe<T>(&self, subscription: Subscription<T>) {
        drop(subscription);
    }

    /// Marks every entry whose key starts with `prefix` as stale and
    /// re-fetches the ones that currently have subscribers.
    ///
    /// Returns the number of matched entries.
    #[instrument(skip_all, fields(prefix = %prefix))]
    pub fn invalidate(&self, prefix: &QueryKey) -> usize {
        let mut entries = self.lock();
        let mut matched: usize = 0;
        for (key, entry) in entries.iter_mut().filter(|(key, _)| key.starts_with(prefix)) {
            matched = matched.saturating_add(1);
            entry.tx.send_modify(|s| s.is_invalidated = true);
            if entry.subscribers == 0 {
                continue;
            }
            if entry.is_fetching() {
                entry.refetch_pending = true;
            } else {
                self.start_fetch(key, entry);
            }
        }
        tracing::info!(matched, "invalidated queries");
        matched
    }

    /// Re-runs the registered fetch for `key` regardless of freshness.
    ///
    /// If a fetch is already in flight, another one follows it. Returns
    /// `false` if the entry does not exist or was never enabled.
    pub fn refetch(&self, key: &QueryKey) -> bool {
        let mut entries = self.lock();
        let Some(entry) = entries.get_mut(key) else {
            return false;
        };
        self.schedule_refetch(key, entry)
    }

    /// Replaces the fetch function of an existing entry and re-fetches.
    ///
    /// Used when parameters that are not part of the key change.
    pub(crate) fn refetch_with(
        &self,
        key: &QueryKey,
        params_key: QueryKey,
        fetcher: Fetcher,
        options: &QueryOptions,
    ) -> bool {
        let retry = self.retry_policy(options);
        let mut entries = self.lock();
        let Some(entry) = entries.get_mut(key) else {
            return false;
        };
        entry.fetch = Some(BoundFetch { params_key, fetcher });
        entry.retry = retry;
        self.schedule_refetch(key, entry)
    }

    fn schedule_refetch(&self, key: &QueryKey, entry: &mut Entry) -> bool {
        if entry.fetch.is_none() {
            return false;
        }
        if entry.is_fetching() {
            entry.refetch_pending = true;
        } else {
            self.start_fetch(key, entry);
        }
        true
    }

    /// Returns the bookkeeping of one entry.
    #[must_use]
    pub fn entry_info(&self, key: &QueryKey) -> Option<EntryInfo> {
        let entries = self.lock();
        let entry = entries.get(key)?;
        let snapshot = entry.tx.borrow();
        Some(EntryInfo {
            status: snapshot.status,
            has_data: snapshot.data.is_some(),
            is_fetching: snapshot.is_fetching,
            is_invalidated: snapshot.is_invalidated,
            subscribers: entry.subscribers,
            updated_at: snapshot.updated_at,
        })
    }

    /// Returns aggregate counters.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        let entries = self.lock();
        entries.values().fold(CacheStats::default(), |mut stats, entry| {
            stats.entries = stats.entries.saturating_add(1);
            if entry.subscribers > 0 {
                stats.subscribed = stats.subscribed.saturating_add(1);
            }
            if entry.is_fetching() {
                stats.fetching = stats.fetching.saturating_add(1);
            }
            stats
        })
    }

    /// Removes entries that have had no subscribers and no fetch activity
    /// for at least `gc_time`. Returns the number removed.
    pub fn collect_garbage(&self) -> usize {
        let now = Instant::now();
        let gc_time = self.inner.config.gc_time;
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|key, entry| {
            let evictable = entry.subscribers == 0
                && !entry.is_fetching()
                && now.saturating_duration_since(entry.last_active) >= gc_time;
            if evictable {
                tracing::debug!(key = %key, "evicting unused entry");
            }
            !evictable
        });
        before.saturating_sub(entries.len())
    }

    /// Drops every entry. In-flight fetches complete but their results are
    /// discarded; existing subscriptions stop receiving updates.
    pub fn dispose_all(&self) {
        let mut entries = self.lock();
        tracing::debug!(entries = entries.len(), "disposing all cache entries");
        entries.clear();
    }

    /// Marks `entry` as fetching and spawns the fetch task. The caller
    /// holds the entries lock.
    fn start_fetch(&self, key: &QueryKey, entry: &mut Entry) {
        if entry.fetch.is_none() {
            return;
        }
        entry.tx.send_modify(|s| {
            s.is_fetching = true;
            if s.data.is_none() {
                s.status = QueryStatus::Loading;
                s.error = None;
            }
        });
        self.spawn_fetch(key, entry);
    }

    /// Spawns the registered fetch without publishing a state change.
    fn spawn_fetch(&self, key: &QueryKey, entry: &mut Entry) {
        let Some(BoundFetch { params_key, fetcher }) = entry.fetch.clone() else {
            return;
        };
        entry.refetch_pending = false;
        entry.in_flight = Some(params_key.clone());
        tracing::debug!(key = %key, params = %params_key, "fetching");

        let cache = self.clone();
        let key = key.clone();
        let entry_id = entry.id;
        let retry = entry.retry;
        tokio::spawn(async move {
            let result = fetch_with_retry(&key, &fetcher, retry).await;
            cache.finish_fetch(&key, entry_id, params_key, result);
        });
    }

    /// Stores a fetch result. A queued refetch is started in the same
    /// state update, so readers never observe a settled entry in between.
    fn finish_fetch(
        &self,
        key: &QueryKey,
        entry_id: u64,
        params_key: QueryKey,
        result: Result<QueryValue, ErrorInfo>,
    ) {
        let now = Instant::now();
        let mut entries = self.lock();
        let Some(entry) = entries.get_mut(key).filter(|entry| entry.id == entry_id) else {
            tracing::debug!(key = %key, "entry was disposed; dropping fetch result");
            return;
        };
        entry.last_active = now;
        entry.in_flight = None;
        let refetch = entry.refetch_pending && entry.subscribers > 0 && entry.fetch.is_some();
        entry.refetch_pending = false;

        match result {
            Ok(value) => {
                entry.tx.send_modify(|s| {
                    s.status = QueryStatus::Success;
                    s.data = Some(value);
                    s.error = None;
                    s.is_fetching = refetch;
                    s.is_invalidated = false;
                    s.updated_at = Some(now);
                    s.params_key = Some(params_key);
                });
                tracing::debug!(key = %key, "fetch succeeded");
            }
            Err(error) => {
                tracing::error!(key = %key, error = %error, "query failed");
                entry.tx.send_modify(|s| {
                    if refetch && s.data.is_none() {
                        s.status = QueryStatus::Loading;
                        s.error = None;
                    } else {
                        s.status = QueryStatus::Error;
                        s.error = Some(error);
                    }
                    s.is_fetching = refetch;
                });
            }
        }

        if refetch {
            self.spawn_fetch(key, entry);
        }
    }
}

/// Runs `fetcher` once plus up to `retry.retry_count` more times.
async fn fetch_with_retry(
    key: &QueryKey,
    fetcher: &Fetcher,
    retry: RetryPolicy,
) -> Result<QueryValue, ErrorInfo> {
    let mut attempt: u32 = 0;
    loop {
        match fetcher().await {
            Ok(value) => return Ok(value),
            Err(error) if attempt < retry.retry_count => {
                attempt = attempt.saturating_add(1);
                tracing::warn!(
                    key = %key,
                    retry = attempt,
                    max_retries = retry.retry_count,
                    error = %error,
                    "query fetch failed. Retrying..."
                );
                let backoff = retry.retry_delay.saturating_mul(attempt);
                if !backoff.is_zero() {
                    tokio::time::sleep(backoff).await;
                }
            }
            Err(error) => return Err(error),
        }
    }
}

/// A live registration of interest in one key.
///
/// Dropping it decrements the entry's subscriber count.
pub struct Subscription<T> {
    cache: QueryCache,
    key: QueryKey,
    entry_id: u64,
    rx: watch::Receiver<Snapshot>,
    params_key: QueryKey,
    keep_previous_data: bool,
    _marker: PhantomData<fn() -> T>,
}

impl<T> std::fmt::Debug for Subscription<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("key", &self.key)
            .field("params_key", &self.params_key)
            .field("keep_previous_data", &self.keep_previous_data)
            .finish_non_exhaustive()
    }
}

impl<T: Send + Sync + 'static> Subscription<T> {
    /// Returns the subscribed key.
    #[must_use]
    pub const fn key(&self) -> &QueryKey {
        &self.key
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> QueryState<T> {
        self.rx.borrow().typed(self.keep_previous_data, &self.params_key)
    }

    /// Waits for the next state change.
    ///
    /// Returns `false` once the entry has been disposed.
    pub async fn changed(&mut self) -> bool {
        self.rx.changed().await.is_ok()
    }

    /// Waits until no fetch is in flight for this key and returns the
    /// resulting state.
    pub async fn settled(&mut self) -> QueryState<T> {
        let keep_previous_data = self.keep_previous_data;
        let params_key = &self.params_key;
        let settled = self
            .rx
            .wait_for(|s| !s.is_fetching)
            .await
            .map(|s| s.typed(keep_previous_data, params_key));
        settled.unwrap_or_else(|_| self.state())
    }

    /// Points the subscription at another parameter set of the same key.
    pub(crate) fn retarget(&mut self, params_key: QueryKey, keep_previous_data: bool) {
        self.params_key = params_key;
        self.keep_previous_data = keep_previous_data;
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        let mut entries = self.cache.lock();
        if let Some(entry) = entries
            .get_mut(&self.key)
            .filter(|entry| entry.id == self.entry_id)
        {
            entry.subscribers = entry.subscribers.saturating_sub(1);
            entry.last_active = Instant::now();
            if entry.subscribers == 0 {
                tracing::debug!(key = %self.key, "no subscribers left; entry is evictable");
            }
        }
    }
}
