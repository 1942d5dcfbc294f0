//! View-side handle that follows one query across key changes.

use std::marker::PhantomData;
use std::sync::Arc;

use crate::cache::{Fetcher, QueryCache, Subscription};
use crate::key::QueryKey;
use crate::options::QueryOptions;
use crate::state::{QueryState, QueryStatus};

/// A query ready to be subscribed: key, fetch function and options.
pub struct BoundQuery<T> {
    key: QueryKey,
    params_key: QueryKey,
    fetcher: Fetcher,
    options: QueryOptions,
    _marker: PhantomData<fn() -> T>,
}

impl<T> std::fmt::Debug for BoundQuery<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundQuery")
            .field("key", &self.key)
            .field("params_key", &self.params_key)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl<T> BoundQuery<T> {
    /// Creates a bound query.
    ///
    /// `params_key` identifies the full parameter set; it may carry more
    /// than `key` when some parameters are not part of the cache key.
    #[must_use]
    pub fn new(key: QueryKey, params_key: QueryKey, fetcher: Fetcher, options: QueryOptions) -> Self {
        Self {
            key,
            params_key,
            fetcher,
            options,
            _marker: PhantomData,
        }
    }

    /// Returns the cache key.
    #[must_use]
    pub const fn key(&self) -> &QueryKey {
        &self.key
    }

    /// Returns the full parameter identity.
    #[must_use]
    pub const fn params_key(&self) -> &QueryKey {
        &self.params_key
    }

    /// Returns the options.
    #[must_use]
    pub const fn options(&self) -> &QueryOptions {
        &self.options
    }

    /// Replaces the options.
    #[must_use]
    pub fn with_options(mut self, options: QueryOptions) -> Self {
        self.options = options;
        self
    }
}

/// Follows a query as its parameters change, the way a screen does.
///
/// With `keep_previous_data`, switching to a new key keeps the last data
/// visible (flagged as placeholder) until the new key's first result
/// arrives. Changing parameters that are not part of the key re-fetches
/// the same entry, and so does subscribing to an entry whose data came
/// from other parameters.
pub struct QueryObserver<T> {
    cache: QueryCache,
    subscription: Subscription<T>,
    params_key: QueryKey,
    options: QueryOptions,
    placeholder: Option<Arc<T>>,
}

impl<T> std::fmt::Debug for QueryObserver<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryObserver")
            .field("subscription", &self.subscription)
            .field("params_key", &self.params_key)
            .field("options", &self.options)
            .field("has_placeholder", &self.placeholder.is_some())
            .finish_non_exhaustive()
    }
}

impl<T: Send + Sync + 'static> QueryObserver<T> {
    /// Subscribes to `query`.
    #[must_use]
    pub fn new(cache: &QueryCache, query: BoundQuery<T>) -> Self {
        let subscription = cache.subscribe_with_params(
            query.key,
            query.params_key.clone(),
            query.fetcher,
            query.options,
        );
        Self {
            cache: cache.clone(),
            subscription,
            params_key: query.params_key,
            options: query.options,
            placeholder: None,
        }
    }

    /// Switches to a new query.
    ///
    /// A different key moves the subscription to another entry. The same
    /// key with different parameters, or a query that becomes enabled,
    /// triggers a refetch of the current entry.
    pub fn set_query(&mut self, query: BoundQuery<T>) {
        if query.key == *self.subscription.key() {
            let params_changed = query.params_key != self.params_key;
            let became_enabled = !self.options.enabled && query.options.enabled;
            if query.options.enabled && (params_changed || became_enabled) {
                self.cache.refetch_with(
                    &query.key,
                    query.params_key.clone(),
                    query.fetcher,
                    &query.options,
                );
            }
            self.subscription
                .retarget(query.params_key.clone(), query.options.keep_previous_data);
        } else {
            let previous = self.state().data;
            tracing::debug!(
                from = %self.subscription.key(),
                to = %query.key,
                "switching query key"
            );
            // Assigning drops the old subscription, releasing its entry.
            self.subscription = self.cache.subscribe_with_params(
                query.key,
                query.params_key.clone(),
                query.fetcher,
                query.options,
            );
            self.placeholder = if query.options.keep_previous_data {
                previous
            } else {
                None
            };
        }
        self.params_key = query.params_key;
        self.options = query.options;
    }

    /// Returns the current cache key.
    #[must_use]
    pub const fn key(&self) -> &QueryKey {
        self.subscription.key()
    }

    /// Returns what the view should render.
    #[must_use]
    pub fn state(&self) -> QueryState<T> {
        let mut state = self.subscription.state();
        if !self.options.keep_previous_data || !state.is_fetching || state.data.is_some() {
            return state;
        }
        if let Some(placeholder) = &self.placeholder {
            state.data = Some(Arc::clone(placeholder));
            state.status = QueryStatus::Success;
            state.is_placeholder_data = true;
        }
        state
    }

    /// Forces a refetch of the current key. No-op while disabled.
    pub fn refetch(&self) -> bool {
        self.options.enabled && self.cache.refetch(self.subscription.key())
    }

    /// Waits for the next state change.
    ///
    /// Returns `false` once the entry has been disposed.
    pub async fn changed(&mut self) -> bool {
        let alive = self.subscription.changed().await;
        self.discard_placeholder_when_settled();
        alive
    }

    /// Waits until the current key has no fetch in flight and returns the
    /// state the view should render.
    pub async fn settled(&mut self) -> QueryState<T> {
        self.subscription.settled().await;
        self.discard_placeholder_when_settled();
        self.state()
    }

    fn discard_placeholder_when_settled(&mut self) {
        if !self.subscription.state().is_fetching {
            self.placeholder = None;
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use futures::FutureExt;
    use tokio::sync::Semaphore;

    use super::*;
    use crate::options::CacheConfig;
    use crate::state::QueryValue;

    /// Query on `key` whose fetch echoes `value` after taking a permit.
    fn gated_query(
        key: &str,
        value: &'static str,
        gate: &Arc<Semaphore>,
        calls: &Arc<AtomicUsize>,
    ) -> BoundQuery<String> {
        let gate = Arc::clone(gate);
        let calls = Arc::clone(calls);
        let fetcher: Fetcher = Arc::new(move || {
            calls.fetch_add(1, Ordering::SeqCst);
            let gate = Arc::clone(&gate);
            async move {
                gate.acquire().await.unwrap().forget();
                Ok(Arc::new(String::from(value)) as QueryValue)
            }
            .boxed()
        });
        let key = QueryKey::new("TEST").with(key);
        BoundQuery::new(
            key.clone(),
            key.with(value),
            fetcher,
            QueryOptions::default().keep_previous_data(true),
        )
    }

    fn test_cache() -> QueryCache {
        QueryCache::new(CacheConfig {
            retry_delay: Duration::ZERO,
            ..CacheConfig::default()
        })
    }

    #[tokio::test]
    async fn test_key_change_keeps_previous_data_as_placeholder() {
        // Arrange
        let cache = test_cache();
        let gate = Arc::new(Semaphore::new(1));
        let calls = Arc::new(AtomicUsize::new(0));
        let mut observer = QueryObserver::new(&cache, gated_query("one", "first", &gate, &calls));
        observer.settled().await;

        // Act
        observer.set_query(gated_query("two", "second", &gate, &calls));
        let during = observer.state();
        gate.add_permits(1);
        let after = observer.settled().await;

        // Assert
        assert!(during.is_success());
        assert!(during.is_fetching);
        assert!(during.is_placeholder_data);
        assert_eq!(during.data.unwrap().as_str(), "first");
        assert!(!after.is_placeholder_data);
        assert_eq!(after.data.unwrap().as_str(), "second");
        assert_eq!(cache.entry_info(&QueryKey::new("TEST").with("one")).unwrap().subscribers, 0);
    }

    #[tokio::test]
    async fn test_key_change_without_keep_previous_data_shows_loading() {
        // Arrange
        let cache = test_cache();
        let gate = Arc::new(Semaphore::new(1));
        let calls = Arc::new(AtomicUsize::new(0));
        let mut observer = QueryObserver::new(&cache, gated_query("one", "first", &gate, &calls));
        observer.settled().await;

        // Act
        let next = gated_query("two", "second", &gate, &calls);
        let options = next.options().keep_previous_data(false);
        observer.set_query(next.with_options(options));
        let during = observer.state();

        // Assert
        assert!(during.is_loading());
        assert!(during.data.is_none());
    }

    #[tokio::test]
    async fn test_params_change_on_same_key_refetches_and_flags_placeholder() {
        // Arrange
        let cache = test_cache();
        let gate = Arc::new(Semaphore::new(1));
        let calls = Arc::new(AtomicUsize::new(0));
        let mut observer = QueryObserver::new(&cache, gated_query("same", "first", &gate, &calls));
        observer.settled().await;

        // Act
        observer.set_query(gated_query("same", "second", &gate, &calls));
        let during = observer.state();
        gate.add_permits(1);
        let after = observer.settled().await;

        // Assert
        assert!(during.is_fetching);
        assert!(during.is_placeholder_data);
        assert_eq!(during.data.unwrap().as_str(), "first");
        assert_eq!(after.data.unwrap().as_str(), "second");
        assert!(!after.is_placeholder_data);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_identical_query_does_not_refetch() {
        // Arrange
        let cache = test_cache();
        let gate = Arc::new(Semaphore::new(1));
        let calls = Arc::new(AtomicUsize::new(0));
        let mut observer = QueryObserver::new(&cache, gated_query("same", "first", &gate, &calls));
        observer.settled().await;

        // Act
        observer.set_query(gated_query("same", "first", &gate, &calls));
        let state = observer.state();

        // Assert
        assert!(!state.is_fetching);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_enabling_a_disabled_query_fetches() {
        // Arrange
        let cache = test_cache();
        let gate = Arc::new(Semaphore::new(1));
        let calls = Arc::new(AtomicUsize::new(0));
        let disabled = gated_query("gated", "value", &gate, &calls);
        let options = disabled.options().enabled(false);
        let mut observer = QueryObserver::new(&cache, disabled.with_options(options));
        let idle = observer.state();

        // Act
        observer.set_query(gated_query("gated", "value", &gate, &calls));
        let after = observer.settled().await;

        // Assert
        assert!(idle.is_idle());
        assert_eq!(after.data.unwrap().as_str(), "value");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_refetch_while_disabled_is_noop() {
        // Arrange
        let cache = test_cache();
        let gate = Arc::new(Semaphore::new(0));
        let calls = Arc::new(AtomicUsize::new(0));
        let query = gated_query("gated", "value", &gate, &calls);
        let options = query.options().enabled(false);
        let observer = QueryObserver::new(&cache, query.with_options(options));

        // Act
        let scheduled = observer.refetch();

        // Assert
        assert!(!scheduled);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
