//! Entry status and the snapshots handed to subscribers.

use std::any::Any;
use std::sync::Arc;

use tokio::time::Instant;

use crate::error::ErrorInfo;
use crate::key::QueryKey;

/// Type-erased cached result.
pub type QueryValue = Arc<dyn Any + Send + Sync>;

/// Lifecycle of a cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStatus {
    /// Never fetched (or disabled).
    Idle,
    /// First fetch in flight, no data yet.
    Loading,
    /// Last fetch succeeded.
    Success,
    /// Last fetch failed after all retries.
    Error,
}

/// Untyped entry state broadcast through the entry's watch channel.
#[derive(Clone)]
pub(crate) struct Snapshot {
    pub(crate) status: QueryStatus,
    pub(crate) data: Option<QueryValue>,
    pub(crate) error: Option<ErrorInfo>,
    pub(crate) is_fetching: bool,
    pub(crate) is_invalidated: bool,
    pub(crate) updated_at: Option<Instant>,
    /// Parameter identity of the fetch that produced `data`.
    pub(crate) params_key: Option<QueryKey>,
}

impl Snapshot {
    pub(crate) const fn idle() -> Self {
        Self {
            status: QueryStatus::Idle,
            data: None,
            error: None,
            is_fetching: false,
            is_invalidated: false,
            updated_at: None,
            params_key: None,
        }
    }

    /// Converts to a typed view for a reader interested in `params_key`.
    ///
    /// Without `keep_previous_data`, a background refetch hides the old
    /// data and reports `Loading`. Data produced by other parameters is
    /// flagged as placeholder.
    pub(crate) fn typed<T: Send + Sync + 'static>(
        &self,
        keep_previous_data: bool,
        params_key: &QueryKey,
    ) -> QueryState<T> {
        let data = self.data.as_ref().and_then(|value| {
            Arc::clone(value).downcast::<T>().map_or_else(
                |_| {
                    tracing::error!(
                        expected = std::any::type_name::<T>(),
                        "cached value has an unexpected type"
                    );
                    None
                },
                Some,
            )
        });

        let mut state = QueryState {
            status: self.status,
            data,
            error: self.error.clone(),
            is_fetching: self.is_fetching,
            is_placeholder_data: false,
            updated_at: self.updated_at,
        };
        if state.is_fetching && !keep_previous_data && state.data.is_some() {
            state.status = QueryStatus::Loading;
            state.data = None;
        }
        state.is_placeholder_data =
            state.data.is_some() && self.params_key.as_ref() != Some(params_key);
        state
    }
}

impl std::fmt::Debug for Snapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Snapshot")
            .field("status", &self.status)
            .field("has_data", &self.data.is_some())
            .field("error", &self.error)
            .field("is_fetching", &self.is_fetching)
            .field("is_invalidated", &self.is_invalidated)
            .field("updated_at", &self.updated_at)
            .field("params_key", &self.params_key)
            .finish()
    }
}

/// What a view sees for one query.
#[derive(Debug)]
#[allow(clippy::module_name_repetitions)]
pub struct QueryState<T> {
    /// Entry status.
    pub status: QueryStatus,
    /// Last successful result, or placeholder data.
    pub data: Option<Arc<T>>,
    /// Last error, if the latest fetch failed.
    pub error: Option<ErrorInfo>,
    /// A fetch for this key is in flight.
    pub is_fetching: bool,
    /// `data` is carried over from a previous key or previous parameters.
    pub is_placeholder_data: bool,
    /// When `data` was fetched.
    pub updated_at: Option<Instant>,
}

impl<T> Clone for QueryState<T> {
    fn clone(&self) -> Self {
        Self {
            status: self.status,
            data: self.data.clone(),
            error: self.error.clone(),
            is_fetching: self.is_fetching,
            is_placeholder_data: self.is_placeholder_data,
            updated_at: self.updated_at,
        }
    }
}

impl<T> QueryState<T> {
    /// Status is `Idle`.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.status == QueryStatus::Idle
    }

    /// Status is `Loading`.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.status == QueryStatus::Loading
    }

    /// Status is `Success`.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == QueryStatus::Success
    }

    /// Status is `Error`.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.status == QueryStatus::Error
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    fn params(page: u32) -> QueryKey {
        QueryKey::new("TEST").with(page)
    }

    fn success_snapshot(value: u32, is_fetching: bool) -> Snapshot {
        Snapshot {
            status: QueryStatus::Success,
            data: Some(Arc::new(value)),
            error: None,
            is_fetching,
            is_invalidated: false,
            updated_at: Some(Instant::now()),
            params_key: Some(params(1)),
        }
    }

    #[test]
    fn test_typed_downcasts_data() {
        // Arrange
        let snapshot = success_snapshot(42, false);

        // Act
        let state: QueryState<u32> = snapshot.typed(false, &params(1));

        // Assert
        assert!(state.is_success());
        assert_eq!(*state.data.unwrap(), 42);
    }

    #[test]
    fn test_typed_with_wrong_type_yields_no_data() {
        // Arrange
        let snapshot = success_snapshot(42, false);

        // Act
        let state: QueryState<String> = snapshot.typed(true, &params(1));

        // Assert
        assert!(state.data.is_none());
    }

    #[test]
    fn test_refetch_keeps_data_when_keep_previous_data() {
        // Arrange
        let snapshot = success_snapshot(7, true);

        // Act
        let state: QueryState<u32> = snapshot.typed(true, &params(1));

        // Assert
        assert!(state.is_success());
        assert!(state.is_fetching);
        assert_eq!(*state.data.unwrap(), 7);
    }

    #[test]
    fn test_refetch_hides_data_without_keep_previous_data() {
        // Arrange
        let snapshot = success_snapshot(7, true);

        // Act
        let state: QueryState<u32> = snapshot.typed(false, &params(1));

        // Assert
        assert!(state.is_loading());
        assert!(state.data.is_none());
        assert!(!state.is_placeholder_data);
    }

    #[test]
    fn test_data_from_other_params_is_placeholder() {
        // Arrange
        let settled = success_snapshot(7, false);
        let refetching = success_snapshot(7, true);

        // Act
        let same: QueryState<u32> = settled.typed(true, &params(1));
        let other: QueryState<u32> = settled.typed(true, &params(2));
        let other_while_fetching: QueryState<u32> = refetching.typed(true, &params(2));

        // Assert
        assert!(!same.is_placeholder_data);
        assert!(other.is_placeholder_data);
        assert!(other_while_fetching.is_placeholder_data);
        assert_eq!(*other_while_fetching.data.unwrap(), 7);
    }
}
