use std::any::Any;
use std::sync::Arc;
use std::time::Instant;

use verdant_core::ClientError;

/// Lifecycle of one key (or one mutation).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchStatus {
    /// Nothing requested yet.
    Idle,
    /// A request is in flight and no value has ever resolved.
    Pending,
    /// The last completed request succeeded.
    Success,
    /// The last completed request failed.
    Failure,
}

/// The per-key state machine, collapsed to the variant a caller branches on.
#[derive(Debug)]
pub enum FetchState<V: ?Sized> {
    Idle,
    Pending,
    Success(Arc<V>),
    Failure(ClientError),
}

/// Snapshot of one key as observed by its subscribers.
///
/// `data` survives a later failure (stale-while-error) and stays visible
/// while a background refetch runs (`is_fetching` without `is_loading`).
#[derive(Debug)]
pub struct QueryState<V: ?Sized> {
    pub status: FetchStatus,
    pub data: Option<Arc<V>>,
    pub error: Option<ClientError>,
    pub is_fetching: bool,
    /// When `data` last resolved.
    pub updated_at: Option<Instant>,
}

/// Type-erased state stored in the cache.
pub(crate) type RawState = QueryState<dyn Any + Send + Sync>;

impl<V: ?Sized> Clone for QueryState<V> {
    fn clone(&self) -> Self {
        Self {
            status: self.status,
            data: self.data.clone(),
            error: self.error.clone(),
            is_fetching: self.is_fetching,
            updated_at: self.updated_at,
        }
    }
}

impl<V: ?Sized> QueryState<V> {
    pub fn idle() -> Self {
        Self {
            status: FetchStatus::Idle,
            data: None,
            error: None,
            is_fetching: false,
            updated_at: None,
        }
    }

    /// First load in progress: nothing to show yet.
    pub fn is_loading(&self) -> bool {
        self.status == FetchStatus::Pending
    }

    pub fn is_error(&self) -> bool {
        self.status == FetchStatus::Failure
    }

    pub fn is_success(&self) -> bool {
        self.status == FetchStatus::Success
    }

    pub fn data(&self) -> Option<&V> {
        self.data.as_deref()
    }

    pub fn fetch_state(&self) -> FetchState<V> {
        match (self.status, &self.data, &self.error) {
            (FetchStatus::Success, Some(data), _) => FetchState::Success(data.clone()),
            (FetchStatus::Failure, _, Some(err)) => FetchState::Failure(err.clone()),
            (FetchStatus::Idle, _, _) => FetchState::Idle,
            _ => FetchState::Pending,
        }
    }
}

impl RawState {
    pub(crate) fn downcast<V: Send + Sync + 'static>(&self) -> QueryState<V> {
        let data = self.data.clone().and_then(|data| match data.downcast::<V>() {
            Ok(data) => Some(data),
            Err(_) => {
                tracing::warn!(
                    expected = std::any::type_name::<V>(),
                    "cached value has a different type than requested"
                );
                None
            }
        });
        QueryState {
            status: self.status,
            data,
            error: self.error.clone(),
            is_fetching: self.is_fetching,
            updated_at: self.updated_at,
        }
    }
}

/// Snapshot of a [`Mutation`](crate::Mutation).
#[derive(Debug)]
pub struct MutationState<R> {
    pub status: FetchStatus,
    pub data: Option<Arc<R>>,
    pub error: Option<ClientError>,
}

impl<R> Clone for MutationState<R> {
    fn clone(&self) -> Self {
        Self {
            status: self.status,
            data: self.data.clone(),
            error: self.error.clone(),
        }
    }
}

impl<R> MutationState<R> {
    pub fn idle() -> Self {
        Self {
            status: FetchStatus::Idle,
            data: None,
            error: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == FetchStatus::Pending
    }

    pub fn is_error(&self) -> bool {
        self.status == FetchStatus::Failure
    }

    pub fn is_success(&self) -> bool {
        self.status == FetchStatus::Success
    }
}
