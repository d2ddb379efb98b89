use std::marker::PhantomData;
use std::sync::Arc;

use tokio::sync::watch;
use verdant_core::{ClientError, ResourceKey};

use crate::query::{Entry, QueryCache};
use crate::state::{FetchState, QueryState, RawState};

/// A live view of one cache entry.
///
/// Every subscription to the same key observes the same state. Dropping the
/// subscription detaches it; once a key has no subscribers it becomes
/// eligible for eviction after `gc_time`.
pub struct Subscription<V> {
    cache: QueryCache,
    entry: Arc<Entry>,
    receiver: watch::Receiver<RawState>,
    _value: PhantomData<fn() -> V>,
}

impl<V: Send + Sync + 'static> Subscription<V> {
    pub(crate) fn new(cache: QueryCache, entry: Arc<Entry>, receiver: watch::Receiver<RawState>) -> Self {
        Self {
            cache,
            entry,
            receiver,
            _value: PhantomData,
        }
    }

    pub fn key(&self) -> &ResourceKey {
        self.entry.key()
    }

    pub fn state(&self) -> QueryState<V> {
        self.receiver.borrow().downcast()
    }

    pub fn fetch_state(&self) -> FetchState<V> {
        self.state().fetch_state()
    }

    pub fn data(&self) -> Option<Arc<V>> {
        self.state().data
    }

    pub fn error(&self) -> Option<ClientError> {
        self.receiver.borrow().error.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.receiver.borrow().is_loading()
    }

    pub fn is_fetching(&self) -> bool {
        self.receiver.borrow().is_fetching
    }

    pub fn is_error(&self) -> bool {
        self.receiver.borrow().is_error()
    }

    /// Wait for the next state change. Returns `false` once the entry can no
    /// longer change.
    pub async fn changed(&mut self) -> bool {
        self.receiver.changed().await.is_ok()
    }

    /// Wait until no request is in flight and return the resulting state.
    pub async fn settled(&mut self) -> QueryState<V> {
        let _ = self.receiver.wait_for(|state| !state.is_fetching).await;
        self.state()
    }

    /// Force a new request for this key.
    pub fn refetch(&self) -> bool {
        self.cache.refetch(self.key())
    }

    pub fn unsubscribe(self) {}
}

impl<V> Drop for Subscription<V> {
    fn drop(&mut self) {
        self.cache.release(&self.entry);
    }
}

impl<V> std::fmt::Debug for Subscription<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("key", self.entry.key())
            .field("status", &self.receiver.borrow().status)
            .finish()
    }
}
