use std::any::Any;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio::sync::watch;
use verdant_core::{ClientConfig, ClientError, ResourceKey};
use verdant_events::EventBus;

use crate::retry::RetryPolicy;
use crate::state::{FetchStatus, QueryState, RawState};
use crate::subscription::Subscription;

pub(crate) type AnyValue = Arc<dyn Any + Send + Sync>;

type FetchFuture = Pin<Box<dyn Future<Output = Result<AnyValue, ClientError>> + Send>>;
type Fetcher = Arc<dyn Fn() -> FetchFuture + Send + Sync>;

/// Emitted on the cache's event bus whenever a fetch ends in `Failure`.
#[derive(Debug, Clone)]
pub struct QueryFailed {
    pub key: ResourceKey,
    pub error: ClientError,
}

/// Lifecycle policy of a [`QueryCache`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheOptions {
    /// Age after which a cached value is revalidated by new subscribers.
    pub stale_time: Duration,
    /// Eviction delay once the last subscriber detaches. `None` keeps entries
    /// for the lifetime of the cache.
    pub gc_time: Option<Duration>,
    pub retry: RetryPolicy,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            stale_time: Duration::ZERO,
            gc_time: None,
            retry: RetryPolicy::none(),
        }
    }
}

impl CacheOptions {
    pub fn from_config(config: &ClientConfig) -> Self {
        Self {
            stale_time: config.stale_time,
            gc_time: config.gc_time,
            retry: RetryPolicy::from(config.retry),
        }
    }

    pub fn with_stale_time(mut self, stale_time: Duration) -> Self {
        self.stale_time = stale_time;
        self
    }

    pub fn with_gc_time(mut self, gc_time: Duration) -> Self {
        self.gc_time = Some(gc_time);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

/// Bookkeeping guarded by the entry lock. Always taken before the state
/// channel's own lock.
struct Control {
    /// Sequence number of the most recently issued request.
    seq: u64,
    in_flight: bool,
    subscribers: usize,
    fetcher: Option<Fetcher>,
    /// Bumped on every attach so a scheduled eviction can tell it is outdated.
    generation: u64,
}

pub(crate) struct Entry {
    key: ResourceKey,
    state: watch::Sender<RawState>,
    control: Mutex<Control>,
}

impl Entry {
    fn new(key: ResourceKey) -> Self {
        let (state, _) = watch::channel(RawState::idle());
        Self {
            key,
            state,
            control: Mutex::new(Control {
                seq: 0,
                in_flight: false,
                subscribers: 0,
                fetcher: None,
                generation: 0,
            }),
        }
    }

    fn control(&self) -> MutexGuard<'_, Control> {
        self.control.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn key(&self) -> &ResourceKey {
        &self.key
    }

    pub(crate) fn watch(&self) -> watch::Receiver<RawState> {
        self.state.subscribe()
    }

    pub(crate) fn snapshot(&self) -> RawState {
        self.state.borrow().clone()
    }
}

struct CacheInner {
    entries: DashMap<ResourceKey, Arc<Entry>>,
    options: CacheOptions,
    events: Option<EventBus>,
}

/// Process-wide store of keyed fetch states.
///
/// Guarantees at most one in-flight request per key, shares one state per
/// key among all subscribers, and discards responses from superseded
/// requests. `QueryCache` is a cheap `Clone` handle; every clone sees the
/// same entries.
#[derive(Clone)]
pub struct QueryCache {
    inner: Arc<CacheInner>,
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new(CacheOptions::default())
    }
}

impl QueryCache {
    pub fn new(options: CacheOptions) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                entries: DashMap::new(),
                options,
                events: None,
            }),
        }
    }

    /// Create a cache that publishes [`QueryFailed`] events on `bus`.
    pub fn with_events(options: CacheOptions, bus: EventBus) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                entries: DashMap::new(),
                options,
                events: Some(bus),
            }),
        }
    }

    pub fn options(&self) -> &CacheOptions {
        &self.inner.options
    }

    /// Subscribe to `key`, fetching with `fetch` when needed.
    ///
    /// - unknown key: `Idle -> Pending`, `fetch` runs once
    /// - request already in flight: attach to it, `fetch` is not called
    /// - cached value: returned immediately; revalidated in the background
    ///   when older than `stale_time`
    /// - previous failure: fetched again
    ///
    /// The latest `fetch` supplied for a key is the one later refetches use.
    /// Must be called within a tokio runtime.
    pub fn subscribe<V, F, Fut>(&self, key: ResourceKey, fetch: F) -> Subscription<V>
    where
        V: Send + Sync + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<V, ClientError>> + Send + 'static,
    {
        let fetcher: Fetcher = Arc::new(move || -> FetchFuture {
            let fut = fetch();
            Box::pin(async move { fut.await.map(|value| Arc::new(value) as AnyValue) })
        });

        // Count the subscriber under the map's shard lock so a concurrent
        // eviction cannot remove an entry that is being attached to.
        let entry = {
            let slot = self
                .inner
                .entries
                .entry(key.clone())
                .or_insert_with(|| Arc::new(Entry::new(key.clone())));
            let entry = Arc::clone(slot.value());
            let mut control = entry.control();
            control.subscribers += 1;
            control.generation += 1;
            drop(control);
            entry
        };
        let receiver = entry.watch();

        let started = {
            let mut control = entry.control();
            control.fetcher = Some(fetcher);
            let needs_fetch = !control.in_flight && {
                let state = entry.state.borrow();
                match state.status {
                    FetchStatus::Success => is_stale(state.updated_at, self.inner.options.stale_time),
                    FetchStatus::Idle | FetchStatus::Pending | FetchStatus::Failure => true,
                }
            };
            if needs_fetch {
                self.begin(&entry, &mut control, false)
            } else {
                tracing::debug!(key = %key, in_flight = control.in_flight, "attached to cached entry");
                None
            }
        };
        if let Some((seq, fetcher)) = started {
            self.spawn_fetch(entry.clone(), seq, fetcher);
        }

        Subscription::new(self.clone(), entry, receiver)
    }

    /// Issue a new request for `key`, superseding any request in flight.
    ///
    /// Returns `false` when the key is unknown or has never been given a
    /// fetch function.
    pub fn refetch(&self, key: &ResourceKey) -> bool {
        match self.lookup(key) {
            Some(entry) => self.force_fetch(&entry),
            None => false,
        }
    }

    /// Mark `key` outdated: entries with subscribers refetch immediately,
    /// entries without subscribers are dropped.
    pub fn invalidate(&self, key: &ResourceKey) {
        let Some(entry) = self.lookup(key) else {
            return;
        };
        let active = entry.control().subscribers > 0;
        if active {
            self.force_fetch(&entry);
        } else {
            self.evict(&entry);
        }
    }

    /// Forget the value of `key`. Entries with subscribers start over as a
    /// first load, so the old value is never shown again; entries without
    /// subscribers are dropped. Returns `false` for an unknown key.
    pub fn purge(&self, key: &ResourceKey) -> bool {
        let Some(entry) = self.lookup(key) else {
            return false;
        };
        let next = {
            let mut control = entry.control();
            if control.subscribers == 0 {
                None
            } else {
                Some(self.begin(&entry, &mut control, true))
            }
        };
        match next {
            None => self.evict(&entry),
            Some(Some((seq, fetcher))) => self.spawn_fetch(entry, seq, fetcher),
            // Subscribed but never given a fetch function.
            Some(None) => reset(&entry),
        }
        tracing::debug!(key = %key, "purged");
        true
    }

    /// [`invalidate`](Self::invalidate) every key that starts with `prefix`.
    pub fn invalidate_prefix(&self, prefix: &ResourceKey) {
        let keys: Vec<ResourceKey> = self
            .inner
            .entries
            .iter()
            .filter(|e| e.key().starts_with(prefix))
            .map(|e| e.key().clone())
            .collect();
        tracing::debug!(prefix = %prefix, count = keys.len(), "invalidating keys");
        for key in keys {
            self.invalidate(&key);
        }
    }

    /// Refetch every stale entry that still has subscribers (focus change).
    pub fn refetch_active(&self) -> usize {
        let entries: Vec<Arc<Entry>> = self.inner.entries.iter().map(|e| e.value().clone()).collect();
        let mut started = 0;
        for entry in entries {
            let next = {
                let mut control = entry.control();
                let stale = {
                    let state = entry.state.borrow();
                    is_stale(state.updated_at, self.inner.options.stale_time)
                };
                if control.subscribers > 0 && !control.in_flight && stale {
                    self.begin(&entry, &mut control, false)
                } else {
                    None
                }
            };
            if let Some((seq, fetcher)) = next {
                self.spawn_fetch(entry, seq, fetcher);
                started += 1;
            }
        }
        started
    }

    /// Drop `key` outright. A response still in flight for it is discarded,
    /// and subscribers still attached observe `Idle`.
    pub fn remove(&self, key: &ResourceKey) -> bool {
        match self.inner.entries.remove(key) {
            Some((_, entry)) => {
                reset(&entry);
                true
            }
            None => false,
        }
    }

    pub fn clear(&self) {
        let entries: Vec<Arc<Entry>> = self.inner.entries.iter().map(|e| e.value().clone()).collect();
        self.inner.entries.clear();
        for entry in entries {
            reset(&entry);
        }
    }

    /// Write a value through the cache, as if a request for `key` had just
    /// succeeded. A request in flight for `key` is superseded.
    pub fn set_data<V: Send + Sync + 'static>(&self, key: ResourceKey, value: V) {
        let entry = self
            .inner
            .entries
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Entry::new(key)))
            .clone();
        let mut control = entry.control();
        control.seq += 1;
        control.in_flight = false;
        let value: AnyValue = Arc::new(value);
        entry.state.send_modify(|state| {
            state.status = FetchStatus::Success;
            state.data = Some(value);
            state.error = None;
            state.is_fetching = false;
            state.updated_at = Some(Instant::now());
        });
    }

    pub fn get_data<V: Send + Sync + 'static>(&self, key: &ResourceKey) -> Option<Arc<V>> {
        self.state::<V>(key).and_then(|state| state.data)
    }

    pub fn state<V: Send + Sync + 'static>(&self, key: &ResourceKey) -> Option<QueryState<V>> {
        self.lookup(key).map(|entry| entry.snapshot().downcast())
    }

    pub fn contains(&self, key: &ResourceKey) -> bool {
        self.inner.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.inner.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.entries.is_empty()
    }

    /// Number of live subscriptions on `key`.
    pub fn subscriber_count(&self, key: &ResourceKey) -> usize {
        self.lookup(key).map_or(0, |entry| entry.control().subscribers)
    }

    fn lookup(&self, key: &ResourceKey) -> Option<Arc<Entry>> {
        self.inner.entries.get(key).map(|e| Arc::clone(e.value()))
    }

    fn force_fetch(&self, entry: &Arc<Entry>) -> bool {
        let started = {
            let mut control = entry.control();
            if control.in_flight {
                tracing::debug!(key = %entry.key, seq = control.seq, "superseding in-flight request");
            }
            self.begin(entry, &mut control, false)
        };
        match started {
            Some((seq, fetcher)) => {
                self.spawn_fetch(entry.clone(), seq, fetcher);
                true
            }
            None => false,
        }
    }

    /// Tag a new request and publish the in-flight transition. With
    /// `discard_data` the entry goes back to a first load in the same update.
    fn begin(&self, entry: &Entry, control: &mut Control, discard_data: bool) -> Option<(u64, Fetcher)> {
        let fetcher = control.fetcher.clone()?;
        control.seq += 1;
        control.in_flight = true;
        entry.state.send_modify(|state| {
            state.is_fetching = true;
            if discard_data {
                state.data = None;
                state.updated_at = None;
            }
            if state.data.is_none() {
                state.status = FetchStatus::Pending;
                state.error = None;
            }
        });
        tracing::debug!(key = %entry.key, seq = control.seq, "fetch issued");
        Some((control.seq, fetcher))
    }

    fn spawn_fetch(&self, entry: Arc<Entry>, seq: u64, fetcher: Fetcher) {
        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime,
            Err(_) => {
                let error = ClientError::Transport("no async runtime available to run the fetch".into());
                self.complete(&entry, seq, Err(error));
                return;
            }
        };
        let cache = self.clone();
        runtime.spawn(async move {
            let result = cache.run_with_retry(&entry, &fetcher).await;
            if let Some(error) = cache.complete(&entry, seq, result) {
                if let Some(bus) = &cache.inner.events {
                    bus.emit(QueryFailed {
                        key: entry.key.clone(),
                        error,
                    })
                    .await;
                }
            }
        });
    }

    async fn run_with_retry(&self, entry: &Entry, fetcher: &Fetcher) -> Result<AnyValue, ClientError> {
        let policy = self.inner.options.retry;
        let mut attempt = 0;
        loop {
            match fetcher().await {
                Ok(value) => return Ok(value),
                Err(error) if policy.should_retry(attempt, &error) => {
                    let delay = policy.delay_for(attempt);
                    tracing::debug!(key = %entry.key, attempt, ?delay, error = %error, "retrying fetch");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(error) => return Err(error),
            }
        }
    }

    /// Apply a finished request. Returns the error to publish, if any.
    fn complete(
        &self,
        entry: &Entry,
        seq: u64,
        result: Result<AnyValue, ClientError>,
    ) -> Option<ClientError> {
        let mut control = entry.control();
        if control.seq != seq {
            tracing::debug!(key = %entry.key, seq, latest = control.seq, "discarding superseded response");
            return None;
        }
        control.in_flight = false;

        match result {
            Ok(value) => {
                entry.state.send_modify(|state| {
                    state.status = FetchStatus::Success;
                    state.data = Some(value);
                    state.error = None;
                    state.is_fetching = false;
                    state.updated_at = Some(Instant::now());
                });
                tracing::debug!(key = %entry.key, seq, "fetch succeeded");
                None
            }
            Err(error) => {
                let auth = error.is_auth();
                entry.state.send_modify(|state| {
                    state.status = FetchStatus::Failure;
                    state.error = Some(error.clone());
                    state.is_fetching = false;
                    // Privileges read with rejected credentials must not outlive them.
                    if auth {
                        state.data = None;
                        state.updated_at = None;
                    }
                });
                tracing::warn!(key = %entry.key, seq, error = %error, "fetch failed");
                Some(error)
            }
        }
    }

    /// Called by a subscription when it detaches.
    pub(crate) fn release(&self, entry: &Arc<Entry>) {
        let generation = {
            let mut control = entry.control();
            control.subscribers = control.subscribers.saturating_sub(1);
            if control.subscribers > 0 {
                return;
            }
            control.generation
        };

        match self.inner.options.gc_time {
            None => {}
            Some(delay) if delay.is_zero() => self.evict(entry),
            Some(delay) => {
                let Ok(runtime) = tokio::runtime::Handle::try_current() else {
                    return;
                };
                let cache = self.clone();
                let entry = entry.clone();
                runtime.spawn(async move {
                    tokio::time::sleep(delay).await;
                    if entry.control().generation == generation {
                        cache.evict(&entry);
                    }
                });
            }
        }
    }

    /// Remove `entry` from the map if it is still the live entry for its key
    /// and nobody is subscribed to it.
    fn evict(&self, entry: &Arc<Entry>) {
        let removed = self
            .inner
            .entries
            .remove_if(&entry.key, |_, live| {
                Arc::ptr_eq(live, entry) && live.control().subscribers == 0
            })
            .is_some();
        if removed {
            reset(entry);
            tracing::debug!(key = %entry.key, "evicted entry");
        }
    }
}

/// Detach a removed entry: supersede its in-flight request and show `Idle`.
fn reset(entry: &Entry) {
    let mut control = entry.control();
    control.seq += 1;
    control.in_flight = false;
    entry.state.send_replace(RawState::idle());
}

fn is_stale(updated_at: Option<Instant>, stale_time: Duration) -> bool {
    match updated_at {
        None => true,
        Some(ts) => ts.elapsed() >= stale_time,
    }
}
