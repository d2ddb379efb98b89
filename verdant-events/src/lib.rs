//! In-process typed event bus.
//!
//! Listeners register for one concrete event type and receive it as an
//! `Arc<E>`. The cache publishes `QueryFailed` here; mutation flows publish
//! [`Notification`]s for whatever surface shows them to the user.

mod notification;

pub use notification::{Notification, NotificationLevel, NotificationLog};

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::{RwLock, Semaphore};
use tokio::task::JoinHandle;

type BoxFuture = Pin<Box<dyn Future<Output = ()> + Send>>;
type Listener<E> = Arc<dyn Fn(Arc<E>) -> BoxFuture + Send + Sync>;

/// Listener slots a bus built with [`EventBus::new`] runs concurrently.
pub const DEFAULT_MAX_CONCURRENCY: usize = 256;

/// Typed publish/subscribe. Clones share listeners and the concurrency limit.
#[derive(Clone)]
pub struct EventBus {
    // TypeId::of::<E>() -> Vec<Listener<E>>
    topics: Arc<RwLock<HashMap<TypeId, Box<dyn Any + Send + Sync>>>>,
    limit: Option<Arc<Semaphore>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::bounded(DEFAULT_MAX_CONCURRENCY)
    }

    /// At most `slots` listeners run at once; the rest queue for a slot.
    pub fn bounded(slots: usize) -> Self {
        Self {
            topics: Arc::default(),
            limit: Some(Arc::new(Semaphore::new(slots))),
        }
    }

    pub fn unbounded() -> Self {
        Self {
            topics: Arc::default(),
            limit: None,
        }
    }

    pub async fn subscribe<E, F, Fut>(&self, listener: F)
    where
        E: Send + Sync + 'static,
        F: Fn(Arc<E>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let listener: Listener<E> = Arc::new(move |event: Arc<E>| -> BoxFuture { Box::pin(listener(event)) });
        let mut topics = self.topics.write().await;
        let slot = topics
            .entry(TypeId::of::<E>())
            .or_insert_with(|| Box::new(Vec::<Listener<E>>::new()) as Box<dyn Any + Send + Sync>);
        match slot.downcast_mut::<Vec<Listener<E>>>() {
            Some(listeners) => listeners.push(listener),
            None => tracing::error!(event = std::any::type_name::<E>(), "listener table holds a foreign type"),
        }
    }

    pub async fn listener_count<E: 'static>(&self) -> usize {
        self.listeners::<E>().await.len()
    }

    /// Publish `event` to every listener of `E` without waiting for them.
    pub async fn emit<E: Send + Sync + 'static>(&self, event: E) {
        self.dispatch(event).await;
    }

    /// Publish `event` and return once every listener has finished.
    /// A listener that panics is logged and does not affect the others.
    pub async fn emit_and_wait<E: Send + Sync + 'static>(&self, event: E) {
        for task in self.dispatch(event).await {
            if let Err(err) = task.await {
                tracing::warn!(event = std::any::type_name::<E>(), error = %err, "event listener failed");
            }
        }
    }

    /// Free listener slots; `None` for an unbounded bus.
    pub fn idle_slots(&self) -> Option<usize> {
        self.limit.as_ref().map(|limit| limit.available_permits())
    }

    async fn listeners<E: 'static>(&self) -> Vec<Listener<E>> {
        let topics = self.topics.read().await;
        topics
            .get(&TypeId::of::<E>())
            .and_then(|slot| slot.downcast_ref::<Vec<Listener<E>>>())
            .cloned()
            .unwrap_or_default()
    }

    async fn dispatch<E: Send + Sync + 'static>(&self, event: E) -> Vec<JoinHandle<()>> {
        let listeners = self.listeners::<E>().await;
        if listeners.is_empty() {
            return Vec::new();
        }
        let event = Arc::new(event);
        listeners
            .into_iter()
            .map(|listener| {
                let event = event.clone();
                let limit = self.limit.clone();
                tokio::spawn(async move {
                    // A closed semaphore only means the limit is gone.
                    let _slot = match limit {
                        Some(limit) => limit.acquire_owned().await.ok(),
                        None => None,
                    };
                    listener(event).await;
                })
            })
            .collect()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

pub mod prelude {
    pub use crate::{EventBus, Notification, NotificationLevel, NotificationLog};
}
