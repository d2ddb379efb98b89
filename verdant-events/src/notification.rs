use std::sync::{Arc, Mutex};

use crate::EventBus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationLevel {
    Success,
    Info,
    Error,
}

/// A transient, user-visible message (the toast of a UI).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub level: NotificationLevel,
    pub message: String,
}

impl Notification {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Success,
            message: message.into(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Info,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Error,
            message: message.into(),
        }
    }
}

/// Records every [`Notification`] emitted on a bus, in arrival order.
#[derive(Clone, Default)]
pub struct NotificationLog {
    entries: Arc<Mutex<Vec<Notification>>>,
}

impl NotificationLog {
    /// Create a log subscribed to `bus`.
    pub async fn attach(bus: &EventBus) -> Self {
        let log = NotificationLog::default();
        let entries = log.entries.clone();
        bus.subscribe(move |n: Arc<Notification>| {
            let entries = entries.clone();
            async move {
                if let Ok(mut entries) = entries.lock() {
                    entries.push((*n).clone());
                }
            }
        })
        .await;
        log
    }

    pub fn entries(&self) -> Vec<Notification> {
        self.entries.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn last(&self) -> Option<Notification> {
        self.entries.lock().ok().and_then(|e| e.last().cloned())
    }

    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
        }
    }
}
