//! Listener bus for sync lifecycle events.
//!
//! Listeners are plain callbacks invoked synchronously, in subscription
//! order, on the task that emits the event. They must not block: a slow
//! listener delays the orchestrator.
//!
//! # Usage
//!
//! ```rust
//! use hearth_sync_engine::{ListenerBus, SyncEvent};
//!
//! let bus = ListenerBus::new();
//! let subscription = bus.subscribe(|event: &SyncEvent| {
//!     println!("{}: {}", event.name(), event.payload());
//! });
//!
//! bus.emit(&SyncEvent::SyncStarted);
//! subscription.unsubscribe();
//! assert_eq!(bus.listener_count(), 0);
//! ```

use crate::state::SyncPass;
use parking_lot::RwLock;
use serde_json::json;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

/// A subscribed callback.
pub type Listener = Arc<dyn Fn(&SyncEvent) + Send + Sync>;

type Listeners = RwLock<Vec<(u64, Listener)>>;

/// An event emitted by the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// A pull or push-all pass started.
    SyncStarted,
    /// A pull or push-all pass finished.
    SyncCompleted(SyncPass),
    /// One record (or the pass bookkeeping, when `key` is `None`) failed.
    SyncError {
        /// The record that failed.
        key: Option<String>,
        /// What went wrong.
        message: String,
    },
    /// First-run migration started.
    MigrationStarted,
    /// First-run migration finished.
    MigrationCompleted(SyncPass),
    /// First-run migration could not run.
    MigrationError {
        /// What went wrong.
        message: String,
    },
}

impl SyncEvent {
    /// Returns the event name delivered to subscribers.
    pub fn name(&self) -> &'static str {
        match self {
            SyncEvent::SyncStarted => "sync_started",
            SyncEvent::SyncCompleted(_) => "sync_completed",
            SyncEvent::SyncError { .. } => "sync_error",
            SyncEvent::MigrationStarted => "migration_started",
            SyncEvent::MigrationCompleted(_) => "migration_completed",
            SyncEvent::MigrationError { .. } => "migration_error",
        }
    }

    /// Returns the JSON payload delivered to subscribers.
    ///
    /// Completion events carry `{syncedCount, errorCount}` (migration adds
    /// `skippedCount`); error events carry `{error}` and, for per-record
    /// failures, `key`. Start events carry an empty object.
    pub fn payload(&self) -> serde_json::Value {
        match self {
            SyncEvent::SyncStarted | SyncEvent::MigrationStarted => json!({}),
            SyncEvent::SyncCompleted(pass) => json!({
                "syncedCount": pass.synced_count(),
                "errorCount": pass.error_count(),
            }),
            SyncEvent::MigrationCompleted(pass) => json!({
                "syncedCount": pass.synced_count(),
                "errorCount": pass.error_count(),
                "skippedCount": pass.skipped,
            }),
            SyncEvent::SyncError { key: Some(key), message } => json!({
                "error": message,
                "key": key,
            }),
            SyncEvent::SyncError { key: None, message } | SyncEvent::MigrationError { message } => {
                json!({ "error": message })
            }
        }
    }
}

/// Distributes [`SyncEvent`]s to subscribed callbacks.
///
/// The bus:
/// - Delivers every event to every listener, in subscription order
/// - Isolates listeners: one that panics is logged and skipped
/// - Can be subscribed to while an event is being delivered
pub struct ListenerBus {
    listeners: Arc<Listeners>,
    next_id: AtomicU64,
}

impl ListenerBus {
    /// Creates a bus with no listeners.
    pub fn new() -> Self {
        Self {
            listeners: Arc::new(RwLock::new(Vec::new())),
            next_id: AtomicU64::new(1),
        }
    }

    /// Registers a callback and returns its handle.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&SyncEvent) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.listeners.write().push((id, Arc::new(listener)));
        Subscription {
            id,
            listeners: Arc::downgrade(&self.listeners),
        }
    }

    /// Delivers `event` to every listener.
    pub fn emit(&self, event: &SyncEvent) {
        // Snapshot so a listener may subscribe or unsubscribe re-entrantly.
        let snapshot: Vec<Listener> = self
            .listeners
            .read()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();

        for listener in snapshot {
            let delivered = panic::catch_unwind(AssertUnwindSafe(|| listener(event)));
            if delivered.is_err() {
                tracing::warn!(event = event.name(), "sync listener panicked");
            }
        }
    }

    /// Returns the number of subscribed listeners.
    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }
}

impl Default for ListenerBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ListenerBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerBus")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

/// Handle returned by [`ListenerBus::subscribe`].
///
/// Dropping the handle keeps the listener registered; call
/// [`unsubscribe`](Subscription::unsubscribe) to remove it.
#[must_use = "dropping a subscription does not unsubscribe; keep it to unsubscribe later"]
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    listeners: Weak<Listeners>,
}

impl Subscription {
    /// Removes the listener. Does nothing if the bus is gone.
    pub fn unsubscribe(self) {
        if let Some(listeners) = self.listeners.upgrade() {
            listeners.write().retain(|(id, _)| *id != self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::PassKind;
    use parking_lot::Mutex;

    fn recorder(bus: &ListenerBus) -> (Arc<Mutex<Vec<String>>>, Subscription) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let subscription = bus.subscribe(move |event| sink.lock().push(event.name().to_string()));
        (seen, subscription)
    }

    #[test]
    fn delivers_in_order() {
        let bus = ListenerBus::new();
        let (seen, _subscription) = recorder(&bus);

        bus.emit(&SyncEvent::SyncStarted);
        bus.emit(&SyncEvent::SyncCompleted(SyncPass::new(PassKind::Pull)));

        assert_eq!(*seen.lock(), vec!["sync_started", "sync_completed"]);
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let bus = ListenerBus::new();
        let (first, subscription) = recorder(&bus);
        let (second, _keep) = recorder(&bus);
        assert_eq!(bus.listener_count(), 2);

        subscription.unsubscribe();
        bus.emit(&SyncEvent::MigrationStarted);

        assert!(first.lock().is_empty());
        assert_eq!(*second.lock(), vec!["migration_started"]);
        assert_eq!(bus.listener_count(), 1);
    }

    #[test]
    fn unsubscribe_after_bus_dropped() {
        let bus = ListenerBus::new();
        let (_, subscription) = recorder(&bus);
        drop(bus);
        subscription.unsubscribe();
    }

    #[test]
    fn panicking_listener_is_isolated() {
        let bus = ListenerBus::new();
        let _bad = bus.subscribe(|_| panic!("listener bug"));
        let (seen, _good) = recorder(&bus);

        bus.emit(&SyncEvent::SyncStarted);
        bus.emit(&SyncEvent::SyncStarted);

        assert_eq!(seen.lock().len(), 2);
    }

    #[test]
    fn completion_payload() {
        let mut pass = SyncPass::new(PassKind::Push);
        pass.pushed = 4;
        pass.failed = 1;
        pass.skipped = 2;

        assert_eq!(
            SyncEvent::SyncCompleted(pass.clone()).payload(),
            json!({"syncedCount": 4, "errorCount": 1})
        );
        assert_eq!(
            SyncEvent::MigrationCompleted(pass).payload(),
            json!({"syncedCount": 4, "errorCount": 1, "skippedCount": 2})
        );
    }

    #[test]
    fn error_payload() {
        let event = SyncEvent::SyncError {
            key: Some("journal_notes".into()),
            message: "disk full".into(),
        };
        assert_eq!(event.name(), "sync_error");
        assert_eq!(
            event.payload(),
            json!({"error": "disk full", "key": "journal_notes"})
        );

        let event = SyncEvent::MigrationError {
            message: "flag unreadable".into(),
        };
        assert_eq!(event.payload(), json!({"error": "flag unreadable"}));
        assert_eq!(SyncEvent::SyncStarted.payload(), json!({}));
    }
}
