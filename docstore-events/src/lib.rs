//! The change bus: per-table subscribers receive insert/update/delete
//! events after commit, never from inside the writing transaction.
//!
//! Subscriptions hold only a weak handle back into the bus, so an `Unsubscribe`
//! dropped after the engine itself is gone is a harmless no-op rather than
//! a dangling reference.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use tracing::warn;

use docstore_core::traits::{ChangeEvent, ChangeSubscriber};

struct Subscription {
    id: u64,
    subscriber: Arc<dyn ChangeSubscriber>,
}

struct Inner {
    subscribers: DashMap<String, Vec<Subscription>>,
    next_id: AtomicU64,
}

/// The process-wide change bus one `Engine` owns. Cheaply cloneable —
/// internally an `Arc` — so the replication hook and ordinary subscribers
/// share one registry.
#[derive(Clone)]
pub struct ChangeBus {
    inner: Arc<Inner>,
}

impl Default for ChangeBus {
    fn default() -> Self {
        Self::new()
    }
}

/// An unsubscribe handle returned by [`ChangeBus::subscribe`]. Dropping it
/// does nothing; call [`Unsubscribe::unsubscribe`] explicitly to remove the
/// subscription.
pub struct Unsubscribe {
    bus: Weak<Inner>,
    table: String,
    id: u64,
}

impl Unsubscribe {
    pub fn unsubscribe(self) {
        let Some(inner) = self.bus.upgrade() else {
            return;
        };
        if let Some(mut subs) = inner.subscribers.get_mut(&self.table) {
            subs.retain(|s| s.id != self.id);
        }
    }
}

impl ChangeBus {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                subscribers: DashMap::new(),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Register `subscriber` for every change event on `table`. Returns a
    /// handle the caller can use to unsubscribe later.
    pub fn subscribe(&self, table: &str, subscriber: Arc<dyn ChangeSubscriber>) -> Unsubscribe {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner
            .subscribers
            .entry(table.to_string())
            .or_default()
            .push(Subscription { id, subscriber });
        Unsubscribe {
            bus: Arc::downgrade(&self.inner),
            table: table.to_string(),
            id,
        }
    }

    /// Deliver `event` to every subscriber of its table. Subscriber panics
    /// and errors are isolated: one failing subscriber never stops the
    /// others or propagates to the caller. Must be called strictly after the
    /// triggering transaction has committed.
    pub fn publish(&self, event: ChangeEvent) {
        let Some(subs) = self.inner.subscribers.get(&event.table) else {
            return;
        };
        for sub in subs.iter() {
            let subscriber = sub.subscriber.clone();
            let event_ref = &event;
            let result = catch_unwind(AssertUnwindSafe(|| subscriber.on_change(event_ref)));
            if result.is_err() {
                warn!(table = %event.table, "change-bus subscriber panicked; event swallowed");
            }
        }
    }

    /// Number of live subscriptions across every table, for diagnostics.
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.iter().map(|e| e.value().len()).sum()
    }
}
