//! Listener registries for breaker and server notifications.
//!
//! Listeners are plain synchronous closures. [`Listeners::emit`] snapshots the
//! registry before invoking anything, so a listener may subscribe or
//! unsubscribe (itself included) while being notified.

use parking_lot::RwLock;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Shared callback receiving a notification payload.
pub type Listener<E> = Arc<dyn Fn(&E) + Send + Sync>;

/// Handle returned by [`Listeners::subscribe`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

pub struct Listeners<E> {
    next_id: AtomicU64,
    entries: RwLock<Vec<(SubscriptionId, Listener<E>)>>,
}

impl<E> Listeners<E> {
    pub fn new() -> Self {
        Self { next_id: AtomicU64::new(1), entries: RwLock::new(Vec::new()) }
    }

    pub fn subscribe(&self, listener: Listener<E>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.entries.write().push((id, listener));
        id
    }

    /// Returns `false` if the id was not (or no longer) registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|(entry_id, _)| *entry_id != id);
        entries.len() != before
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Deliver `event` to every listener in subscription order.
    ///
    /// A panicking listener propagates to the caller; whatever state change
    /// triggered the notification has already been committed.
    pub fn emit(&self, event: &E) {
        let snapshot: Vec<Listener<E>> =
            self.entries.read().iter().map(|(_, listener)| Arc::clone(listener)).collect();
        for listener in snapshot {
            listener(event);
        }
    }
}

impl<E> Default for Listeners<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for Listeners<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listeners").field("len", &self.len()).finish()
    }
}
