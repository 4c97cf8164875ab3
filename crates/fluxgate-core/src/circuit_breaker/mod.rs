//! Per-node circuit breaker.
//!
//! A breaker counts failures reported against one node. Once the count has
//! reached the threshold, the next failure trips the breaker open and arms a
//! one-shot reset timer. When the timer fires the breaker goes half-open, and
//! the next reported outcome decides: success closes it, failure trips it again.
//!
//! States:
//! - Closed: Normal operation, operations pass through
//! - Open: Node is failing, guarded operations fail fast
//! - Half-Open: Reset interval elapsed, waiting for a verdict

mod execute;
mod manager;
mod recording;
mod timer;

#[cfg(test)]
mod tests;

pub use execute::ExecuteError;
pub use manager::{BreakerSummary, CircuitBreakerManager};

use fluxgate_types::{CircuitState, CircuitStateChanged, ConfigError, FailureKind};
use parking_lot::{Mutex, ReentrantMutex, RwLock};
use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::debug;

use crate::events::{Listener, Listeners, SubscriptionId};
use crate::metrics::record_circuit_transition;
use timer::ResetTimer;

pub struct CircuitBreaker {
    node_id: String,
    node: RwLock<String>,
    threshold: AtomicU32,
    failure_count: AtomicU32,
    state: Mutex<CircuitState>,
    /// Held across a state commit and its notification, so listeners see
    /// transitions in commit order. Reentrant for listeners that call back in.
    transition: ReentrantMutex<()>,
    reset_interval_ms: AtomicU64,
    ignored_kinds: RwLock<HashSet<FailureKind>>,
    timer: ResetTimer,
    total_trips: AtomicU64,
    state_listeners: Listeners<CircuitStateChanged>,
    service_level_listeners: Listeners<CircuitBreaker>,
    weak_self: Weak<CircuitBreaker>,
}

impl CircuitBreaker {
    /// Create a closed breaker for `node_id`, hosted on `node`.
    ///
    /// Socket-level failures are ignored by [`CircuitBreaker::execute`] until
    /// [`CircuitBreaker::set_ignored_kinds`] says otherwise.
    pub fn new(
        node_id: impl Into<String>,
        node: impl Into<String>,
        threshold: u32,
        reset_interval_ms: u64,
    ) -> Result<Arc<Self>, ConfigError> {
        let node_id = node_id.into();
        let node = node.into();
        ConfigError::require_non_blank("node_id", &node_id)?;
        ConfigError::require_non_blank("node", &node)?;
        validate_threshold(threshold)?;
        validate_reset_interval(reset_interval_ms)?;

        Ok(Arc::new_cyclic(|weak_self| Self {
            node_id,
            node: RwLock::new(node),
            threshold: AtomicU32::new(threshold),
            failure_count: AtomicU32::new(0),
            state: Mutex::new(CircuitState::Closed),
            transition: ReentrantMutex::new(()),
            reset_interval_ms: AtomicU64::new(reset_interval_ms),
            ignored_kinds: RwLock::new(HashSet::from([FailureKind::Socket])),
            timer: ResetTimer::new(),
            total_trips: AtomicU64::new(0),
            state_listeners: Listeners::new(),
            service_level_listeners: Listeners::new(),
            weak_self: weak_self.clone(),
        }))
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    pub fn node(&self) -> String {
        self.node.read().clone()
    }

    pub fn set_node(&self, node: impl Into<String>) -> Result<(), ConfigError> {
        let node = node.into();
        ConfigError::require_non_blank("node", &node)?;
        *self.node.write() = node;
        Ok(())
    }

    pub fn state(&self) -> CircuitState {
        *self.state.lock()
    }

    pub fn is_open(&self) -> bool {
        self.state() == CircuitState::Open
    }

    pub fn failure_count(&self) -> u32 {
        self.failure_count.load(Ordering::Acquire)
    }

    pub fn threshold(&self) -> u32 {
        self.threshold.load(Ordering::Acquire)
    }

    /// Takes effect on the next reported failure.
    pub fn set_threshold(&self, threshold: u32) -> Result<(), ConfigError> {
        validate_threshold(threshold)?;
        self.threshold.store(threshold, Ordering::Release);
        Ok(())
    }

    pub fn reset_interval(&self) -> Duration {
        Duration::from_millis(self.reset_interval_ms.load(Ordering::Acquire))
    }

    /// Change the reset interval. A pending reset timer restarts with the new interval.
    pub fn set_reset_interval(&self, reset_interval_ms: u64) -> Result<(), ConfigError> {
        validate_reset_interval(reset_interval_ms)?;
        self.reset_interval_ms.store(reset_interval_ms, Ordering::Release);

        let state = self.state.lock();
        if *state == CircuitState::Open && self.timer.is_armed() {
            debug!(node_id = %self.node_id, reset_interval_ms, "Re-arming reset timer");
            self.timer.arm(self.weak_self.clone(), self.reset_interval());
        }
        drop(state);
        Ok(())
    }

    /// `(threshold - failure_count) / threshold`, as a percentage in `[0, 100]`.
    #[allow(clippy::cast_precision_loss, reason = "u32 counts fit in f64")]
    pub fn service_level(&self) -> f64 {
        let threshold = self.threshold();
        let failures = self.failure_count().min(threshold);
        f64::from(threshold - failures) / f64::from(threshold) * 100.0
    }

    pub fn total_trips(&self) -> u64 {
        self.total_trips.load(Ordering::Relaxed)
    }

    pub fn ignored_kinds(&self) -> HashSet<FailureKind> {
        self.ignored_kinds.read().clone()
    }

    /// Failure kinds that [`CircuitBreaker::execute`] passes through without counting.
    pub fn set_ignored_kinds(&self, kinds: impl IntoIterator<Item = FailureKind>) {
        *self.ignored_kinds.write() = kinds.into_iter().collect();
    }

    pub fn is_ignored(&self, kind: FailureKind) -> bool {
        self.ignored_kinds.read().contains(&kind)
    }

    /// Notified after every state transition.
    pub fn on_state_changed(&self, listener: Listener<CircuitStateChanged>) -> SubscriptionId {
        self.state_listeners.subscribe(listener)
    }

    /// Notified whenever the failure count moves without a state transition.
    pub fn on_service_level_changed(&self, listener: Listener<CircuitBreaker>) -> SubscriptionId {
        self.service_level_listeners.subscribe(listener)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.state_listeners.unsubscribe(id) || self.service_level_listeners.unsubscribe(id)
    }

    fn emit_state_changed(&self, new_state: CircuitState, message: &str) {
        record_circuit_transition(new_state);
        let event = CircuitStateChanged {
            node_id: self.node_id.clone(),
            host: self.node(),
            new_state,
            message: message.to_string(),
        };
        self.state_listeners.emit(&event);
    }

    fn emit_service_level_changed(&self) {
        self.service_level_listeners.emit(self);
    }
}

fn validate_threshold(threshold: u32) -> Result<(), ConfigError> {
    if threshold == 0 {
        return Err(ConfigError::invalid("threshold", "threshold must be at least 1"));
    }
    Ok(())
}

fn validate_reset_interval(reset_interval_ms: u64) -> Result<(), ConfigError> {
    if reset_interval_ms == 0 {
        return Err(ConfigError::invalid(
            "reset_interval_ms",
            "reset interval must be at least 1ms",
        ));
    }
    Ok(())
}

impl fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("node_id", &self.node_id)
            .field("node", &self.node())
            .field("state", &self.state())
            .field("failure_count", &self.failure_count())
            .field("threshold", &self.threshold())
            .field("reset_interval", &self.reset_interval())
            .finish_non_exhaustive()
    }
}
