use fluxgate_types::CircuitState;
use std::sync::atomic::Ordering;
use tracing::{debug, info, warn};

use super::CircuitBreaker;

impl CircuitBreaker {
    /// Record a failed operation against this node.
    ///
    /// Below the threshold the count goes up by one. At the threshold, or in
    /// half-open, the breaker trips instead.
    pub fn failure_occurred(&self) {
        if self.state() == CircuitState::HalfOpen {
            debug!(node_id = %self.node_id, "Failure during half-open");
            self.trip();
            return;
        }

        let threshold = self.threshold();
        let counted = self.failure_count.fetch_update(Ordering::AcqRel, Ordering::Acquire, |count| {
            (count < threshold).then_some(count + 1)
        });

        match counted {
            Ok(previous) => {
                debug!(
                    node_id = %self.node_id,
                    failures = previous + 1,
                    threshold,
                    "Failure recorded"
                );
                self.emit_service_level_changed();
            },
            Err(_) => self.trip(),
        }
    }

    /// Record a successful operation against this node.
    ///
    /// A half-open breaker closes. The failure count goes down by one, never below zero.
    pub fn operation_succeeded(&self) {
        if self.state() == CircuitState::HalfOpen {
            self.reset();
        }

        let decremented = self
            .failure_count
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |count| count.checked_sub(1))
            .is_ok();
        if decremented {
            self.emit_service_level_changed();
        }
    }

    /// Force the breaker open and arm the reset timer. No-op if already open.
    pub fn trip(&self) {
        let _transition = self.transition.lock();
        {
            let mut state = self.state.lock();
            if *state == CircuitState::Open {
                return;
            }
            *state = CircuitState::Open;
            self.timer.arm(self.weak_self.clone(), self.reset_interval());
        }
        self.total_trips.fetch_add(1, Ordering::Relaxed);
        warn!(
            node_id = %self.node_id,
            failures = self.failure_count(),
            reset_interval_ms = self.reset_interval().as_millis(),
            "Circuit breaker opening"
        );
        self.emit_state_changed(CircuitState::Open, "Failure threshold exceeded");
    }

    /// Force the breaker closed, zero the failure count and cancel the reset timer.
    /// No-op if already closed.
    pub fn reset(&self) {
        let _transition = self.transition.lock();
        {
            let mut state = self.state.lock();
            if *state == CircuitState::Closed {
                return;
            }
            *state = CircuitState::Closed;
            self.failure_count.store(0, Ordering::Release);
            self.timer.cancel();
        }
        info!(node_id = %self.node_id, "Circuit breaker closing");
        self.emit_state_changed(CircuitState::Closed, "Circuit reset");
    }

    /// Called by the reset timer. A stale generation means the timer was
    /// re-armed or cancelled after this firing was scheduled.
    pub(super) fn reset_interval_elapsed(&self, generation: u64) {
        let _transition = self.transition.lock();
        {
            let mut state = self.state.lock();
            if *state != CircuitState::Open || !self.timer.complete(generation) {
                return;
            }
            *state = CircuitState::HalfOpen;
        }
        info!(node_id = %self.node_id, "Circuit breaker transitioning to half-open");
        self.emit_state_changed(CircuitState::HalfOpen, "Reset interval elapsed, testing recovery");
    }
}
