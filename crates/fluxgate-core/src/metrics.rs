//! Metrics for breaker, rotation and pool observability.
//!
//! Recorded through the `metrics` facade; nothing is exported unless the
//! application installs a recorder.
//! - `fluxgate_circuit_transitions_total{state}` - Counter of breaker state changes
//! - `fluxgate_server_state_total{state}` - Counter of server roster changes
//! - `fluxgate_pool_exhausted_total` - Counter of timed-out pool waits
//! - `fluxgate_pool_connections{state}` - Gauge of free and used pooled connections

// Prometheus metrics: bounded counters only.
#![allow(clippy::cast_precision_loss, reason = "pool sizes are far below f64 precision")]

use fluxgate_types::{CircuitState, ServerState};
use metrics::{counter, describe_counter, describe_gauge, gauge};

/// Register metric descriptions. Safe to call more than once.
pub fn describe_metrics() {
    describe_counter!(
        "fluxgate_circuit_transitions_total",
        "Circuit breaker state transitions by new state"
    );
    describe_counter!("fluxgate_server_state_total", "Server roster changes by new state");
    describe_counter!(
        "fluxgate_pool_exhausted_total",
        "Pool acquisitions that timed out waiting for capacity"
    );
    describe_gauge!("fluxgate_pool_connections", "Pooled connections by free/used state");
}

pub(crate) fn record_circuit_transition(state: CircuitState) {
    let labels = [("state", state.to_string())];
    counter!("fluxgate_circuit_transitions_total", &labels).increment(1);
}

pub(crate) fn record_server_state(state: ServerState) {
    let labels = [("state", state.to_string())];
    counter!("fluxgate_server_state_total", &labels).increment(1);
}

pub(crate) fn record_pool_exhausted() {
    counter!("fluxgate_pool_exhausted_total").increment(1);
}

pub(crate) fn record_pool_size(free: usize, used: usize) {
    gauge!("fluxgate_pool_connections", "state" => "free").set(free as f64);
    gauge!("fluxgate_pool_connections", "state" => "used").set(used as f64);
}
