//! Keyed registry of breakers sharing a pair of global listeners.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use fluxgate_types::{CircuitState, CircuitStateChanged, ConfigError};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

use super::CircuitBreaker;
use crate::events::Listener;

/// Summary of breaker states across all nodes
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BreakerSummary {
    pub closed: usize,
    pub open: usize,
    pub half_open: usize,
    pub total_trips: u64,
}

/// Manages circuit breakers for all nodes
#[derive(Default)]
pub struct CircuitBreakerManager {
    breakers: DashMap<String, Arc<CircuitBreaker>>,
    on_state_changed: Option<Listener<CircuitStateChanged>>,
    on_service_level_changed: Option<Listener<CircuitBreaker>>,
}

impl CircuitBreakerManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every breaker added later gets these listeners wired in.
    pub fn with_listeners(
        on_state_changed: Option<Listener<CircuitStateChanged>>,
        on_service_level_changed: Option<Listener<CircuitBreaker>>,
    ) -> Self {
        Self { breakers: DashMap::new(), on_state_changed, on_service_level_changed }
    }

    /// Register a breaker under `key`. Returns `Ok(false)` if the key is taken.
    pub fn add_breaker(
        &self,
        key: &str,
        node: &str,
        threshold: u32,
        reset_interval_ms: u64,
    ) -> Result<bool, ConfigError> {
        ConfigError::require_non_blank("key", key)?;
        let breaker = CircuitBreaker::new(key, node, threshold, reset_interval_ms)?;

        match self.breakers.entry(key.to_string()) {
            Entry::Occupied(_) => {
                debug!(key = %key, "Breaker already registered");
                Ok(false)
            },
            Entry::Vacant(slot) => {
                if let Some(listener) = &self.on_state_changed {
                    breaker.on_state_changed(Arc::clone(listener));
                }
                if let Some(listener) = &self.on_service_level_changed {
                    breaker.on_service_level_changed(Arc::clone(listener));
                }
                slot.insert(breaker);
                info!(key = %key, node = %node, threshold, reset_interval_ms, "Breaker registered");
                Ok(true)
            },
        }
    }

    pub fn get_breaker(&self, key: &str) -> Result<Option<Arc<CircuitBreaker>>, ConfigError> {
        ConfigError::require_non_blank("key", key)?;
        Ok(self.lookup(key))
    }

    pub fn remove_breaker(&self, key: &str) -> Result<Option<Arc<CircuitBreaker>>, ConfigError> {
        ConfigError::require_non_blank("key", key)?;
        let removed = self.breakers.remove(key).map(|(_, breaker)| breaker);
        if removed.is_some() {
            debug!(key = %key, "Breaker removed");
        }
        Ok(removed)
    }

    /// Report a failure to the breaker under `key`. Returns `false` if there is none.
    pub fn forward_failure(&self, key: &str) -> bool {
        let Some(breaker) = self.lookup(key) else {
            return false;
        };
        breaker.failure_occurred();
        true
    }

    /// Report a success to the breaker under `key`. Returns `false` if there is none.
    pub fn forward_success(&self, key: &str) -> bool {
        let Some(breaker) = self.lookup(key) else {
            return false;
        };
        breaker.operation_succeeded();
        true
    }

    pub fn len(&self) -> usize {
        self.breakers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.breakers.is_empty()
    }

    pub fn keys(&self) -> Vec<String> {
        self.breakers.iter().map(|entry| entry.key().clone()).collect()
    }

    pub fn summary(&self) -> BreakerSummary {
        let mut summary = BreakerSummary::default();
        for breaker in self.snapshot() {
            summary.total_trips += breaker.total_trips();
            match breaker.state() {
                CircuitState::Closed => summary.closed += 1,
                CircuitState::Open => summary.open += 1,
                CircuitState::HalfOpen => summary.half_open += 1,
            }
        }
        summary
    }

    // The shard guard is released before the breaker is touched, listeners
    // may re-enter the manager.
    fn lookup(&self, key: &str) -> Option<Arc<CircuitBreaker>> {
        self.breakers.get(key).map(|entry| Arc::clone(entry.value()))
    }

    fn snapshot(&self) -> Vec<Arc<CircuitBreaker>> {
        self.breakers.iter().map(|entry| Arc::clone(entry.value())).collect()
    }
}

impl std::fmt::Debug for CircuitBreakerManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreakerManager").field("breakers", &self.len()).finish()
    }
}
