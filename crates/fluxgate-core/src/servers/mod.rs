//! Server roster with round-robin selection.
//!
//! Every server gets its own breaker keyed by [`Server::id`]. Breaker state
//! changes move the server between the lists:
//! - Open: blacklisted, dropped from rotation
//! - Closed: whitelisted, back in rotation
//! - Half-Open: whitelisted, then greylisted so providers make one probe
//!
//! The breaker's current state decides, not the state carried by the
//! notification, so a late notification cannot strand a server.

mod roster;


use fluxgate_types::{
    CircuitState, CircuitStateChanged, ConfigError, ConnectionConfig, Server, ServerState,
    ServerStateChanged,
};
use parking_lot::Mutex;
use std::fmt;
use std::sync::{Arc, Weak};
use tracing::{debug, info, trace, warn};

use crate::circuit_breaker::CircuitBreakerManager;
use crate::events::{Listener, Listeners, SubscriptionId};
use crate::metrics::record_server_state;
use roster::Roster;

pub struct ServerManager {
    roster: Mutex<Roster>,
    breakers: CircuitBreakerManager,
    listeners: Listeners<ServerStateChanged>,
    threshold: u32,
    reset_interval_ms: u64,
}

impl ServerManager {
    /// Build a manager over `servers`, each guarded by a breaker with the given settings.
    pub fn new(
        servers: Vec<Server>,
        threshold: u32,
        reset_interval_ms: u64,
    ) -> Result<Arc<Self>, ConfigError> {
        if threshold == 0 {
            return Err(ConfigError::invalid("threshold", "threshold must be at least 1"));
        }
        if reset_interval_ms == 0 {
            return Err(ConfigError::invalid(
                "reset_interval_ms",
                "reset interval must be at least 1ms",
            ));
        }

        let manager = Arc::new_cyclic(|weak: &Weak<Self>| {
            let weak = weak.clone();
            let on_state_changed: Listener<CircuitStateChanged> =
                Arc::new(move |event: &CircuitStateChanged| {
                    if let Some(manager) = weak.upgrade() {
                        manager.circuit_state_changed(event);
                    }
                });
            Self {
                roster: Mutex::new(Roster::default()),
                breakers: CircuitBreakerManager::with_listeners(Some(on_state_changed), None),
                listeners: Listeners::new(),
                threshold,
                reset_interval_ms,
            }
        });

        for server in servers {
            manager.add(server)?;
        }
        Ok(manager)
    }

    pub fn from_config(config: &ConnectionConfig) -> Result<Arc<Self>, ConfigError> {
        Self::new(
            config.servers.clone(),
            config.breaker_failure_threshold,
            config.breaker_reset_interval_ms,
        )
    }

    /// Next server in rotation, skipping blacklisted ones. `None` when all are blacklisted.
    pub fn next(&self) -> Option<Server> {
        self.roster.lock().next()
    }

    /// Whether at least one server is available for selection.
    pub fn has_next(&self) -> bool {
        self.roster.lock().has_next()
    }

    /// Add `server` to the roster and give it a breaker.
    /// Returns `Ok(false)` if an equal server is already managed.
    pub fn add(&self, server: Server) -> Result<bool, ConfigError> {
        ConfigError::require_non_blank("host", server.host())?;
        if self.roster.lock().contains(&server) {
            debug!(server = %server, "Server already managed");
            return Ok(false);
        }

        self.breakers.add_breaker(
            &server.id(),
            server.host(),
            self.threshold,
            self.reset_interval_ms,
        )?;
        let added = self.roster.lock().add(server.clone());
        if added {
            info!(server = %server, "Server added to rotation");
        }
        Ok(added)
    }

    /// Drop `server` from the roster, its lists and its breaker.
    pub fn remove(&self, server: &Server) -> bool {
        let removed = self.roster.lock().remove(server);
        let Some(removed) = removed else {
            return false;
        };
        if let Err(err) = self.breakers.remove_breaker(&removed.id()) {
            warn!(server = %removed, error = %err, "Failed to remove breaker");
        }
        info!(server = %removed, "Server removed from rotation");
        self.announce(&removed, ServerState::Removed, "Server removed from roster");
        true
    }

    /// Exclude `server` from selection. Announces only an actual change.
    pub fn blacklist(&self, server: &Server) -> bool {
        let changed = self.roster.lock().blacklist(server);
        if changed {
            warn!(server = %server, "Server blacklisted");
            self.announce(server, ServerState::Blacklisted, "Server marked unavailable");
        }
        changed
    }

    /// Return `server` to selection. Announces only an actual change.
    pub fn whitelist(&self, server: &Server) -> bool {
        let changed = self.roster.lock().whitelist(server);
        if changed {
            info!(server = %server, "Server whitelisted");
            self.announce(server, ServerState::Whitelisted, "Server available again");
        }
        changed
    }

    /// Ask providers for one probe connection to `server`.
    pub fn greylist(&self, server: &Server) -> bool {
        if !self.roster.lock().contains(server) {
            return false;
        }
        debug!(server = %server, "Server greylisted");
        self.announce(server, ServerState::Greylisted, "Probe connection requested");
        true
    }

    /// Report a failed operation against `server`.
    pub fn error_occurred(&self, server: &Server, error: Option<&dyn std::error::Error>) {
        match error {
            Some(error) => debug!(server = %server, error = %error, "Operation failed"),
            None => debug!(server = %server, "Operation failed"),
        }
        if !self.breakers.forward_failure(&self.breaker_key(server)) {
            trace!(server = %server, "No breaker for server");
        }
    }

    /// Report a successful operation against `server`.
    pub fn operation_succeeded(&self, server: &Server) {
        if !self.breakers.forward_success(&self.breaker_key(server)) {
            trace!(server = %server, "No breaker for server");
        }
    }

    pub fn subscribe(&self, listener: Listener<ServerStateChanged>) -> SubscriptionId {
        self.listeners.subscribe(listener)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.listeners.unsubscribe(id)
    }

    /// Snapshot of the roster in insertion order.
    pub fn servers(&self) -> Vec<Server> {
        self.roster.lock().servers().to_vec()
    }

    pub fn contains(&self, server: &Server) -> bool {
        self.roster.lock().contains(server)
    }

    pub fn is_blacklisted(&self, server: &Server) -> bool {
        self.roster.lock().is_blacklisted(server)
    }

    pub fn breakers(&self) -> &CircuitBreakerManager {
        &self.breakers
    }

    /// Breaker key of the managed server equal to `server`.
    fn breaker_key(&self, server: &Server) -> String {
        self.roster.lock().managed(server).map_or_else(|| server.id(), Server::id)
    }

    fn circuit_state_changed(&self, event: &CircuitStateChanged) {
        let server = self.roster.lock().find_by_id(&event.node_id);
        let Some(server) = server else {
            trace!(node_id = %event.node_id, "Breaker event for unmanaged server");
            return;
        };

        // Notifications from other threads may land late; act on the breaker as it is now
        let state = match self.breakers.get_breaker(&event.node_id) {
            Ok(Some(breaker)) => breaker.state(),
            _ => event.new_state,
        };
        if state != event.new_state {
            debug!(
                server = %server,
                notified = %event.new_state,
                current = %state,
                "Stale breaker notification"
            );
        }

        match state {
            CircuitState::Open => {
                self.blacklist(&server);
            },
            CircuitState::Closed => {
                self.whitelist(&server);
            },
            CircuitState::HalfOpen => {
                self.whitelist(&server);
                self.greylist(&server);
            },
        }
    }

    fn announce(&self, server: &Server, state: ServerState, message: &str) {
        record_server_state(state);
        self.listeners.emit(&ServerStateChanged::new(server.clone(), state, message));
    }
}

impl fmt::Debug for ServerManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let roster = self.roster.lock();
        f.debug_struct("ServerManager")
            .field("servers", &roster.servers())
            .field("available", &roster.available())
            .field("threshold", &self.threshold)
            .field("reset_interval_ms", &self.reset_interval_ms)
            .finish_non_exhaustive()
    }
}
