//! Notification payloads emitted by breakers and the server manager.

use serde::{Deserialize, Serialize};

use super::server::Server;
use super::state::{CircuitState, ServerState};
use crate::error::ConfigError;

/// A breaker changed state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CircuitStateChanged {
    /// Unique node identifier the breaker is keyed by
    pub node_id: String,
    /// Host name of the node
    pub host: String,
    /// State the circuit flipped to
    pub new_state: CircuitState,
    /// Free-form message data
    pub message: String,
}

impl CircuitStateChanged {
    pub fn new(
        node_id: impl Into<String>,
        host: impl Into<String>,
        new_state: CircuitState,
        message: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        let node_id = node_id.into();
        let host = host.into();
        ConfigError::require_non_blank("node_id", &node_id)?;
        ConfigError::require_non_blank("host", &host)?;
        Ok(Self { node_id, host, new_state, message: message.into() })
    }
}

/// A server moved between blacklist, whitelist and greylist.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServerStateChanged {
    pub server: Server,
    pub new_state: ServerState,
    pub message: String,
}

impl ServerStateChanged {
    pub fn new(server: Server, new_state: ServerState, message: impl Into<String>) -> Self {
        Self { server, new_state, message: message.into() }
    }
}
