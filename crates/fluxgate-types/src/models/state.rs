//! Circuit and server state enums.

use serde::{Deserialize, Serialize};

/// State of a circuit breaker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Normal operation - operations flow through
    Closed,
    /// Node is failing - operations fail immediately
    Open,
    /// Reset interval elapsed - the next outcome decides between closed and open
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "closed"),
            CircuitState::Open => write!(f, "open"),
            CircuitState::HalfOpen => write!(f, "half_open"),
        }
    }
}

/// Health state of a server as seen by the server manager
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServerState {
    /// Failed too many times and excluded from selection
    Blacklisted,
    /// Available for selection
    Whitelisted,
    /// Flagged for a one-shot probe connection
    Greylisted,
    /// Dropped from the roster
    Removed,
}

impl std::fmt::Display for ServerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServerState::Blacklisted => write!(f, "blacklisted"),
            ServerState::Whitelisted => write!(f, "whitelisted"),
            ServerState::Greylisted => write!(f, "greylisted"),
            ServerState::Removed => write!(f, "removed"),
        }
    }
}
