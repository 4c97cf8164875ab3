//! Connection acquisition errors.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::TransportError;
use crate::models::{Classify, FailureKind};

/// Errors returned by connection providers.
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "details")]
pub enum ConnectionError {
    /// Every server was tried and none produced a working connection
    #[error("No connection could be made because all servers have failed ({attempts} attempts)")]
    Exhausted { attempts: u32 },

    /// A bounded wait for pool capacity timed out
    #[error("Timed out after {waited_ms}ms trying to acquire a connection from the connection pool")]
    PoolExhausted { waited_ms: u64 },

    /// Creating a connection object failed at the transport level
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl ConnectionError {
    /// Terminal errors are not worth retrying on this call.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Exhausted { .. } | Self::PoolExhausted { .. })
    }
}

impl Classify for ConnectionError {
    fn failure_kind(&self) -> FailureKind {
        match self {
            Self::Transport(err) => err.failure_kind(),
            Self::PoolExhausted { .. } => FailureKind::Timeout,
            Self::Exhausted { .. } => FailureKind::Transport,
        }
    }
}
