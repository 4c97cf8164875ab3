//! Circuit breaker errors.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors surfaced by a circuit breaker guarding a node.
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "details")]
pub enum CircuitError {
    /// The breaker is open: do not retry this node now, pick another or back off
    #[error("Circuit breaker for {node_id} is currently open")]
    Open { node_id: String },
}
