//! Typed error definitions for fluxgate.
//!
//! This module provides a structured error hierarchy with specific error types
//! for different domains. All errors are designed to be:
//!
//! - **Serializable** for diagnostics via serde
//! - **Displayable** for logging via Display trait
//! - **Matchable** for retry logic via enum variants
//! - **Composable** via thiserror derive macros

mod circuit;
mod config;
mod connection;
mod transport;

pub use circuit::CircuitError;
pub use config::ConfigError;
pub use connection::ConnectionError;
pub use transport::TransportError;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{Classify, FailureKind};

/// Unified error type that wraps all domain-specific errors.
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "domain", content = "error")]
pub enum TypedError {
    /// Wraps a configuration or argument error
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// Wraps a circuit breaker error
    #[error("Circuit error: {0}")]
    Circuit(#[from] CircuitError),

    /// Wraps a connection acquisition error
    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),
}

impl From<TransportError> for TypedError {
    fn from(err: TransportError) -> Self {
        Self::Connection(ConnectionError::Transport(err))
    }
}

impl Classify for TypedError {
    fn failure_kind(&self) -> FailureKind {
        match self {
            Self::Connection(err) => err.failure_kind(),
            Self::Config(_) | Self::Circuit(_) => FailureKind::Application,
        }
    }
}

/// Standard Result type using TypedError.
pub type Result<T> = std::result::Result<T, TypedError>;
