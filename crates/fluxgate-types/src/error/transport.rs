//! Transport-level errors raised by connection implementations.

use serde::{Deserialize, Serialize};
use std::io;
use thiserror::Error;

use crate::models::{Classify, FailureKind};

/// Errors raised while opening or using a connection to a server.
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "details")]
pub enum TransportError {
    /// The server actively refused the connection
    #[error("Connection to {endpoint} refused: {message}")]
    Refused { endpoint: String, message: String },

    /// The connection attempt did not complete in time
    #[error("Connection to {endpoint} timed out after {timeout_ms}ms")]
    TimedOut { endpoint: String, timeout_ms: u64 },

    /// Any other socket-level failure
    #[error("Socket error on {endpoint}: {message}")]
    Socket { endpoint: String, message: String },

    /// The connection is not open
    #[error("Connection to {endpoint} is closed")]
    Closed { endpoint: String },
}

impl TransportError {
    /// Map an I/O error observed while talking to `endpoint`.
    pub fn from_io(endpoint: impl Into<String>, e: &io::Error) -> Self {
        let endpoint = endpoint.into();
        match e.kind() {
            io::ErrorKind::ConnectionRefused => {
                Self::Refused { endpoint, message: e.to_string() }
            },
            io::ErrorKind::TimedOut => Self::TimedOut { endpoint, timeout_ms: 0 },
            io::ErrorKind::NotConnected | io::ErrorKind::BrokenPipe => Self::Closed { endpoint },
            _ => Self::Socket { endpoint, message: e.to_string() },
        }
    }

    /// The `host:port` this error was observed on.
    pub fn endpoint(&self) -> &str {
        match self {
            Self::Refused { endpoint, .. }
            | Self::TimedOut { endpoint, .. }
            | Self::Socket { endpoint, .. }
            | Self::Closed { endpoint } => endpoint,
        }
    }
}

impl Classify for TransportError {
    fn failure_kind(&self) -> FailureKind {
        match self {
            Self::TimedOut { .. } => FailureKind::Timeout,
            Self::Refused { .. } | Self::Socket { .. } | Self::Closed { .. } => FailureKind::Socket,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_io_maps_kinds() {
        let refused = io::Error::new(io::ErrorKind::ConnectionRefused, "refused");
        let err = TransportError::from_io("db1:9160", &refused);
        assert!(matches!(err, TransportError::Refused { .. }));
        assert_eq!(err.endpoint(), "db1:9160");

        let timed_out = io::Error::new(io::ErrorKind::TimedOut, "slow");
        let err = TransportError::from_io("db1:9160", &timed_out);
        assert_eq!(err.failure_kind(), FailureKind::Timeout);

        let reset = io::Error::new(io::ErrorKind::ConnectionReset, "reset");
        assert_eq!(TransportError::from_io("db1:9160", &reset).failure_kind(), FailureKind::Socket);
    }
}
