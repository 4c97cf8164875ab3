//! Failure classification used by breakers to decide which errors to ignore.

use serde::{Deserialize, Serialize};
use std::io;

/// Coarse kind of an operation failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Low-level socket error (reset, refused, broken pipe)
    Socket,
    /// Deadline exceeded
    Timeout,
    /// Transport failure above the socket (exhausted retries, protocol framing)
    Transport,
    /// Anything raised by the operation itself
    Application,
}

/// Errors that can report their [`FailureKind`].
pub trait Classify {
    fn failure_kind(&self) -> FailureKind;
}

impl Classify for io::Error {
    fn failure_kind(&self) -> FailureKind {
        match self.kind() {
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => FailureKind::Timeout,
            io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::NotConnected
            | io::ErrorKind::AddrInUse
            | io::ErrorKind::AddrNotAvailable
            | io::ErrorKind::BrokenPipe => FailureKind::Socket,
            _ => FailureKind::Application,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_classification() {
        let reset = io::Error::new(io::ErrorKind::ConnectionReset, "reset");
        let slow = io::Error::new(io::ErrorKind::TimedOut, "slow");
        let other = io::Error::other("boom");

        assert_eq!(reset.failure_kind(), FailureKind::Socket);
        assert_eq!(slow.failure_kind(), FailureKind::Timeout);
        assert_eq!(other.failure_kind(), FailureKind::Application);
    }
}
