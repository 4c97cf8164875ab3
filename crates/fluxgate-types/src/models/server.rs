//! Server endpoint value.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::error::ConfigError;

/// One node endpoint.
///
/// Equality and hashing use the host (ASCII case-insensitive) and port only;
/// the timeout is part of [`Server::id`] but not of identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Server {
    host: String,
    #[serde(default = "default_port")]
    port: u16,
    /// Connect timeout in seconds, 0 = none
    #[serde(default)]
    timeout: u32,
}

fn default_port() -> u16 {
    Server::DEFAULT_PORT
}

impl Server {
    pub const DEFAULT_HOST: &'static str = "127.0.0.1";
    pub const DEFAULT_PORT: u16 = 9160;
    pub const DEFAULT_TIMEOUT: u32 = 0;

    pub fn new(host: impl Into<String>, port: u16, timeout: u32) -> Result<Self, ConfigError> {
        let host = host.into();
        ConfigError::require_non_blank("host", &host)?;
        Ok(Self { host, port, timeout })
    }

    /// Server on `host` with the default port and timeout.
    pub fn with_host(host: impl Into<String>) -> Result<Self, ConfigError> {
        Self::new(host, Self::DEFAULT_PORT, Self::DEFAULT_TIMEOUT)
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn timeout(&self) -> u32 {
        self.timeout
    }

    /// Stable string that uniquely identifies this server, used as breaker key.
    pub fn id(&self) -> String {
        self.to_string()
    }

    /// `host:port`, suitable for socket connects.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for Server {
    fn default() -> Self {
        Self {
            host: Self::DEFAULT_HOST.to_string(),
            port: Self::DEFAULT_PORT,
            timeout: Self::DEFAULT_TIMEOUT,
        }
    }
}

impl fmt::Display for Server {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{},{} secs", self.host, self.port, self.timeout)
    }
}

impl PartialEq for Server {
    fn eq(&self, other: &Self) -> bool {
        self.port == other.port && self.host.eq_ignore_ascii_case(&other.host)
    }
}

impl Eq for Server {}

impl Hash for Server {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.port.hash(state);
        for b in self.host.bytes() {
            b.to_ascii_lowercase().hash(state);
        }
    }
}
