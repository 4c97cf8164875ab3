//! Connection configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use validator::Validate;

use super::server::Server;
use crate::error::ConfigError;

/// Everything the resilience core needs to know about how to reach the cluster.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Validate)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Initial server roster
    #[validate(length(min = 1_u64))]
    pub servers: Vec<Server>,
    /// Use the pooled provider instead of one connection per request
    pub pooling: bool,
    /// Pool warm-up floor
    pub min_pool_size: usize,
    /// Hard cap on free + used pooled connections
    #[validate(range(min = 1_usize))]
    pub max_pool_size: usize,
    /// Connection open timeout in milliseconds, 0 = none
    pub connection_timeout_ms: u64,
    /// Maximum age of a pooled connection in milliseconds, 0 = infinite
    pub connection_lifetime_ms: u64,
    /// Failures a server may accumulate before its breaker trips
    #[validate(range(min = 1_u32))]
    pub breaker_failure_threshold: u32,
    /// Time an open breaker waits before going half-open, in milliseconds
    #[validate(range(min = 1_u64))]
    pub breaker_reset_interval_ms: u64,
    /// Bounded wait for pool capacity, in milliseconds
    #[validate(range(min = 1_u64))]
    pub pool_wait_timeout_ms: u64,
    /// Period of the pool maintenance sweep, in milliseconds
    #[validate(range(min = 1_u64))]
    pub maintenance_interval_ms: u64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            servers: vec![Server::default()],
            pooling: false,
            min_pool_size: 0,
            max_pool_size: 100,
            connection_timeout_ms: 0,
            connection_lifetime_ms: 0,
            breaker_failure_threshold: 2,
            breaker_reset_interval_ms: 60_000,
            pool_wait_timeout_ms: 30_000,
            maintenance_interval_ms: 30_000,
        }
    }
}

impl ConnectionConfig {
    /// Config for the given roster with every other setting at its default.
    pub fn with_servers(servers: Vec<Server>) -> Self {
        Self { servers, ..Self::default() }
    }

    /// Parse a JSON document and validate it.
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(raw).map_err(|e| ConfigError::from_json_error(&e))?;
        config.check()?;
        Ok(config)
    }

    /// Run field validation plus the cross-field rules.
    pub fn check(&self) -> Result<(), ConfigError> {
        self.validate().map_err(|e| ConfigError::from_validation(&e))?;

        for server in &self.servers {
            ConfigError::require_non_blank("servers.host", server.host())?;
        }
        if self.min_pool_size > self.max_pool_size {
            return Err(ConfigError::invalid(
                "min_pool_size",
                format!(
                    "min_pool_size ({}) exceeds max_pool_size ({})",
                    self.min_pool_size, self.max_pool_size
                ),
            ));
        }
        if self.servers.len() > 1 && self.connection_timeout_ms == 0 {
            return Err(ConfigError::invalid(
                "connection_timeout_ms",
                "You must specify a timeout when using multiple servers",
            ));
        }
        Ok(())
    }

    pub fn connection_timeout(&self) -> Option<Duration> {
        (self.connection_timeout_ms > 0).then(|| Duration::from_millis(self.connection_timeout_ms))
    }

    /// `None` means connections never expire by age.
    pub fn connection_lifetime(&self) -> Option<Duration> {
        (self.connection_lifetime_ms > 0)
            .then(|| Duration::from_millis(self.connection_lifetime_ms))
    }

    pub fn breaker_reset_interval(&self) -> Duration {
        Duration::from_millis(self.breaker_reset_interval_ms)
    }

    pub fn pool_wait_timeout(&self) -> Duration {
        Duration::from_millis(self.pool_wait_timeout_ms)
    }

    pub fn maintenance_interval(&self) -> Duration {
        Duration::from_millis(self.maintenance_interval_ms)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn two_servers() -> Vec<Server> {
        vec![Server::with_host("db1").unwrap(), Server::with_host("db2").unwrap()]
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = ConnectionConfig::default();
        assert!(config.check().is_ok());
        assert_eq!(config.pool_wait_timeout(), Duration::from_secs(30));
        assert_eq!(config.maintenance_interval(), Duration::from_secs(30));
        assert!(config.connection_lifetime().is_none());
        assert!(config.connection_timeout().is_none());
    }

    #[test]
    fn test_multiple_servers_require_timeout() {
        let config = ConnectionConfig::with_servers(two_servers());
        let err = config.check().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { ref field, .. } if field == "connection_timeout_ms"));

        let config = ConnectionConfig { connection_timeout_ms: 500, ..config };
        assert!(config.check().is_ok());
    }

    #[test]
    fn test_zero_threshold_rejected() {
        let config = ConnectionConfig { breaker_failure_threshold: 0, ..Default::default() };
        let err = config.check().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { ref field, .. } if field == "breaker_failure_threshold"));
    }

    #[test]
    fn test_empty_roster_rejected() {
        let config = ConnectionConfig::with_servers(Vec::new());
        assert!(config.check().is_err());
    }

    #[test]
    fn test_min_pool_above_max_rejected() {
        let config = ConnectionConfig { min_pool_size: 5, max_pool_size: 2, ..Default::default() };
        assert!(config.check().is_err());
    }

    #[test]
    fn test_from_json_fills_defaults() {
        let config = ConnectionConfig::from_json(
            r#"{"servers":[{"host":"db1","port":9042}],"pooling":true,"max_pool_size":4}"#,
        )
        .unwrap();
        assert!(config.pooling);
        assert_eq!(config.max_pool_size, 4);
        assert_eq!(config.servers[0].port(), 9042);
        assert_eq!(config.breaker_failure_threshold, 2);

        assert!(matches!(
            ConnectionConfig::from_json("{not json"),
            Err(ConfigError::ParseError { .. })
        ));
    }
}
