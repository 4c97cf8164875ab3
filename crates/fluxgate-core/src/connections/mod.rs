//! Connection acquisition.
//!
//! - **`NormalConnectionProvider`** - a fresh connection per request
//! - **`PooledConnectionProvider`** - bounded reuse with eviction and warm-up
//!
//! Both walk the [`ServerManager`](crate::servers::ServerManager) rotation and
//! report every open failure back to it, so failing servers are blacklisted
//! by their breakers without caller involvement.

pub mod connection;
mod normal;
mod pooled;
mod provider;
pub mod tcp;

#[cfg(test)]
pub(crate) mod mock;

pub use connection::{is_alive, same_connection, Connection, ConnectionFactory, SharedConnection};
pub use normal::NormalConnectionProvider;
pub use pooled::{PoolStats, PooledConnectionProvider};
pub use provider::{Candidate, ConnectionProvider};
pub use tcp::{TcpConnection, TcpConnectionFactory};

use fluxgate_types::{ConfigError, ConnectionConfig};
use std::sync::Arc;
use tracing::debug;

/// Pooled or normal provider, as selected by [`ConnectionConfig::pooling`].
pub fn connection_provider(
    config: ConnectionConfig,
    factory: Arc<dyn ConnectionFactory>,
) -> Result<Arc<dyn ConnectionProvider>, ConfigError> {
    if config.pooling {
        debug!(
            min = config.min_pool_size,
            max = config.max_pool_size,
            "Creating pooled connection provider"
        );
        let provider: Arc<dyn ConnectionProvider> = PooledConnectionProvider::new(config, factory)?;
        Ok(provider)
    } else {
        debug!("Creating normal connection provider");
        let provider: Arc<dyn ConnectionProvider> = NormalConnectionProvider::new(config, factory)?;
        Ok(provider)
    }
}
