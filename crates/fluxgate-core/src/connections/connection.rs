//! Connection capability used by the providers.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fluxgate_types::{ConnectionConfig, Server, TransportError};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// A connection to one server. Implementations carry their own interior state.
#[async_trait]
pub trait Connection: Send + Sync + fmt::Debug {
    fn server(&self) -> &Server;

    /// When the connection object was created.
    fn created(&self) -> DateTime<Utc>;

    fn is_open(&self) -> bool;

    /// Open the connection. A no-op on an already open connection.
    async fn open(&self) -> Result<(), TransportError>;

    fn close(&self);
}

pub type SharedConnection = Arc<dyn Connection>;

/// Creates unopened connections for a server.
pub trait ConnectionFactory: Send + Sync {
    fn create(
        &self,
        server: &Server,
        config: &ConnectionConfig,
    ) -> Result<SharedConnection, TransportError>;
}

/// Identity comparison, ignoring vtable pointers.
pub fn same_connection(a: &SharedConnection, b: &SharedConnection) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

/// Open, and younger than `lifetime` when one is set.
pub fn is_alive(connection: &dyn Connection, lifetime: Option<Duration>) -> bool {
    if !connection.is_open() {
        return false;
    }
    let Some(lifetime) = lifetime else {
        return true;
    };
    Utc::now().signed_duration_since(connection.created()).to_std().map_or(true, |age| age <= lifetime)
}
