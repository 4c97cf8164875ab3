//! Provider contract shared by the normal and pooled strategies.

use async_trait::async_trait;
use fluxgate_types::{ConnectionConfig, ConnectionError, Server, TransportError};
use std::sync::Arc;
use tracing::{debug, warn};

use super::connection::SharedConnection;
use crate::servers::ServerManager;

/// Next thing to try when opening a connection.
#[derive(Debug)]
pub enum Candidate {
    /// A connection, possibly not yet opened.
    Connection(SharedConnection),
    /// The factory could not build a connection to `server`.
    Failed { server: Server, error: TransportError },
}

/// Hands out open connections and routes outcomes back to the server manager.
#[async_trait]
pub trait ConnectionProvider: Send + Sync {
    fn config(&self) -> &ConnectionConfig;

    fn servers(&self) -> &Arc<ServerManager>;

    /// Produce the next candidate. `Ok(None)` means no server is currently available.
    async fn create_connection(&self) -> Result<Option<Candidate>, ConnectionError>;

    /// Whether candidates are queued that do not depend on server rotation.
    fn has_pending(&self) -> bool {
        false
    }

    /// Try candidates until one opens. Every failed create or open is reported
    /// against its server, so a persistently failing roster ends in
    /// [`ConnectionError::Exhausted`].
    async fn open(&self) -> Result<SharedConnection, ConnectionError> {
        let mut attempts = 0_u32;
        while self.servers().has_next() || self.has_pending() {
            let Some(candidate) = self.create_connection().await? else {
                break;
            };
            attempts = attempts.saturating_add(1);

            let connection = match candidate {
                Candidate::Connection(connection) => connection,
                Candidate::Failed { server, error } => {
                    warn!(
                        server = %server,
                        error = %error,
                        attempts,
                        "Failed to create connection, trying next server"
                    );
                    self.servers().error_occurred(&server, Some(&error));
                    continue;
                },
            };

            if connection.is_open() {
                return Ok(connection);
            }
            match connection.open().await {
                Ok(()) => {
                    debug!(server = %connection.server(), attempts, "Connection ready");
                    return Ok(connection);
                },
                Err(err) => {
                    warn!(
                        server = %connection.server(),
                        error = %err,
                        attempts,
                        "Failed to open connection, trying next server"
                    );
                    self.servers().error_occurred(connection.server(), Some(&err));
                    self.close(&connection);
                },
            }
        }
        Err(ConnectionError::Exhausted { attempts })
    }

    /// Release `connection`. Returns `true` once the provider is done with it.
    fn close(&self, connection: &SharedConnection) -> bool {
        if connection.is_open() {
            connection.close();
        }
        true
    }

    /// Report a failed operation on `connection`, then close and release it.
    fn error_occurred(
        &self,
        connection: &SharedConnection,
        error: Option<&dyn std::error::Error>,
    ) {
        self.servers().error_occurred(connection.server(), error);
        if connection.is_open() {
            connection.close();
        }
        self.close(connection);
    }

    fn operation_succeeded(&self, connection: &SharedConnection) {
        self.servers().operation_succeeded(connection.server());
    }
}
