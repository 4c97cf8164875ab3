//! One connection per request, with probe connections queued for greylisted servers.

use async_trait::async_trait;
use fluxgate_types::{
    ConfigError, ConnectionConfig, ConnectionError, Server, ServerState, ServerStateChanged,
    TransportError,
};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, warn};

use super::connection::{ConnectionFactory, SharedConnection};
use super::provider::{Candidate, ConnectionProvider};
use crate::servers::ServerManager;

pub struct NormalConnectionProvider {
    config: ConnectionConfig,
    servers: Arc<ServerManager>,
    factory: Arc<dyn ConnectionFactory>,
    retry_queue: Mutex<VecDeque<SharedConnection>>,
}

impl NormalConnectionProvider {
    /// Fails if the config does not validate, notably when several servers
    /// are configured without a connection timeout.
    pub fn new(
        config: ConnectionConfig,
        factory: Arc<dyn ConnectionFactory>,
    ) -> Result<Arc<Self>, ConfigError> {
        let provider = Arc::new(Self::build(config, factory)?);
        let weak = Arc::downgrade(&provider);
        provider.servers.subscribe(Arc::new(move |event: &ServerStateChanged| {
            if let Some(provider) = weak.upgrade() {
                provider.server_state_changed(event);
            }
        }));
        Ok(provider)
    }

    /// Provider without a server-state subscription, for embedding.
    pub(crate) fn build(
        config: ConnectionConfig,
        factory: Arc<dyn ConnectionFactory>,
    ) -> Result<Self, ConfigError> {
        config.check()?;
        let servers = ServerManager::from_config(&config)?;
        Ok(Self { config, servers, factory, retry_queue: Mutex::new(VecDeque::new()) })
    }

    /// Unopened connection to `server`.
    pub(crate) fn new_connection(&self, server: &Server) -> Result<SharedConnection, TransportError> {
        self.factory.create(server, &self.config)
    }

    /// Unopened connection to the next server in rotation. `None` when no
    /// server is available.
    pub(crate) fn connection_to_next_server(&self) -> Option<Candidate> {
        let server = self.servers.next()?;
        let candidate = match self.new_connection(&server) {
            Ok(connection) => Candidate::Connection(connection),
            Err(error) => Candidate::Failed { server, error },
        };
        Some(candidate)
    }

    pub fn queued_probes(&self) -> usize {
        self.retry_queue.lock().len()
    }

    fn server_state_changed(&self, event: &ServerStateChanged) {
        match event.new_state {
            ServerState::Greylisted => self.queue_probe(&event.server),
            ServerState::Removed => {
                let mut queue = self.retry_queue.lock();
                let before = queue.len();
                queue.retain(|probe| probe.server() != &event.server);
                let dropped = before - queue.len();
                drop(queue);
                if dropped > 0 {
                    debug!(server = %event.server, dropped, "Dropped probes for removed server");
                }
            },
            ServerState::Blacklisted | ServerState::Whitelisted => {},
        }
    }

    /// Queue one probe for `server`, unless one is already waiting.
    fn queue_probe(&self, server: &Server) {
        let queued = self.retry_queue.lock().iter().any(|probe| probe.server() == server);
        if queued {
            debug!(server = %server, "Probe already queued");
            return;
        }
        match self.new_connection(server) {
            Ok(connection) => {
                let mut queue = self.retry_queue.lock();
                if queue.iter().all(|probe| probe.server() != server) {
                    queue.push_back(connection);
                    debug!(server = %server, "Queued probe connection");
                }
            },
            Err(err) => {
                warn!(server = %server, error = %err, "Failed to create probe connection");
                self.servers.error_occurred(server, Some(&err));
            },
        }
    }
}

#[async_trait]
impl ConnectionProvider for NormalConnectionProvider {
    fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    fn servers(&self) -> &Arc<ServerManager> {
        &self.servers
    }

    async fn create_connection(&self) -> Result<Option<Candidate>, ConnectionError> {
        let probe = self.retry_queue.lock().pop_front();
        if let Some(probe) = probe {
            return Ok(Some(Candidate::Connection(probe)));
        }
        Ok(self.connection_to_next_server())
    }

    fn has_pending(&self) -> bool {
        !self.retry_queue.lock().is_empty()
    }
}
