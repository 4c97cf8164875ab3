//! Bounded pool of reusable connections.
//!
//! Connections move between a free queue and a used list; together they never
//! exceed `max_pool_size`. A caller that finds the pool full waits up to
//! `pool_wait_timeout_ms` for a release. Server state changes reshape the pool:
//! - Blacklisted or Removed: evict every connection to that server
//! - Whitelisted: with infinite lifetime, drop all pooled connections so the
//!   pool rebalances over the restored roster
//! - Greylisted: open one probe connection and put it at the front of the free queue

mod maintenance;

use async_trait::async_trait;
use fluxgate_types::{
    ConfigError, ConnectionConfig, ConnectionError, Server, ServerState, ServerStateChanged,
};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::{Arc, Weak};
use tokio::runtime::Handle;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::connection::{is_alive, same_connection, ConnectionFactory, SharedConnection};
use super::normal::NormalConnectionProvider;
use super::provider::{Candidate, ConnectionProvider};
use crate::metrics::{record_pool_exhausted, record_pool_size};
use crate::servers::ServerManager;

#[derive(Default)]
struct Pool {
    free: VecDeque<SharedConnection>,
    used: Vec<SharedConnection>,
}

impl Pool {
    fn len(&self) -> usize {
        self.free.len() + self.used.len()
    }

    fn is_free(&self, connection: &SharedConnection) -> bool {
        self.free.iter().any(|c| same_connection(c, connection))
    }

    fn take_used(&mut self, connection: &SharedConnection) -> Option<SharedConnection> {
        let position = self.used.iter().position(|c| same_connection(c, connection))?;
        Some(self.used.swap_remove(position))
    }

    /// Remove every connection to `server`. Free ones are closed, used ones
    /// are closed when their caller releases them.
    fn evict(&mut self, server: &Server) -> usize {
        let before = self.len();
        self.used.retain(|c| c.server() != server);
        self.free.retain(|c| {
            let keep = c.server() != server;
            if !keep {
                c.close();
            }
            keep
        });
        before - self.len()
    }

    fn clear(&mut self) -> usize {
        let before = self.len();
        self.used.clear();
        for connection in self.free.drain(..) {
            connection.close();
        }
        before
    }
}

/// Occupancy snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    pub free: usize,
    pub used: usize,
    pub max: usize,
}

pub struct PooledConnectionProvider {
    base: NormalConnectionProvider,
    pool: Mutex<Pool>,
    available: Notify,
    maintenance: Mutex<Option<JoinHandle<()>>>,
    weak_self: Weak<PooledConnectionProvider>,
}

impl PooledConnectionProvider {
    /// Build the pool and, inside a Tokio runtime, start the maintenance task.
    pub fn new(
        config: ConnectionConfig,
        factory: Arc<dyn ConnectionFactory>,
    ) -> Result<Arc<Self>, ConfigError> {
        let base = NormalConnectionProvider::build(config, factory)?;
        let provider = Arc::new_cyclic(|weak_self| Self {
            base,
            pool: Mutex::new(Pool::default()),
            available: Notify::new(),
            maintenance: Mutex::new(None),
            weak_self: weak_self.clone(),
        });

        let weak = Arc::downgrade(&provider);
        provider.servers().subscribe(Arc::new(move |event: &ServerStateChanged| {
            if let Some(provider) = weak.upgrade() {
                provider.server_state_changed(event);
            }
        }));

        match Handle::try_current() {
            Ok(handle) => provider.start_maintenance(&handle),
            Err(_) => warn!("No Tokio runtime available, pool maintenance disabled"),
        }
        Ok(provider)
    }

    pub fn free_count(&self) -> usize {
        self.pool.lock().free.len()
    }

    pub fn used_count(&self) -> usize {
        self.pool.lock().used.len()
    }

    pub fn stats(&self) -> PoolStats {
        let pool = self.pool.lock();
        PoolStats { free: pool.free.len(), used: pool.used.len(), max: self.config().max_pool_size }
    }

    /// Stop background maintenance and close every free connection.
    pub fn shutdown(&self) {
        if let Some(task) = self.maintenance.lock().take() {
            task.abort();
        }
        let dropped = self.pool.lock().clear();
        if dropped > 0 {
            info!(dropped, "Connection pool shut down");
        }
        self.wake_waiters();
    }

    /// Open a probe connection to `server` and make it the next one handed out.
    /// Returns `false` if the probe failed or the pool had no room.
    pub async fn probe(&self, server: &Server) -> bool {
        let connection = match self.base.new_connection(server) {
            Ok(connection) => connection,
            Err(err) => {
                warn!(server = %server, error = %err, "Failed to create probe connection");
                self.servers().error_occurred(server, Some(&err));
                return false;
            },
        };
        if let Err(err) = connection.open().await {
            warn!(server = %server, error = %err, "Probe connection failed");
            self.servers().error_occurred(server, Some(&err));
            connection.close();
            return false;
        }

        let max = self.config().max_pool_size;
        let admitted = {
            let mut pool = self.pool.lock();
            if pool.len() >= max {
                if let Some(retired) = pool.free.pop_front() {
                    retired.close();
                }
            }
            let admitted = pool.len() < max;
            if admitted {
                pool.free.push_front(Arc::clone(&connection));
            }
            record_pool_size(pool.free.len(), pool.used.len());
            admitted
        };

        if admitted {
            debug!(server = %server, "Probe connection pooled");
            self.available.notify_one();
        } else {
            debug!(server = %server, "Pool full of used connections, dropping probe");
            connection.close();
        }
        admitted
    }

    /// Reshape the pool for a roster change. Blacklist and whitelist
    /// notifications are checked against the roster as it is now.
    pub(crate) fn server_state_changed(&self, event: &ServerStateChanged) {
        match event.new_state {
            ServerState::Blacklisted => {
                if !self.servers().is_blacklisted(&event.server) {
                    debug!(server = %event.server, "Server no longer blacklisted, keeping pool");
                    return;
                }
                let evicted = self.pool.lock().evict(&event.server);
                if evicted > 0 {
                    info!(server = %event.server, evicted, "Evicted connections to blacklisted server");
                    self.wake_waiters();
                }
            },
            ServerState::Removed => {
                let evicted = self.pool.lock().evict(&event.server);
                if evicted > 0 {
                    info!(server = %event.server, evicted, "Evicted connections to removed server");
                    self.wake_waiters();
                }
            },
            ServerState::Whitelisted => {
                if self.config().connection_lifetime().is_some()
                    || self.servers().is_blacklisted(&event.server)
                {
                    return;
                }
                let dropped = self.pool.lock().clear();
                if dropped > 0 {
                    info!(server = %event.server, dropped, "Rebalancing pool over restored server");
                    self.wake_waiters();
                }
            },
            ServerState::Greylisted => self.spawn_probe(event.server.clone()),
        }
    }

    fn spawn_probe(&self, server: Server) {
        let Ok(handle) = Handle::try_current() else {
            warn!(server = %server, "No Tokio runtime available, skipping probe");
            return;
        };
        let weak = self.weak_self.clone();
        handle.spawn(async move {
            if let Some(provider) = weak.upgrade() {
                provider.probe(&server).await;
            }
        });
    }

    fn wake_waiters(&self) {
        self.available.notify_waiters();
        self.available.notify_one();
    }
}

#[async_trait]
impl ConnectionProvider for PooledConnectionProvider {
    fn config(&self) -> &ConnectionConfig {
        self.base.config()
    }

    fn servers(&self) -> &Arc<ServerManager> {
        self.base.servers()
    }

    /// Take a free connection, or create one while there is room, or wait
    /// for a release up to the pool wait timeout.
    async fn create_connection(&self) -> Result<Option<Candidate>, ConnectionError> {
        let max = self.config().max_pool_size;
        let wait = self.config().pool_wait_timeout();

        loop {
            let released = self.available.notified();
            {
                let mut pool = self.pool.lock();
                if let Some(connection) = pool.free.pop_front() {
                    pool.used.push(Arc::clone(&connection));
                    record_pool_size(pool.free.len(), pool.used.len());
                    return Ok(Some(Candidate::Connection(connection)));
                }
                if pool.len() < max {
                    let candidate = self.base.connection_to_next_server();
                    if let Some(Candidate::Connection(connection)) = &candidate {
                        pool.used.push(Arc::clone(connection));
                        record_pool_size(pool.free.len(), pool.used.len());
                    }
                    return Ok(candidate);
                }
            }

            if tokio::time::timeout(wait, released).await.is_err() {
                record_pool_exhausted();
                let waited_ms = u64::try_from(wait.as_millis()).unwrap_or(u64::MAX);
                warn!(waited_ms, max, "Connection pool exhausted");
                return Err(ConnectionError::PoolExhausted { waited_ms });
            }
        }
    }

    fn has_pending(&self) -> bool {
        !self.pool.lock().free.is_empty()
    }

    /// Return `connection` to the free queue if it is still alive.
    fn close(&self, connection: &SharedConnection) -> bool {
        let lifetime = self.config().connection_lifetime();
        {
            let mut pool = self.pool.lock();
            match pool.take_used(connection) {
                Some(released) if is_alive(released.as_ref(), lifetime) => {
                    pool.free.push_back(released);
                },
                Some(released) => {
                    debug!(server = %released.server(), "Dropping expired connection");
                    released.close();
                },
                None if pool.is_free(connection) => {},
                None => {
                    debug!(server = %connection.server(), "Closing orphaned connection");
                    connection.close();
                },
            }
            record_pool_size(pool.free.len(), pool.used.len());
        }
        self.available.notify_one();
        true
    }
}

impl Drop for PooledConnectionProvider {
    fn drop(&mut self) {
        if let Some(task) = self.maintenance.get_mut().take() {
            task.abort();
        }
    }
}
