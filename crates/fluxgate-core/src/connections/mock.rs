//! Scripted connections for provider tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fluxgate_types::{ConnectionConfig, Server, TransportError};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use super::connection::{Connection, ConnectionFactory, SharedConnection};

#[derive(Debug)]
pub(crate) struct MockConnection {
    server: Server,
    created: DateTime<Utc>,
    fail_open: bool,
    open: AtomicBool,
    pub(crate) open_calls: AtomicU32,
}

impl MockConnection {
    pub(crate) fn new(server: Server, created: DateTime<Utc>, fail_open: bool) -> Self {
        Self { server, created, fail_open, open: AtomicBool::new(false), open_calls: AtomicU32::new(0) }
    }
}

#[async_trait]
impl Connection for MockConnection {
    fn server(&self) -> &Server {
        &self.server
    }

    fn created(&self) -> DateTime<Utc> {
        self.created
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    async fn open(&self) -> Result<(), TransportError> {
        self.open_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_open {
            return Err(TransportError::Refused {
                endpoint: self.server.address(),
                message: "scripted failure".to_string(),
            });
        }
        self.open.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn close(&self) {
        self.open.store(false, Ordering::SeqCst);
    }
}

/// Creates [`MockConnection`]s; opens fail for servers marked down.
#[derive(Default)]
pub(crate) struct MockFactory {
    down: Mutex<HashSet<Server>>,
    refused: Mutex<HashSet<Server>>,
    age_ms: Mutex<i64>,
    created: Mutex<Vec<Arc<MockConnection>>>,
}

impl MockFactory {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn set_down(&self, server: &Server) {
        self.down.lock().insert(server.clone());
    }

    pub(crate) fn set_up(&self, server: &Server) {
        self.down.lock().remove(server);
        self.refused.lock().remove(server);
    }

    /// Fail `create` itself for `server`.
    pub(crate) fn set_refused(&self, server: &Server) {
        self.refused.lock().insert(server.clone());
    }

    /// Backdate every connection created from now on.
    pub(crate) fn set_age_ms(&self, age_ms: i64) {
        *self.age_ms.lock() = age_ms;
    }

    pub(crate) fn created_count(&self) -> usize {
        self.created.lock().len()
    }

    pub(crate) fn connection(&self, index: usize) -> Arc<MockConnection> {
        Arc::clone(&self.created.lock()[index])
    }

    /// Simulate every socket dying underneath the pool.
    pub(crate) fn close_all(&self) {
        for connection in self.created.lock().iter() {
            connection.close();
        }
    }

    pub(crate) fn created_for(&self, server: &Server) -> usize {
        self.created.lock().iter().filter(|c| c.server() == server).count()
    }
}

impl ConnectionFactory for MockFactory {
    fn create(
        &self,
        server: &Server,
        _config: &ConnectionConfig,
    ) -> Result<SharedConnection, TransportError> {
        if self.refused.lock().contains(server) {
            return Err(TransportError::Refused {
                endpoint: server.address(),
                message: "scripted create failure".to_string(),
            });
        }
        let created = Utc::now() - chrono::Duration::milliseconds(*self.age_ms.lock());
        let fail_open = self.down.lock().contains(server);
        let connection = Arc::new(MockConnection::new(server.clone(), created, fail_open));
        self.created.lock().push(Arc::clone(&connection));
        Ok(connection)
    }
}
