//! TCP-backed connection.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fluxgate_types::{ConnectionConfig, Server, TransportError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tracing::{debug, trace};
use uuid::Uuid;

use super::connection::{Connection, ConnectionFactory, SharedConnection};

/// Plain TCP connection. The open stream is handed to the wire layer through
/// [`TcpConnection::stream`].
#[derive(Debug)]
pub struct TcpConnection {
    id: Uuid,
    server: Server,
    created: DateTime<Utc>,
    connect_timeout: Option<Duration>,
    open: AtomicBool,
    stream: Mutex<Option<TcpStream>>,
}

impl TcpConnection {
    /// A per-server timeout (seconds) takes precedence over `default_timeout`.
    pub fn new(server: Server, default_timeout: Option<Duration>) -> Self {
        let connect_timeout = match server.timeout() {
            0 => default_timeout,
            secs => Some(Duration::from_secs(u64::from(secs))),
        };
        Self {
            id: Uuid::new_v4(),
            server,
            created: Utc::now(),
            connect_timeout,
            open: AtomicBool::new(false),
            stream: Mutex::new(None),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout
    }

    /// The underlying stream, `None` until opened and after close.
    pub fn stream(&self) -> &Mutex<Option<TcpStream>> {
        &self.stream
    }

    async fn connect(&self) -> Result<TcpStream, TransportError> {
        let address = self.server.address();
        let connecting = TcpStream::connect(address.as_str());
        let result = match self.connect_timeout {
            Some(limit) => tokio::time::timeout(limit, connecting).await.map_err(|_| {
                TransportError::TimedOut {
                    endpoint: address.clone(),
                    timeout_ms: u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
                }
            })?,
            None => connecting.await,
        };
        result.map_err(|e| TransportError::from_io(address.as_str(), &e))
    }
}

#[async_trait]
impl Connection for TcpConnection {
    fn server(&self) -> &Server {
        &self.server
    }

    fn created(&self) -> DateTime<Utc> {
        self.created
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    async fn open(&self) -> Result<(), TransportError> {
        if self.is_open() {
            return Ok(());
        }
        let stream = self.connect().await?;
        if let Err(e) = stream.set_nodelay(true) {
            trace!(connection_id = %self.id, error = %e, "Failed to set TCP_NODELAY");
        }
        *self.stream.lock().await = Some(stream);
        self.open.store(true, Ordering::Release);
        debug!(connection_id = %self.id, server = %self.server, "Connection opened");
        Ok(())
    }

    fn close(&self) {
        if !self.open.swap(false, Ordering::AcqRel) {
            return;
        }
        // A stream borrowed by the wire layer is dropped when it is returned.
        if let Ok(mut stream) = self.stream.try_lock() {
            stream.take();
        }
        debug!(connection_id = %self.id, server = %self.server, "Connection closed");
    }
}

/// Factory producing [`TcpConnection`]s with the configured connect timeout.
#[derive(Debug, Default, Clone, Copy)]
pub struct TcpConnectionFactory;

impl ConnectionFactory for TcpConnectionFactory {
    fn create(
        &self,
        server: &Server,
        config: &ConnectionConfig,
    ) -> Result<SharedConnection, TransportError> {
        Ok(Arc::new(TcpConnection::new(server.clone(), config.connection_timeout())))
    }
}
