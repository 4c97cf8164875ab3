//! # Fluxgate Core
//!
//! Client-side resilience for a multi-node data store.
//!
//! ## Architecture
//!
//! ```text
//! fluxgate-core/src/
//! ├── circuit_breaker/  # per-node breaker, reset timer, keyed manager
//! ├── servers/          # round-robin roster with black/white/grey lists
//! ├── connections/      # connection trait, TCP, normal and pooled providers
//! ├── events.rs         # listener registries
//! ├── metrics.rs        # metrics facade counters and gauges
//! └── logger.rs         # tracing subscriber setup
//! ```
//!
//! Callers report every operation outcome through a
//! [`ConnectionProvider`](connections::ConnectionProvider); breakers turn those
//! reports into blacklisting, re-admission and probe connections.

#![allow(
    clippy::significant_drop_tightening,
    reason = "parking_lot guards are scoped explicitly around event emission"
)]
// Test-only lints: allow panic!, float_cmp, etc. in test code
#![cfg_attr(test, allow(clippy::panic, clippy::float_cmp))]

pub mod circuit_breaker;
pub mod connections;
pub mod events;
pub mod logger;
pub mod metrics;
pub mod servers;

pub use circuit_breaker::{BreakerSummary, CircuitBreaker, CircuitBreakerManager, ExecuteError};
pub use connections::{
    connection_provider, Candidate, Connection, ConnectionFactory, ConnectionProvider,
    NormalConnectionProvider, PoolStats, PooledConnectionProvider, SharedConnection,
    TcpConnection, TcpConnectionFactory,
};
pub use events::{Listener, Listeners, SubscriptionId};
pub use servers::ServerManager;

pub use fluxgate_types::{
    CircuitError, CircuitState, CircuitStateChanged, Classify, ConfigError, ConnectionConfig,
    ConnectionError, FailureKind, Server, ServerState, ServerStateChanged, TransportError,
};
