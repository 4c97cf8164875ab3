//! # Fluxgate Types
//!
//! Core types, notifications, configuration and error definitions for the
//! fluxgate client resilience layer.
//!
//! - **`error`** - Typed error hierarchy for configuration, circuits and connections
//! - **`models`** - Server endpoints, state enums, notifications and configuration
//!
//! ## Architecture Role
//!
//! `fluxgate-types` sits at the bottom of the dependency graph:
//!
//! ```text
//!      fluxgate-types (this crate)
//!              │
//!              ▼
//!       fluxgate-core
//!   (breakers, server manager, providers)
//!              │
//!              ▼
//!   query execution layer (caller)
//! ```

pub mod error;
pub mod models;

// Re-export error types for convenience
pub use error::{
    CircuitError, ConfigError, ConnectionError, Result, TransportError, TypedError,
};

// Re-export core model types
pub use models::{
    CircuitState, CircuitStateChanged, Classify, ConnectionConfig, FailureKind, Server,
    ServerState, ServerStateChanged,
};
