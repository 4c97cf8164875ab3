//! Core domain models for fluxgate.
//!
//! Shared data structures used by the breakers, the server manager and the
//! connection providers.

mod config;
mod events;
mod failure;
mod server;
mod state;

pub use config::ConnectionConfig;
pub use events::{CircuitStateChanged, ServerStateChanged};
pub use failure::{Classify, FailureKind};
pub use server::Server;
pub use state::{CircuitState, ServerState};
