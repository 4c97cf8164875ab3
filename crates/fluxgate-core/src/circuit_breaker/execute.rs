use fluxgate_types::{CircuitError, CircuitState, Classify};
use std::future::Future;
use thiserror::Error;
use tracing::trace;

use super::CircuitBreaker;

/// Outcome of an operation guarded by [`CircuitBreaker::execute`].
#[derive(Debug, Error)]
pub enum ExecuteError<E> {
    /// The breaker was open, the operation never ran
    #[error(transparent)]
    Open(#[from] CircuitError),

    /// The operation failed and the failure was counted against the node
    #[error("Operation on {node_id} failed: {source}")]
    OperationFailed {
        node_id: String,
        #[source]
        source: E,
    },

    /// The operation failed with an ignored kind, nothing was counted
    #[error(transparent)]
    Ignored(E),
}

impl<E> ExecuteError<E> {
    /// The operation's own error, when it ran.
    pub fn into_inner(self) -> Option<E> {
        match self {
            Self::Open(_) => None,
            Self::OperationFailed { source, .. } | Self::Ignored(source) => Some(source),
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open(_))
    }
}

impl CircuitBreaker {
    /// Run `operation` through the breaker.
    ///
    /// Fails fast with [`CircuitError::Open`] while open. Success counts as
    /// [`CircuitBreaker::operation_succeeded`]; failures whose kind is ignored
    /// pass through untouched, every other failure counts as
    /// [`CircuitBreaker::failure_occurred`].
    pub async fn execute<F, Fut, T, E>(&self, operation: F) -> Result<T, ExecuteError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Classify,
    {
        if self.state() == CircuitState::Open {
            return Err(CircuitError::Open { node_id: self.node_id.clone() }.into());
        }

        match operation().await {
            Ok(value) => {
                self.operation_succeeded();
                Ok(value)
            },
            Err(err) => {
                let kind = err.failure_kind();
                if self.is_ignored(kind) {
                    trace!(node_id = %self.node_id, ?kind, "Ignoring failure");
                    return Err(ExecuteError::Ignored(err));
                }
                self.failure_occurred();
                Err(ExecuteError::OperationFailed { node_id: self.node_id.clone(), source: err })
            },
        }
    }
}
