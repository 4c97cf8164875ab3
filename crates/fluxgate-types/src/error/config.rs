//! Configuration and argument errors.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised when a precondition on an argument or configuration value fails.
///
/// These are raised synchronously by the call that violates the precondition
/// and are never retried.
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "details")]
pub enum ConfigError {
    /// A required value is blank, zero or otherwise out of range
    #[error("Invalid {field}: {message}")]
    Invalid {
        /// Name of the argument or field that failed validation
        field: String,
        /// Description of the validation failure
        message: String,
    },

    /// Config parse error (JSON)
    #[error("Config parse error: {message}")]
    ParseError {
        /// Description of the parse failure
        message: String,
    },
}

impl ConfigError {
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Invalid { field: field.into(), message: message.into() }
    }

    /// Fails with [`ConfigError::Invalid`] when `value` is empty or whitespace.
    pub fn require_non_blank(field: &str, value: &str) -> Result<(), Self> {
        if value.trim().is_empty() {
            return Err(Self::invalid(field, format!("{field} cannot be blank")));
        }
        Ok(())
    }

    /// Create a parse error from a serde_json error.
    pub fn from_json_error(e: &serde_json::Error) -> Self {
        Self::ParseError { message: e.to_string() }
    }

    /// Collapse derive-validation failures into a single error naming the first field.
    pub fn from_validation(errors: &validator::ValidationErrors) -> Self {
        let field = errors
            .field_errors()
            .keys()
            .next()
            .map_or_else(|| "config".to_string(), |k| k.to_string());
        Self::invalid(field, errors.to_string())
    }
}
