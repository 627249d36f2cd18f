// Copyright 2025 Cowboy AI, LLC.

//! Error types for reconciliation operations
//!
//! Nothing in the correction path returns these to the host: `correct` and
//! `schedule` swallow them and emit a tracing event instead. They surface
//! only from configuration loading and binding installation.

use thiserror::Error;

/// Failures reported by a host session or order
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HostError {
    /// The host object does not expose the named operation
    #[error("Host operation not available: {operation}")]
    MissingOperation {
        /// Operation name that was probed
        operation: String,
    },

    /// The host operation exists but raised while running
    #[error("Host operation {operation} failed: {reason}")]
    Rejected {
        /// Operation name that was invoked
        operation: String,
        /// Message raised by the host
        reason: String,
    },

    /// A direct field write was refused
    #[error("Host field {field} rejected write: {reason}")]
    FieldRejected {
        /// Field name that was written
        field: String,
        /// Message raised by the host
        reason: String,
    },
}

impl HostError {
    /// Build a `Rejected` error
    pub fn rejected(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        HostError::Rejected {
            operation: operation.into(),
            reason: reason.into(),
        }
    }

    /// Build a `MissingOperation` error
    pub fn missing(operation: impl Into<String>) -> Self {
        HostError::MissingOperation {
            operation: operation.into(),
        }
    }
}

/// Errors that can occur while configuring or installing the engine
#[derive(Debug, Clone, Error)]
pub enum ReconcileError {
    /// A host object failed
    #[error("Host error: {0}")]
    Host(#[from] HostError),

    /// Engine configuration is unusable
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The event binding was installed twice for one engine
    #[error("Event binding already installed")]
    AlreadyInstalled,
}

/// Result type for reconciliation operations
pub type ReconcileResult<T> = Result<T, ReconcileError>;

impl From<serde_json::Error> for ReconcileError {
    fn from(err: serde_json::Error) -> Self {
        ReconcileError::Serialization(err.to_string())
    }
}

impl ReconcileError {
    /// Create a configuration error
    pub fn configuration(msg: impl Into<String>) -> Self {
        ReconcileError::Configuration(msg.into())
    }

    /// Check if this error originated in the host
    pub fn is_host_error(&self) -> bool {
        matches!(self, ReconcileError::Host(_))
    }

    /// Check if this is a configuration problem
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            ReconcileError::Configuration(_) | ReconcileError::Serialization(_)
        )
    }
}
