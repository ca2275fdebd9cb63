//! Error types for archmem-core.

use thiserror::Error;

/// Result type alias using archmem-core's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during store operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed or out-of-range entity/relationship field
    #[error("Validation error on {field}: {message}")]
    Validation { field: String, message: String },

    /// Duplicate relationship triple without explicit replace
    #[error("Conflict: {message}")]
    Conflict { message: String },

    /// Referenced record does not exist
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// I/O failure while writing or reading a snapshot
    #[error("Persistence error: {message}")]
    Persistence {
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    /// Snapshot content could not be decoded
    #[error("Snapshot parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a validation error for a named field.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a conflict error.
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    /// Create a not-found error.
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Create a persistence error with an I/O source.
    pub fn persistence(message: impl Into<String>, source: std::io::Error) -> Self {
        Self::Persistence {
            message: message.into(),
            source: Some(source),
        }
    }

    /// Whether this error is caller-visible and fatal to the triggering operation.
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            Self::Validation { .. } | Self::Conflict { .. } | Self::NotFound { .. }
        )
    }
}
