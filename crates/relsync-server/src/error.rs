//! Handler error types.

use thiserror::Error;

use relsync_domain::DomainError;
use relsync_storage::StoreError;

/// Errors surfaced to the bus by event and check handlers.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// The payload could not be parsed or is missing required fields.
    /// Not retryable; redelivery would fail identically.
    #[error("malformed input: {message}")]
    MalformedInput { message: String },

    /// The payload carries a value outside the known vocabulary, e.g. an
    /// unknown artifact visibility. Not retryable.
    #[error("schema mismatch: {message}")]
    SchemaMismatch { message: String },

    /// A store or cache operation failed. Retryable via bus redelivery.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl HandlerError {
    /// Shorthand for a malformed-input error.
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedInput {
            message: message.into(),
        }
    }

    /// True when redelivering the event could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::MalformedInput { .. } | Self::SchemaMismatch { .. } => false,
            Self::Store(err) => err.is_retryable(),
        }
    }
}

impl From<DomainError> for HandlerError {
    fn from(err: DomainError) -> Self {
        Self::MalformedInput {
            message: err.to_string(),
        }
    }
}

/// Result type for handler operations.
pub type HandlerResult<T> = Result<T, HandlerError>;
