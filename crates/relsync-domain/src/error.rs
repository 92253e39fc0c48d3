//! Domain error types.

use thiserror::Error;

/// Errors raised by the pure domain layer.
#[derive(Debug, Error)]
pub enum DomainError {
    /// A check-request line did not match `<object>#<relation>@<user>`.
    #[error("invalid check line: {line:?}")]
    InvalidCheckLine { line: String },

    /// The check payload was not valid UTF-8.
    #[error("check payload is not valid UTF-8")]
    InvalidCheckPayload,

    /// A cache key could not be decoded back into a relation key.
    #[error("invalid cache key: {message}")]
    InvalidCacheKey { message: String },

    /// A policy descriptor is missing a required field.
    #[error("invalid policy: {message}")]
    InvalidPolicy { message: String },
}

/// Result type for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;
