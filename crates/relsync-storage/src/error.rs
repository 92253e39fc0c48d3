//! Storage error types.

use thiserror::Error;

/// Errors from the relationship store or the KV cache.
///
/// `AlreadyExists` and `NotFound` are absorbed by the adapter (duplicate
/// writes and missing deletes are idempotent no-ops); `Conflict` is
/// retryable; everything else surfaces to the caller so the bus can
/// redeliver the event.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A write targeted a tuple that already exists.
    #[error("tuple already exists: {tuple}")]
    AlreadyExists { tuple: String },

    /// A delete targeted a tuple that does not exist.
    #[error("tuple not found: {tuple}")]
    NotFound { tuple: String },

    /// The store reported a write conflict.
    #[error("write conflict: {message}")]
    Conflict { message: String },

    /// Transport-level failure, including timeouts.
    #[error("transport error: {message}")]
    Transport { message: String },

    /// The operation was cancelled before completion.
    #[error("operation cancelled")]
    Cancelled,

    /// The caller handed the store something it cannot represent.
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
}

impl StoreError {
    /// True for the error kinds a mutating call may be retried on.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            StoreError::Conflict { .. } | StoreError::Transport { .. } | StoreError::Cancelled
        )
    }
}

/// Result type for storage operations.
pub type StoreResult<T> = Result<T, StoreError>;
