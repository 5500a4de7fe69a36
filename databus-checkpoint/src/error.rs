//! Checkpoint error types.

use thiserror::Error;

/// Result type for checkpoint operations.
pub type CheckpointResult<T> = Result<T, CheckpointError>;

/// Errors that can occur while reading, writing or migrating checkpoints.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CheckpointError {
    /// I/O error talking to the checkpoint provider.
    #[error("I/O error: {operation}: {message}")]
    Io {
        /// The operation that failed.
        operation: &'static str,
        /// Error message.
        message: String,
    },

    /// A stored checkpoint could not be decoded.
    #[error("corrupt checkpoint under key {key}: {message}")]
    Corrupt {
        /// The checkpoint key.
        key: String,
        /// What was wrong with the payload.
        message: String,
    },

    /// A partition-identity mapping cannot be applied.
    #[error("invalid partition mapping: {message}")]
    InvalidMapping {
        /// What was wrong with the mapping.
        message: String,
    },
}
