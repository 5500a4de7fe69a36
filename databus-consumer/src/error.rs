//! Consumer error types.

use databus_checkpoint::CheckpointError;
use databus_reader::ReaderError;

/// Result type for consumer operations.
pub type ConsumerResult<T> = std::result::Result<T, ConsumerError>;

/// Consumer error type.
#[derive(Debug, thiserror::Error)]
pub enum ConsumerError {
    /// Missing or malformed configuration.
    #[error("configuration error: {message}")]
    Config {
        /// Error message.
        message: String,
    },

    /// Configuration values that contradict each other.
    #[error("invariant violation: {message}")]
    InvariantViolation {
        /// Error message.
        message: String,
    },

    /// A configured value is outside the consumer limits.
    #[error("limit error: {0}")]
    Limit(#[from] databus_core::Error),

    /// Operation called in the wrong lifecycle phase.
    #[error("invalid state: {message}")]
    State {
        /// Error message.
        message: String,
    },

    /// Checkpoint storage or migration failed.
    #[error("checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),

    /// A partition reader failed.
    #[error("reader error: {0}")]
    Reader(#[from] ReaderError),
}

impl ConsumerError {
    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Returns true if the error happened before any reader started.
    #[must_use]
    pub const fn is_startup(&self) -> bool {
        matches!(
            self,
            Self::Config { .. } | Self::InvariantViolation { .. } | Self::Limit(_)
        )
    }
}
