//! Reader error types.

use databus_fs::FsError;
use thiserror::Error;

/// Result type for reader operations.
pub type ReaderResult<T> = Result<T, ReaderError>;

/// Errors raised by a partition reader.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReaderError {
    /// Filesystem error during a tick. The tick is retried.
    #[error("filesystem error: {0}")]
    Fs(#[from] FsError),

    /// A line could not be decoded and the policy is to halt.
    #[error("decode error in {partition} at {file}:{line_num}: {message}")]
    Decode {
        /// Partition being read.
        partition: String,
        /// File containing the line.
        file: String,
        /// One-based number of the bad line.
        line_num: u64,
        /// Decoder message.
        message: String,
    },

    /// The downstream queue receiver was dropped.
    #[error("queue closed for partition {partition}")]
    QueueClosed {
        /// Partition being read.
        partition: String,
    },

    /// The reader task panicked or was cancelled.
    #[error("reader task failed: {message}")]
    Task {
        /// Join error message.
        message: String,
    },
}

impl ReaderError {
    /// Returns true if the error ends only the current tick.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Fs(_))
    }
}
