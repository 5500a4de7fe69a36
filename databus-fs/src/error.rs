//! Filesystem error types.
//!
//! Every error here is transient from a reader's point of view: the tick that
//! hit it is abandoned and retried later.

use thiserror::Error;

/// Result type for filesystem operations.
pub type FsResult<T> = Result<T, FsError>;

/// Errors that can occur during filesystem operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FsError {
    /// File not found.
    #[error("file not found: {path}")]
    NotFound {
        /// The path that was not found.
        path: String,
    },

    /// I/O error.
    #[error("I/O error: {operation}: {message}")]
    Io {
        /// What operation was being performed.
        operation: &'static str,
        /// Error message.
        message: String,
    },
}

impl FsError {
    /// Returns true if the error means the file does not exist.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = FsError::NotFound {
            path: "/data/clicks/c1/f1".to_string(),
        };
        assert_eq!(err.to_string(), "file not found: /data/clicks/c1/f1");
        assert!(err.is_not_found());

        let err = FsError::Io {
            operation: "read_range",
            message: "permission denied".to_string(),
        };
        assert!(err.to_string().contains("read_range"));
        assert!(!err.is_not_found());
    }
}
