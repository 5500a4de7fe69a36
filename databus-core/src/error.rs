//! Error types for databus core values.
//!
//! Following `TigerStyle`: all errors must be handled explicitly.
//! No silent failures, no ignored errors.

use std::fmt;

/// The result type for core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while validating core values against [`crate::Limits`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A resource limit was exceeded.
    LimitExceeded {
        /// Which limit was exceeded.
        limit: &'static str,
        /// The maximum allowed value.
        max: u64,
        /// The actual value that exceeded the limit.
        actual: u64,
    },

    /// A value fell below its allowed minimum.
    BelowMinimum {
        /// Which limit was violated.
        limit: &'static str,
        /// The minimum allowed value.
        min: u64,
        /// The actual value.
        actual: u64,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LimitExceeded { limit, max, actual } => {
                write!(f, "limit exceeded: {limit} (max={max}, actual={actual})")
            }
            Self::BelowMinimum { limit, min, actual } => {
                write!(f, "below minimum: {limit} (min={min}, actual={actual})")
            }
        }
    }
}

impl std::error::Error for Error {}
