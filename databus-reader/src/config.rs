//! Reader configuration.

use std::time::Duration;

use databus_core::Limits;

use crate::decode::DecodeFailurePolicy;

/// Configuration for a [`crate::PartitionReader`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReaderConfig {
    /// Sleep after a tick that found nothing to do.
    pub idle_retry: Duration,
    /// Bytes requested per filesystem read.
    pub read_chunk_bytes: u32,
    /// Lines longer than this are dropped as undecodable.
    pub max_line_bytes: u32,
    /// What to do with lines that fail to decode.
    pub decode_policy: DecodeFailurePolicy,
}

impl ReaderConfig {
    /// Creates a configuration from limits.
    #[must_use]
    pub const fn from_limits(limits: &Limits) -> Self {
        Self {
            idle_retry: Duration::from_millis(limits.default_idle_retry_ms),
            read_chunk_bytes: limits.read_chunk_bytes,
            max_line_bytes: limits.max_line_bytes,
            decode_policy: DecodeFailurePolicy::Skip,
        }
    }

    /// Creates a configuration for fast tests (small reads, short sleeps).
    #[must_use]
    pub const fn for_testing() -> Self {
        Self::from_limits(&Limits::for_testing())
    }

    /// Builder: set the idle retry interval.
    #[must_use]
    pub const fn with_idle_retry(mut self, idle_retry: Duration) -> Self {
        self.idle_retry = idle_retry;
        self
    }

    /// Builder: set the read chunk size.
    ///
    /// # Panics
    ///
    /// Panics if `read_chunk_bytes` is zero.
    #[must_use]
    pub const fn with_read_chunk_bytes(mut self, read_chunk_bytes: u32) -> Self {
        assert!(read_chunk_bytes > 0, "read_chunk_bytes must be positive");
        self.read_chunk_bytes = read_chunk_bytes;
        self
    }

    /// Builder: set the maximum line length.
    ///
    /// # Panics
    ///
    /// Panics if `max_line_bytes` is zero.
    #[must_use]
    pub const fn with_max_line_bytes(mut self, max_line_bytes: u32) -> Self {
        assert!(max_line_bytes > 0, "max_line_bytes must be positive");
        self.max_line_bytes = max_line_bytes;
        self
    }

    /// Builder: set the decode failure policy.
    #[must_use]
    pub const fn with_decode_policy(mut self, decode_policy: DecodeFailurePolicy) -> Self {
        self.decode_policy = decode_policy;
        self
    }
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self::from_limits(&Limits::new())
    }
}
