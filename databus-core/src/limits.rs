//! Consumer limits and configuration bounds.
//!
//! Following TigerStyle: put limits on everything.
//! The output queue, read buffers and polling cadence all have explicit
//! bounds so a misconfigured consumer fails at startup, not under load.

use crate::error::{Error, Result};

/// Limits applied to consumer configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    // Queue limits.
    /// Maximum capacity of the shared output queue.
    pub max_queue_capacity: u32,
    /// Default capacity of the shared output queue.
    pub default_queue_capacity: u32,

    // Read limits.
    /// Bytes requested from the filesystem per read call.
    pub read_chunk_bytes: u32,
    /// Longest line a reader buffers before giving up on it.
    pub max_line_bytes: u32,
    /// Maximum number of roots (and therefore readers) per consumer.
    pub max_roots: u32,

    // Polling limits (in milliseconds).
    /// Default idle sleep between ticks of a partition with no new data.
    pub default_idle_retry_ms: u64,
    /// Minimum idle sleep, to keep idle partitions from busy-polling.
    pub min_idle_retry_ms: u64,
    /// Maximum idle sleep.
    pub max_idle_retry_ms: u64,
}

impl Limits {
    /// Creates limits with safe defaults.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            // Queue: 5k entries by default, 1M max.
            max_queue_capacity: 1_000_000,
            default_queue_capacity: 5_000,

            // Reads: 64KB chunks, 16MB lines, 1024 roots.
            read_chunk_bytes: 64 * 1024,
            max_line_bytes: 16 * 1024 * 1024,
            max_roots: 1024,

            // Polling: 1s default, 10ms..10min.
            default_idle_retry_ms: 1_000,
            min_idle_retry_ms: 10,
            max_idle_retry_ms: 10 * 60 * 1_000,
        }
    }

    /// Creates limits suitable for fast tests (small chunks, short sleeps).
    #[must_use]
    pub const fn for_testing() -> Self {
        let mut limits = Self::new();
        limits.read_chunk_bytes = 16;
        limits.max_line_bytes = 4 * 1024;
        limits.default_idle_retry_ms = 10;
        limits.min_idle_retry_ms = 1;
        limits
    }

    /// Checks a queue capacity against the limits.
    ///
    /// # Errors
    ///
    /// Returns an error if the capacity is zero or above the maximum.
    pub const fn check_queue_capacity(&self, capacity: u64) -> Result<u32> {
        if capacity == 0 {
            return Err(Error::BelowMinimum {
                limit: "queue_capacity",
                min: 1,
                actual: capacity,
            });
        }
        if capacity > self.max_queue_capacity as u64 {
            return Err(Error::LimitExceeded {
                limit: "queue_capacity",
                max: self.max_queue_capacity as u64,
                actual: capacity,
            });
        }
        #[allow(clippy::cast_possible_truncation)] // Bounded by max_queue_capacity.
        Ok(capacity as u32)
    }

    /// Checks an idle retry interval against the limits.
    ///
    /// # Errors
    ///
    /// Returns an error if the interval is outside `min..=max`.
    pub const fn check_idle_retry_ms(&self, idle_retry_ms: u64) -> Result<u64> {
        if idle_retry_ms < self.min_idle_retry_ms {
            return Err(Error::BelowMinimum {
                limit: "idle_retry_ms",
                min: self.min_idle_retry_ms,
                actual: idle_retry_ms,
            });
        }
        if idle_retry_ms > self.max_idle_retry_ms {
            return Err(Error::LimitExceeded {
                limit: "idle_retry_ms",
                max: self.max_idle_retry_ms,
                actual: idle_retry_ms,
            });
        }
        Ok(idle_retry_ms)
    }

    /// Checks a maximum line length against the read chunk size.
    ///
    /// # Errors
    ///
    /// Returns an error if the length is smaller than one read chunk.
    pub const fn check_max_line_bytes(&self, max_line_bytes: u64) -> Result<u32> {
        if max_line_bytes < self.read_chunk_bytes as u64 {
            return Err(Error::BelowMinimum {
                limit: "max_line_bytes",
                min: self.read_chunk_bytes as u64,
                actual: max_line_bytes,
            });
        }
        if max_line_bytes > u32::MAX as u64 {
            return Err(Error::LimitExceeded {
                limit: "max_line_bytes",
                max: u32::MAX as u64,
                actual: max_line_bytes,
            });
        }
        #[allow(clippy::cast_possible_truncation)] // Bounded by u32::MAX.
        Ok(max_line_bytes as u32)
    }

    /// Checks the number of configured roots.
    ///
    /// # Errors
    ///
    /// Returns an error if there are more roots than `max_roots`.
    pub const fn check_root_count(&self, count: usize) -> Result<()> {
        if count as u64 > self.max_roots as u64 {
            return Err(Error::LimitExceeded {
                limit: "roots",
                max: self.max_roots as u64,
                actual: count as u64,
            });
        }
        Ok(())
    }
}

impl Default for Limits {
    fn default() -> Self {
        Self::new()
    }
}
