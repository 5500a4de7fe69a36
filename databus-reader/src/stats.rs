//! Per-reader counters.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters updated by one partition reader.
///
/// Shared with the [`crate::ReaderHandle`] through an `Arc`; readers only add.
#[derive(Debug, Default)]
pub struct ReaderStats {
    /// Records emitted to the queue.
    pub records_emitted: AtomicU64,
    /// Decoded payload bytes emitted.
    pub bytes_emitted: AtomicU64,
    /// Lines skipped while resuming from a checkpoint.
    pub lines_skipped: AtomicU64,
    /// Lines that were not valid base64.
    pub decode_failures: AtomicU64,
    /// Ticks that ended in a filesystem error.
    pub tick_errors: AtomicU64,
    /// Moves from one data file to the next.
    pub file_rotations: AtomicU64,
}

impl ReaderStats {
    /// Returns a point-in-time copy of the counters.
    #[must_use]
    pub fn snapshot(&self) -> ReaderStatsSnapshot {
        ReaderStatsSnapshot {
            records_emitted: self.records_emitted.load(Ordering::Relaxed),
            bytes_emitted: self.bytes_emitted.load(Ordering::Relaxed),
            lines_skipped: self.lines_skipped.load(Ordering::Relaxed),
            decode_failures: self.decode_failures.load(Ordering::Relaxed),
            tick_errors: self.tick_errors.load(Ordering::Relaxed),
            file_rotations: self.file_rotations.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn add(counter: &AtomicU64, value: u64) {
        counter.fetch_add(value, Ordering::Relaxed);
    }
}

/// Plain copy of [`ReaderStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReaderStatsSnapshot {
    /// Records emitted to the queue.
    pub records_emitted: u64,
    /// Decoded payload bytes emitted.
    pub bytes_emitted: u64,
    /// Lines skipped while resuming from a checkpoint.
    pub lines_skipped: u64,
    /// Lines that were not valid base64.
    pub decode_failures: u64,
    /// Ticks that ended in a filesystem error.
    pub tick_errors: u64,
    /// Moves from one data file to the next.
    pub file_rotations: u64,
}
