//! Handle to a spawned partition reader.

use std::sync::Arc;

use databus_core::PartitionId;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::error::{ReaderError, ReaderResult};
use crate::signal::StopTrigger;
use crate::stats::{ReaderStats, ReaderStatsSnapshot};

/// Controls a reader running on its own task.
#[derive(Debug)]
pub struct ReaderHandle {
    id: PartitionId,
    trigger: StopTrigger,
    stats: Arc<ReaderStats>,
    join: JoinHandle<ReaderResult<()>>,
}

impl ReaderHandle {
    pub(crate) const fn new(
        id: PartitionId,
        trigger: StopTrigger,
        stats: Arc<ReaderStats>,
        join: JoinHandle<ReaderResult<()>>,
    ) -> Self {
        Self {
            id,
            trigger,
            stats,
            join,
        }
    }

    /// Returns the partition id.
    #[must_use]
    pub const fn id(&self) -> &PartitionId {
        &self.id
    }

    /// Returns a copy of the reader's counters.
    #[must_use]
    pub fn stats(&self) -> ReaderStatsSnapshot {
        self.stats.snapshot()
    }

    /// Returns true once the reader task has exited.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Requests a stop without waiting for it.
    pub fn close(&self) {
        debug!(partition = %self.id, "Closing partition reader");
        self.trigger.stop();
    }

    /// Waits for the reader task to exit.
    ///
    /// # Errors
    ///
    /// Returns the error that failed the reader, or `Task` if it panicked.
    pub async fn join(self) -> ReaderResult<()> {
        self.join.await.map_err(|e| ReaderError::Task {
            message: e.to_string(),
        })?
    }

    /// Requests a stop and waits for the reader task to exit.
    ///
    /// # Errors
    ///
    /// Same as [`Self::join`].
    pub async fn stop(self) -> ReaderResult<()> {
        self.close();
        self.join().await
    }
}
