//! Databus Core - Partition identity, position and record types.
//!
//! This crate provides the value types shared by every other databus crate.
//! It does NOT touch the filesystem or the checkpoint store - those live in
//! `databus-fs` and `databus-checkpoint`.
//!
//! # Design Principles (TigerStyle)
//!
//! - **Immutable values**: A [`PartitionId`] and a [`PartitionCheckpoint`]
//!   never change after construction; readers produce new checkpoints.
//! - **Explicit limits**: Queue capacity, read chunk size and retry interval
//!   are bounded by [`Limits`].
//! - **Explicit types**: Line numbers and offsets are `u64`, not `usize`.
//! - **No unsafe code**: Safety > Performance

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod error;
mod limits;
mod record;
mod types;

pub use error::{Error, Result};
pub use limits::Limits;
pub use record::{Message, QueueEntry};
pub use types::{PartitionCheckpoint, PartitionId};

/// Names reserved inside a collector directory.
pub mod layout {
    /// Suffix of the marker file naming the file currently being written.
    ///
    /// The full marker name is `{stream}_current`.
    pub const CURRENT_FILE_SUFFIX: &str = "_current";

    /// Name of the collector statistics file, never consumed.
    pub const STATS_FILE_NAME: &str = "scribe_stats";

    /// Prefix of the default cluster names (`hadoopcluster0`, `hadoopcluster1`, ...).
    pub const DEFAULT_CLUSTER_PREFIX: &str = "hadoopcluster";

    /// Returns the marker file name for a stream.
    #[must_use]
    pub fn current_file_name(stream: &str) -> String {
        format!("{stream}{CURRENT_FILE_SUFFIX}")
    }

    /// Returns the default cluster name for the root at `index`.
    #[must_use]
    pub fn default_cluster_name(index: usize) -> String {
        format!("{DEFAULT_CLUSTER_PREFIX}{index}")
    }

    /// Returns true if `name` is a data file that readers may consume.
    ///
    /// Excludes the marker file (anything ending in `current`), the stats
    /// file and in-flight `.tmp` files.
    #[must_use]
    pub fn is_data_file(name: &str) -> bool {
        !(name.is_empty()
            || name.ends_with("current")
            || name == STATS_FILE_NAME
            || name.ends_with(".tmp"))
    }

}
