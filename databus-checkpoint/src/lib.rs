//! Consumer checkpointing for databus.
//!
//! This crate persists how far each partition of a consumer has read, and
//! moves those positions when partition identities are renamed.
//!
//! # Overview
//!
//! - **Positions**: A [`ConsumerCheckpoint`] maps each [`databus_core::PartitionId`]
//!   to a [`databus_core::PartitionCheckpoint`] (file name + line count).
//! - **Persistence**: A [`CheckpointStore`] reads and writes one consumer's
//!   checkpoint through a [`CheckpointProvider`]. A missing key means no
//!   prior progress.
//! - **Migration**: A [`PartitionIdMap`] renames identities (for example
//!   `hadoopcluster0 -> east`). Migration is idempotent.
//!
//! # Example
//!
//! ```ignore
//! use databus_checkpoint::{CheckpointStore, PartitionIdMap, SimulatedCheckpointProvider};
//!
//! let store = CheckpointStore::new(SimulatedCheckpointProvider::new(42), "consumer-1");
//! let map = PartitionIdMap::new([(old_id, new_id)])?;
//! store.migrate(&map).await?;
//! let checkpoint = store.read().await?;
//! ```
//!
//! # Testing
//!
//! The [`SimulatedCheckpointProvider`] provides deterministic fault injection
//! for DST testing:
//!
//! ```ignore
//! use databus_checkpoint::{CheckpointFaultConfig, SimulatedCheckpointProvider};
//!
//! let config = CheckpointFaultConfig::flaky(); // 5% failure rate
//! let provider = SimulatedCheckpointProvider::with_faults(seed, config);
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
// Allow these for cleaner code in this crate.
#![allow(clippy::module_name_repetitions)]

mod checkpoint;
mod error;
mod file;
mod migration;
mod storage;
mod store;

// Re-export public API.
pub use checkpoint::{
    ConsumerCheckpoint, StoredCheckpoint, StoredPartition, CHECKPOINT_FORMAT_VERSION,
};
pub use error::{CheckpointError, CheckpointResult};
pub use file::{FileCheckpointConfig, FileCheckpointProvider};
pub use migration::{MigrationReport, PartitionIdMap};
pub use storage::{CheckpointFaultConfig, CheckpointProvider, SimulatedCheckpointProvider};
pub use store::CheckpointStore;
