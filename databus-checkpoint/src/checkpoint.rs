//! In-memory consumer checkpoint and its stored form.

use std::collections::BTreeMap;

use databus_core::{PartitionCheckpoint, PartitionId};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::migration::{MigrationReport, PartitionIdMap};

/// Version written into every stored checkpoint.
pub const CHECKPOINT_FORMAT_VERSION: u32 = 1;

// -----------------------------------------------------------------------------
// ConsumerCheckpoint
// -----------------------------------------------------------------------------

/// Positions of every partition of one consumer instance.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConsumerCheckpoint {
    partitions: BTreeMap<PartitionId, PartitionCheckpoint>,
}

impl ConsumerCheckpoint {
    /// Creates an empty checkpoint.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            partitions: BTreeMap::new(),
        }
    }

    /// Records the position of a partition, replacing any previous one.
    pub fn set(&mut self, id: PartitionId, checkpoint: PartitionCheckpoint) {
        self.partitions.insert(id, checkpoint);
    }

    /// Returns the position of a partition.
    #[must_use]
    pub fn get(&self, id: &PartitionId) -> Option<&PartitionCheckpoint> {
        self.partitions.get(id)
    }

    /// Returns the position of a partition, or the empty position.
    #[must_use]
    pub fn get_or_empty(&self, id: &PartitionId) -> PartitionCheckpoint {
        self.partitions
            .get(id)
            .cloned()
            .unwrap_or_else(PartitionCheckpoint::empty)
    }

    /// Removes and returns the position of a partition.
    pub fn remove(&mut self, id: &PartitionId) -> Option<PartitionCheckpoint> {
        self.partitions.remove(id)
    }

    /// Iterates positions in partition order.
    pub fn iter(&self) -> impl Iterator<Item = (&PartitionId, &PartitionCheckpoint)> {
        self.partitions.iter()
    }

    /// Returns the number of partitions with a recorded position.
    #[must_use]
    pub fn len(&self) -> usize {
        self.partitions.len()
    }

    /// Returns true if no position is recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.partitions.is_empty()
    }

    /// Forgets every position.
    pub fn clear(&mut self) {
        self.partitions.clear();
    }

    /// Moves positions from old identities to new ones.
    ///
    /// For each `old -> new` with a position under `old`, the value is moved
    /// to `new`, replacing whatever `new` held. Sources with no position are
    /// left alone. Values never change, only their keys.
    pub fn migrate(&mut self, map: &PartitionIdMap) -> MigrationReport {
        let mut report = MigrationReport::default();

        for (old, new) in map.iter() {
            let Some(position) = self.partitions.remove(old) else {
                report.missing.push(old.clone());
                continue;
            };
            if let Some(previous) = self.partitions.insert(new.clone(), position) {
                warn!(
                    from = %old,
                    to = %new,
                    replaced = %previous,
                    "Migration replaced an existing checkpoint"
                );
                report.overwritten.push(new.clone());
            }
            report.moved.push((old.clone(), new.clone()));
        }

        // TigerStyle: Assert postcondition.
        debug_assert!(map.iter().all(|(old, _)| !self.partitions.contains_key(old)));
        report
    }

    /// Converts to the stored form.
    #[must_use]
    pub fn to_stored(&self) -> StoredCheckpoint {
        StoredCheckpoint {
            version: CHECKPOINT_FORMAT_VERSION,
            partitions: self
                .partitions
                .iter()
                .map(|(id, checkpoint)| StoredPartition {
                    partition: id.clone(),
                    checkpoint: checkpoint.clone(),
                })
                .collect(),
        }
    }

    /// Builds from the stored form.
    ///
    /// Duplicate partitions keep the last entry.
    #[must_use]
    pub fn from_stored(stored: StoredCheckpoint) -> Self {
        Self {
            partitions: stored
                .partitions
                .into_iter()
                .map(|entry| (entry.partition, entry.checkpoint))
                .collect(),
        }
    }
}

impl FromIterator<(PartitionId, PartitionCheckpoint)> for ConsumerCheckpoint {
    fn from_iter<T: IntoIterator<Item = (PartitionId, PartitionCheckpoint)>>(iter: T) -> Self {
        Self {
            partitions: iter.into_iter().collect(),
        }
    }
}

// -----------------------------------------------------------------------------
// Stored Form
// -----------------------------------------------------------------------------

/// Serialized checkpoint, as written to a [`crate::CheckpointProvider`].
///
/// Partitions are stored as a list since JSON object keys must be strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredCheckpoint {
    /// Format version.
    pub version: u32,
    /// One entry per partition.
    pub partitions: Vec<StoredPartition>,
}

/// One partition's position in a [`StoredCheckpoint`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredPartition {
    /// The partition.
    pub partition: PartitionId,
    /// Its position.
    pub checkpoint: PartitionCheckpoint,
}
