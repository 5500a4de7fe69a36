//! Partition-identity migration.
//!
//! When a consumer is reconfigured with explicit cluster names, positions
//! recorded under the default names (`hadoopcluster<i>`) must move to the new
//! identities before any reader starts. A [`PartitionIdMap`] describes that
//! renaming; [`crate::ConsumerCheckpoint::migrate`] applies it.

use std::collections::BTreeMap;

use databus_core::PartitionId;

use crate::error::{CheckpointError, CheckpointResult};

// -----------------------------------------------------------------------------
// PartitionIdMap
// -----------------------------------------------------------------------------

/// Immutable `old -> new` partition-identity mapping.
///
/// # Invariants
///
/// - No identity pairs (`old == new` is dropped at construction).
/// - Each source maps to exactly one target.
/// - No target is also a source, so applying the map twice is the same as
///   applying it once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartitionIdMap {
    entries: BTreeMap<PartitionId, PartitionId>,
}

impl PartitionIdMap {
    /// Builds a mapping from `(old, new)` pairs.
    ///
    /// # Errors
    ///
    /// Returns `InvalidMapping` if a source maps to two different targets, or
    /// if a target is also a source (chains and cycles).
    pub fn new(
        pairs: impl IntoIterator<Item = (PartitionId, PartitionId)>,
    ) -> CheckpointResult<Self> {
        let mut entries = BTreeMap::new();
        for (old, new) in pairs {
            if old == new {
                continue;
            }
            if let Some(existing) = entries.get(&old) {
                if existing != &new {
                    return Err(CheckpointError::InvalidMapping {
                        message: format!("{old} maps to both {existing} and {new}"),
                    });
                }
                continue;
            }
            entries.insert(old, new);
        }

        if let Some(target) = entries.values().find(|new| entries.contains_key(*new)) {
            return Err(CheckpointError::InvalidMapping {
                message: format!("{target} is both a source and a target"),
            });
        }

        Ok(Self { entries })
    }

    /// Returns an empty mapping.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Returns the target for `old`, if mapped.
    #[must_use]
    pub fn get(&self, old: &PartitionId) -> Option<&PartitionId> {
        self.entries.get(old)
    }

    /// Returns true if nothing is mapped.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the number of mapped identities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Iterates over `(old, new)` pairs in source order.
    pub fn iter(&self) -> impl Iterator<Item = (&PartitionId, &PartitionId)> {
        self.entries.iter()
    }
}

// -----------------------------------------------------------------------------
// MigrationReport
// -----------------------------------------------------------------------------

/// Outcome of applying a [`PartitionIdMap`] to a checkpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationReport {
    /// Identities whose position moved, as `(old, new)`.
    pub moved: Vec<(PartitionId, PartitionId)>,
    /// Moves that replaced a position already stored under `new`.
    pub overwritten: Vec<PartitionId>,
    /// Sources with no stored position (nothing to move).
    pub missing: Vec<PartitionId>,
}

impl MigrationReport {
    /// Returns true if the checkpoint changed.
    #[must_use]
    pub fn changed(&self) -> bool {
        !self.moved.is_empty()
    }
}
