//! Checkpoint store binding a provider to one consumer's key.
//!
//! The `CheckpointStore` is the persistence contract readers rely on:
//! - Reading a missing key yields an empty checkpoint (no prior progress)
//! - Writes replace the whole checkpoint of this consumer
//! - Migration re-keys positions and persists the result before returning

use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, info};

use crate::checkpoint::{ConsumerCheckpoint, StoredCheckpoint, CHECKPOINT_FORMAT_VERSION};
use crate::error::{CheckpointError, CheckpointResult};
use crate::migration::{MigrationReport, PartitionIdMap};
use crate::storage::CheckpointProvider;

// -----------------------------------------------------------------------------
// Checkpoint Store
// -----------------------------------------------------------------------------

/// Reads and writes the checkpoint of one consumer instance.
///
/// # Thread Safety
///
/// The store is `Send + Sync`, but concurrent writers of the same key race:
/// the last write wins. One consumer instance owns one key.
pub struct CheckpointStore<P: CheckpointProvider> {
    /// Storage backend.
    provider: Arc<P>,
    /// Key under which this consumer's checkpoint is stored.
    key: String,
}

impl<P: CheckpointProvider> CheckpointStore<P> {
    /// Creates a store for `key`.
    ///
    /// # Panics
    ///
    /// Panics if `key` is empty.
    #[must_use]
    pub fn new(provider: P, key: impl Into<String>) -> Self {
        Self::from_shared(Arc::new(provider), key)
    }

    /// Creates a store for `key` over a shared provider.
    ///
    /// # Panics
    ///
    /// Panics if `key` is empty.
    #[must_use]
    pub fn from_shared(provider: Arc<P>, key: impl Into<String>) -> Self {
        let key = key.into();
        assert!(!key.is_empty(), "checkpoint key must not be empty");
        Self { provider, key }
    }

    /// Returns the underlying provider.
    #[must_use]
    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Returns the checkpoint key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Reads the stored checkpoint.
    ///
    /// # Errors
    ///
    /// Returns `Io` if the provider fails, `Corrupt` if the stored bytes
    /// cannot be decoded or carry an unknown version.
    pub async fn read(&self) -> CheckpointResult<ConsumerCheckpoint> {
        let Some(bytes) = self.provider.read(&self.key).await? else {
            debug!(key = %self.key, "No stored checkpoint");
            return Ok(ConsumerCheckpoint::new());
        };

        let stored: StoredCheckpoint =
            serde_json::from_slice(&bytes).map_err(|e| CheckpointError::Corrupt {
                key: self.key.clone(),
                message: e.to_string(),
            })?;
        if stored.version != CHECKPOINT_FORMAT_VERSION {
            return Err(CheckpointError::Corrupt {
                key: self.key.clone(),
                message: format!(
                    "unsupported version {} (expected {CHECKPOINT_FORMAT_VERSION})",
                    stored.version
                ),
            });
        }

        let checkpoint = ConsumerCheckpoint::from_stored(stored);
        debug!(key = %self.key, partitions = checkpoint.len(), "Read checkpoint");
        Ok(checkpoint)
    }

    /// Replaces the stored checkpoint.
    ///
    /// # Errors
    ///
    /// Returns `Io` if the provider fails.
    pub async fn write(&self, checkpoint: &ConsumerCheckpoint) -> CheckpointResult<()> {
        let bytes = serde_json::to_vec(&checkpoint.to_stored()).map_err(|e| {
            CheckpointError::Io {
                operation: "encode",
                message: e.to_string(),
            }
        })?;
        self.provider.write(&self.key, Bytes::from(bytes)).await?;

        debug!(key = %self.key, partitions = checkpoint.len(), "Wrote checkpoint");
        Ok(())
    }

    /// Removes every stored position of this consumer.
    ///
    /// # Errors
    ///
    /// Returns `Io` if the provider fails.
    pub async fn clear(&self) -> CheckpointResult<()> {
        self.provider.delete(&self.key).await?;
        info!(key = %self.key, "Cleared checkpoint");
        Ok(())
    }

    /// Moves stored positions from old identities to new ones and persists.
    ///
    /// Nothing is written if no position moved, so re-running a completed
    /// migration is a read-only no-op.
    ///
    /// # Errors
    ///
    /// Returns `Io` if the provider fails, `Corrupt` if the stored checkpoint
    /// cannot be decoded.
    pub async fn migrate(&self, map: &PartitionIdMap) -> CheckpointResult<MigrationReport> {
        if map.is_empty() {
            return Ok(MigrationReport::default());
        }

        let mut checkpoint = self.read().await?;
        let report = checkpoint.migrate(map);
        if report.changed() {
            self.write(&checkpoint).await?;
        }

        info!(
            key = %self.key,
            moved = report.moved.len(),
            overwritten = report.overwritten.len(),
            missing = report.missing.len(),
            "Migrated checkpoint"
        );
        Ok(report)
    }
}

impl<P: CheckpointProvider> std::fmt::Debug for CheckpointStore<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CheckpointStore")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

// -----------------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::SimulatedCheckpointProvider;
    use databus_core::{PartitionCheckpoint, PartitionId};

    fn create_store(seed: u64) -> CheckpointStore<SimulatedCheckpointProvider> {
        CheckpointStore::new(SimulatedCheckpointProvider::new(seed), "consumer-1")
    }

    fn pid(cluster: &str) -> PartitionId {
        PartitionId::with_collector(cluster, "c1")
    }

    #[tokio::test]
    async fn test_missing_key_reads_empty() {
        let store = create_store(42);
        let checkpoint = store.read().await.unwrap();
        assert!(checkpoint.is_empty());
    }

    #[tokio::test]
    async fn test_write_then_read() {
        let store = create_store(42);
        let mut checkpoint = ConsumerCheckpoint::new();
        checkpoint.set(pid("a"), PartitionCheckpoint::new("f1", 5));
        checkpoint.set(pid("b"), PartitionCheckpoint::new("f7", 0));

        store.write(&checkpoint).await.unwrap();
        assert_eq!(store.read().await.unwrap(), checkpoint);
    }

    #[tokio::test]
    async fn test_clear() {
        let store = create_store(42);
        let mut checkpoint = ConsumerCheckpoint::new();
        checkpoint.set(pid("a"), PartitionCheckpoint::new("f1", 5));
        store.write(&checkpoint).await.unwrap();

        store.clear().await.unwrap();
        assert!(store.read().await.unwrap().is_empty());
        assert_eq!(store.provider().key_count(), 0);
    }

    #[tokio::test]
    async fn test_corrupt_payload() {
        let provider = SimulatedCheckpointProvider::new(42);
        provider.put_raw("consumer-1", &b"not json"[..]);
        let store = CheckpointStore::new(provider, "consumer-1");

        let result = store.read().await;
        assert!(matches!(result, Err(CheckpointError::Corrupt { .. })));
    }

    #[tokio::test]
    async fn test_unknown_version() {
        let provider = SimulatedCheckpointProvider::new(42);
        provider.put_raw("consumer-1", &br#"{"version":99,"partitions":[]}"#[..]);
        let store = CheckpointStore::new(provider, "consumer-1");

        let result = store.read().await;
        assert!(matches!(result, Err(CheckpointError::Corrupt { .. })));
    }

    #[tokio::test]
    async fn test_provider_failure_is_io() {
        let store = create_store(42);
        store.provider().fault_config().force_read_fail = true;
        assert!(matches!(store.read().await, Err(CheckpointError::Io { .. })));

        store.provider().fault_config().force_write_fail = true;
        let result = store.write(&ConsumerCheckpoint::new()).await;
        assert!(matches!(result, Err(CheckpointError::Io { .. })));
    }

    #[tokio::test]
    async fn test_migrate_persists() {
        let store = create_store(42);
        let mut checkpoint = ConsumerCheckpoint::new();
        checkpoint.set(pid("hadoopcluster0"), PartitionCheckpoint::new("f3", 10));
        store.write(&checkpoint).await.unwrap();

        let map = PartitionIdMap::new([(pid("hadoopcluster0"), pid("east"))]).unwrap();
        let report = store.migrate(&map).await.unwrap();
        assert_eq!(report.moved.len(), 1);

        let stored = store.read().await.unwrap();
        assert_eq!(stored.get(&pid("east")), Some(&PartitionCheckpoint::new("f3", 10)));
        assert_eq!(stored.get(&pid("hadoopcluster0")), None);

        // Second run changes nothing.
        let report = store.migrate(&map).await.unwrap();
        assert!(!report.changed());
        assert_eq!(store.read().await.unwrap(), stored);
    }

    #[tokio::test]
    async fn test_migrate_missing_old_is_noop() {
        let store = create_store(42);
        let map = PartitionIdMap::new([(pid("hadoopcluster0"), pid("east"))]).unwrap();

        let report = store.migrate(&map).await.unwrap();
        assert_eq!(report.missing, vec![pid("hadoopcluster0")]);
        assert_eq!(store.provider().key_count(), 0);
    }

    #[tokio::test]
    async fn test_migrate_unreachable_store() {
        let store = create_store(42);
        store.provider().fault_config().force_read_fail = true;
        let map = PartitionIdMap::new([(pid("hadoopcluster0"), pid("east"))]).unwrap();

        let result = store.migrate(&map).await;
        assert!(matches!(result, Err(CheckpointError::Io { .. })));
    }
}
