//! Multi-root consumer orchestrator.
//!
//! One consumer owns one reader per root directory. Startup order:
//! 1. Resolve cluster names (defaults `hadoopcluster<i>` or overrides)
//! 2. Migrate stored positions from default identities to overrides
//! 3. Load the checkpoint
//! 4. Build readers, each resuming from its own position
//!
//! Migration always completes before the first reader exists.

use std::sync::Arc;
use std::time::Duration;

use databus_checkpoint::{
    CheckpointProvider, CheckpointStore, ConsumerCheckpoint, MigrationReport, PartitionIdMap,
};
use databus_core::{Limits, PartitionId, QueueEntry};
use databus_fs::{CollectorDir, StreamFs};
use databus_reader::{
    message_queue, MessageReceiver, MessageSender, PartitionReader, ReaderHandle,
    ReaderStatsSnapshot,
};
use tracing::{debug, info, warn};

use crate::error::{ConsumerError, ConsumerResult};
use crate::settings::ConsumerSettings;

// -----------------------------------------------------------------------------
// Lifecycle
// -----------------------------------------------------------------------------

/// Lifecycle phase of a [`DatabusConsumer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumerPhase {
    /// Checkpoint loaded, no readers yet.
    Initialized,
    /// Readers built but not running.
    ReadersCreated,
    /// Readers running on their own tasks.
    Running,
    /// Readers stopped.
    Stopped,
}

/// One root directory and the identity it is consumed under.
#[derive(Debug, Clone)]
struct Partition {
    id: PartitionId,
    dir: CollectorDir,
}

// -----------------------------------------------------------------------------
// DatabusConsumer
// -----------------------------------------------------------------------------

/// Consumes one stream/collector across several root directories.
pub struct DatabusConsumer<F: StreamFs + ?Sized + 'static, P: CheckpointProvider> {
    settings: ConsumerSettings,
    fs: Arc<F>,
    store: CheckpointStore<P>,
    partitions: Vec<Partition>,
    migration: MigrationReport,
    /// Start positions overlaid with the latest position received per partition.
    checkpoint: ConsumerCheckpoint,
    tx: Option<MessageSender>,
    rx: MessageReceiver,
    readers: Vec<PartitionReader<F>>,
    handles: Vec<ReaderHandle>,
    phase: ConsumerPhase,
}

impl<F: StreamFs + ?Sized + 'static, P: CheckpointProvider> DatabusConsumer<F, P> {
    /// Prepares a consumer: resolves identities, migrates and loads the
    /// checkpoint. No reader is created yet.
    ///
    /// # Errors
    ///
    /// - `Config` if no root is configured or a name is blank
    /// - `InvariantViolation` if the cluster overrides don't match the roots
    /// - `Limit` if the queue capacity is out of bounds
    /// - `Checkpoint` if migration or loading fails
    pub async fn initialize(
        settings: ConsumerSettings,
        fs: Arc<F>,
        provider: P,
    ) -> ConsumerResult<Self> {
        if settings.root_dirs.is_empty() {
            return Err(ConsumerError::config("no root directories configured"));
        }
        for (what, value) in [
            ("stream", &settings.stream),
            ("collector", &settings.collector),
            ("consumer name", &settings.consumer_name),
        ] {
            if value.trim().is_empty() {
                return Err(ConsumerError::config(format!("blank {what}")));
            }
        }
        let limits = Limits::new();
        limits.check_root_count(settings.root_dirs.len())?;
        let capacity = limits.check_queue_capacity(u64::from(settings.queue_capacity))?;

        let names = settings.resolve_cluster_names()?;
        let map = migration_map(&settings, &names)?;
        let store = CheckpointStore::new(provider, settings.consumer_name.clone());

        let migration = if map.is_empty() {
            MigrationReport::default()
        } else {
            info!(
                consumer = %settings.consumer_name,
                mappings = map.len(),
                "Migrating checkpoint to configured cluster names"
            );
            store.migrate(&map).await?
        };
        let checkpoint = store.read().await?;

        let partitions: Vec<Partition> = names
            .iter()
            .zip(&settings.root_dirs)
            .map(|(name, root)| Partition {
                id: PartitionId::with_collector(name.clone(), settings.collector.clone()),
                dir: CollectorDir::new(root, &settings.stream, &settings.collector),
            })
            .collect();

        let (tx, rx) = message_queue(capacity);

        info!(
            consumer = %settings.consumer_name,
            stream = %settings.stream,
            collector = %settings.collector,
            partitions = partitions.len(),
            stored_positions = checkpoint.len(),
            migrated = migration.moved.len(),
            "Consumer initialized"
        );

        Ok(Self {
            settings,
            fs,
            store,
            partitions,
            migration,
            checkpoint,
            tx: Some(tx),
            rx,
            readers: Vec::new(),
            handles: Vec::new(),
            phase: ConsumerPhase::Initialized,
        })
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    /// Returns the settings.
    #[must_use]
    pub const fn settings(&self) -> &ConsumerSettings {
        &self.settings
    }

    /// Returns the lifecycle phase.
    #[must_use]
    pub const fn phase(&self) -> ConsumerPhase {
        self.phase
    }

    /// Returns the partition identities, in root order.
    #[must_use]
    pub fn partition_ids(&self) -> Vec<PartitionId> {
        self.partitions.iter().map(|p| p.id.clone()).collect()
    }

    /// Returns what startup migration moved.
    #[must_use]
    pub const fn migration_report(&self) -> &MigrationReport {
        &self.migration
    }

    /// Returns the positions that `write_checkpoint` would persist.
    #[must_use]
    pub const fn checkpoint(&self) -> &ConsumerCheckpoint {
        &self.checkpoint
    }

    /// Returns the checkpoint store.
    #[must_use]
    pub const fn store(&self) -> &CheckpointStore<P> {
        &self.store
    }

    /// Returns the readers built by `create_readers` that have not started.
    #[must_use]
    pub fn readers(&self) -> &[PartitionReader<F>] {
        &self.readers
    }

    /// Returns the counters of every running reader.
    #[must_use]
    pub fn reader_stats(&self) -> Vec<(PartitionId, ReaderStatsSnapshot)> {
        if self.handles.is_empty() {
            self.readers
                .iter()
                .map(|r| (r.id().clone(), r.stats()))
                .collect()
        } else {
            self.handles
                .iter()
                .map(|h| (h.id().clone(), h.stats()))
                .collect()
        }
    }

    // -------------------------------------------------------------------------
    // Readers
    // -------------------------------------------------------------------------

    /// Builds one reader per root, each resuming from its stored position.
    ///
    /// # Errors
    ///
    /// Returns `State` unless the consumer is freshly initialized.
    pub fn create_readers(&mut self) -> ConsumerResult<usize> {
        if self.phase != ConsumerPhase::Initialized {
            return Err(self.wrong_phase("create_readers"));
        }
        let Some(tx) = &self.tx else {
            return Err(self.wrong_phase("create_readers"));
        };

        self.readers = self
            .partitions
            .iter()
            .map(|partition| {
                PartitionReader::new(
                    partition.id.clone(),
                    partition.dir.clone(),
                    Arc::clone(&self.fs),
                    self.checkpoint.get_or_empty(&partition.id),
                    tx.clone(),
                    self.settings.reader,
                )
            })
            .collect();
        self.phase = ConsumerPhase::ReadersCreated;

        debug_assert_eq!(self.readers.len(), self.partitions.len());
        Ok(self.readers.len())
    }

    /// Spawns every reader, creating them first if needed.
    ///
    /// # Errors
    ///
    /// Returns `State` if the consumer is already running or stopped.
    pub fn start(&mut self) -> ConsumerResult<()> {
        if self.phase == ConsumerPhase::Initialized {
            self.create_readers()?;
        }
        if self.phase != ConsumerPhase::ReadersCreated {
            return Err(self.wrong_phase("start"));
        }

        self.handles = self.readers.drain(..).map(PartitionReader::spawn).collect();
        // Readers hold the only senders now; the queue closes when all exit.
        self.tx = None;
        self.phase = ConsumerPhase::Running;

        info!(
            consumer = %self.settings.consumer_name,
            readers = self.handles.len(),
            "Consumer started"
        );
        Ok(())
    }

    /// Stops every reader and waits for it to exit.
    ///
    /// Every reader is awaited even if one of them failed.
    ///
    /// # Errors
    ///
    /// Returns the first reader failure.
    pub async fn stop(&mut self) -> ConsumerResult<()> {
        for handle in &self.handles {
            handle.close();
        }
        for reader in &self.readers {
            reader.close();
        }
        self.readers.clear();
        self.tx = None;

        let mut first_error = None;
        for handle in self.handles.drain(..) {
            let id = handle.id().clone();
            if let Err(e) = handle.join().await {
                warn!(partition = %id, error = %e, "Partition reader ended with error");
                first_error.get_or_insert(e);
            }
        }
        self.phase = ConsumerPhase::Stopped;
        info!(consumer = %self.settings.consumer_name, "Consumer stopped");

        first_error.map_or(Ok(()), |e| Err(ConsumerError::Reader(e)))
    }

    // -------------------------------------------------------------------------
    // Records
    // -------------------------------------------------------------------------

    /// Receives the next record and records its position.
    ///
    /// Returns `None` once the consumer is running and every reader has exited.
    pub async fn next(&mut self) -> Option<QueueEntry> {
        let entry = self.rx.recv().await?;
        self.record(&entry);
        Some(entry)
    }

    /// Like [`Self::next`] but gives up after `timeout`.
    pub async fn next_timeout(&mut self, timeout: Duration) -> Option<QueueEntry> {
        tokio::time::timeout(timeout, self.next()).await.ok().flatten()
    }

    /// Receives a record if one is already queued.
    pub fn try_next(&mut self) -> Option<QueueEntry> {
        let entry = self.rx.try_recv().ok()?;
        self.record(&entry);
        Some(entry)
    }

    fn record(&mut self, entry: &QueueEntry) {
        self.checkpoint
            .set(entry.partition_id.clone(), entry.checkpoint.clone());
    }

    // -------------------------------------------------------------------------
    // Checkpoint
    // -------------------------------------------------------------------------

    /// Persists the latest position of every partition.
    ///
    /// Partitions that delivered nothing keep the position they started from.
    ///
    /// # Errors
    ///
    /// Returns `Checkpoint` if the provider write fails.
    pub async fn write_checkpoint(&self) -> ConsumerResult<()> {
        self.store.write(&self.checkpoint).await?;
        debug!(
            consumer = %self.settings.consumer_name,
            positions = self.checkpoint.len(),
            "Checkpoint written"
        );
        Ok(())
    }

    /// Deletes the stored checkpoint and forgets every position.
    ///
    /// Running readers are not rewound; this affects the next start.
    ///
    /// # Errors
    ///
    /// Returns `Checkpoint` if the provider delete fails.
    pub async fn clear_checkpoint(&mut self) -> ConsumerResult<()> {
        self.store.clear().await?;
        self.checkpoint.clear();
        info!(consumer = %self.settings.consumer_name, "Checkpoint cleared");
        Ok(())
    }

    fn wrong_phase(&self, operation: &str) -> ConsumerError {
        ConsumerError::State {
            message: format!("{operation} called while {:?}", self.phase),
        }
    }
}

impl<F: StreamFs + ?Sized + 'static, P: CheckpointProvider> Drop for DatabusConsumer<F, P> {
    fn drop(&mut self) {
        for handle in &self.handles {
            handle.close();
        }
    }
}

/// Maps every default identity whose root has an override to that override.
fn migration_map(settings: &ConsumerSettings, names: &[String]) -> ConsumerResult<PartitionIdMap> {
    let pairs: Vec<(PartitionId, PartitionId)> = settings
        .default_cluster_names()
        .into_iter()
        .zip(names)
        .filter(|(default, name)| default != *name)
        .map(|(default, name)| {
            (
                PartitionId::with_collector(default, settings.collector.clone()),
                PartitionId::with_collector(name.clone(), settings.collector.clone()),
            )
        })
        .collect();
    Ok(PartitionIdMap::new(pairs)?)
}
