//! Reusable scenario pieces: seeds, names and drivers.

use std::collections::BTreeMap;
use std::time::Duration;

use databus_checkpoint::CheckpointProvider;
use databus_consumer::DatabusConsumer;
use databus_core::PartitionId;
use databus_fs::{CollectorDir, StreamFs};
use databus_reader::{MessageReceiver, PartitionReader};

use crate::properties::Delivered;
use crate::workload::{CollectorWriter, FileSink, WrittenRecord};

/// Seed sets for deterministic simulation.
pub mod seeds {
    /// Standard test seeds that have historically found bugs.
    pub const REGRESSION_SEEDS: &[u64] = &[
        42,
        12345,
        0xDEAD_BEEF,
        999,
        7777,
        0x1337,
        0xCAFE_BABE,
        1,
        u64::MAX,
        0,
    ];
}

/// Stream and collector names shared by the scenarios.
pub mod names {
    /// Stream name.
    pub const STREAM: &str = "clicks";
    /// Collector name.
    pub const COLLECTOR: &str = "collector1";
    /// Consumer name (checkpoint key).
    pub const CONSUMER: &str = "scenario-consumer";
}

/// Upper bound on how long a scenario waits for records.
pub const RECEIVE_TIMEOUT: Duration = Duration::from_secs(30);

/// Returns the collector directory under `root`.
#[must_use]
pub fn collector_dir(root: &str) -> CollectorDir {
    CollectorDir::new(root, names::STREAM, names::COLLECTOR)
}

/// Returns the identity of a partition in the scenario collector.
#[must_use]
pub fn partition(cluster: &str) -> PartitionId {
    PartitionId::with_collector(cluster, names::COLLECTOR)
}

/// Groups every writer's records under the partition it is consumed as.
#[must_use]
pub fn expected_from<S: FileSink>(
    writers: &[(PartitionId, &CollectorWriter<S>)],
) -> BTreeMap<PartitionId, Vec<WrittenRecord>> {
    writers
        .iter()
        .map(|(id, writer)| (id.clone(), writer.written().to_vec()))
        .collect()
}

/// Ticks a reader until a tick makes no progress.
///
/// # Panics
///
/// Panics if a tick fails or the reader is still busy after `max_ticks`.
pub async fn tick_until_idle<F: StreamFs + ?Sized + 'static>(
    reader: &mut PartitionReader<F>,
    max_ticks: u32,
) {
    for _ in 0..max_ticks {
        let outcome = reader.tick().await.expect("tick");
        if outcome.is_idle() {
            return;
        }
    }
    panic!("reader {} still busy after {max_ticks} ticks", reader.id());
}

/// Takes every record already in the queue.
pub fn drain_queue(rx: &mut MessageReceiver) -> Vec<Delivered> {
    let mut out = Vec::new();
    while let Ok(entry) = rx.try_recv() {
        out.push(Delivered::from(entry));
    }
    out
}

/// Receives exactly `count` records from a running consumer.
///
/// # Panics
///
/// Panics if fewer than `count` records arrive within [`RECEIVE_TIMEOUT`].
pub async fn receive<F, P>(consumer: &mut DatabusConsumer<F, P>, count: usize) -> Vec<Delivered>
where
    F: StreamFs + ?Sized + 'static,
    P: CheckpointProvider,
{
    let deadline = tokio::time::Instant::now() + RECEIVE_TIMEOUT;
    let mut out = Vec::with_capacity(count);
    while out.len() < count {
        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        let Some(entry) = consumer.next_timeout(remaining).await else {
            panic!("received {} of {count} records before timeout", out.len());
        };
        out.push(Delivered::from(entry));
    }
    out
}

/// Asserts nothing more arrives within `quiet`.
///
/// # Panics
///
/// Panics if a record arrives.
pub async fn assert_quiet<F, P>(consumer: &mut DatabusConsumer<F, P>, quiet: Duration)
where
    F: StreamFs + ?Sized + 'static,
    P: CheckpointProvider,
{
    if let Some(entry) = consumer.next_timeout(quiet).await {
        panic!("unexpected extra record: {:?}", Delivered::from(entry));
    }
}
