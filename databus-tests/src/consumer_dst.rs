//! Consumer DST.
//!
//! Full consumers over flaky simulated storage:
//! - Several roots, random layouts, flaky filesystem
//! - A collector writing while readers tail, flaky filesystem
//! - Lines written in two parts while markers fail or go missing
//! - Restarts against a flaky checkpoint provider
//!
//! Each run must deliver every record exactly once per partition, in order.

#![allow(clippy::too_many_lines)]

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use databus_checkpoint::{
    CheckpointFaultConfig, CheckpointStore, SimulatedCheckpointProvider,
};
use databus_consumer::{ConsumerError, ConsumerSettings, DatabusConsumer};
use databus_core::{PartitionCheckpoint, PartitionId};
use databus_fs::{FsFaultConfig, SimulatedFs};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::properties::{assert_no_violations, check_delivery, Delivered};
use crate::scenarios::{assert_quiet, collector_dir, names, receive, seeds};
use crate::workload::{
    random_layout, write_layout, CollectorWriter, PendingRecord, WrittenRecord,
};

// ============================================================================
// Helper Functions
// ============================================================================

type TestConsumer = DatabusConsumer<SimulatedFs, SimulatedCheckpointProvider>;

const QUIET: Duration = Duration::from_millis(80);

fn settings(roots: usize) -> ConsumerSettings {
    let roots = (0..roots).map(|i| PathBuf::from(format!("/root{i}"))).collect();
    ConsumerSettings::for_testing(roots, names::STREAM, names::COLLECTOR)
        .with_consumer_name(names::CONSUMER)
}

fn writers(fs: &SimulatedFs, roots: usize) -> Vec<CollectorWriter<SimulatedFs>> {
    (0..roots)
        .map(|i| CollectorWriter::new(fs.clone(), collector_dir(&format!("/root{i}")), format!("p{i}")))
        .collect()
}

fn expected_after(
    ids: &[PartitionId],
    writers: &[CollectorWriter<SimulatedFs>],
    start: &BTreeMap<PartitionId, PartitionCheckpoint>,
) -> BTreeMap<PartitionId, Vec<WrittenRecord>> {
    ids.iter()
        .zip(writers)
        .map(|(id, writer)| {
            let from = start.get(id).cloned().unwrap_or_default();
            (id.clone(), writer.written_after(&from))
        })
        .collect()
}

/// Retries an initialize until the flaky provider lets it through.
async fn initialize_with_retry(
    settings: &ConsumerSettings,
    fs: &SimulatedFs,
    provider: &SimulatedCheckpointProvider,
) -> TestConsumer {
    for _ in 0..100 {
        match DatabusConsumer::initialize(settings.clone(), Arc::new(fs.clone()), provider.clone())
            .await
        {
            Ok(consumer) => return consumer,
            Err(ConsumerError::Checkpoint(_)) => {}
            Err(e) => panic!("initialize failed: {e}"),
        }
    }
    panic!("initialize kept failing");
}

/// Retries a checkpoint write until it succeeds.
async fn write_with_retry(consumer: &TestConsumer) {
    for _ in 0..100 {
        if consumer.write_checkpoint().await.is_ok() {
            return;
        }
    }
    panic!("checkpoint write kept failing");
}

// ============================================================================
// DST Tests
// ============================================================================

/// Several roots on a flaky filesystem, consumed to the end.
#[tokio::test]
async fn test_dst_consumer_flaky_fs_exact_delivery() {
    for &seed in &seeds::REGRESSION_SEEDS[..6] {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let fs = SimulatedFs::with_faults(seed, FsFaultConfig::flaky());
        let provider = SimulatedCheckpointProvider::new(seed);
        let roots = rng.gen_range(1..=4);
        let mut writers = writers(&fs, roots);
        for writer in &mut writers {
            let layout = random_layout(&mut rng, 4, 10);
            write_layout(writer, &layout);
        }

        let mut consumer = initialize_with_retry(&settings(roots), &fs, &provider).await;
        consumer.start().unwrap();
        let want = expected_after(&consumer.partition_ids(), &writers, &BTreeMap::new());
        let total = want.values().map(Vec::len).sum();

        let delivered = receive(&mut consumer, total).await;
        assert_quiet(&mut consumer, QUIET).await;
        let errors: u64 = consumer
            .reader_stats()
            .iter()
            .map(|(_, stats)| stats.tick_errors)
            .sum();
        consumer.stop().await.unwrap();

        assert_no_violations(
            &format!("seed {seed} roots {roots} tick_errors {errors}"),
            &check_delivery(&want, &delivered),
        );
    }
}

/// Collectors keep appending and rotating while the consumer tails them.
#[tokio::test]
async fn test_dst_consumer_flaky_fs_live_collectors() {
    for &seed in &seeds::REGRESSION_SEEDS[..4] {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let fs = SimulatedFs::with_faults(seed, FsFaultConfig::flaky());
        let provider = SimulatedCheckpointProvider::new(seed);
        let mut writers = writers(&fs, 2);

        let mut consumer = initialize_with_retry(&settings(2), &fs, &provider).await;
        consumer.start().unwrap();
        let ids = consumer.partition_ids();

        let mut delivered: Vec<Delivered> = Vec::new();
        for _ in 0..60 {
            let writer = &mut writers[rng.gen_range(0..2)];
            if rng.gen_ratio(1, 8) {
                writer.rotate();
            }
            writer.write_records(rng.gen_range(1..=4));

            tokio::time::sleep(Duration::from_millis(2)).await;
            while let Some(entry) = consumer.try_next() {
                delivered.push(Delivered::from(entry));
            }
        }

        let want = expected_after(&ids, &writers, &BTreeMap::new());
        let total: usize = want.values().map(Vec::len).sum();
        delivered.extend(receive(&mut consumer, total.saturating_sub(delivered.len())).await);
        assert_quiet(&mut consumer, QUIET).await;
        consumer.stop().await.unwrap();

        assert_no_violations(&format!("seed {seed}"), &check_delivery(&want, &delivered));
    }
}

/// Half-written lines on the active files while markers fail, vanish and return.
#[tokio::test]
async fn test_dst_consumer_partial_lines_with_marker_outages() {
    for &seed in &seeds::REGRESSION_SEEDS[..4] {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let faults = FsFaultConfig::flaky().with_first_line_fail_rate(0.3);
        let fs = SimulatedFs::with_faults(seed, faults);
        let provider = SimulatedCheckpointProvider::new(seed);
        let mut writers = writers(&fs, 2);
        for writer in &mut writers {
            writer.rotate();
        }

        let mut consumer = initialize_with_retry(&settings(2), &fs, &provider).await;
        consumer.start().unwrap();
        let ids = consumer.partition_ids();

        let mut pending: Vec<Option<PendingRecord>> = vec![None, None];
        let mut delivered: Vec<Delivered> = Vec::new();
        for _ in 0..80 {
            let i = rng.gen_range(0..2);
            let writer = &mut writers[i];
            match rng.gen_range(0..8) {
                0 if pending[i].is_none() => {
                    writer.rotate();
                }
                1 | 2 if pending[i].is_none() => {
                    pending[i] = Some(writer.start_record(rng.gen_range(1..12)));
                }
                3 => {
                    if let Some(record) = pending[i].take() {
                        writer.finish_record(record);
                    }
                }
                4 => writer.remove_marker(),
                5 => writer.restore_marker(),
                6 if pending[i].is_none() => writer.write_records(rng.gen_range(1..=3)),
                _ => {}
            }

            tokio::time::sleep(Duration::from_millis(2)).await;
            while let Some(entry) = consumer.try_next() {
                delivered.push(Delivered::from(entry));
            }
        }

        for (writer, record) in writers.iter_mut().zip(&mut pending) {
            if let Some(record) = record.take() {
                writer.finish_record(record);
            }
            writer.restore_marker();
        }
        let want = expected_after(&ids, &writers, &BTreeMap::new());
        let total: usize = want.values().map(Vec::len).sum();
        delivered.extend(receive(&mut consumer, total.saturating_sub(delivered.len())).await);
        assert_quiet(&mut consumer, QUIET).await;
        let decode_failures: u64 = consumer
            .reader_stats()
            .iter()
            .map(|(_, stats)| stats.decode_failures)
            .sum();
        consumer.stop().await.unwrap();

        assert_no_violations(&format!("seed {seed}"), &check_delivery(&want, &delivered));
        assert_eq!(decode_failures, 0, "seed {seed}");
    }
}

/// Repeated stop/checkpoint/restart cycles against flaky storage.
#[tokio::test]
async fn test_dst_consumer_restart_cycles() {
    for &seed in &seeds::REGRESSION_SEEDS[..4] {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let fs = SimulatedFs::with_faults(seed, FsFaultConfig::flaky());
        let provider = SimulatedCheckpointProvider::with_faults(seed, CheckpointFaultConfig::flaky());
        let mut writers = writers(&fs, 3);
        let mut all_delivered: Vec<Delivered> = Vec::new();

        for cycle in 0..4 {
            for writer in &mut writers {
                let layout = random_layout(&mut rng, 2, 6);
                write_layout(writer, &layout);
            }

            let mut consumer = initialize_with_retry(&settings(3), &fs, &provider).await;
            let start: BTreeMap<PartitionId, PartitionCheckpoint> = consumer
                .checkpoint()
                .iter()
                .map(|(id, checkpoint)| (id.clone(), checkpoint.clone()))
                .collect();
            consumer.start().unwrap();

            let want = expected_after(&consumer.partition_ids(), &writers, &start);
            let available: usize = want.values().map(Vec::len).sum();
            // Take a random share; the rest must come back next cycle.
            let take = rng.gen_range(0..=available);
            let delivered = receive(&mut consumer, take).await;

            write_with_retry(&consumer).await;
            consumer.stop().await.unwrap();
            drop(consumer);

            for record in &delivered {
                let Some(records) = want.get(&record.partition) else {
                    panic!("seed {seed} cycle {cycle}: unknown partition {}", record.partition);
                };
                assert!(
                    records
                        .iter()
                        .any(|r| r.file == record.file && r.line_num == record.line_num),
                    "seed {seed} cycle {cycle}: {}:{} was not pending",
                    record.file,
                    record.line_num
                );
            }
            all_delivered.extend(delivered);
        }

        // Final run drains everything left.
        let mut consumer = initialize_with_retry(&settings(3), &fs, &provider).await;
        let start: BTreeMap<PartitionId, PartitionCheckpoint> = consumer
            .checkpoint()
            .iter()
            .map(|(id, checkpoint)| (id.clone(), checkpoint.clone()))
            .collect();
        consumer.start().unwrap();
        let ids = consumer.partition_ids();
        let rest = expected_after(&ids, &writers, &start);
        let remaining: usize = rest.values().map(Vec::len).sum();
        all_delivered.extend(receive(&mut consumer, remaining).await);
        assert_quiet(&mut consumer, QUIET).await;
        write_with_retry(&consumer).await;
        consumer.stop().await.unwrap();

        // Across all cycles: every record exactly once.
        let want = expected_after(&ids, &writers, &BTreeMap::new());
        assert_no_violations(
            &format!("seed {seed} restart cycles"),
            &check_delivery(&want, &all_delivered),
        );

        // The stored checkpoint ends at the last record of every partition.
        provider.fault_config().read_fail_rate = 0.0;
        let stored = CheckpointStore::new(provider.clone(), names::CONSUMER)
            .read()
            .await
            .unwrap();
        for (id, writer) in ids.iter().zip(&writers) {
            if let Some(last) = writer.written().last() {
                assert_eq!(stored.get(id), Some(&last.checkpoint()), "seed {seed} {id}");
            }
        }
    }
}
