//! Partition reader DST.
//!
//! A single reader ticked by hand over a `SimulatedFs` that fails listings,
//! reads and marker reads at random and returns short reads. Transient
//! errors must never lose or repeat a line, and a line the collector has
//! only half written must never be delivered in pieces.

#![allow(clippy::cast_possible_truncation)]

use std::collections::BTreeMap;
use std::sync::Arc;

use databus_core::{PartitionCheckpoint, PartitionId};
use databus_fs::{FsFaultConfig, SimulatedFs};
use databus_reader::{message_queue, MessageReceiver, PartitionReader, ReaderConfig};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::properties::{assert_no_violations, check_delivery, Delivered};
use crate::scenarios::{collector_dir, drain_queue, partition, seeds};
use crate::workload::{random_layout, write_layout, CollectorWriter, PendingRecord};

// ============================================================================
// Helper Functions
// ============================================================================

const MAX_TICKS: u32 = 50_000;

fn id() -> PartitionId {
    partition("hadoopcluster0")
}

fn flaky_reader(
    fs: &SimulatedFs,
    checkpoint: PartitionCheckpoint,
) -> (PartitionReader<SimulatedFs>, MessageReceiver) {
    let (tx, rx) = message_queue(100_000);
    let reader = PartitionReader::new(
        id(),
        collector_dir("/data"),
        Arc::new(fs.clone()),
        checkpoint,
        tx,
        ReaderConfig::for_testing(),
    );
    (reader, rx)
}

/// Ticks until `want` records have arrived and a tick is idle.
///
/// Transient errors are counted and retried; anything else fails the test.
async fn tick_through_faults(
    reader: &mut PartitionReader<SimulatedFs>,
    rx: &mut MessageReceiver,
    want: usize,
) -> (Vec<Delivered>, u64) {
    let mut delivered = Vec::new();
    let mut errors = 0;
    for _ in 0..MAX_TICKS {
        match reader.tick().await {
            Ok(outcome) => {
                delivered.extend(drain_queue(rx));
                if outcome.is_idle() && delivered.len() >= want {
                    return (delivered, errors);
                }
            }
            Err(e) => {
                assert!(e.is_transient(), "non-transient error: {e}");
                errors += 1;
            }
        }
    }
    panic!(
        "reader delivered {} of {want} records in {MAX_TICKS} ticks",
        delivered.len()
    );
}

// ============================================================================
// DST Tests
// ============================================================================

/// Exact delivery from an empty checkpoint under a flaky filesystem.
#[tokio::test]
async fn test_dst_reader_flaky_fs_exact_delivery() {
    let mut total_errors = 0;
    for &seed in seeds::REGRESSION_SEEDS {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let fs = SimulatedFs::with_faults(seed, FsFaultConfig::flaky());
        let mut writer = CollectorWriter::new(fs.clone(), collector_dir("/data"), "f");
        let layout = random_layout(&mut rng, 6, 15);
        write_layout(&mut writer, &layout);

        let (mut reader, mut rx) = flaky_reader(&fs, PartitionCheckpoint::empty());
        let (delivered, errors) = tick_through_faults(&mut reader, &mut rx, writer.written().len()).await;
        total_errors += errors;

        let want = BTreeMap::from([(id(), writer.written().to_vec())]);
        assert_no_violations(
            &format!("seed {seed} layout {layout:?}"),
            &check_delivery(&want, &delivered),
        );
    }
    assert!(total_errors > 0, "faults were never injected");
}

/// Resume from a random position under a flaky filesystem.
#[tokio::test]
async fn test_dst_reader_flaky_fs_resume() {
    for &seed in seeds::REGRESSION_SEEDS {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let fs = SimulatedFs::with_faults(seed, FsFaultConfig::flaky());
        let mut writer = CollectorWriter::new(fs.clone(), collector_dir("/data"), "f");
        let mut layout = random_layout(&mut rng, 5, 10);
        // Resume inside the first file, which needs at least one line.
        layout[0] = layout[0].max(1);
        write_layout(&mut writer, &layout);

        let line = rng.gen_range(0..=layout[0]);
        let checkpoint = PartitionCheckpoint::new("f-00001", line);
        let expected = writer.written_after(&checkpoint);

        let (mut reader, mut rx) = flaky_reader(&fs, checkpoint);
        let (delivered, _) = tick_through_faults(&mut reader, &mut rx, expected.len()).await;

        let want = BTreeMap::from([(id(), expected)]);
        assert_no_violations(
            &format!("seed {seed} layout {layout:?} resume at {line}"),
            &check_delivery(&want, &delivered),
        );
        assert_eq!(reader.stats().lines_skipped, line, "seed {seed}");
    }
}

/// Appends between ticks, with the collector rotating now and then.
#[tokio::test]
async fn test_dst_reader_flaky_fs_interleaved_writes() {
    for &seed in seeds::REGRESSION_SEEDS {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let fs = SimulatedFs::with_faults(seed, FsFaultConfig::flaky());
        let mut writer = CollectorWriter::new(fs.clone(), collector_dir("/data"), "f");
        writer.rotate();

        let (mut reader, mut rx) = flaky_reader(&fs, PartitionCheckpoint::empty());
        let mut delivered = Vec::new();
        for _ in 0..200 {
            match rng.gen_range(0..10) {
                0 => {
                    writer.rotate();
                }
                1..=5 => {
                    writer.write_record();
                }
                _ => {}
            }
            if let Err(e) = reader.tick().await {
                assert!(e.is_transient(), "non-transient error: {e}");
            }
            delivered.extend(drain_queue(&mut rx));
        }

        let (rest, _) = tick_through_faults(
            &mut reader,
            &mut rx,
            writer.written().len().saturating_sub(delivered.len()),
        )
        .await;
        delivered.extend(rest);

        let want = BTreeMap::from([(id(), writer.written().to_vec())]);
        assert_no_violations(&format!("seed {seed}"), &check_delivery(&want, &delivered));
    }
}

/// Lines written in two parts while the marker fails, disappears and returns.
#[tokio::test]
async fn test_dst_reader_partial_lines_with_marker_outages() {
    let mut ticks_mid_line = 0;
    for &seed in seeds::REGRESSION_SEEDS {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let faults = FsFaultConfig::flaky().with_first_line_fail_rate(0.3);
        let fs = SimulatedFs::with_faults(seed, faults);
        let mut writer = CollectorWriter::new(fs.clone(), collector_dir("/data"), "f");
        writer.rotate();

        let (mut reader, mut rx) = flaky_reader(&fs, PartitionCheckpoint::empty());
        let mut pending: Option<PendingRecord> = None;
        let mut delivered = Vec::new();
        for _ in 0..300 {
            // The collector never rotates in the middle of a line.
            match rng.gen_range(0..10) {
                0 if pending.is_none() => {
                    writer.rotate();
                }
                1 | 2 if pending.is_none() => {
                    pending = Some(writer.start_record(rng.gen_range(1..12)));
                }
                3 | 4 => {
                    if let Some(record) = pending.take() {
                        writer.finish_record(record);
                    }
                }
                5 => writer.remove_marker(),
                6 => writer.restore_marker(),
                7 if pending.is_none() => {
                    writer.write_record();
                }
                _ => {}
            }
            if pending.is_some() {
                ticks_mid_line += 1;
            }

            if let Err(e) = reader.tick().await {
                assert!(e.is_transient(), "seed {seed}: non-transient error: {e}");
            }
            delivered.extend(drain_queue(&mut rx));
        }

        if let Some(record) = pending.take() {
            writer.finish_record(record);
        }
        writer.restore_marker();
        let (rest, _) = tick_through_faults(
            &mut reader,
            &mut rx,
            writer.written().len().saturating_sub(delivered.len()),
        )
        .await;
        delivered.extend(rest);

        let want = BTreeMap::from([(id(), writer.written().to_vec())]);
        assert_no_violations(&format!("seed {seed}"), &check_delivery(&want, &delivered));
        let payloads: Vec<_> = delivered.iter().map(|d| d.payload.clone()).collect();
        let written: Vec<_> = writer.written().iter().map(|r| r.payload.clone()).collect();
        assert_eq!(payloads, written, "seed {seed}");
        assert_eq!(reader.stats().decode_failures, 0, "seed {seed}");
    }
    assert!(ticks_mid_line > 0, "no tick ran while a line was half written");
}
