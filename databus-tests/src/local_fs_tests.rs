//! Local filesystem integration tests.
//!
//! The same delivery properties against real directories: `LocalFs` for the
//! collector side and `FileCheckpointProvider` for positions, configured the
//! way the `databus-tail` binary configures them.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use databus_checkpoint::{FileCheckpointConfig, FileCheckpointProvider};
use databus_consumer::{keys, ClientConfig, ConsumerSettings, DatabusConsumer};
use databus_core::Limits;
use databus_fs::LocalFs;
use tempfile::TempDir;

use crate::properties::{assert_no_violations, check_delivery};
use crate::scenarios::{assert_quiet, names, receive, RECEIVE_TIMEOUT};
use crate::workload::{write_layout, CollectorWriter, LocalSink};

// ============================================================================
// Helper Functions
// ============================================================================

type LocalConsumer = DatabusConsumer<LocalFs, FileCheckpointProvider>;

fn client_config(base: &Path, roots: &[&str]) -> ClientConfig {
    let roots: Vec<String> = roots
        .iter()
        .map(|r| base.join(r).display().to_string())
        .collect();
    let text = format!(
        r#"
        [databus.consumer]
        rootdirs = {roots:?}
        stream = "{stream}"
        collector = "{collector}"
        name = "{name}"
        idle.retry.ms = 10
        checkpoint.dir = "{checkpoints}"
        "#,
        stream = names::STREAM,
        collector = names::COLLECTOR,
        name = names::CONSUMER,
        checkpoints = base.join("checkpoints").display(),
    );
    text.parse().expect("valid config")
}

async fn consumer(config: &ClientConfig) -> LocalConsumer {
    let settings = ConsumerSettings::from_client_config(config, &Limits::new()).expect("settings");
    let provider = FileCheckpointProvider::new(FileCheckpointConfig::for_testing(
        settings.checkpoint_dir.clone(),
    ))
    .await
    .expect("provider");
    DatabusConsumer::initialize(settings, Arc::new(LocalFs::new()), provider)
        .await
        .expect("initialize")
}

fn local_writer(base: &Path, root: &str, tag: &str) -> CollectorWriter<LocalSink> {
    let dir = databus_fs::CollectorDir::new(base.join(root), names::STREAM, names::COLLECTOR);
    CollectorWriter::new(LocalSink, dir, tag)
}

// ============================================================================
// Tests
// ============================================================================

/// Two roots on disk: exact delivery, then a restart that only sees new data.
#[tokio::test]
async fn test_local_consumer_delivery_and_restart() {
    let temp = TempDir::new().unwrap();
    let base = temp.path();
    let config = client_config(base, &["east", "west"]);
    assert_eq!(config.get(keys::STREAM), Some(names::STREAM));

    let mut east = local_writer(base, "east", "e");
    let mut west = local_writer(base, "west", "w");
    write_layout(&mut east, &[3, 2]);
    write_layout(&mut west, &[4]);
    // Collectors also keep a stats file next to the data.
    std::fs::write(east.dir().file_path("scribe_stats"), "bytes=10\n").unwrap();

    let mut first = consumer(&config).await;
    first.start().unwrap();
    let ids = first.partition_ids();
    let want = BTreeMap::from([
        (ids[0].clone(), east.written().to_vec()),
        (ids[1].clone(), west.written().to_vec()),
    ]);
    let delivered = receive(&mut first, 9).await;
    assert_quiet(&mut first, std::time::Duration::from_millis(50)).await;
    first.write_checkpoint().await.unwrap();
    first.stop().await.unwrap();
    drop(first);
    assert_no_violations("first run", &check_delivery(&want, &delivered));
    assert!(base.join("checkpoints").join(format!("{}.ck", names::CONSUMER)).exists());

    east.write_records(2);
    west.write_file(1);

    let mut second = consumer(&config).await;
    second.start().unwrap();
    let delivered = receive(&mut second, 3).await;
    assert_quiet(&mut second, std::time::Duration::from_millis(50)).await;
    second.stop().await.unwrap();

    let want = BTreeMap::from([
        (ids[0].clone(), east.written()[5..].to_vec()),
        (ids[1].clone(), west.written()[4..].to_vec()),
    ]);
    assert_no_violations("second run", &check_delivery(&want, &delivered));
}

/// A line written in two parts on disk is delivered once, whole.
#[tokio::test]
async fn test_local_consumer_partial_line() {
    let temp = TempDir::new().unwrap();
    let base = temp.path();
    let config = client_config(base, &["only"]);
    let mut writer = local_writer(base, "only", "o");
    writer.write_file(1);

    let mut consumer = consumer(&config).await;
    consumer.start().unwrap();
    receive(&mut consumer, 1).await;

    let pending = writer.start_record(5);
    assert!(consumer
        .next_timeout(std::time::Duration::from_millis(50))
        .await
        .is_none());
    let record = writer.finish_record(pending);

    let entry = consumer
        .next_timeout(RECEIVE_TIMEOUT)
        .await
        .expect("completed line");
    assert_eq!(entry.message.data(), &record.payload);
    assert_eq!(entry.checkpoint, record.checkpoint());
    consumer.stop().await.unwrap();
}
