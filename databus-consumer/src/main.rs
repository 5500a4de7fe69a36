//! Databus tail binary.
//!
//! Tails one stream/collector across the configured roots and writes each
//! decoded record to stdout, one line per record. Logs go to stderr.
//!
//! ```bash
//! databus-tail --config consumer.toml
//! databus-tail --config consumer.toml --root-dir /data/east --root-dir /data/west
//! databus-tail --config consumer.toml --from-start --log-level debug
//! ```
//!
//! Positions are written on every checkpoint interval and once more on
//! Ctrl-C, always after stdout has been flushed.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use databus_checkpoint::{FileCheckpointConfig, FileCheckpointProvider};
use databus_consumer::{keys, ClientConfig, ConsumerSettings, DatabusConsumer};
use databus_core::Limits;
use databus_fs::LocalFs;
use tokio::io::{AsyncWriteExt, BufWriter, Stdout};
use tokio::time::MissedTickBehavior;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

type TailConsumer = DatabusConsumer<LocalFs, FileCheckpointProvider>;

/// Databus stream tailer.
#[derive(Parser, Debug)]
#[command(name = "databus-tail")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Consumer configuration file (TOML).
    #[arg(long)]
    config: PathBuf,

    /// Root directory to read; replaces the configured roots.
    /// Can be specified multiple times, one partition per root.
    #[arg(long = "root-dir")]
    root_dirs: Vec<String>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: Level,

    /// Interval between checkpoint writes, in milliseconds.
    #[arg(long, default_value = "5000", value_parser = clap::value_parser!(u64).range(1..))]
    checkpoint_interval_ms: u64,

    /// Delete the stored checkpoint and read every partition from its first file.
    #[arg(long)]
    from_start: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Logs to stderr; stdout carries records.
    let subscriber = FmtSubscriber::builder()
        .with_max_level(args.log_level)
        .with_target(true)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mut config = ClientConfig::load(&args.config)?;
    if !args.root_dirs.is_empty() {
        config.set(keys::ROOT_DIRS, args.root_dirs.join(","));
    }
    let settings = ConsumerSettings::from_client_config(&config, &Limits::new())?;

    info!(
        config = %args.config.display(),
        stream = %settings.stream,
        collector = %settings.collector,
        roots = settings.root_dirs.len(),
        checkpoint_dir = %settings.checkpoint_dir.display(),
        "Starting databus tail"
    );

    let provider =
        FileCheckpointProvider::new(FileCheckpointConfig::new(settings.checkpoint_dir.clone()))
            .await?;
    let mut consumer = DatabusConsumer::initialize(settings, Arc::new(LocalFs::new()), provider).await?;

    if args.from_start {
        consumer.clear_checkpoint().await?;
    }
    consumer.start()?;

    let mut out = BufWriter::new(tokio::io::stdout());
    let interval = Duration::from_millis(args.checkpoint_interval_ms);
    let result = tail(&mut consumer, &mut out, interval).await;

    // Checkpoint whatever was flushed, even if tailing failed.
    out.flush().await?;
    consumer.write_checkpoint().await?;
    consumer.stop().await?;

    let records = result?;
    info!(records, "Databus tail finished");
    Ok(())
}

/// Copies records to `out` until Ctrl-C or until every reader has exited.
async fn tail(
    consumer: &mut TailConsumer,
    out: &mut BufWriter<Stdout>,
    interval: Duration,
) -> Result<u64, Box<dyn std::error::Error>> {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    let mut records: u64 = 0;
    loop {
        tokio::select! {
            entry = consumer.next() => {
                let Some(entry) = entry else {
                    warn!("All partition readers exited");
                    break;
                };
                out.write_all(entry.message.data()).await?;
                out.write_all(b"\n").await?;
                records += 1;
            }
            _ = ticker.tick() => {
                out.flush().await?;
                consumer.write_checkpoint().await?;
            }
            result = &mut shutdown => {
                result?;
                info!(records, "Interrupted, shutting down");
                break;
            }
        }
    }
    Ok(records)
}
