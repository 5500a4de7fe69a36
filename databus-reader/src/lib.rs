//! Databus Reader - Partition reader state machine.
//!
//! This crate tails one collector directory per partition and turns each
//! base64 line into a [`databus_core::QueueEntry`] on a bounded queue.
//!
//! # Design
//!
//! A [`PartitionReader`] owns:
//! - The current file name and the number of its lines already consumed
//! - A [`LineCursor`] that remembers the byte offset after the last line
//! - A stop signal checked between ticks, between lines, and while blocked
//!   on a full queue
//!
//! Resuming from a checkpoint `(file, n)` opens `file` at offset zero and
//! skips `n` lines. Rotation is detected by comparing the current file with
//! the `<stream>_current` marker once the file is exhausted. A trailing line
//! without a newline is only emitted once a later file exists.
//!
//! # Operations
//!
//! - `tick`: One bounded step (choose a file, read lines, or advance)
//! - `run` / `spawn`: Tick until stopped, sleeping when idle
//! - `close`: Request a cooperative stop
//!
//! # `TigerStyle` Principles
//!
//! - Explicit limits on read chunk size, line length and queue capacity
//! - Filesystem errors never end a reader; they are retried next tick
//! - No unsafe code

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

mod config;
mod cursor;
mod decode;
mod error;
mod handle;
mod reader;
mod signal;
mod stats;

pub use config::ReaderConfig;
pub use cursor::{LineCursor, NextLine};
pub use decode::{decode_line, DecodeFailurePolicy};
pub use error::{ReaderError, ReaderResult};
pub use handle::ReaderHandle;
pub use reader::{PartitionReader, ReaderState, TickOutcome};
pub use signal::{
    message_queue, stop_channel, MessageReceiver, MessageSender, StopSignal, StopTrigger,
};
pub use stats::{ReaderStats, ReaderStatsSnapshot};
