//! Partition reader state machine.
//!
//! A reader tails one collector directory. Each tick is one bounded step:
//!
//! ```text
//!   Uninitialized ──start file found──> Reading <──no successor── AdvanceFile
//!                                         │                          ^
//!                                         └──rotated out / vanished──┘
//!
//!   any state ──stop──> Stopped        decode halt / queue closed ──> Failed
//! ```
//!
//! Records are emitted strictly in file-then-line order. Every emitted entry
//! carries the position after its line, so persisting the latest entry's
//! checkpoint resumes exactly after it.

use std::path::Path;
use std::sync::Arc;

use databus_core::{Message, PartitionCheckpoint, PartitionId, QueueEntry};
use databus_fs::{CollectorDir, StreamFs};
use tracing::{debug, error, info, trace, warn};

use crate::config::ReaderConfig;
use crate::cursor::{LineCursor, NextLine};
use crate::decode::{decode_line, DecodeFailurePolicy};
use crate::error::{ReaderError, ReaderResult};
use crate::handle::ReaderHandle;
use crate::signal::{stop_channel, MessageSender, StopSignal, StopTrigger};
use crate::stats::{ReaderStats, ReaderStatsSnapshot};

// -----------------------------------------------------------------------------
// State
// -----------------------------------------------------------------------------

/// Lifecycle state of a [`PartitionReader`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderState {
    /// No file chosen yet.
    Uninitialized,
    /// Reading lines of the current file.
    Reading,
    /// Looking for the file after the current one.
    AdvanceFile,
    /// Stopped on request. Terminal.
    Stopped,
    /// Halted by an unrecoverable error. Terminal.
    Failed,
}

impl ReaderState {
    /// Returns true for states the reader never leaves.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Stopped | Self::Failed)
    }
}

/// What one tick did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickOutcome {
    /// Records emitted during the tick.
    pub emitted: u64,
    /// True if the tick chose or changed the current file.
    pub moved: bool,
}

impl TickOutcome {
    const fn idle() -> Self {
        Self {
            emitted: 0,
            moved: false,
        }
    }

    /// Returns true if the tick made no progress and the reader should sleep.
    #[must_use]
    pub const fn is_idle(&self) -> bool {
        self.emitted == 0 && !self.moved
    }
}

/// What happened to one line.
enum LineOutcome {
    Emitted,
    Skipped,
    Stopped,
}

/// How a read pass over the current file ended.
enum PassEnd {
    /// Caught up with the file that is still being written.
    CaughtUp,
    /// File is finished; look for the next one.
    Rotated,
    /// Stop observed.
    Stopped,
}

// -----------------------------------------------------------------------------
// PartitionReader
// -----------------------------------------------------------------------------

/// Tails one collector directory and emits decoded records.
pub struct PartitionReader<F: StreamFs + ?Sized> {
    id: PartitionId,
    dir: CollectorDir,
    fs: Arc<F>,
    config: ReaderConfig,
    tx: MessageSender,
    stop: StopSignal,
    stop_trigger: StopTrigger,
    stats: Arc<ReaderStats>,

    state: ReaderState,
    start: PartitionCheckpoint,
    current_file: Option<String>,
    line_num: u64,
    skip_lines: u64,
    cursor: LineCursor,
}

impl<F: StreamFs + ?Sized + 'static> PartitionReader<F> {
    /// Creates a reader that resumes after `checkpoint`.
    #[must_use]
    pub fn new(
        id: PartitionId,
        dir: CollectorDir,
        fs: Arc<F>,
        checkpoint: PartitionCheckpoint,
        tx: MessageSender,
        config: ReaderConfig,
    ) -> Self {
        assert!(config.read_chunk_bytes > 0, "read_chunk_bytes must be positive");

        let (stop_trigger, stop) = stop_channel();
        info!(
            partition = %id,
            dir = %dir.path().display(),
            checkpoint = %checkpoint,
            "Partition reader initialized"
        );
        Self {
            id,
            dir,
            fs,
            config,
            tx,
            stop,
            stop_trigger,
            stats: Arc::new(ReaderStats::default()),
            state: ReaderState::Uninitialized,
            start: checkpoint,
            current_file: None,
            line_num: 0,
            skip_lines: 0,
            cursor: LineCursor::new(config.max_line_bytes),
        }
    }

    /// Returns the partition id.
    #[must_use]
    pub const fn id(&self) -> &PartitionId {
        &self.id
    }

    /// Returns the current state.
    #[must_use]
    pub const fn state(&self) -> ReaderState {
        self.state
    }

    /// Returns the file being read, if one has been chosen.
    #[must_use]
    pub fn current_file(&self) -> Option<&str> {
        self.current_file.as_deref()
    }

    /// Returns the number of lines of the current file consumed so far.
    #[must_use]
    pub const fn line_num(&self) -> u64 {
        self.line_num
    }

    /// Returns the byte offset just after the last consumed line.
    #[must_use]
    pub const fn offset(&self) -> u64 {
        self.cursor.offset()
    }

    /// Returns the current position.
    #[must_use]
    pub fn position(&self) -> PartitionCheckpoint {
        self.current_file
            .as_ref()
            .map_or_else(PartitionCheckpoint::empty, |file| {
                PartitionCheckpoint::new(file.clone(), self.line_num)
            })
    }

    /// Returns a trigger that stops this reader.
    #[must_use]
    pub fn stop_trigger(&self) -> StopTrigger {
        self.stop_trigger.clone()
    }

    /// Requests a stop. Observed at the next stop point.
    pub fn close(&self) {
        self.stop_trigger.stop();
    }

    /// Returns a copy of the counters.
    #[must_use]
    pub fn stats(&self) -> ReaderStatsSnapshot {
        self.stats.snapshot()
    }

    /// Spawns the reader loop on the tokio runtime.
    #[must_use]
    pub fn spawn(self) -> ReaderHandle {
        let id = self.id.clone();
        let trigger = self.stop_trigger.clone();
        let stats = Arc::clone(&self.stats);
        let join = tokio::spawn(self.run());
        ReaderHandle::new(id, trigger, stats, join)
    }

    /// Runs ticks until stopped or failed.
    ///
    /// Filesystem errors are logged and retried after the idle interval.
    ///
    /// # Errors
    ///
    /// Returns the error that moved the reader to `Failed`.
    pub async fn run(mut self) -> ReaderResult<()> {
        info!(partition = %self.id, "Partition reader started");

        while !self.state.is_terminal() {
            match self.tick().await {
                Ok(outcome) => {
                    if outcome.is_idle() && !self.state.is_terminal() {
                        self.idle_sleep().await;
                    }
                }
                Err(e) if e.is_transient() => {
                    warn!(partition = %self.id, state = ?self.state, error = %e, "Reader tick failed");
                    ReaderStats::add(&self.stats.tick_errors, 1);
                    self.idle_sleep().await;
                }
                Err(e) => {
                    error!(partition = %self.id, error = %e, "Partition reader failed");
                    self.state = ReaderState::Failed;
                    return Err(e);
                }
            }
        }

        info!(
            partition = %self.id,
            position = %self.position(),
            records = self.stats.snapshot().records_emitted,
            "Partition reader stopped"
        );
        Ok(())
    }

    /// Performs one step of the state machine.
    ///
    /// # Errors
    ///
    /// Filesystem errors leave the state unchanged so the tick can be retried.
    /// Decode errors (under `HaltPartition`) and a closed queue move the reader
    /// to `Failed`.
    pub async fn tick(&mut self) -> ReaderResult<TickOutcome> {
        if self.state.is_terminal() {
            return Ok(TickOutcome::idle());
        }
        if self.stop.is_stopped() {
            self.state = ReaderState::Stopped;
            return Ok(TickOutcome::idle());
        }

        match self.state {
            ReaderState::Uninitialized => self.initialize().await,
            ReaderState::Reading => self.read_current().await,
            ReaderState::AdvanceFile => self.advance_file().await,
            ReaderState::Stopped | ReaderState::Failed => Ok(TickOutcome::idle()),
        }
    }

    // -------------------------------------------------------------------------
    // States
    // -------------------------------------------------------------------------

    async fn initialize(&mut self) -> ReaderResult<TickOutcome> {
        let file = if let Some(file) = self.start.file_name() {
            self.skip_lines = self.start.line_num();
            file.to_string()
        } else {
            let files = self.dir.list_data_files(self.fs.as_ref()).await?;
            let Some(first) = files.into_iter().next() else {
                debug!(partition = %self.id, "No file to read");
                return Ok(TickOutcome::idle());
            };
            first
        };

        info!(
            partition = %self.id,
            file = %file,
            skip_lines = self.skip_lines,
            "Starting partition at file"
        );
        self.open(file);
        Ok(TickOutcome {
            emitted: 0,
            moved: true,
        })
    }

    async fn read_current(&mut self) -> ReaderResult<TickOutcome> {
        let Some(file) = self.current_file.clone() else {
            // Reading always has a file; recover by rediscovering it.
            self.state = ReaderState::Uninitialized;
            return Ok(TickOutcome::idle());
        };
        let path = self.dir.file_path(&file);
        trace!(
            partition = %self.id,
            file = %file,
            offset = self.cursor.offset(),
            line_num = self.line_num,
            "Reading file"
        );

        if self.skip_lines > 0 {
            match self.skip(&file, &path).await {
                Ok(true) => {}
                Ok(false) => {
                    self.state = ReaderState::Stopped;
                    return Ok(TickOutcome::idle());
                }
                Err(ReaderError::Fs(e)) if e.is_not_found() => return Ok(self.file_vanished(&file)),
                Err(e) => return Err(e),
            }
        }

        let mut emitted = 0;
        let end = self.read_lines(&file, &path, &mut emitted).await;
        match end {
            Ok(PassEnd::CaughtUp) => Ok(TickOutcome {
                emitted,
                moved: false,
            }),
            Ok(PassEnd::Rotated) => {
                self.state = ReaderState::AdvanceFile;
                Ok(TickOutcome {
                    emitted,
                    moved: true,
                })
            }
            Ok(PassEnd::Stopped) => {
                self.state = ReaderState::Stopped;
                Ok(TickOutcome {
                    emitted,
                    moved: false,
                })
            }
            Err(ReaderError::Fs(e)) if e.is_not_found() => {
                let mut outcome = self.file_vanished(&file);
                outcome.emitted = emitted;
                Ok(outcome)
            }
            Err(e) => {
                if !e.is_transient() {
                    self.state = ReaderState::Failed;
                }
                Err(e)
            }
        }
    }

    async fn advance_file(&mut self) -> ReaderResult<TickOutcome> {
        let Some(current) = self.current_file.clone() else {
            self.state = ReaderState::Uninitialized;
            return Ok(TickOutcome::idle());
        };

        let files = self.dir.list_data_files(self.fs.as_ref()).await?;
        let Some(next) = CollectorDir::next_file(&files, &current) else {
            debug!(partition = %self.id, file = %current, "No next file, reading the same file");
            self.state = ReaderState::Reading;
            return Ok(TickOutcome::idle());
        };
        let next = next.to_string();

        // A successor exists, so the writer is done with the current file
        // and an unterminated trailing line is complete.
        let mut emitted = 0;
        match self.drain_current(&current, &mut emitted).await {
            Ok(true) => {}
            Ok(false) => {
                self.state = ReaderState::Stopped;
                return Ok(TickOutcome {
                    emitted,
                    moved: false,
                });
            }
            Err(e) => {
                if !e.is_transient() {
                    self.state = ReaderState::Failed;
                }
                return Err(e);
            }
        }

        info!(
            partition = %self.id,
            from = %current,
            to = %next,
            lines = self.line_num,
            "Advancing to next file"
        );
        self.open(next);
        ReaderStats::add(&self.stats.file_rotations, 1);
        Ok(TickOutcome {
            emitted,
            moved: true,
        })
    }

    // -------------------------------------------------------------------------
    // Helpers
    // -------------------------------------------------------------------------

    /// Makes `file` current, positioned at its first line.
    fn open(&mut self, file: String) {
        self.current_file = Some(file);
        self.line_num = 0;
        self.cursor.reset();
        self.state = ReaderState::Reading;
    }

    /// Moves on from a file that no longer exists.
    fn file_vanished(&mut self, file: &str) -> TickOutcome {
        warn!(
            partition = %self.id,
            file = %file,
            line_num = self.line_num,
            "Current file no longer exists, advancing"
        );
        self.skip_lines = 0;
        self.state = ReaderState::AdvanceFile;
        TickOutcome {
            emitted: 0,
            moved: true,
        }
    }

    /// Discards lines up to the resume point.
    ///
    /// Returns `Ok(false)` if a stop was observed. A file shorter than the
    /// resume point is logged and reading continues from its end.
    async fn skip(&mut self, file: &str, path: &Path) -> ReaderResult<bool> {
        let target = self.skip_lines;
        while self.line_num < target {
            if self.stop.is_stopped() {
                return Ok(false);
            }
            // Counted lines were consumed before, so a trailing unterminated
            // line may be taken as one of them.
            let line = self
                .cursor
                .next_line(self.fs.as_ref(), path, self.config.read_chunk_bytes, true)
                .await?;
            if line.is_none() {
                break;
            }
            self.line_num += 1;
            ReaderStats::add(&self.stats.lines_skipped, 1);
        }

        if self.line_num < target {
            warn!(
                partition = %self.id,
                file = %file,
                expected = target,
                skipped = self.line_num,
                "Skipped fewer lines than checkpointed"
            );
        } else {
            info!(partition = %self.id, file = %file, skipped = self.line_num, "Skipped lines");
        }
        self.skip_lines = 0;
        Ok(true)
    }

    /// Reads and emits terminated lines until the file is caught up or
    /// rotated out.
    ///
    /// A partial trailing line stays buffered in the cursor either way.
    async fn read_lines(
        &mut self,
        file: &str,
        path: &Path,
        emitted: &mut u64,
    ) -> ReaderResult<PassEnd> {
        loop {
            if self.stop.is_stopped() {
                return Ok(PassEnd::Stopped);
            }

            let line = self
                .cursor
                .next_line(self.fs.as_ref(), path, self.config.read_chunk_bytes, false)
                .await?;
            let Some(line) = line else {
                match self.dir.current_file(self.fs.as_ref()).await {
                    Ok(Some(active)) if active == file => {
                        trace!(partition = %self.id, file = %file, "Caught up with active file");
                        return Ok(PassEnd::CaughtUp);
                    }
                    Ok(active) => {
                        debug!(
                            partition = %self.id,
                            file = %file,
                            active = ?active,
                            "File rotated out"
                        );
                    }
                    Err(e) => {
                        warn!(
                            partition = %self.id,
                            file = %file,
                            error = %e,
                            "Could not read current-file marker, treating file as rotated"
                        );
                    }
                }
                return Ok(PassEnd::Rotated);
            };

            match self.handle_line(file, line).await? {
                LineOutcome::Emitted => *emitted += 1,
                LineOutcome::Skipped => {}
                LineOutcome::Stopped => return Ok(PassEnd::Stopped),
            }
        }
    }

    /// Emits what is left of a finished file, including a trailing line
    /// without a newline.
    ///
    /// Returns `Ok(false)` if a stop was observed. A file that has vanished
    /// has nothing left to drain.
    async fn drain_current(&mut self, file: &str, emitted: &mut u64) -> ReaderResult<bool> {
        let path = self.dir.file_path(file);
        loop {
            if self.stop.is_stopped() {
                return Ok(false);
            }

            let line = match self
                .cursor
                .next_line(self.fs.as_ref(), &path, self.config.read_chunk_bytes, true)
                .await
            {
                Ok(Some(line)) => line,
                Ok(None) => return Ok(true),
                Err(e) if e.is_not_found() => {
                    debug!(partition = %self.id, file = %file, "Finished file is gone, nothing to drain");
                    return Ok(true);
                }
                Err(e) => return Err(e.into()),
            };

            match self.handle_line(file, line).await? {
                LineOutcome::Emitted => *emitted += 1,
                LineOutcome::Skipped => {}
                LineOutcome::Stopped => return Ok(false),
            }
        }
    }

    /// Decodes and emits one line.
    async fn handle_line(&mut self, file: &str, line: NextLine) -> ReaderResult<LineOutcome> {
        let line_num = self.line_num + 1;

        let decoded = match line {
            NextLine::Line(line) => decode_line(&line).map_err(|e| e.to_string()),
            NextLine::TooLong => Err(format!(
                "line longer than {} bytes",
                self.config.max_line_bytes
            )),
        };
        let payload = match decoded {
            Ok(payload) => payload,
            Err(message) => {
                ReaderStats::add(&self.stats.decode_failures, 1);
                match self.config.decode_policy {
                    DecodeFailurePolicy::Skip => {
                        warn!(
                            partition = %self.id,
                            file = %file,
                            line_num,
                            error = %message,
                            "Skipping undecodable line"
                        );
                        self.line_num = line_num;
                        return Ok(LineOutcome::Skipped);
                    }
                    DecodeFailurePolicy::HaltPartition => {
                        return Err(ReaderError::Decode {
                            partition: self.id.to_string(),
                            file: file.to_string(),
                            line_num,
                            message,
                        });
                    }
                }
            }
        };

        let bytes = payload.len() as u64;
        let entry = QueueEntry::new(
            Message::new(payload),
            self.id.clone(),
            PartitionCheckpoint::new(file, line_num),
        );

        // Wait for queue space, but give up as soon as a stop is requested.
        let stop = &mut self.stop;
        let tx = &self.tx;
        let sent = tokio::select! {
            biased;
            () = stop.stopped() => None,
            result = tx.send(entry) => Some(result),
        };
        match sent {
            None => Ok(LineOutcome::Stopped),
            Some(Err(_)) => Err(ReaderError::QueueClosed {
                partition: self.id.to_string(),
            }),
            Some(Ok(())) => {
                self.line_num = line_num;
                ReaderStats::add(&self.stats.records_emitted, 1);
                ReaderStats::add(&self.stats.bytes_emitted, bytes);
                trace!(partition = %self.id, file = %file, line_num, "Emitted record");
                Ok(LineOutcome::Emitted)
            }
        }
    }

    async fn idle_sleep(&mut self) {
        let idle = self.config.idle_retry;
        tokio::select! {
            biased;
            () = self.stop.stopped() => {}
            () = tokio::time::sleep(idle) => {}
        }
    }
}

impl<F: StreamFs + ?Sized> std::fmt::Debug for PartitionReader<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PartitionReader")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("current_file", &self.current_file)
            .field("line_num", &self.line_num)
            .field("offset", &self.cursor.offset())
            .finish_non_exhaustive()
    }
}

// -----------------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------------
