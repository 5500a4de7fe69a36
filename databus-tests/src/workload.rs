//! Collector-side workload generation.
//!
//! A [`CollectorWriter`] plays the upstream collector: it creates data files
//! in name order, appends base64 lines and keeps the `<stream>_current`
//! marker pointing at the file it writes. Every record it writes is kept so
//! tests can compare deliveries against it.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use bytes::Bytes;
use databus_core::PartitionCheckpoint;
use databus_fs::{CollectorDir, SimulatedFs};
use rand::Rng;

// ============================================================================
// File Sinks
// ============================================================================

/// Where a [`CollectorWriter`] puts its bytes.
pub trait FileSink {
    /// Replaces the content of a file, creating it and its parents if needed.
    fn write_file(&self, path: &Path, content: &[u8]);

    /// Appends bytes to a file, creating it if needed.
    fn append(&self, path: &Path, content: &[u8]);

    /// Deletes a file if it exists.
    fn remove(&self, path: &Path);
}

impl FileSink for SimulatedFs {
    fn write_file(&self, path: &Path, content: &[u8]) {
        Self::write_file(self, path, content);
    }

    fn append(&self, path: &Path, content: &[u8]) {
        Self::append(self, path, content);
    }

    fn remove(&self, path: &Path) {
        Self::remove(self, path);
    }
}

/// Sink writing to the local filesystem.
///
/// Panics on I/O errors; only used by tests against temp directories.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalSink;

impl FileSink for LocalSink {
    fn write_file(&self, path: &Path, content: &[u8]) {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create collector dir");
        }
        std::fs::write(path, content).expect("write file");
    }

    fn append(&self, path: &Path, content: &[u8]) {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create collector dir");
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .expect("open for append");
        file.write_all(content).expect("append");
    }

    fn remove(&self, path: &Path) {
        match std::fs::remove_file(path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => panic!("remove {}: {e}", path.display()),
        }
    }
}

// ============================================================================
// Written Records
// ============================================================================

/// A record as the collector wrote it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenRecord {
    /// Data file holding the record.
    pub file: String,
    /// 1-based line number within the file.
    pub line_num: u64,
    /// Decoded payload.
    pub payload: Bytes,
}

impl WrittenRecord {
    /// Returns true if this record comes after `checkpoint`.
    #[must_use]
    pub fn is_after(&self, checkpoint: &PartitionCheckpoint) -> bool {
        checkpoint.file_name().map_or(true, |file| {
            self.file.as_str() > file || (self.file == file && self.line_num > checkpoint.line_num())
        })
    }

    /// Returns the position just after this record.
    #[must_use]
    pub fn checkpoint(&self) -> PartitionCheckpoint {
        PartitionCheckpoint::new(self.file.clone(), self.line_num)
    }
}

/// First half of a record whose newline has not been written yet.
#[derive(Debug)]
#[must_use = "finish the record with CollectorWriter::finish_record"]
pub struct PendingRecord {
    record: WrittenRecord,
    rest: String,
}

// ============================================================================
// Collector Writer
// ============================================================================

/// Writes data files and the marker of one collector directory.
#[derive(Debug)]
pub struct CollectorWriter<S: FileSink> {
    sink: S,
    dir: CollectorDir,
    /// Prefix of file names and payloads; distinguishes partitions.
    tag: String,
    file_index: u32,
    current: Option<String>,
    lines_in_file: u64,
    written: Vec<WrittenRecord>,
}

impl<S: FileSink> CollectorWriter<S> {
    /// Creates a writer. No file exists until the first write or rotation.
    #[must_use]
    pub fn new(sink: S, dir: CollectorDir, tag: impl Into<String>) -> Self {
        Self {
            sink,
            dir,
            tag: tag.into(),
            file_index: 0,
            current: None,
            lines_in_file: 0,
            written: Vec::new(),
        }
    }

    /// Returns the collector directory.
    #[must_use]
    pub const fn dir(&self) -> &CollectorDir {
        &self.dir
    }

    /// Returns the file being written.
    #[must_use]
    pub fn current_file(&self) -> Option<&str> {
        self.current.as_deref()
    }

    /// Returns every record written so far, in write order.
    #[must_use]
    pub fn written(&self) -> &[WrittenRecord] {
        &self.written
    }

    /// Returns the records written after `checkpoint`.
    #[must_use]
    pub fn written_after(&self, checkpoint: &PartitionCheckpoint) -> Vec<WrittenRecord> {
        self.written
            .iter()
            .filter(|r| r.is_after(checkpoint))
            .cloned()
            .collect()
    }

    /// Returns the name the next rotation will use.
    #[must_use]
    pub fn next_file_name(&self) -> String {
        format!("{}-{:05}", self.tag, self.file_index + 1)
    }

    /// Starts a new data file and points the marker at it.
    pub fn rotate(&mut self) -> String {
        let name = self.next_file_name();
        self.file_index += 1;
        self.sink.write_file(&self.dir.file_path(&name), b"");
        self.sink
            .write_file(&self.dir.marker_path(), format!("{name}\n").as_bytes());
        self.current = Some(name.clone());
        self.lines_in_file = 0;
        name
    }

    /// Removes the marker content, as a collector does between files.
    pub fn blank_marker(&self) {
        self.sink.write_file(&self.dir.marker_path(), b"");
    }

    /// Deletes the marker file.
    pub fn remove_marker(&self) {
        self.sink.remove(&self.dir.marker_path());
    }

    /// Points the marker back at the current file, if there is one.
    pub fn restore_marker(&self) {
        if let Some(name) = &self.current {
            self.sink
                .write_file(&self.dir.marker_path(), format!("{name}\n").as_bytes());
        }
    }

    /// Appends one record to the current file, rotating first if none.
    pub fn write_record(&mut self) -> WrittenRecord {
        let pending = self.start_record(0);
        self.finish_record(pending)
    }

    /// Appends `count` records.
    pub fn write_records(&mut self, count: u64) {
        for _ in 0..count {
            self.write_record();
        }
    }

    /// Rotates, then appends `count` records to the new file.
    pub fn write_file(&mut self, count: u64) -> String {
        let name = self.rotate();
        self.write_records(count);
        name
    }

    /// Appends a line that is not valid base64. It still takes a line number.
    pub fn write_garbage_line(&mut self) {
        let file = self.ensure_file();
        self.lines_in_file += 1;
        self.sink
            .append(&self.dir.file_path(&file), b"!!not base64!!\n");
    }

    /// Writes the first `split` bytes of the next record's line.
    pub fn start_record(&mut self, split: usize) -> PendingRecord {
        let file = self.ensure_file();
        self.lines_in_file += 1;
        let line_num = self.lines_in_file;
        let payload = format!("{}|{file}|{line_num}", self.tag);
        let line = STANDARD.encode(&payload);
        let split = split.min(line.len());

        if split > 0 {
            self.sink
                .append(&self.dir.file_path(&file), &line.as_bytes()[..split]);
        }
        PendingRecord {
            record: WrittenRecord {
                file,
                line_num,
                payload: Bytes::from(payload),
            },
            rest: format!("{}\n", &line[split..]),
        }
    }

    /// Writes the rest of a record started with [`Self::start_record`].
    pub fn finish_record(&mut self, pending: PendingRecord) -> WrittenRecord {
        self.sink.append(
            &self.dir.file_path(&pending.record.file),
            pending.rest.as_bytes(),
        );
        self.written.push(pending.record.clone());
        pending.record
    }

    fn ensure_file(&mut self) -> String {
        match &self.current {
            Some(name) => name.clone(),
            None => self.rotate(),
        }
    }
}

// ============================================================================
// Random Layouts
// ============================================================================

/// Returns line counts for a random sequence of files.
///
/// Between one and `max_files` files, each with zero to `max_lines` lines.
pub fn random_layout(rng: &mut impl Rng, max_files: u32, max_lines: u64) -> Vec<u64> {
    assert!(max_files > 0, "max_files must be positive");
    let files = rng.gen_range(1..=max_files);
    (0..files).map(|_| rng.gen_range(0..=max_lines)).collect()
}

/// Writes one file per entry of `layout`.
pub fn write_layout<S: FileSink>(writer: &mut CollectorWriter<S>, layout: &[u64]) {
    for &lines in layout {
        writer.write_file(lines);
    }
}
