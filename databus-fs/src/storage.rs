//! Filesystem abstraction for tailing.
//!
//! This module provides the [`StreamFs`] trait and [`SimulatedFs`], an
//! in-memory backend with deterministic fault injection.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::{FsError, FsResult};

// -----------------------------------------------------------------------------
// StreamFs Trait
// -----------------------------------------------------------------------------

/// Append-aware hierarchical byte store.
///
/// Files only ever grow while being written; readers address them by byte
/// offset. Implementations must be `Send + Sync` for use across reader tasks.
#[async_trait]
pub trait StreamFs: Send + Sync {
    /// Lists the names of the regular files directly inside `dir`.
    ///
    /// A missing directory lists as empty. Order is unspecified.
    ///
    /// # Errors
    ///
    /// Returns an error if the listing fails.
    async fn list(&self, dir: &Path) -> FsResult<Vec<String>>;

    /// Reads up to `max_bytes` bytes of `path` starting at `offset`.
    ///
    /// Returns an empty buffer when `offset` is at or past the end of the file.
    /// May return fewer bytes than requested even if more are available.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the file does not exist, `Io` on other failures.
    async fn read_range(&self, path: &Path, offset: u64, max_bytes: u32) -> FsResult<Bytes>;

    /// Reads the first line of a small file, without its line terminator.
    ///
    /// Returns `None` if the file does not exist or is empty.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read.
    async fn read_first_line(&self, path: &Path) -> FsResult<Option<String>>;

    /// Checks whether a file exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the check fails.
    async fn exists(&self, path: &Path) -> FsResult<bool>;
}

// -----------------------------------------------------------------------------
// Fault Configuration
// -----------------------------------------------------------------------------

/// Configuration for fault injection in [`SimulatedFs`].
///
/// Used for deterministic simulation testing (DST) of readers.
#[derive(Debug, Clone, Default)]
#[allow(clippy::struct_excessive_bools)]
pub struct FsFaultConfig {
    /// Probability of list failing. Range: 0.0 - 1.0.
    pub list_fail_rate: f64,
    /// Probability of `read_range` failing. Range: 0.0 - 1.0.
    pub read_fail_rate: f64,
    /// Probability of `read_first_line` failing. Range: 0.0 - 1.0.
    pub first_line_fail_rate: f64,
    /// Caps the bytes returned by a single `read_range` (short reads).
    pub max_read_bytes: Option<u32>,
    /// If true, next list will fail (one-shot).
    pub force_list_fail: bool,
    /// If true, next `read_range` will fail (one-shot).
    pub force_read_fail: bool,
    /// If true, next `read_first_line` will fail (one-shot).
    pub force_first_line_fail: bool,
}

impl FsFaultConfig {
    /// Creates a fault config with no faults.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Creates a fault config that simulates a flaky distributed filesystem.
    #[must_use]
    pub fn flaky() -> Self {
        Self {
            list_fail_rate: 0.05,
            read_fail_rate: 0.05,
            first_line_fail_rate: 0.05,
            max_read_bytes: Some(7),
            ..Default::default()
        }
    }

    /// Sets the list failure rate.
    ///
    /// # Panics
    ///
    /// Panics if rate is not in range 0.0..=1.0.
    #[must_use]
    pub fn with_list_fail_rate(mut self, rate: f64) -> Self {
        assert!((0.0..=1.0).contains(&rate), "rate must be in 0.0..=1.0");
        self.list_fail_rate = rate;
        self
    }

    /// Sets the read failure rate.
    ///
    /// # Panics
    ///
    /// Panics if rate is not in range 0.0..=1.0.
    #[must_use]
    pub fn with_read_fail_rate(mut self, rate: f64) -> Self {
        assert!((0.0..=1.0).contains(&rate), "rate must be in 0.0..=1.0");
        self.read_fail_rate = rate;
        self
    }

    /// Sets the first-line failure rate.
    ///
    /// # Panics
    ///
    /// Panics if rate is not in range 0.0..=1.0.
    #[must_use]
    pub fn with_first_line_fail_rate(mut self, rate: f64) -> Self {
        assert!((0.0..=1.0).contains(&rate), "rate must be in 0.0..=1.0");
        self.first_line_fail_rate = rate;
        self
    }

    /// Caps the bytes returned per read.
    ///
    /// # Panics
    ///
    /// Panics if `max_read_bytes` is zero.
    #[must_use]
    pub fn with_max_read_bytes(mut self, max_read_bytes: u32) -> Self {
        assert!(max_read_bytes > 0, "max_read_bytes must be positive");
        self.max_read_bytes = Some(max_read_bytes);
        self
    }
}

// -----------------------------------------------------------------------------
// SimulatedFs
// -----------------------------------------------------------------------------

/// In-memory simulated filesystem for deterministic testing.
///
/// Directories are implicit: a file's directory is its path's parent.
///
/// # Determinism
///
/// Fault injection hashes the seed with an operation counter, so a given seed
/// fails the same operations on every run.
///
/// # Cloning
///
/// Clones share the same files (via `Arc`), so a test can keep a handle and
/// append to files while readers tail them.
#[derive(Debug, Clone)]
pub struct SimulatedFs {
    /// File contents keyed by full path.
    files: Arc<Mutex<BTreeMap<PathBuf, Vec<u8>>>>,
    /// Fault injection configuration.
    fault_config: Arc<Mutex<FsFaultConfig>>,
    /// RNG seed for deterministic fault injection.
    seed: u64,
    /// Operation counter for deterministic RNG.
    counter: Arc<AtomicU64>,
}

impl SimulatedFs {
    /// Creates an empty simulated filesystem with no faults.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self::with_faults(seed, FsFaultConfig::none())
    }

    /// Creates an empty simulated filesystem with fault injection enabled.
    #[must_use]
    pub fn with_faults(seed: u64, config: FsFaultConfig) -> Self {
        Self {
            files: Arc::new(Mutex::new(BTreeMap::new())),
            fault_config: Arc::new(Mutex::new(config)),
            seed,
            counter: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Returns the fault configuration for modification.
    ///
    /// # Panics
    ///
    /// Panics if the mutex is poisoned.
    pub fn fault_config(&self) -> std::sync::MutexGuard<'_, FsFaultConfig> {
        self.fault_config.lock().expect("fault config lock poisoned")
    }

    /// Creates or replaces a file.
    ///
    /// # Panics
    ///
    /// Panics if the mutex is poisoned.
    pub fn write_file(&self, path: &Path, content: impl AsRef<[u8]>) {
        let mut files = self.files.lock().expect("files lock poisoned");
        files.insert(path.to_path_buf(), content.as_ref().to_vec());
    }

    /// Appends bytes to a file, creating it if needed.
    ///
    /// # Panics
    ///
    /// Panics if the mutex is poisoned.
    pub fn append(&self, path: &Path, content: impl AsRef<[u8]>) {
        let mut files = self.files.lock().expect("files lock poisoned");
        files
            .entry(path.to_path_buf())
            .or_default()
            .extend_from_slice(content.as_ref());
    }

    /// Appends `line` plus a newline to a file, creating it if needed.
    pub fn append_line(&self, path: &Path, line: &str) {
        let mut content = Vec::with_capacity(line.len() + 1);
        content.extend_from_slice(line.as_bytes());
        content.push(b'\n');
        self.append(path, content);
    }

    /// Truncates a file to `len` bytes. No-op if the file is missing.
    ///
    /// # Panics
    ///
    /// Panics if the mutex is poisoned.
    pub fn truncate(&self, path: &Path, len: usize) {
        let mut files = self.files.lock().expect("files lock poisoned");
        if let Some(content) = files.get_mut(path) {
            content.truncate(len);
        }
    }

    /// Removes a file. Returns true if it existed.
    ///
    /// # Panics
    ///
    /// Panics if the mutex is poisoned.
    pub fn remove(&self, path: &Path) -> bool {
        let mut files = self.files.lock().expect("files lock poisoned");
        files.remove(path).is_some()
    }

    /// Returns the raw content of a file (bypasses faults).
    ///
    /// # Panics
    ///
    /// Panics if the mutex is poisoned.
    #[must_use]
    pub fn raw_content(&self, path: &Path) -> Option<Vec<u8>> {
        let files = self.files.lock().expect("files lock poisoned");
        files.get(path).cloned()
    }

    /// Returns the number of files (bypasses faults).
    ///
    /// # Panics
    ///
    /// Panics if the mutex is poisoned.
    #[must_use]
    pub fn file_count(&self) -> usize {
        let files = self.files.lock().expect("files lock poisoned");
        files.len()
    }

    /// Deterministic RNG based on seed and counter.
    fn should_inject_fault(&self, rate: f64) -> bool {
        if rate <= 0.0 {
            return false;
        }
        if rate >= 1.0 {
            return true;
        }
        let counter = self.counter.fetch_add(1, Ordering::Relaxed);
        // Hash seed+counter together for proper pseudo-random distribution.
        let hash = self
            .seed
            .wrapping_add(counter)
            .wrapping_mul(0x5851_f42d_4c95_7f2d);
        #[allow(clippy::cast_precision_loss)]
        let normalized = (hash as f64) / (u64::MAX as f64);
        normalized < rate
    }

    /// Consumes a one-shot flag or rolls against a rate.
    fn check_fault(
        &self,
        take_forced: impl FnOnce(&mut FsFaultConfig) -> bool,
        rate: impl FnOnce(&FsFaultConfig) -> f64,
    ) -> Option<&'static str> {
        let mut config = self.fault_config.lock().expect("fault config lock poisoned");
        if take_forced(&mut config) {
            return Some("forced");
        }
        let rate = rate(&config);
        drop(config);
        if self.should_inject_fault(rate) {
            return Some("random");
        }
        None
    }
}

// Allow significant_drop_tightening since this is test-only simulation code.
#[allow(clippy::significant_drop_tightening)]
#[async_trait]
impl StreamFs for SimulatedFs {
    async fn list(&self, dir: &Path) -> FsResult<Vec<String>> {
        if let Some(kind) = self.check_fault(
            |c| std::mem::take(&mut c.force_list_fail),
            |c| c.list_fail_rate,
        ) {
            return Err(FsError::Io {
                operation: "list",
                message: format!("simulated list failure ({kind})"),
            });
        }

        let files = self.files.lock().expect("files lock poisoned");
        let names: Vec<String> = files
            .keys()
            .filter(|path| path.parent() == Some(dir))
            .filter_map(|path| path.file_name())
            .map(|name| name.to_string_lossy().into_owned())
            .collect();
        Ok(names)
    }

    async fn read_range(&self, path: &Path, offset: u64, max_bytes: u32) -> FsResult<Bytes> {
        // TigerStyle: Assert precondition.
        assert!(max_bytes > 0, "max_bytes must be positive");

        if let Some(kind) = self.check_fault(
            |c| std::mem::take(&mut c.force_read_fail),
            |c| c.read_fail_rate,
        ) {
            return Err(FsError::Io {
                operation: "read_range",
                message: format!("simulated read failure ({kind})"),
            });
        }
        let cap = self
            .fault_config
            .lock()
            .expect("fault config lock poisoned")
            .max_read_bytes
            .map_or(max_bytes, |cap| cap.min(max_bytes));

        let files = self.files.lock().expect("files lock poisoned");
        let content = files.get(path).ok_or_else(|| FsError::NotFound {
            path: path.display().to_string(),
        })?;

        let len = content.len() as u64;
        if offset >= len {
            return Ok(Bytes::new());
        }
        #[allow(clippy::cast_possible_truncation)] // offset < len, which is a usize.
        let start = offset as usize;
        let end = content.len().min(start + cap as usize);
        let result = Bytes::copy_from_slice(&content[start..end]);

        // TigerStyle: Assert postcondition.
        assert!(result.len() <= max_bytes as usize);
        Ok(result)
    }

    async fn read_first_line(&self, path: &Path) -> FsResult<Option<String>> {
        if let Some(kind) = self.check_fault(
            |c| std::mem::take(&mut c.force_first_line_fail),
            |c| c.first_line_fail_rate,
        ) {
            return Err(FsError::Io {
                operation: "read_first_line",
                message: format!("simulated read failure ({kind})"),
            });
        }

        let files = self.files.lock().expect("files lock poisoned");
        let Some(content) = files.get(path) else {
            return Ok(None);
        };
        if content.is_empty() {
            return Ok(None);
        }
        let line = content.split(|&b| b == b'\n').next().unwrap_or_default();
        let line = String::from_utf8_lossy(line);
        Ok(Some(line.trim_end_matches('\r').to_string()))
    }

    async fn exists(&self, path: &Path) -> FsResult<bool> {
        let files = self.files.lock().expect("files lock poisoned");
        Ok(files.contains_key(path))
    }
}

// -----------------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------------
