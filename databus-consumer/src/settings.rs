//! Validated consumer settings.

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use databus_core::layout::default_cluster_name;
use databus_core::Limits;
use databus_reader::{DecodeFailurePolicy, ReaderConfig};

use crate::config::{keys, ClientConfig};
use crate::error::{ConsumerError, ConsumerResult};

/// Default consumer name, used as the checkpoint key.
pub const DEFAULT_CONSUMER_NAME: &str = "databus-consumer";

/// Default checkpoint directory of the file provider.
pub const DEFAULT_CHECKPOINT_DIR: &str = "checkpoints";

/// Settings of one consumer instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumerSettings {
    /// Root directories, one partition each.
    pub root_dirs: Vec<PathBuf>,
    /// Cluster name overrides, one per root.
    pub cluster_names: Option<Vec<String>>,
    /// Stream name.
    pub stream: String,
    /// Collector name.
    pub collector: String,
    /// Consumer name; the checkpoint key.
    pub consumer_name: String,
    /// Directory of the file checkpoint provider.
    pub checkpoint_dir: PathBuf,
    /// Capacity of the output queue.
    pub queue_capacity: u32,
    /// Per-reader configuration.
    pub reader: ReaderConfig,
}

impl ConsumerSettings {
    /// Creates settings with default limits.
    #[must_use]
    pub fn new(
        root_dirs: Vec<PathBuf>,
        stream: impl Into<String>,
        collector: impl Into<String>,
    ) -> Self {
        let limits = Limits::new();
        Self {
            root_dirs,
            cluster_names: None,
            stream: stream.into(),
            collector: collector.into(),
            consumer_name: DEFAULT_CONSUMER_NAME.to_string(),
            checkpoint_dir: PathBuf::from(DEFAULT_CHECKPOINT_DIR),
            queue_capacity: limits.default_queue_capacity,
            reader: ReaderConfig::from_limits(&limits),
        }
    }

    /// Creates settings for fast tests (small reads, short sleeps).
    #[must_use]
    pub fn for_testing(
        root_dirs: Vec<PathBuf>,
        stream: impl Into<String>,
        collector: impl Into<String>,
    ) -> Self {
        let mut settings = Self::new(root_dirs, stream, collector);
        settings.reader = ReaderConfig::for_testing();
        settings.queue_capacity = 64;
        settings
    }

    /// Builder: set the cluster name overrides.
    #[must_use]
    pub fn with_cluster_names(mut self, names: Vec<String>) -> Self {
        self.cluster_names = Some(names);
        self
    }

    /// Builder: set the consumer name.
    #[must_use]
    pub fn with_consumer_name(mut self, name: impl Into<String>) -> Self {
        self.consumer_name = name.into();
        self
    }

    /// Builder: set the queue capacity.
    #[must_use]
    pub const fn with_queue_capacity(mut self, capacity: u32) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Builder: set the reader configuration.
    #[must_use]
    pub const fn with_reader(mut self, reader: ReaderConfig) -> Self {
        self.reader = reader;
        self
    }

    /// Builds settings from a client configuration.
    ///
    /// # Errors
    ///
    /// Returns `Config` for missing or malformed keys and `Limit` for values
    /// outside `limits`.
    pub fn from_client_config(config: &ClientConfig, limits: &Limits) -> ConsumerResult<Self> {
        let root_dirs: Vec<PathBuf> = config
            .get_list(keys::ROOT_DIRS)
            .filter(|roots| !roots.is_empty())
            .ok_or_else(|| ConsumerError::config(format!("missing key {}", keys::ROOT_DIRS)))?
            .into_iter()
            .map(PathBuf::from)
            .collect();
        limits.check_root_count(root_dirs.len())?;

        let stream = config.require(keys::STREAM)?.to_string();
        let collector = config.require(keys::COLLECTOR)?.to_string();
        let consumer_name = config
            .get_string(keys::CONSUMER_NAME)
            .unwrap_or(DEFAULT_CONSUMER_NAME)
            .to_string();
        let checkpoint_dir = PathBuf::from(
            config
                .get_string(keys::CHECKPOINT_DIR)
                .unwrap_or(DEFAULT_CHECKPOINT_DIR),
        );

        let idle_retry_ms = match config.get_u64(keys::IDLE_RETRY_MS)? {
            Some(ms) => limits.check_idle_retry_ms(ms)?,
            None => limits.default_idle_retry_ms,
        };
        let queue_capacity = match config.get_u64(keys::QUEUE_SIZE)? {
            Some(capacity) => limits.check_queue_capacity(capacity)?,
            None => limits.default_queue_capacity,
        };
        let max_line_bytes = match config.get_u64(keys::MAX_LINE_BYTES)? {
            Some(bytes) => limits.check_max_line_bytes(bytes)?,
            None => limits.max_line_bytes,
        };
        let decode_policy = match config.get_string(keys::DECODE_POLICY) {
            Some(name) => DecodeFailurePolicy::parse(name).ok_or_else(|| {
                ConsumerError::config(format!(
                    "invalid value for {}: {name:?} (expected skip or halt)",
                    keys::DECODE_POLICY
                ))
            })?,
            None => DecodeFailurePolicy::default(),
        };

        Ok(Self {
            root_dirs,
            cluster_names: config.get_list(keys::CLUSTER_NAMES),
            stream,
            collector,
            consumer_name,
            checkpoint_dir,
            queue_capacity,
            reader: ReaderConfig::from_limits(limits)
                .with_idle_retry(Duration::from_millis(idle_retry_ms))
                .with_max_line_bytes(max_line_bytes)
                .with_decode_policy(decode_policy),
        })
    }

    /// Returns the default cluster names (`hadoopcluster0..n`).
    #[must_use]
    pub fn default_cluster_names(&self) -> Vec<String> {
        (0..self.root_dirs.len()).map(default_cluster_name).collect()
    }

    /// Returns the cluster name of every root.
    ///
    /// # Errors
    ///
    /// Returns `InvariantViolation` if the override list length differs from
    /// the root count or names a cluster twice, and `Config` for a blank name.
    pub fn resolve_cluster_names(&self) -> ConsumerResult<Vec<String>> {
        let Some(names) = &self.cluster_names else {
            return Ok(self.default_cluster_names());
        };

        if names.len() != self.root_dirs.len() {
            return Err(ConsumerError::InvariantViolation {
                message: format!(
                    "{} cluster names for {} root directories",
                    names.len(),
                    self.root_dirs.len()
                ),
            });
        }

        let mut seen = HashSet::with_capacity(names.len());
        for name in names {
            if name.trim().is_empty() {
                return Err(ConsumerError::config("blank cluster name"));
            }
            if !seen.insert(name.as_str()) {
                return Err(ConsumerError::InvariantViolation {
                    message: format!("cluster name {name} is used by more than one root"),
                });
            }
        }
        Ok(names.clone())
    }
}
