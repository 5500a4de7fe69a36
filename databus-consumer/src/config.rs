//! Client configuration loaded from TOML.
//!
//! Consumers are configured with flat dotted keys
//! (`databus.consumer.rootdirs = "/a,/b"`). The same keys may also be written
//! as nested tables; both forms flatten to the same map.

use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;

use crate::error::{ConsumerError, ConsumerResult};

/// Configuration keys understood by the consumer.
pub mod keys {
    /// Comma-separated list of root directories (required).
    pub const ROOT_DIRS: &str = "databus.consumer.rootdirs";
    /// Comma-separated cluster names, one per root.
    pub const CLUSTER_NAMES: &str = "databus.consumer.clustersname";
    /// Stream name (required).
    pub const STREAM: &str = "databus.consumer.stream";
    /// Collector name (required).
    pub const COLLECTOR: &str = "databus.consumer.collector";
    /// Consumer name; also the checkpoint key.
    pub const CONSUMER_NAME: &str = "databus.consumer.name";
    /// Directory of the file checkpoint provider.
    pub const CHECKPOINT_DIR: &str = "databus.consumer.checkpoint.dir";
    /// Idle sleep between reader ticks, in milliseconds.
    pub const IDLE_RETRY_MS: &str = "databus.consumer.idle.retry.ms";
    /// Capacity of the output queue.
    pub const QUEUE_SIZE: &str = "databus.consumer.queue.size";
    /// Decode failure policy: `skip` or `halt`.
    pub const DECODE_POLICY: &str = "databus.consumer.decode.policy";
    /// Longest line a reader buffers, in bytes.
    pub const MAX_LINE_BYTES: &str = "databus.consumer.max.line.bytes";
}

/// Flat string key/value configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientConfig {
    values: BTreeMap<String, String>,
}

impl ClientConfig {
    /// Creates an empty configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a configuration file.
    ///
    /// # Errors
    ///
    /// Returns `Config` if the file cannot be read or is not valid TOML.
    pub fn load(path: &Path) -> ConsumerResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            ConsumerError::config(format!("cannot read {}: {e}", path.display()))
        })?;
        text.parse()
    }

    /// Builder: set a key.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    /// Sets a key, replacing any previous value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    /// Returns the raw value of a key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Returns the trimmed value of a key, or `None` if absent or blank.
    #[must_use]
    pub fn get_string(&self, key: &str) -> Option<&str> {
        self.get(key).map(str::trim).filter(|v| !v.is_empty())
    }

    /// Returns the value of a required key.
    ///
    /// # Errors
    ///
    /// Returns `Config` if the key is absent or blank.
    pub fn require(&self, key: &str) -> ConsumerResult<&str> {
        self.get_string(key)
            .ok_or_else(|| ConsumerError::config(format!("missing key {key}")))
    }

    /// Returns a comma-separated list with blank entries removed.
    #[must_use]
    pub fn get_list(&self, key: &str) -> Option<Vec<String>> {
        self.get_string(key).map(|v| {
            v.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(ToString::to_string)
                .collect()
        })
    }

    /// Returns an unsigned integer value.
    ///
    /// # Errors
    ///
    /// Returns `Config` if the value is present but not a number.
    pub fn get_u64(&self, key: &str) -> ConsumerResult<Option<u64>> {
        self.get_string(key)
            .map(|v| {
                v.parse::<u64>().map_err(|e| {
                    ConsumerError::config(format!("invalid value for {key}: {v:?} ({e})"))
                })
            })
            .transpose()
    }

    /// Returns the number of keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if no keys are set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl FromStr for ClientConfig {
    type Err = ConsumerError;

    fn from_str(text: &str) -> ConsumerResult<Self> {
        let table: toml::Table = toml::from_str(text)
            .map_err(|e| ConsumerError::config(format!("invalid TOML: {e}")))?;
        let mut config = Self::new();
        flatten("", &table, &mut config.values);
        Ok(config)
    }
}

fn flatten(prefix: &str, table: &toml::Table, out: &mut BTreeMap<String, String>) {
    for (key, value) in table {
        let key = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        match value {
            toml::Value::Table(nested) => flatten(&key, nested, out),
            other => {
                out.insert(key, render(other));
            }
        }
    }
}

fn render(value: &toml::Value) -> String {
    match value {
        toml::Value::String(s) => s.clone(),
        toml::Value::Array(items) => items.iter().map(render).collect::<Vec<_>>().join(","),
        other => other.to_string(),
    }
}
