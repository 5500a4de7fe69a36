//! Checkpoint provider abstraction.
//!
//! Provides the `CheckpointProvider` trait, the durable key-value store that
//! checkpoints are persisted to, and `SimulatedCheckpointProvider` for
//! deterministic simulation testing.

#![allow(clippy::significant_drop_tightening)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::{CheckpointError, CheckpointResult};

// -----------------------------------------------------------------------------
// Checkpoint Provider Trait
// -----------------------------------------------------------------------------

/// Durable key-value store for checkpoint payloads.
///
/// Keys are consumer names; values are opaque bytes. A write must be durable
/// when it returns.
#[async_trait]
pub trait CheckpointProvider: Send + Sync {
    /// Reads the value stored under `key`.
    ///
    /// Returns `None` if the key has never been written or was deleted.
    async fn read(&self, key: &str) -> CheckpointResult<Option<Bytes>>;

    /// Replaces the value stored under `key`.
    async fn write(&self, key: &str, value: Bytes) -> CheckpointResult<()>;

    /// Deletes `key`.
    ///
    /// No-op if the key doesn't exist.
    async fn delete(&self, key: &str) -> CheckpointResult<()>;
}

// -----------------------------------------------------------------------------
// Fault Configuration
// -----------------------------------------------------------------------------

/// Fault configuration for simulated checkpoint provider.
#[derive(Debug, Clone, Default)]
pub struct CheckpointFaultConfig {
    /// Probability of read operations failing (0.0 - 1.0).
    pub read_fail_rate: f64,
    /// Probability of write operations failing (0.0 - 1.0).
    pub write_fail_rate: f64,
    /// Probability of delete operations failing (0.0 - 1.0).
    pub delete_fail_rate: f64,
    /// Force next read to fail (one-shot).
    pub force_read_fail: bool,
    /// Force next write to fail (one-shot).
    pub force_write_fail: bool,
}

impl CheckpointFaultConfig {
    /// No faults (all operations succeed).
    #[must_use]
    pub const fn none() -> Self {
        Self {
            read_fail_rate: 0.0,
            write_fail_rate: 0.0,
            delete_fail_rate: 0.0,
            force_read_fail: false,
            force_write_fail: false,
        }
    }

    /// Flaky configuration for stress testing.
    #[must_use]
    pub const fn flaky() -> Self {
        Self {
            read_fail_rate: 0.05,
            write_fail_rate: 0.05,
            delete_fail_rate: 0.02,
            force_read_fail: false,
            force_write_fail: false,
        }
    }

    /// Builder: set read fail rate.
    #[must_use]
    pub const fn with_read_fail_rate(mut self, rate: f64) -> Self {
        self.read_fail_rate = rate;
        self
    }

    /// Builder: set write fail rate.
    #[must_use]
    pub const fn with_write_fail_rate(mut self, rate: f64) -> Self {
        self.write_fail_rate = rate;
        self
    }

    /// Builder: set delete fail rate.
    #[must_use]
    pub const fn with_delete_fail_rate(mut self, rate: f64) -> Self {
        self.delete_fail_rate = rate;
        self
    }
}

// -----------------------------------------------------------------------------
// Simulated Checkpoint Provider
// -----------------------------------------------------------------------------

/// In-memory simulated checkpoint provider for DST.
///
/// Clones share state via `Arc`, so a test can hand one clone to a consumer,
/// drop the consumer, and start a new one against the same values.
#[derive(Debug, Clone)]
pub struct SimulatedCheckpointProvider {
    /// Stored values.
    values: Arc<Mutex<HashMap<String, Bytes>>>,
    /// Fault configuration.
    fault_config: Arc<Mutex<CheckpointFaultConfig>>,
    /// RNG seed for deterministic faults.
    seed: u64,
    /// Operation counter for deterministic RNG.
    counter: Arc<AtomicU64>,
}

impl SimulatedCheckpointProvider {
    /// Creates a new simulated provider with no faults.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self::with_faults(seed, CheckpointFaultConfig::none())
    }

    /// Creates a simulated provider with fault injection.
    #[must_use]
    pub fn with_faults(seed: u64, config: CheckpointFaultConfig) -> Self {
        Self {
            values: Arc::new(Mutex::new(HashMap::new())),
            fault_config: Arc::new(Mutex::new(config)),
            seed,
            counter: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Returns fault config for modification.
    ///
    /// # Panics
    ///
    /// Panics if the mutex is poisoned.
    pub fn fault_config(&self) -> std::sync::MutexGuard<'_, CheckpointFaultConfig> {
        self.fault_config.lock().expect("fault config lock poisoned")
    }

    /// Deterministic RNG using the `(seed + counter) * M` formula.
    fn should_inject_fault(&self, rate: f64) -> bool {
        if rate <= 0.0 {
            return false;
        }
        if rate >= 1.0 {
            return true;
        }
        let counter = self.counter.fetch_add(1, Ordering::Relaxed);
        let hash = self
            .seed
            .wrapping_add(counter)
            .wrapping_mul(0x9e37_79b9_7f4a_7c15);
        #[allow(clippy::cast_precision_loss)]
        let normalized = (hash as f64) / (u64::MAX as f64);
        normalized < rate
    }

    /// Returns the raw value under `key` (bypasses faults, for assertions in tests).
    ///
    /// # Panics
    ///
    /// Panics if the mutex is poisoned.
    #[must_use]
    pub fn raw_value(&self, key: &str) -> Option<Bytes> {
        let values = self.values.lock().expect("values lock poisoned");
        values.get(key).cloned()
    }

    /// Stores a raw value (bypasses faults, for seeding tests).
    ///
    /// # Panics
    ///
    /// Panics if the mutex is poisoned.
    pub fn put_raw(&self, key: &str, value: impl Into<Bytes>) {
        let mut values = self.values.lock().expect("values lock poisoned");
        values.insert(key.to_string(), value.into());
    }

    /// Returns key count (bypasses faults, for assertions in tests).
    ///
    /// # Panics
    ///
    /// Panics if the mutex is poisoned.
    #[must_use]
    pub fn key_count(&self) -> usize {
        let values = self.values.lock().expect("values lock poisoned");
        values.len()
    }
}

#[async_trait]
impl CheckpointProvider for SimulatedCheckpointProvider {
    async fn read(&self, key: &str) -> CheckpointResult<Option<Bytes>> {
        assert!(!key.is_empty(), "key must not be empty");

        // Check for forced failure.
        {
            let mut config = self.fault_config.lock().expect("lock poisoned");
            if config.force_read_fail {
                config.force_read_fail = false;
                return Err(CheckpointError::Io {
                    operation: "read",
                    message: "simulated failure (forced)".into(),
                });
            }
        }

        // Check for probabilistic failure.
        let read_fail_rate = self.fault_config.lock().expect("lock").read_fail_rate;
        if self.should_inject_fault(read_fail_rate) {
            return Err(CheckpointError::Io {
                operation: "read",
                message: "simulated failure (random)".into(),
            });
        }

        let values = self.values.lock().expect("values lock poisoned");
        Ok(values.get(key).cloned())
    }

    async fn write(&self, key: &str, value: Bytes) -> CheckpointResult<()> {
        // TigerStyle: Assert precondition.
        assert!(!key.is_empty(), "key must not be empty");

        // Check for forced failure.
        {
            let mut config = self.fault_config.lock().expect("lock poisoned");
            if config.force_write_fail {
                config.force_write_fail = false;
                return Err(CheckpointError::Io {
                    operation: "write",
                    message: "simulated failure (forced)".into(),
                });
            }
        }

        // Check for probabilistic failure.
        let write_fail_rate = self.fault_config.lock().expect("lock").write_fail_rate;
        if self.should_inject_fault(write_fail_rate) {
            return Err(CheckpointError::Io {
                operation: "write",
                message: "simulated failure (random)".into(),
            });
        }

        let mut values = self.values.lock().expect("values lock poisoned");
        values.insert(key.to_string(), value);

        // TigerStyle: Assert postcondition.
        assert!(values.contains_key(key));
        Ok(())
    }

    async fn delete(&self, key: &str) -> CheckpointResult<()> {
        assert!(!key.is_empty(), "key must not be empty");

        // Check for probabilistic failure.
        let delete_fail_rate = self.fault_config.lock().expect("lock").delete_fail_rate;
        if self.should_inject_fault(delete_fail_rate) {
            return Err(CheckpointError::Io {
                operation: "delete",
                message: "simulated failure (random)".into(),
            });
        }

        let mut values = self.values.lock().expect("values lock poisoned");
        values.remove(key);
        Ok(())
    }
}

// -----------------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------------
