//! Databus consumer.
//!
//! Consumes one stream/collector across several root directories, one
//! partition reader per root, and persists positions through a
//! [`databus_checkpoint::CheckpointStore`].
//!
//! Partition identities default to `hadoopcluster<i>` for the i-th root. When
//! cluster names are configured, stored positions are migrated from the
//! default identities to the configured ones before any reader starts.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod consumer;
mod error;
mod settings;

pub use config::{keys, ClientConfig};
pub use consumer::{ConsumerPhase, DatabusConsumer};
pub use error::{ConsumerError, ConsumerResult};
pub use settings::{ConsumerSettings, DEFAULT_CHECKPOINT_DIR, DEFAULT_CONSUMER_NAME};
