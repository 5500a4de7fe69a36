//! Decoded records and the entries readers hand to the consumer.
//!
//! A [`Message`] is the opaque payload decoded from one line of a data file.
//! A [`QueueEntry`] pairs it with the partition it came from and the position
//! *after* it, so the consumer can persist progress once the message has been
//! handled.

use bytes::Bytes;

use crate::types::{PartitionCheckpoint, PartitionId};

/// An opaque message payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    data: Bytes,
}

impl Message {
    /// Creates a message from raw bytes.
    #[must_use]
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self { data: data.into() }
    }

    /// Returns the payload.
    #[must_use]
    pub const fn data(&self) -> &Bytes {
        &self.data
    }

    /// Consumes the message and returns the payload.
    #[must_use]
    pub fn into_data(self) -> Bytes {
        self.data
    }

    /// Returns the payload size in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true if the payload is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// One decoded record on its way from a partition reader to the consumer.
///
/// Ownership moves into the queue at enqueue time; each entry is consumed
/// exactly once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueEntry {
    /// The decoded payload.
    pub message: Message,
    /// Partition the record was read from.
    pub partition_id: PartitionId,
    /// Position after this record.
    pub checkpoint: PartitionCheckpoint,
}

impl QueueEntry {
    /// Creates a queue entry.
    ///
    /// # Panics
    ///
    /// Panics if the checkpoint is empty or at line zero; a record always
    /// advances the position past at least one line.
    #[must_use]
    pub fn new(message: Message, partition_id: PartitionId, checkpoint: PartitionCheckpoint) -> Self {
        assert!(
            !checkpoint.is_empty() && checkpoint.line_num() > 0,
            "entry checkpoint must point past a line"
        );
        Self {
            message,
            partition_id,
            checkpoint,
        }
    }
}
