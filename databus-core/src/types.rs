//! Partition identity and read-position types.
//!
//! Following `TigerStyle`: explicit types prevent bugs from mixing up a
//! cluster name with a file name, and both types are immutable values.

use std::fmt;

use serde::{Deserialize, Serialize};

// -----------------------------------------------------------------------------
// PartitionId
// -----------------------------------------------------------------------------

/// Identity of one logical partition: a cluster plus an optional collector.
///
/// Used as a map key for checkpoints, so it is hashable and totally ordered
/// (cluster first, then collector, with `None` before any collector). Two ids
/// are equal iff both fields match.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PartitionId {
    cluster: String,
    collector: Option<String>,
}

impl PartitionId {
    /// Creates a partition id.
    ///
    /// # Panics
    ///
    /// Panics if `cluster` is empty.
    #[must_use]
    pub fn new(cluster: impl Into<String>, collector: Option<String>) -> Self {
        let cluster = cluster.into();
        assert!(!cluster.is_empty(), "cluster name must not be empty");
        Self { cluster, collector }
    }

    /// Creates a partition id for a cluster and collector.
    #[must_use]
    pub fn with_collector(cluster: impl Into<String>, collector: impl Into<String>) -> Self {
        Self::new(cluster, Some(collector.into()))
    }

    /// Returns the cluster name.
    #[must_use]
    pub fn cluster(&self) -> &str {
        &self.cluster
    }

    /// Returns the collector name, if any.
    #[must_use]
    pub fn collector(&self) -> Option<&str> {
        self.collector.as_deref()
    }

    /// Returns a copy of this id under a different cluster name.
    #[must_use]
    pub fn renamed(&self, cluster: impl Into<String>) -> Self {
        Self::new(cluster, self.collector.clone())
    }
}

impl fmt::Debug for PartitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "partition({self})")
    }
}

impl fmt::Display for PartitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.collector {
            Some(collector) => write!(f, "{}/{collector}", self.cluster),
            None => write!(f, "{}", self.cluster),
        }
    }
}

// -----------------------------------------------------------------------------
// PartitionCheckpoint
// -----------------------------------------------------------------------------

/// Last successfully delivered position within a partition.
///
/// `file_name = None` means no progress yet: start from the earliest file.
/// `line_num` counts fully consumed lines of `file_name`; a reader resumes
/// strictly after that many lines. No byte offset is stored - it is rebuilt
/// by re-scanning line boundaries from the start of the file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct PartitionCheckpoint {
    file_name: Option<String>,
    line_num: u64,
}

impl PartitionCheckpoint {
    /// Creates a checkpoint after `line_num` lines of `file_name`.
    ///
    /// # Panics
    ///
    /// Panics if `file_name` is empty.
    #[must_use]
    pub fn new(file_name: impl Into<String>, line_num: u64) -> Self {
        let file_name = file_name.into();
        assert!(!file_name.is_empty(), "file name must not be empty");
        Self {
            file_name: Some(file_name),
            line_num,
        }
    }

    /// Creates the "no progress yet" checkpoint.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            file_name: None,
            line_num: 0,
        }
    }

    /// Returns the checkpointed file name.
    #[must_use]
    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }

    /// Returns the number of fully consumed lines in the file.
    #[must_use]
    pub const fn line_num(&self) -> u64 {
        self.line_num
    }

    /// Returns true if no progress has been recorded.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.file_name.is_none()
    }
}

impl fmt::Display for PartitionCheckpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.file_name {
            Some(name) => write!(f, "{name}:{}", self.line_num),
            None => write!(f, "<start>"),
        }
    }
}
