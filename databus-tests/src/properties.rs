//! Delivery properties and their checkers.
//!
//! Every scenario reduces to the same question: for each partition, did the
//! consumer deliver exactly the records written after its start position,
//! in file-then-line order?

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use bytes::Bytes;
use databus_core::{PartitionId, QueueEntry};

use crate::workload::WrittenRecord;

// ============================================================================
// Delivered Records
// ============================================================================

/// A record as the consumer delivered it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivered {
    /// Partition that emitted the record.
    pub partition: PartitionId,
    /// File named by the entry checkpoint.
    pub file: String,
    /// Line number named by the entry checkpoint.
    pub line_num: u64,
    /// Decoded payload.
    pub payload: Bytes,
}

impl From<QueueEntry> for Delivered {
    fn from(entry: QueueEntry) -> Self {
        Self {
            file: entry.checkpoint.file_name().unwrap_or_default().to_string(),
            line_num: entry.checkpoint.line_num(),
            partition: entry.partition_id,
            payload: entry.message.into_data(),
        }
    }
}

// ============================================================================
// Violations
// ============================================================================

/// A broken delivery property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryViolation {
    /// The same position was delivered twice.
    Duplicate {
        /// Partition.
        partition: PartitionId,
        /// File.
        file: String,
        /// Line number.
        line_num: u64,
    },
    /// A position went backwards within a partition.
    OutOfOrder {
        /// Partition.
        partition: PartitionId,
        /// Position delivered first.
        previous: (String, u64),
        /// Position delivered after it.
        next: (String, u64),
    },
    /// A delivered position was never written (or was before the start).
    Unexpected {
        /// Partition.
        partition: PartitionId,
        /// File.
        file: String,
        /// Line number.
        line_num: u64,
    },
    /// A written position was never delivered.
    Missing {
        /// Partition.
        partition: PartitionId,
        /// File.
        file: String,
        /// Line number.
        line_num: u64,
    },
    /// The payload at a position differs from what was written.
    PayloadMismatch {
        /// Partition.
        partition: PartitionId,
        /// File.
        file: String,
        /// Line number.
        line_num: u64,
    },
}

impl fmt::Display for DeliveryViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Duplicate {
                partition,
                file,
                line_num,
            } => write!(f, "{partition}: duplicate {file}:{line_num}"),
            Self::OutOfOrder {
                partition,
                previous,
                next,
            } => write!(
                f,
                "{partition}: {}:{} delivered after {}:{}",
                next.0, next.1, previous.0, previous.1
            ),
            Self::Unexpected {
                partition,
                file,
                line_num,
            } => write!(f, "{partition}: unexpected {file}:{line_num}"),
            Self::Missing {
                partition,
                file,
                line_num,
            } => write!(f, "{partition}: missing {file}:{line_num}"),
            Self::PayloadMismatch {
                partition,
                file,
                line_num,
            } => write!(f, "{partition}: payload mismatch at {file}:{line_num}"),
        }
    }
}

// ============================================================================
// Checkers
// ============================================================================

/// Checks deliveries against the records expected per partition.
///
/// `delivered` must be in receive order. Partitions present in `delivered`
/// but absent from `expected` are reported as unexpected.
#[must_use]
pub fn check_delivery(
    expected: &BTreeMap<PartitionId, Vec<WrittenRecord>>,
    delivered: &[Delivered],
) -> Vec<DeliveryViolation> {
    let mut violations = Vec::new();
    let mut by_partition: BTreeMap<&PartitionId, Vec<&Delivered>> = BTreeMap::new();
    for record in delivered {
        by_partition.entry(&record.partition).or_default().push(record);
    }

    let empty = Vec::new();
    let partitions: BTreeSet<&PartitionId> =
        expected.keys().chain(by_partition.keys().copied()).collect();

    for partition in partitions {
        let want: BTreeMap<(&str, u64), &Bytes> = expected
            .get(partition)
            .unwrap_or(&empty)
            .iter()
            .map(|r| ((r.file.as_str(), r.line_num), &r.payload))
            .collect();
        let got = by_partition.get(partition).map_or(&[][..], Vec::as_slice);

        let mut seen: BTreeSet<(&str, u64)> = BTreeSet::new();
        let mut previous: Option<(&str, u64)> = None;
        for record in got {
            let position = (record.file.as_str(), record.line_num);

            if !seen.insert(position) {
                violations.push(DeliveryViolation::Duplicate {
                    partition: partition.clone(),
                    file: record.file.clone(),
                    line_num: record.line_num,
                });
                continue;
            }
            if let Some(prev) = previous {
                if position < prev {
                    violations.push(DeliveryViolation::OutOfOrder {
                        partition: partition.clone(),
                        previous: (prev.0.to_string(), prev.1),
                        next: (record.file.clone(), record.line_num),
                    });
                }
            }
            previous = Some(position);

            match want.get(&position) {
                None => violations.push(DeliveryViolation::Unexpected {
                    partition: partition.clone(),
                    file: record.file.clone(),
                    line_num: record.line_num,
                }),
                Some(payload) if **payload != record.payload => {
                    violations.push(DeliveryViolation::PayloadMismatch {
                        partition: partition.clone(),
                        file: record.file.clone(),
                        line_num: record.line_num,
                    });
                }
                Some(_) => {}
            }
        }

        for (file, line_num) in want.keys() {
            if !seen.contains(&(*file, *line_num)) {
                violations.push(DeliveryViolation::Missing {
                    partition: partition.clone(),
                    file: (*file).to_string(),
                    line_num: *line_num,
                });
            }
        }
    }
    violations
}

/// Panics with every violation listed, if there are any.
///
/// # Panics
///
/// Panics if `violations` is not empty.
pub fn assert_no_violations(context: &str, violations: &[DeliveryViolation]) {
    if violations.is_empty() {
        return;
    }
    let listed: Vec<String> = violations.iter().map(ToString::to_string).collect();
    panic!(
        "{context}: {} delivery violations:\n  {}",
        violations.len(),
        listed.join("\n  ")
    );
}
