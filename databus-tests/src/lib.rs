//! Databus Tests - Scenario and deterministic simulation tests.
//!
//! Unit tests live inline in each crate. This crate holds the tests that
//! span crates: a writer that produces collector directories the way the
//! upstream collectors do, delivery property checkers, and the scenarios
//! built from them.
//!
//! ## Test Organization
//!
//! **DST Tests** (`*_dst.rs`): Deterministic simulation with fault injection
//! - `reader_dst`: Flaky `SimulatedFs` under a single reader, many seeds
//! - `consumer_dst`: Multi-root consumer with flaky filesystems and restarts
//!
//! **Integration Tests** (`*_tests.rs`): Multi-component scenarios
//! - `reader_tests`: Rotation, resume and skip properties of one partition
//! - `consumer_tests`: Orchestrator start/stop, checkpoint and migration
//! - `local_fs_tests`: The same scenarios against `LocalFs` in a temp dir
//!
//! **Support Modules**:
//! - `workload`: `CollectorWriter` producing data files and the marker
//! - `properties`: Delivery checks (no gaps, no duplicates, order)
//! - `scenarios`: Seeds and reusable layouts
//!
//! ## Naming Conventions
//!
//! - DST tests: `test_dst_<component>_<scenario>`
//! - Integration tests: `test_<component>_<scenario>`

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod properties;
pub mod scenarios;
pub mod workload;

// DST test modules (deterministic simulation with fault injection).
#[cfg(test)]
mod consumer_dst;
#[cfg(test)]
mod reader_dst;

#[cfg(test)]
mod local_fs_tests;
