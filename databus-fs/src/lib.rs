//! Databus FS - Filesystem abstraction for tailing collector directories.
//!
//! Readers never talk to a concrete filesystem. They go through the
//! [`StreamFs`] trait, an append-aware hierarchical byte store with just the
//! operations tailing needs: list a directory, read a byte range, read the
//! first line of a small file, and check existence.
//!
//! # Design Principles (`TigerStyle`)
//!
//! - **Deterministic testing**: [`SimulatedFs`] enables fault injection
//! - **Explicit limits**: Reads are bounded by a caller-supplied byte count
//! - **Assertions**: Pre/post-conditions on the simulated backend
//! - **No unsafe code**: Safety > Performance
//!
//! # Backends
//!
//! - [`SimulatedFs`]: In-memory files with fault injection for DST
//! - [`LocalFs`]: Local filesystem through `tokio::fs`
//!
//! # Layout
//!
//! [`CollectorDir`] knows the `root/<stream>/<collector>/` layout: which names
//! are data files, where the `<stream>_current` marker lives, and which file
//! follows a given one.
//!
//! # Example
//!
//! ```ignore
//! use databus_fs::{CollectorDir, SimulatedFs, StreamFs};
//!
//! let fs = SimulatedFs::new(42);
//! let dir = CollectorDir::new("/data", "clicks", "collector1");
//! fs.append_line(&dir.file_path("f1"), "aGVsbG8=");
//! fs.write_file(&dir.marker_path(), "f1\n");
//!
//! let files = dir.list_data_files(&fs).await?;
//! assert_eq!(files, vec!["f1".to_string()]);
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod collector;
mod error;
mod filesystem;
mod storage;

pub use collector::CollectorDir;
pub use error::{FsError, FsResult};
pub use filesystem::LocalFs;
pub use storage::{FsFaultConfig, SimulatedFs, StreamFs};
