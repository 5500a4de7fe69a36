//! Collector directory layout.
//!
//! A collector directory is `root/<stream>/<collector>/`. It holds data files
//! whose names sort chronologically, a `<stream>_current` marker naming the
//! file still being written, and a `scribe_stats` file that is never consumed.

use std::path::{Path, PathBuf};

use databus_core::layout;
use tracing::trace;

use crate::error::FsResult;
use crate::storage::StreamFs;

/// One collector directory on some [`StreamFs`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectorDir {
    path: PathBuf,
    marker_name: String,
}

impl CollectorDir {
    /// Creates the collector directory `root/<stream>/<collector>`.
    ///
    /// # Panics
    ///
    /// Panics if `stream` or `collector` is empty.
    #[must_use]
    pub fn new(root: impl AsRef<Path>, stream: &str, collector: &str) -> Self {
        assert!(!stream.is_empty(), "stream name must not be empty");
        assert!(!collector.is_empty(), "collector name must not be empty");

        Self {
            path: root.as_ref().join(stream).join(collector),
            marker_name: layout::current_file_name(stream),
        }
    }

    /// Returns the directory path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the full path of a file in this directory.
    #[must_use]
    pub fn file_path(&self, name: &str) -> PathBuf {
        self.path.join(name)
    }

    /// Returns the full path of the `<stream>_current` marker.
    #[must_use]
    pub fn marker_path(&self) -> PathBuf {
        self.path.join(&self.marker_name)
    }

    /// Lists consumable data files in ascending name order.
    ///
    /// # Errors
    ///
    /// Returns an error if the listing fails.
    pub async fn list_data_files<F: StreamFs + ?Sized>(&self, fs: &F) -> FsResult<Vec<String>> {
        let mut names: Vec<String> = fs
            .list(&self.path)
            .await?
            .into_iter()
            .filter(|name| layout::is_data_file(name))
            .collect();
        names.sort();
        names.dedup();
        trace!(dir = %self.path.display(), files = names.len(), "Listed collector directory");
        Ok(names)
    }

    /// Reads the name of the file currently being written.
    ///
    /// Returns `None` if the marker is missing, empty or blank.
    ///
    /// # Errors
    ///
    /// Returns an error if the marker exists but cannot be read.
    pub async fn current_file<F: StreamFs + ?Sized>(&self, fs: &F) -> FsResult<Option<String>> {
        let line = fs.read_first_line(&self.marker_path()).await?;
        Ok(line
            .map(|line| line.trim().to_string())
            .filter(|name| !name.is_empty()))
    }

    /// Returns the file that follows `current` in a sorted listing.
    ///
    /// If `current` is listed, its immediate successor. If it is not (the
    /// file vanished), the first name sorting after it. `None` if nothing
    /// follows.
    #[must_use]
    pub fn next_file<'a>(names: &'a [String], current: &str) -> Option<&'a str> {
        debug_assert!(names.windows(2).all(|w| w[0] < w[1]), "names must be sorted");

        let index = match names.binary_search_by(|name| name.as_str().cmp(current)) {
            Ok(index) => index + 1,
            Err(index) => index,
        };
        names.get(index).map(String::as_str)
    }
}
