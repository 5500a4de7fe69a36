//! Local filesystem backend.
//!
//! Reads collector directories straight off a mounted filesystem using
//! `tokio::fs`. Used by the `databus-tail` binary and by integration tests
//! that write real files into a temp directory.

use std::io::SeekFrom;
use std::path::Path;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncSeekExt, BufReader};

use crate::error::{FsError, FsResult};
use crate::storage::StreamFs;

// -----------------------------------------------------------------------------
// LocalFs
// -----------------------------------------------------------------------------

/// [`StreamFs`] over the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFs;

impl LocalFs {
    /// Creates a local filesystem backend.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

/// Maps an I/O error, keeping `NotFound` distinct.
fn map_io_error(operation: &'static str, path: &Path, e: &std::io::Error) -> FsError {
    if e.kind() == std::io::ErrorKind::NotFound {
        FsError::NotFound {
            path: path.display().to_string(),
        }
    } else {
        FsError::Io {
            operation,
            message: format!("'{}': {e}", path.display()),
        }
    }
}

#[async_trait]
impl StreamFs for LocalFs {
    async fn list(&self, dir: &Path) -> FsResult<Vec<String>> {
        let mut entries = match tokio::fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(map_io_error("list", dir, &e)),
        };

        let mut names = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| map_io_error("list", dir, &e))?
        {
            let file_type = entry
                .file_type()
                .await
                .map_err(|e| map_io_error("list", &entry.path(), &e))?;
            if file_type.is_file() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        Ok(names)
    }

    async fn read_range(&self, path: &Path, offset: u64, max_bytes: u32) -> FsResult<Bytes> {
        assert!(max_bytes > 0, "max_bytes must be positive");

        let mut file = tokio::fs::File::open(path)
            .await
            .map_err(|e| map_io_error("open", path, &e))?;
        let len = file
            .metadata()
            .await
            .map_err(|e| map_io_error("metadata", path, &e))?
            .len();
        if offset >= len {
            return Ok(Bytes::new());
        }

        file.seek(SeekFrom::Start(offset))
            .await
            .map_err(|e| map_io_error("seek", path, &e))?;
        let mut buf = Vec::with_capacity(max_bytes as usize);
        file.take(u64::from(max_bytes))
            .read_to_end(&mut buf)
            .await
            .map_err(|e| map_io_error("read_range", path, &e))?;

        debug_assert!(buf.len() <= max_bytes as usize);
        Ok(Bytes::from(buf))
    }

    async fn read_first_line(&self, path: &Path) -> FsResult<Option<String>> {
        let file = match tokio::fs::File::open(path).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(map_io_error("read_first_line", path, &e)),
        };

        let mut line = String::new();
        let read = BufReader::new(file)
            .read_line(&mut line)
            .await
            .map_err(|e| map_io_error("read_first_line", path, &e))?;
        if read == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim_end_matches(['\n', '\r']).to_string()))
    }

    async fn exists(&self, path: &Path) -> FsResult<bool> {
        match tokio::fs::metadata(path).await {
            Ok(metadata) => Ok(metadata.is_file()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(map_io_error("exists", path, &e)),
        }
    }
}

// -----------------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------------
