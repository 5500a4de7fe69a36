//! Filesystem-based checkpoint provider.
//!
//! Each key is stored as one file, `{base_path}/{key}.ck`. Writes go to a temp
//! file first and are renamed into place, so a crash mid-write leaves the
//! previous checkpoint intact.

use std::path::PathBuf;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::AsyncWriteExt;

use crate::error::{CheckpointError, CheckpointResult};
use crate::storage::CheckpointProvider;

/// Extension of checkpoint files.
const CHECKPOINT_EXTENSION: &str = "ck";

// -----------------------------------------------------------------------------
// Configuration
// -----------------------------------------------------------------------------

/// Configuration for [`FileCheckpointProvider`].
#[derive(Debug, Clone)]
pub struct FileCheckpointConfig {
    /// Directory holding the checkpoint files.
    pub base_path: PathBuf,

    /// Whether to call fsync after writes for durability.
    ///
    /// Default: `true` for safety. Set to `false` for faster tests.
    pub sync_on_write: bool,
}

impl FileCheckpointConfig {
    /// Creates a new configuration with the given base path.
    #[must_use]
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
            sync_on_write: true,
        }
    }

    /// Creates a configuration optimized for testing (no fsync).
    #[must_use]
    pub fn for_testing(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
            sync_on_write: false,
        }
    }
}

// -----------------------------------------------------------------------------
// FileCheckpointProvider
// -----------------------------------------------------------------------------

/// Checkpoint provider backed by one file per key.
#[derive(Debug, Clone)]
pub struct FileCheckpointProvider {
    config: FileCheckpointConfig,
}

impl FileCheckpointProvider {
    /// Creates the provider, creating the base directory if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if directory creation fails.
    ///
    /// # Panics
    ///
    /// Panics if `base_path` is empty.
    pub async fn new(config: FileCheckpointConfig) -> CheckpointResult<Self> {
        assert!(
            !config.base_path.as_os_str().is_empty(),
            "base_path must not be empty"
        );

        tokio::fs::create_dir_all(&config.base_path)
            .await
            .map_err(|e| CheckpointError::Io {
                operation: "create_base_dir",
                message: format!(
                    "failed to create checkpoint directory '{}': {e}",
                    config.base_path.display()
                ),
            })?;

        Ok(Self { config })
    }

    /// Returns the file path for a key.
    fn key_path(&self, key: &str) -> CheckpointResult<PathBuf> {
        assert!(!key.is_empty(), "key must not be empty");
        if key.contains(['/', '\\']) || key == "." || key == ".." {
            return Err(CheckpointError::Io {
                operation: "resolve_key",
                message: format!("checkpoint key '{key}' is not a valid file name"),
            });
        }
        Ok(self
            .config
            .base_path
            .join(format!("{key}.{CHECKPOINT_EXTENSION}")))
    }
}

#[async_trait]
impl CheckpointProvider for FileCheckpointProvider {
    async fn read(&self, key: &str) -> CheckpointResult<Option<Bytes>> {
        let path = self.key_path(key)?;

        match tokio::fs::read(&path).await {
            Ok(data) => Ok(Some(Bytes::from(data))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(CheckpointError::Io {
                operation: "read",
                message: format!("failed to read '{}': {e}", path.display()),
            }),
        }
    }

    async fn write(&self, key: &str, value: Bytes) -> CheckpointResult<()> {
        let path = self.key_path(key)?;

        // Write to temp file first, then rename for atomicity.
        let temp_path = path.with_extension("tmp");

        let write_result = async {
            let mut file =
                tokio::fs::File::create(&temp_path)
                    .await
                    .map_err(|e| CheckpointError::Io {
                        operation: "write",
                        message: format!("failed to create temp file: {e}"),
                    })?;

            file.write_all(&value)
                .await
                .map_err(|e| CheckpointError::Io {
                    operation: "write",
                    message: format!("failed to write data: {e}"),
                })?;

            if self.config.sync_on_write {
                file.sync_all().await.map_err(|e| CheckpointError::Io {
                    operation: "write",
                    message: format!("failed to sync file: {e}"),
                })?;
            }

            Ok::<(), CheckpointError>(())
        }
        .await;

        // Clean up temp file on error.
        if let Err(e) = write_result {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(e);
        }

        // Atomic rename.
        tokio::fs::rename(&temp_path, &path)
            .await
            .map_err(|e| CheckpointError::Io {
                operation: "write",
                message: format!("failed to rename temp file: {e}"),
            })?;

        Ok(())
    }

    async fn delete(&self, key: &str) -> CheckpointResult<()> {
        let path = self.key_path(key)?;

        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            // Idempotent: deleting non-existent key succeeds.
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CheckpointError::Io {
                operation: "delete",
                message: format!("failed to delete '{}': {e}", path.display()),
            }),
        }
    }
}

// -----------------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn create_test_provider() -> (FileCheckpointProvider, TempDir) {
        let temp_dir = TempDir::new().expect("create temp dir");
        let config = FileCheckpointConfig::for_testing(temp_dir.path().join("checkpoints"));
        let provider = FileCheckpointProvider::new(config)
            .await
            .expect("create provider");
        (provider, temp_dir)
    }

    #[tokio::test]
    async fn test_missing_key_reads_none() {
        let (provider, _temp) = create_test_provider().await;
        assert_eq!(provider.read("consumer").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_write_overwrites() {
        let (provider, temp) = create_test_provider().await;

        provider
            .write("consumer", Bytes::from_static(b"first"))
            .await
            .unwrap();
        provider
            .write("consumer", Bytes::from_static(b"second"))
            .await
            .unwrap();

        assert_eq!(
            provider.read("consumer").await.unwrap(),
            Some(Bytes::from_static(b"second"))
        );
        // No temp file left behind.
        assert!(!temp.path().join("checkpoints/consumer.tmp").exists());
        assert!(temp.path().join("checkpoints/consumer.ck").exists());
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let (provider, _temp) = create_test_provider().await;

        provider
            .write("consumer", Bytes::from_static(b"x"))
            .await
            .unwrap();
        provider.delete("consumer").await.unwrap();
        provider.delete("consumer").await.unwrap();
        assert_eq!(provider.read("consumer").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_values_survive_new_provider() {
        let temp_dir = TempDir::new().expect("create temp dir");
        let config = FileCheckpointConfig::for_testing(temp_dir.path());

        let provider = FileCheckpointProvider::new(config.clone()).await.unwrap();
        provider
            .write("consumer", Bytes::from_static(b"durable"))
            .await
            .unwrap();
        drop(provider);

        let provider = FileCheckpointProvider::new(config).await.unwrap();
        assert_eq!(
            provider.read("consumer").await.unwrap(),
            Some(Bytes::from_static(b"durable"))
        );
    }

    #[tokio::test]
    async fn test_rejects_path_like_keys() {
        let (provider, _temp) = create_test_provider().await;
        let result = provider.read("../escape").await;
        assert!(matches!(result, Err(CheckpointError::Io { .. })));
    }
}
