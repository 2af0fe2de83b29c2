//! Blob storage abstraction.
//!
//! File bytes live behind the `BlobStorage` trait so the workflow code never
//! touches the filesystem directly. The default backend writes to a local
//! directory; an object-store backend would implement the same four
//! operations.

use std::path::PathBuf;

use async_trait::async_trait;

/// Errors that can occur in blob storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// No blob exists at the given location.
    #[error("blob not found: {0}")]
    NotFound(String),

    /// Underlying I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Byte-stream storage used by the file workflow.
///
/// `write` returns an opaque location handle; the other operations take that
/// handle back. Callers persist the handle on the file record and must not
/// interpret it.
#[async_trait]
pub trait BlobStorage: Send + Sync {
    /// Store a blob under a generated storage key and return its location
    /// handle.
    async fn write(&self, storage_key: &str, bytes: &[u8]) -> Result<String>;

    /// Read the blob at a location handle.
    async fn read(&self, location: &str) -> Result<Vec<u8>>;

    /// Delete the blob at a location handle.
    async fn delete(&self, location: &str) -> Result<()>;

    /// Whether a blob still exists at a location handle.
    async fn exists(&self, location: &str) -> bool;
}

/// Local-filesystem blob storage rooted at a single directory.
pub struct LocalDiskStorage {
    root: PathBuf,
}

impl LocalDiskStorage {
    /// Create a storage backend rooted at `root`. The directory is created
    /// lazily on first write.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl BlobStorage for LocalDiskStorage {
    async fn write(&self, storage_key: &str, bytes: &[u8]) -> Result<String> {
        tokio::fs::create_dir_all(&self.root).await?;

        let path = self.root.join(storage_key);
        tokio::fs::write(&path, bytes).await?;

        Ok(path.to_string_lossy().into_owned())
    }

    async fn read(&self, location: &str) -> Result<Vec<u8>> {
        match tokio::fs::read(location).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(location.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, location: &str) -> Result<()> {
        match tokio::fs::remove_file(location).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(location.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn exists(&self, location: &str) -> bool {
        tokio::fs::try_exists(location).await.unwrap_or(false)
    }
}
