//! Blob backends for persisted stores
//!
//! A blob backend maps a store name to the latest encoded snapshot of that
//! store. [`InMemoryBlobStore`] is suitable for tests and simulation;
//! [`FileBlobStore`] keeps one file per key and replaces it atomically.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::{debug, trace};

use crate::error::StorageError;

/// Key-value backend holding one encoded blob per store
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Load the blob stored under `key`, if any
    async fn load(&self, key: &str) -> Result<Option<Bytes>, StorageError>;

    /// Replace the blob stored under `key`
    ///
    /// # Errors
    ///
    /// Returns an error if the blob could not be durably written. The
    /// previous blob is left intact in that case.
    async fn save(&self, key: &str, value: Bytes) -> Result<(), StorageError>;

    /// Delete the blob stored under `key`; deleting a missing key is a no-op
    async fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// In-memory blob backend
///
/// Writes can be made to fail on demand to exercise persistence-failure
/// handling.
#[derive(Debug, Default)]
pub struct InMemoryBlobStore {
    blobs: DashMap<String, Bytes>,
    fail_writes: AtomicBool,
}

impl InMemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `save` fail with an I/O error
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of keys with a stored blob
    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
    async fn load(&self, key: &str) -> Result<Option<Bytes>, StorageError> {
        Ok(self.blobs.get(key).map(|blob| blob.clone()))
    }

    async fn save(&self, key: &str, value: Bytes) -> Result<(), StorageError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::io(format!("write to {key} rejected")));
        }
        trace!(key, len = value.len(), "Saving blob");
        self.blobs.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.blobs.remove(key);
        Ok(())
    }
}

/// File-backed blob backend
///
/// Each key is stored as `<key>.cache` in the storage directory. Saves
/// write a temporary file and rename it over the old one.
#[derive(Debug)]
pub struct FileBlobStore {
    storage_path: PathBuf,
}

impl FileBlobStore {
    /// Open (creating if needed) a blob directory
    pub async fn new(storage_path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let storage_path = storage_path.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&storage_path).await?;
        debug!(path = ?storage_path, "Opened blob directory");
        Ok(Self { storage_path })
    }

    fn blob_path(&self, key: &str) -> PathBuf {
        self.storage_path.join(format!("{key}.cache"))
    }

    fn temp_path(&self, key: &str) -> PathBuf {
        self.storage_path.join(format!("{key}.cache.tmp"))
    }
}

#[async_trait]
impl BlobStore for FileBlobStore {
    async fn load(&self, key: &str) -> Result<Option<Bytes>, StorageError> {
        let path = self.blob_path(key);
        match tokio::fs::read(&path).await {
            Ok(data) => {
                trace!(path = ?path, len = data.len(), "Loaded blob");
                Ok(Some(Bytes::from(data)))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, key: &str, value: Bytes) -> Result<(), StorageError> {
        let path = self.blob_path(key);
        let temp_path = self.temp_path(key);

        {
            let mut file = File::create(&temp_path).await?;
            file.write_all(&value).await?;
            file.sync_all().await?;
        }

        tokio::fs::rename(&temp_path, &path).await?;
        trace!(path = ?path, len = value.len(), "Saved blob");
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        match tokio::fs::remove_file(self.blob_path(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
