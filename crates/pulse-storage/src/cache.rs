//! Typed single-writer cache over a blob key
//!
//! [`PersistentCacheStore`] keeps the decoded value of one blob in memory
//! and serializes every read-modify-write through an async mutex, so
//! concurrent callers never lose each other's updates.

use std::sync::Arc;

use bytes::Bytes;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::blob::BlobStore;
use crate::error::StorageError;

/// Load state of the in-memory copy
#[derive(Debug)]
enum CacheState<T> {
    /// Not read from the backend yet
    Unloaded,
    Loaded(T),
}

/// A persisted value with atomic read-modify-write
///
/// The backend is read lazily on first access (or eagerly via
/// [`prime`](Self::prime)). A mutation is persisted before it becomes
/// visible in memory; if persisting fails, the in-memory value is
/// unchanged.
pub struct PersistentCacheStore<T> {
    name: String,
    backend: Arc<dyn BlobStore>,
    state: Mutex<CacheState<T>>,
}

impl<T> std::fmt::Debug for PersistentCacheStore<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistentCacheStore")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl<T> PersistentCacheStore<T>
where
    T: Serialize + DeserializeOwned + Default + Clone + Send,
{
    /// Create a cache for the blob stored under `name`
    pub fn new(name: impl Into<String>, backend: Arc<dyn BlobStore>) -> Self {
        Self {
            name: name.into(),
            backend,
            state: Mutex::new(CacheState::Unloaded),
        }
    }

    /// Name of the backing blob
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Load the value from the backend now rather than on first access
    pub async fn prime(&self) -> Result<(), StorageError> {
        let mut state = self.state.lock().await;
        self.ensure_loaded(&mut state).await?;
        Ok(())
    }

    /// Current value
    pub async fn read(&self) -> Result<T, StorageError> {
        self.with_value(T::clone).await
    }

    /// Inspect the current value in place without cloning it
    ///
    /// `inspect` runs while the store is locked, so it sees a value no
    /// mutation can interleave with. Keep it short.
    pub async fn with_value<R, F>(&self, inspect: F) -> Result<R, StorageError>
    where
        F: FnOnce(&T) -> R,
    {
        let mut state = self.state.lock().await;
        let value = self.ensure_loaded(&mut state).await?;
        Ok(inspect(value))
    }

    /// Atomically transform the value and persist the result
    ///
    /// `transform` runs on a working copy while the store is locked. If it
    /// returns an error, nothing is persisted and the error is returned.
    pub async fn mutate<R, F>(&self, transform: F) -> Result<R, StorageError>
    where
        F: FnOnce(&mut T) -> Result<R, StorageError>,
    {
        let mut state = self.state.lock().await;
        let mut working = self.ensure_loaded(&mut state).await?.clone();

        let result = transform(&mut working)?;

        let encoded =
            postcard::to_allocvec(&working).map_err(|e| StorageError::serialization(e.to_string()))?;
        self.backend.save(&self.name, Bytes::from(encoded)).await?;

        *state = CacheState::Loaded(working);
        Ok(result)
    }

    async fn ensure_loaded<'a>(
        &self,
        state: &'a mut CacheState<T>,
    ) -> Result<&'a mut T, StorageError> {
        if let CacheState::Unloaded = state {
            let value = match self.backend.load(&self.name).await? {
                Some(bytes) => {
                    let value = postcard::from_bytes::<T>(&bytes)?;
                    info!(store = %self.name, len = bytes.len(), "Loaded persisted cache");
                    value
                }
                None => {
                    debug!(store = %self.name, "No persisted cache, starting fresh");
                    T::default()
                }
            };
            *state = CacheState::Loaded(value);
        }

        match state {
            CacheState::Loaded(value) => Ok(value),
            CacheState::Unloaded => Err(StorageError::io(format!(
                "cache {} failed to load",
                self.name
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob::InMemoryBlobStore;

    fn cache(backend: Arc<InMemoryBlobStore>) -> PersistentCacheStore<Vec<u32>> {
        PersistentCacheStore::new("numbers", backend)
    }

    #[tokio::test]
    async fn test_mutate_persists_and_reloads() {
        let backend = Arc::new(InMemoryBlobStore::new());
        let store = cache(backend.clone());

        let len = store
            .mutate(|v| {
                v.push(1);
                v.push(2);
                Ok(v.len())
            })
            .await
            .unwrap();
        assert_eq!(len, 2);

        let reopened = cache(backend);
        assert_eq!(reopened.read().await.unwrap(), vec![1, 2]);
    }

    #[tokio::test]
    async fn test_with_value_sees_latest_mutation() {
        let backend = Arc::new(InMemoryBlobStore::new());
        let store = cache(backend.clone());
        assert_eq!(store.with_value(|v| v.len()).await.unwrap(), 0);

        store.mutate(|v| Ok(v.extend([7, 8, 9]))).await.unwrap();
        assert_eq!(store.with_value(|v| v.first().copied()).await.unwrap(), Some(7));

        // Lazily loads a persisted blob on first inspection
        let reopened = cache(backend);
        assert_eq!(reopened.with_value(|v| v.iter().sum::<u32>()).await.unwrap(), 24);
    }

    #[tokio::test]
    async fn test_failed_transform_changes_nothing() {
        let backend = Arc::new(InMemoryBlobStore::new());
        let store = cache(backend.clone());
        store.mutate(|v| Ok(v.push(1))).await.unwrap();

        let result: Result<(), _> = store
            .mutate(|v| {
                v.push(2);
                Err(StorageError::CapacityExhausted { capacity: 1 })
            })
            .await;

        assert!(matches!(result, Err(StorageError::CapacityExhausted { .. })));
        assert_eq!(store.read().await.unwrap(), vec![1]);
    }

    #[tokio::test]
    async fn test_failed_write_keeps_memory_unchanged() {
        let backend = Arc::new(InMemoryBlobStore::new());
        let store = cache(backend.clone());
        store.mutate(|v| Ok(v.push(1))).await.unwrap();

        backend.set_fail_writes(true);
        assert!(store.mutate(|v| Ok(v.push(2))).await.is_err());
        assert_eq!(store.read().await.unwrap(), vec![1]);
    }

    #[tokio::test]
    async fn test_corrupted_blob_is_reported() {
        let backend = Arc::new(InMemoryBlobStore::new());
        backend
            .save("numbers", Bytes::from_static(&[0xff, 0xff, 0xff]))
            .await
            .unwrap();
        let store = cache(backend.clone());

        assert!(matches!(store.prime().await, Err(StorageError::Deserialization(_))));
        // The corrupted blob is left for inspection
        assert!(backend.load("numbers").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_concurrent_mutations_are_serialized() {
        let backend = Arc::new(InMemoryBlobStore::new());
        let store = Arc::new(cache(backend));

        let mut handles = Vec::new();
        for i in 0..50u32 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.mutate(|v| Ok(v.push(i))).await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(store.read().await.unwrap().len(), 50);
    }
}
