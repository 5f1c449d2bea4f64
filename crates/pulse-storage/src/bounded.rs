//! Capacity-bounded log store
//!
//! [`BoundedLogStore`] is an ordered, persisted sequence of log entries
//! with a hard capacity. New entries always go to the tail; when the store
//! is full, the [`EvictionPolicy`] picks one victim to drop first. Surviving
//! entries keep their relative order, so the head is always the oldest
//! arrival still buffered.

use std::sync::Arc;

use pulse_core::LogRecord;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, trace, warn};

use crate::blob::BlobStore;
use crate::cache::PersistentCacheStore;
use crate::error::StorageError;
use crate::eviction::EvictionPolicy;

/// Result of a successful append
#[derive(Debug, Clone, PartialEq)]
pub enum AppendOutcome<E> {
    /// The entry was added without evicting anything
    Appended,
    /// The entry was added after evicting these entries
    Evicted(Vec<E>),
}

impl<E> AppendOutcome<E> {
    /// Entries dropped to make room
    pub fn evicted(&self) -> &[E] {
        match self {
            AppendOutcome::Appended => &[],
            AppendOutcome::Evicted(evicted) => evicted,
        }
    }
}

/// An ordered, capacity-bounded, persisted log sequence
///
/// All mutations are serialized by the underlying
/// [`PersistentCacheStore`], so append, evict and remove operations on one
/// store are totally ordered.
#[derive(Debug)]
pub struct BoundedLogStore<E> {
    cache: PersistentCacheStore<Vec<E>>,
    policy: EvictionPolicy<E>,
}

impl<E> BoundedLogStore<E>
where
    E: LogRecord + Serialize + DeserializeOwned + Clone + Send + Sync,
{
    /// Create a store persisted under `name`
    pub fn new(name: impl Into<String>, backend: Arc<dyn BlobStore>, policy: EvictionPolicy<E>) -> Self {
        Self {
            cache: PersistentCacheStore::new(name, backend),
            policy,
        }
    }

    /// Name of the backing blob
    pub fn name(&self) -> &str {
        self.cache.name()
    }

    /// Maximum number of buffered entries
    pub fn capacity(&self) -> usize {
        self.policy.capacity()
    }

    /// Load persisted entries now rather than on first access
    pub async fn prime(&self) -> Result<(), StorageError> {
        self.cache.prime().await
    }

    /// Append an entry, evicting by priority if the store is full
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::CapacityExhausted`] if room is needed but no
    /// victim exists (a zero-capacity store, or no evictable entry). The
    /// store is left unchanged and the entry is not inserted.
    pub async fn append(&self, entry: E) -> Result<AppendOutcome<E>, StorageError> {
        let name = self.name().to_string();
        let policy = &self.policy;

        let outcome = self
            .cache
            .mutate(move |entries| {
                let mut evicted = Vec::new();
                while policy.would_exceed_capacity(entries.len()) {
                    let victim = policy.select_victim(entries).ok_or(
                        StorageError::CapacityExhausted {
                            capacity: policy.capacity(),
                        },
                    )?;
                    evicted.push(entries.remove(victim));
                }
                entries.push(entry);

                if evicted.is_empty() {
                    Ok(AppendOutcome::Appended)
                } else {
                    Ok(AppendOutcome::Evicted(evicted))
                }
            })
            .await;

        match &outcome {
            Ok(AppendOutcome::Appended) => trace!(store = %name, "Appended log entry"),
            Ok(AppendOutcome::Evicted(evicted)) => debug!(
                store = %name,
                evicted = evicted.len(),
                "Evicted log entries to stay within capacity"
            ),
            Err(e) => warn!(store = %name, error = %e, "Failed to append log entry"),
        }

        outcome
    }

    /// All buffered entries, oldest arrival first
    pub async fn read_all(&self) -> Result<Vec<E>, StorageError> {
        self.cache.read().await
    }

    /// Number of buffered entries
    pub async fn len(&self) -> Result<usize, StorageError> {
        self.cache.with_value(Vec::len).await
    }

    /// Whether nothing is buffered
    pub async fn is_empty(&self) -> Result<bool, StorageError> {
        Ok(self.len().await? == 0)
    }

    /// The oldest buffered entry without removing it
    pub async fn peek_head(&self) -> Result<Option<E>, StorageError> {
        self.cache.with_value(|entries| entries.first().cloned()).await
    }

    /// Remove and return the oldest buffered entry
    pub async fn remove_head(&self) -> Result<Option<E>, StorageError> {
        self.cache
            .mutate(|entries| {
                if entries.is_empty() {
                    Ok(None)
                } else {
                    Ok(Some(entries.remove(0)))
                }
            })
            .await
    }

    /// Remove and return the entry at `index`
    pub async fn remove_at(&self, index: usize) -> Result<E, StorageError> {
        self.cache
            .mutate(|entries| {
                if index < entries.len() {
                    Ok(entries.remove(index))
                } else {
                    Err(StorageError::IndexOutOfBounds {
                        index,
                        len: entries.len(),
                    })
                }
            })
            .await
    }

    /// Remove the head only if it still equals `expected`
    ///
    /// Used after uploading a peeked head: if an eviction dropped that
    /// entry in the meantime, nothing else is removed in its place.
    pub async fn remove_head_if_eq(&self, expected: &E) -> Result<bool, StorageError>
    where
        E: PartialEq,
    {
        self.cache
            .mutate(|entries| {
                if entries.first() == Some(expected) {
                    entries.remove(0);
                    Ok(true)
                } else {
                    Ok(false)
                }
            })
            .await
    }

    /// Drop every buffered entry, returning how many were removed
    pub async fn clear(&self) -> Result<usize, StorageError> {
        self.cache
            .mutate(|entries| {
                let count = entries.len();
                entries.clear();
                Ok(count)
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob::InMemoryBlobStore;
    use serde::Deserialize;

    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    enum Tier {
        Optional,
        Essential,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Entry {
        tier: Tier,
        timestamp: i64,
    }

    impl LogRecord for Entry {
        fn timestamp_millis(&self) -> i64 {
            self.timestamp
        }
    }

    fn entry(tier: Tier, timestamp: i64) -> Entry {
        Entry { tier, timestamp }
    }

    fn store(capacity: usize) -> BoundedLogStore<Entry> {
        let policy = EvictionPolicy::new(
            capacity,
            &[
                |e: &Entry| e.tier == Tier::Optional,
                |e: &Entry| e.tier == Tier::Essential,
            ],
        );
        BoundedLogStore::new("entries", Arc::new(InMemoryBlobStore::new()), policy)
    }

    #[tokio::test]
    async fn test_append_within_capacity() {
        let store = store(3);
        for t in 1..=3 {
            let outcome = store.append(entry(Tier::Optional, t)).await.unwrap();
            assert_eq!(outcome, AppendOutcome::Appended);
        }
        assert_eq!(store.len().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_append_evicts_lowest_tier_first() {
        let store = store(2);
        store.append(entry(Tier::Optional, 1)).await.unwrap();
        store.append(entry(Tier::Essential, 2)).await.unwrap();

        let outcome = store.append(entry(Tier::Optional, 3)).await.unwrap();
        assert_eq!(outcome.evicted(), &[entry(Tier::Optional, 1)]);
        assert_eq!(
            store.read_all().await.unwrap(),
            vec![entry(Tier::Essential, 2), entry(Tier::Optional, 3)]
        );
    }

    #[tokio::test]
    async fn test_zero_capacity_rejects_insert() {
        let store = store(0);
        let result = store.append(entry(Tier::Essential, 1)).await;
        assert!(matches!(result, Err(StorageError::CapacityExhausted { capacity: 0 })));
        assert!(store.is_empty().await.unwrap());
    }

    #[tokio::test]
    async fn test_remove_head_and_at() {
        let store = store(5);
        for t in 1..=4 {
            store.append(entry(Tier::Optional, t)).await.unwrap();
        }

        assert_eq!(store.remove_head().await.unwrap(), Some(entry(Tier::Optional, 1)));
        assert_eq!(store.remove_at(1).await.unwrap(), entry(Tier::Optional, 3));
        assert!(matches!(
            store.remove_at(9).await,
            Err(StorageError::IndexOutOfBounds { index: 9, len: 2 })
        ));
        assert_eq!(store.peek_head().await.unwrap(), Some(entry(Tier::Optional, 2)));
    }

    #[tokio::test]
    async fn test_remove_head_if_eq() {
        let store = store(5);
        store.append(entry(Tier::Optional, 1)).await.unwrap();
        store.append(entry(Tier::Optional, 2)).await.unwrap();

        assert!(!store.remove_head_if_eq(&entry(Tier::Optional, 2)).await.unwrap());
        assert!(store.remove_head_if_eq(&entry(Tier::Optional, 1)).await.unwrap());
        assert_eq!(store.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_remove_head_on_empty_store() {
        let store = store(1);
        assert_eq!(store.remove_head().await.unwrap(), None);
        assert_eq!(store.clear().await.unwrap(), 0);
    }
}
