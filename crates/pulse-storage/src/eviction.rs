//! Capacity limits and tier-ordered eviction
//!
//! An [`EvictionPolicy`] pairs a capacity with an ordered list of priority
//! tiers, least important first. When a store is full, the victim is the
//! oldest entry of the least important tier that has any entries.

use std::fmt;

use pulse_core::LogRecord;

/// Membership test for one priority tier
pub type TierPredicate<E> = fn(&E) -> bool;

/// Capacity and victim selection for a bounded store
#[derive(Clone)]
pub struct EvictionPolicy<E> {
    /// Maximum number of buffered entries
    capacity: usize,
    /// Tiers from least to most important
    tiers: Vec<TierPredicate<E>>,
}

impl<E> fmt::Debug for EvictionPolicy<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EvictionPolicy")
            .field("capacity", &self.capacity)
            .field("tiers", &self.tiers.len())
            .finish()
    }
}

impl<E: LogRecord> EvictionPolicy<E> {
    /// Create a policy with tiers ordered from least to most important
    ///
    /// Entries that match none of the tiers are never evicted.
    pub fn new(capacity: usize, tiers: &[TierPredicate<E>]) -> Self {
        Self {
            capacity,
            tiers: tiers.to_vec(),
        }
    }

    /// Insertion-order-only policy: the globally oldest entry is evicted
    pub fn oldest_first(capacity: usize) -> Self {
        Self::new(capacity, &[|_| true])
    }

    /// Get the maximum number of buffered entries
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Get the number of priority tiers
    pub fn tier_count(&self) -> usize {
        self.tiers.len()
    }

    /// Check if adding one entry to a store of `current_len` needs an eviction
    pub fn would_exceed_capacity(&self, current_len: usize) -> bool {
        current_len.saturating_add(1) > self.capacity
    }

    /// Index of the entry to evict, if any
    ///
    /// Walks the tiers from least to most important and returns the oldest
    /// entry of the first non-empty tier. Ties on timestamp go to the entry
    /// that arrived first.
    pub fn select_victim(&self, entries: &[E]) -> Option<usize> {
        self.tiers.iter().find_map(|in_tier| {
            entries
                .iter()
                .enumerate()
                .filter(|(_, entry)| in_tier(entry))
                .min_by_key(|(_, entry)| entry.timestamp_millis())
                .map(|(index, _)| index)
        })
    }
}
