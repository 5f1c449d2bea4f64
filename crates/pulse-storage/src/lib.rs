//! # Pulse Storage
//!
//! Storage abstractions for the Pulse telemetry pipeline.
//!
//! This crate provides the durable, capacity-bounded buffers that hold
//! telemetry while the device cannot upload it.
//!
//! ## Features
//!
//! - **BlobStore trait**: Pluggable backend holding one encoded blob per store
//! - **InMemoryBlobStore / FileBlobStore**: Test and production backends
//! - **PersistentCacheStore**: Typed value with serialized read-modify-write
//! - **EvictionPolicy**: Capacity plus tier-ordered victim selection
//! - **BoundedLogStore**: Ordered log sequence that never exceeds its capacity
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use pulse_core::{DocumentLog, DocumentContext};
//! use pulse_storage::{BoundedLogStore, EvictionPolicy, InMemoryBlobStore};
//!
//! #[tokio::main]
//! async fn main() {
//!     let store = BoundedLogStore::new(
//!         "documents",
//!         Arc::new(InMemoryBlobStore::new()),
//!         EvictionPolicy::oldest_first(2),
//!     );
//!
//!     for t in 1..=3 {
//!         let doc = DocumentLog::new(t, DocumentContext::new("survey"), None);
//!         store.append(doc).await.unwrap();
//!     }
//!
//!     // The oldest document was evicted
//!     assert_eq!(store.len().await.unwrap(), 2);
//! }
//! ```

pub mod blob;
pub mod bounded;
pub mod cache;
pub mod error;
pub mod eviction;

// Re-exports
pub use blob::{BlobStore, FileBlobStore, InMemoryBlobStore};
pub use bounded::{AppendOutcome, BoundedLogStore};
pub use cache::PersistentCacheStore;
pub use error::StorageError;
pub use eviction::{EvictionPolicy, TierPredicate};
