//! Error types for pulse-storage
//!
//! This module defines the error types used throughout the storage crate.

use thiserror::Error;

/// Errors that can occur in storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    /// I/O error during storage operations
    #[error("I/O error: {0}")]
    Io(String),

    /// No eviction victim exists, so the store cannot make room
    ///
    /// Raised for a zero-capacity store, or when no buffered entry belongs
    /// to any evictable tier. The new entry is not inserted.
    #[error("Storage capacity exhausted: no eviction victim in store of capacity {capacity}")]
    CapacityExhausted { capacity: usize },

    /// Index-based removal outside the buffered range
    #[error("Index {index} out of bounds for store of length {len}")]
    IndexOutOfBounds { index: usize, len: usize },

    /// Error during serialization
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Error during deserialization
    #[error("Deserialization error: {0}")]
    Deserialization(String),
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::Io(err.to_string())
    }
}

impl StorageError {
    /// Create a new Serialization error
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization(message.into())
    }

    /// Create a new Deserialization error
    pub fn deserialization(message: impl Into<String>) -> Self {
        Self::Deserialization(message.into())
    }

    /// Create a new I/O error
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io(message.into())
    }
}

/// Convert from postcard Error to StorageError
impl From<postcard::Error> for StorageError {
    fn from(err: postcard::Error) -> Self {
        StorageError::Deserialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capacity_exhausted_error() {
        let err = StorageError::CapacityExhausted { capacity: 0 };
        assert!(matches!(err, StorageError::CapacityExhausted { capacity: 0 }));
        assert!(err.to_string().contains("capacity 0"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let storage_err: StorageError = io_err.into();
        assert!(matches!(storage_err, StorageError::Io(_)));
    }

    #[test]
    fn test_index_out_of_bounds_display() {
        let err = StorageError::IndexOutOfBounds { index: 3, len: 2 };
        assert_eq!(err.to_string(), "Index 3 out of bounds for store of length 2");
    }
}
