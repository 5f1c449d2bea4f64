//! Error types for the telemetry controllers

use pulse_core::{AuthError, UploadError};
use pulse_storage::StorageError;
use thiserror::Error;

/// Errors surfaced by the telemetry pipeline
///
/// The fire-and-forget `log_*` entry points never return these; they are
/// logged and reported instead. Drain operations and store accessors
/// return them so the caller can decide whether to retry.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// Store persistence or capacity error
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Network upload failed
    #[error("Upload error: {0}")]
    Upload(#[from] UploadError),

    /// Authentication required for document sync failed
    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    /// The device is offline
    #[error("No connectivity")]
    NoConnectivity,

    /// Command queue closed
    #[error("Channel error: {0}")]
    Channel(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type for telemetry operations
pub type TelemetryResult<T> = Result<T, TelemetryError>;
