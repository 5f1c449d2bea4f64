//! Collaborator traits for the telemetry pipeline
//!
//! These traits describe the platform services the pipeline consumes.
//! Production builds wire real implementations; tests use the fakes in
//! [`crate::mock`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::{AuthError, UploadError};
use crate::metric::{MemoryTier, StorageTier};
use crate::snapshot::CpuSnapshot;
use crate::status::{AppIconification, ConnectionStatus};

/// A log entry that can be buffered in a bounded store
///
/// Eviction breaks ties inside a priority tier by age, so every buffered
/// record exposes its creation time.
pub trait LogRecord {
    /// Creation time in milliseconds since the Unix epoch
    fn timestamp_millis(&self) -> i64;
}

/// Wall-clock time abstraction for testability
pub trait Clock: Send + Sync {
    /// Get the current UTC datetime
    fn now_utc(&self) -> DateTime<Utc>;

    /// Current time in milliseconds since the Unix epoch
    fn current_time_millis(&self) -> i64 {
        self.now_utc().timestamp_millis()
    }
}

/// Real clock implementation using system time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Reports the device's current connection status
pub trait ConnectivityProvider: Send + Sync {
    fn current_status(&self) -> ConnectionStatus;
}

/// Outbound network logger for one kind of log
///
/// The pipeline uses one uploader per store: analytics events, performance
/// metrics and cloud-sync documents.
#[async_trait]
pub trait LogUploader<T: Send + Sync>: Send + Sync {
    /// Send a single log to the remote endpoint
    ///
    /// # Errors
    ///
    /// Returns an error if the log did not reach the endpoint. The caller
    /// keeps the log cached in that case.
    async fn send(&self, log: &T) -> Result<(), UploadError>;
}

/// Raw OS metrics consumed by the performance pipeline
pub trait RawMetricsAssessor: Send + Sync {
    /// Size of the installed application package in bytes
    fn apk_size_bytes(&self) -> u64;

    /// Storage used by the application in bytes
    fn used_storage_bytes(&self) -> u64;

    /// Proportional set size of the process in bytes
    fn total_pss_bytes(&self) -> u64;

    /// Bytes received by the application since boot
    fn total_received_bytes(&self) -> u64;

    /// Bytes sent by the application since boot
    fn total_sent_bytes(&self) -> u64;

    fn storage_tier(&self) -> StorageTier;

    fn memory_tier(&self) -> MemoryTier;

    /// Take a CPU/time baseline tagged with the current iconification
    fn compute_cpu_snapshot(&self, iconification: AppIconification) -> CpuSnapshot;

    /// Relative CPU usage between two baselines
    ///
    /// Returns `None` when the interval carries no usable measurement.
    fn relative_cpu_usage(&self, older: &CpuSnapshot, newer: &CpuSnapshot) -> Option<f64> {
        newer.relative_usage_since(older)
    }
}

/// Authenticated session required before cloud-sync uploads
#[async_trait]
pub trait AuthSession: Send + Sync {
    /// The signed-in user id, if a session exists
    fn current_user(&self) -> Option<String>;

    /// Start an anonymous session and return its user id
    async fn sign_in_anonymously(&self) -> Result<String, AuthError>;
}

/// Out-of-process exception reporting sink
pub trait ExceptionReporter: Send + Sync {
    fn report(&self, error: &(dyn std::error::Error + Send + Sync));
}

/// Exception reporter that drops every report
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopExceptionReporter;

impl ExceptionReporter for NoopExceptionReporter {
    fn report(&self, _error: &(dyn std::error::Error + Send + Sync)) {}
}
