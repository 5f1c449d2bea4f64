//! Configuration for the telemetry pipeline

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use pulse_core::AppIconification;
use pulse_storage::{BlobStore, FileBlobStore, InMemoryBlobStore};
use serde::{Deserialize, Serialize};

use crate::error::{TelemetryError, TelemetryResult};

/// Default capacity of the analytics event store
pub const DEFAULT_EVENT_LOG_CAPACITY: usize = 5000;
/// Default capacity of the performance metric store
pub const DEFAULT_METRIC_LOG_CAPACITY: usize = 2500;
/// Default capacity of the document sync store
pub const DEFAULT_DOCUMENT_LOG_CAPACITY: usize = 5000;

/// Configuration for a telemetry pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Maximum buffered analytics events
    pub event_log_capacity: usize,
    /// Maximum buffered performance metrics
    pub metric_log_capacity: usize,
    /// Maximum buffered sync documents
    pub document_log_capacity: usize,
    /// CPU sampling period while the app is visible
    pub foreground_cpu_period: Duration,
    /// CPU sampling period while the app is hidden
    pub background_cpu_period: Duration,
    /// How long to wait for a first lifecycle signal before assuming background
    pub initial_iconification_cutoff: Duration,
    /// Iconification the CPU snapshotter starts in
    pub initial_iconification: AppIconification,
    /// Whether performance metrics are collected at all
    pub enable_performance_metrics_collection: bool,
    /// Directory for persisted stores; `None` keeps everything in memory
    pub storage_dir: Option<PathBuf>,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            event_log_capacity: DEFAULT_EVENT_LOG_CAPACITY,
            metric_log_capacity: DEFAULT_METRIC_LOG_CAPACITY,
            document_log_capacity: DEFAULT_DOCUMENT_LOG_CAPACITY,
            foreground_cpu_period: Duration::from_secs(5 * 60),
            background_cpu_period: Duration::from_secs(60 * 60),
            initial_iconification_cutoff: Duration::from_secs(60),
            initial_iconification: AppIconification::Uninitialized,
            enable_performance_metrics_collection: true,
            storage_dir: None,
        }
    }
}

impl TelemetryConfig {
    /// Configuration persisting stores under `storage_dir`
    pub fn with_storage_dir(storage_dir: impl Into<PathBuf>) -> Self {
        Self {
            storage_dir: Some(storage_dir.into()),
            ..Self::default()
        }
    }

    /// Set the analytics event store capacity
    pub fn with_event_log_capacity(mut self, capacity: usize) -> Self {
        self.event_log_capacity = capacity;
        self
    }

    /// Set the performance metric store capacity
    pub fn with_metric_log_capacity(mut self, capacity: usize) -> Self {
        self.metric_log_capacity = capacity;
        self
    }

    /// Set the document sync store capacity
    pub fn with_document_log_capacity(mut self, capacity: usize) -> Self {
        self.document_log_capacity = capacity;
        self
    }

    /// Set the foreground and background CPU sampling periods
    pub fn with_cpu_periods(mut self, foreground: Duration, background: Duration) -> Self {
        self.foreground_cpu_period = foreground;
        self.background_cpu_period = background;
        self
    }

    pub fn with_initial_iconification_cutoff(mut self, cutoff: Duration) -> Self {
        self.initial_iconification_cutoff = cutoff;
        self
    }

    pub fn with_initial_iconification(mut self, iconification: AppIconification) -> Self {
        self.initial_iconification = iconification;
        self
    }

    /// Enable or disable performance metric collection
    pub fn with_performance_metrics_collection(mut self, enabled: bool) -> Self {
        self.enable_performance_metrics_collection = enabled;
        self
    }

    /// Reject configurations that can never buffer or sample anything
    pub fn validate(&self) -> TelemetryResult<()> {
        let capacities = [
            ("event_log_capacity", self.event_log_capacity),
            ("metric_log_capacity", self.metric_log_capacity),
            ("document_log_capacity", self.document_log_capacity),
        ];
        for (name, capacity) in capacities {
            if capacity == 0 {
                return Err(TelemetryError::Config(format!("{} must be greater than 0", name)));
            }
        }

        let periods = [
            ("foreground_cpu_period", self.foreground_cpu_period),
            ("background_cpu_period", self.background_cpu_period),
            ("initial_iconification_cutoff", self.initial_iconification_cutoff),
        ];
        for (name, period) in periods {
            if period.is_zero() {
                return Err(TelemetryError::Config(format!("{} must be non-zero", name)));
            }
        }

        Ok(())
    }

    /// Open the blob backend selected by `storage_dir`
    pub async fn open_backend(&self) -> TelemetryResult<Arc<dyn BlobStore>> {
        match &self.storage_dir {
            Some(dir) => Ok(Arc::new(FileBlobStore::new(dir).await?)),
            None => Ok(Arc::new(InMemoryBlobStore::new())),
        }
    }
}
