//! # Pulse Analytics
//!
//! On-device telemetry controllers for the Pulse pipeline.
//!
//! This crate ties the bounded stores from `pulse-storage` to the platform
//! collaborators from `pulse-core`:
//! - [`AnalyticsController`]: analytics events, ESSENTIAL kept over OPTIONAL
//! - [`PerformanceMetricsController`]: metrics stamped with device state,
//!   evicting LOW before MEDIUM before HIGH
//! - [`DocumentSyncController`]: auth-gated cloud documents, oldest evicted first
//! - [`CpuPerformanceSnapshotter`]: actor sampling relative CPU usage per
//!   foreground/background period
//! - [`ApplicationLifecycleObserver`]: owns the foreground flag and drives
//!   the snapshotter
//!
//! Every `log_*`/`upload*` entry point is fire-and-forget: failures are
//! logged with `tracing` and forwarded to the [`pulse_core::ExceptionReporter`],
//! never returned to the caller. The `*_and_wait` drain operations return
//! [`TelemetryResult`] so a drain worker can retry.
//!
//! ## Example
//!
//! ```rust,ignore
//! use pulse_analytics::{Collaborators, TelemetryConfig, TelemetryPipeline};
//! use pulse_core::EventContext;
//!
//! let config = TelemetryConfig::with_storage_dir("./telemetry");
//! let pipeline = TelemetryPipeline::start(config, collaborators).await?;
//!
//! pipeline.lifecycle().on_app_created(process_start_millis);
//! pipeline.lifecycle().on_app_in_foreground().await;
//!
//! pipeline
//!     .analytics()
//!     .log_important_event(EventContext::new("lesson_completed"), None)
//!     .await;
//!
//! // Later, from a drain worker
//! let progress = pipeline.analytics().upload_event_logs_and_wait().await?;
//! ```

pub mod analytics;
pub mod config;
pub mod context;
pub mod cpu;
mod diagnostics;
pub mod documents;
pub mod error;
pub mod lifecycle;
pub mod metrics_logger;
pub mod performance;
pub mod pipeline;
pub mod sync_status;

pub use analytics::{
    AnalyticsController, EVENT_LOG_STORE_NAME, UPLOADED_EVENT_LOG_STORE_NAME, event_eviction_policy,
};
pub use config::TelemetryConfig;
pub use context::PipelineContext;
pub use cpu::{CpuPerformanceSnapshotter, CpuSnapshotterConfig, SnapshotterHandle, SnapshotterState};
pub use documents::{DOCUMENT_LOG_STORE_NAME, DocumentSyncController};
pub use error::{TelemetryError, TelemetryResult};
pub use lifecycle::ApplicationLifecycleObserver;
pub use metrics_logger::PerformanceMetricsLogger;
pub use performance::{
    ForegroundState, METRIC_LOG_STORE_NAME, PerformanceMetricsController, metric_eviction_policy,
};
pub use pipeline::{Collaborators, TelemetryPipeline};
pub use sync_status::{SyncStatusTracker, UploadProgress};
