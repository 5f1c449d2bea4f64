//! Assembles the telemetry pipeline from a configuration and the
//! platform collaborators

use std::sync::Arc;

use pulse_core::{
    AuthSession, Clock, ConnectivityProvider, DocumentLog, EventLog, ExceptionReporter,
    LogUploader, MetricLog, RawMetricsAssessor,
};
use tracing::info;

use crate::analytics::AnalyticsController;
use crate::config::TelemetryConfig;
use crate::context::PipelineContext;
use crate::cpu::{CpuPerformanceSnapshotter, CpuSnapshotterConfig, SnapshotterHandle};
use crate::documents::DocumentSyncController;
use crate::error::TelemetryResult;
use crate::lifecycle::ApplicationLifecycleObserver;
use crate::metrics_logger::PerformanceMetricsLogger;
use crate::performance::PerformanceMetricsController;

/// Platform services the pipeline depends on
#[derive(Clone)]
pub struct Collaborators {
    pub clock: Arc<dyn Clock>,
    pub connectivity: Arc<dyn ConnectivityProvider>,
    pub exception_reporter: Arc<dyn ExceptionReporter>,
    pub assessor: Arc<dyn RawMetricsAssessor>,
    pub auth: Arc<dyn AuthSession>,
    pub event_uploader: Arc<dyn LogUploader<EventLog>>,
    pub metric_uploader: Arc<dyn LogUploader<MetricLog>>,
    pub document_uploader: Arc<dyn LogUploader<DocumentLog>>,
}

/// A running telemetry pipeline
///
/// Owns the three controllers, the metrics logger, the lifecycle observer
/// and, when performance collection is enabled, the CPU snapshotter.
pub struct TelemetryPipeline {
    config: TelemetryConfig,
    analytics: Arc<AnalyticsController>,
    metrics: Arc<PerformanceMetricsController>,
    metrics_logger: Arc<PerformanceMetricsLogger>,
    documents: Arc<DocumentSyncController>,
    lifecycle: Arc<ApplicationLifecycleObserver>,
    snapshotter: Option<SnapshotterHandle>,
}

impl TelemetryPipeline {
    /// Validate the configuration, load persisted stores and start sampling
    ///
    /// Must be called from within a tokio runtime.
    pub async fn start(
        config: TelemetryConfig,
        collaborators: Collaborators,
    ) -> TelemetryResult<Self> {
        config.validate()?;
        let backend = config.open_backend().await?;
        let context = PipelineContext::new(
            collaborators.clock.clone(),
            collaborators.connectivity.clone(),
            collaborators.exception_reporter.clone(),
        );

        let analytics = Arc::new(AnalyticsController::new(
            config.event_log_capacity,
            backend.clone(),
            collaborators.event_uploader,
            context.clone(),
        ));
        let metrics = Arc::new(PerformanceMetricsController::new(
            config.metric_log_capacity,
            backend.clone(),
            collaborators.metric_uploader,
            collaborators.assessor.clone(),
            context.clone(),
        ));
        let documents = Arc::new(DocumentSyncController::new(
            config.document_log_capacity,
            backend,
            collaborators.document_uploader,
            collaborators.auth,
            context.clone(),
        ));

        analytics.prime().await?;
        metrics.prime().await?;
        documents.prime().await?;

        let metrics_logger = Arc::new(PerformanceMetricsLogger::new(
            metrics.clone(),
            collaborators.assessor.clone(),
            context,
            config.enable_performance_metrics_collection,
        ));

        let snapshotter = config.enable_performance_metrics_collection.then(|| {
            CpuPerformanceSnapshotter::spawn(
                CpuSnapshotterConfig::from(&config),
                collaborators.assessor.clone(),
                metrics.clone(),
                collaborators.clock.clone(),
            )
        });

        let lifecycle = Arc::new(ApplicationLifecycleObserver::new(
            metrics.foreground_state(),
            metrics_logger.clone(),
            snapshotter.clone(),
            collaborators.clock,
        ));

        info!(
            persisted = config.storage_dir.is_some(),
            performance_metrics = config.enable_performance_metrics_collection,
            "Telemetry pipeline started"
        );

        Ok(Self {
            config,
            analytics,
            metrics,
            metrics_logger,
            documents,
            lifecycle,
            snapshotter,
        })
    }

    pub fn config(&self) -> &TelemetryConfig {
        &self.config
    }

    pub fn analytics(&self) -> &Arc<AnalyticsController> {
        &self.analytics
    }

    pub fn metrics(&self) -> &Arc<PerformanceMetricsController> {
        &self.metrics
    }

    pub fn metrics_logger(&self) -> &Arc<PerformanceMetricsLogger> {
        &self.metrics_logger
    }

    pub fn documents(&self) -> &Arc<DocumentSyncController> {
        &self.documents
    }

    pub fn lifecycle(&self) -> &Arc<ApplicationLifecycleObserver> {
        &self.lifecycle
    }

    /// `None` when performance collection is disabled
    pub fn snapshotter(&self) -> Option<&SnapshotterHandle> {
        self.snapshotter.as_ref()
    }

    /// Stop the CPU snapshotter; buffered logs stay persisted
    pub fn shutdown(&self) {
        if let Some(snapshotter) = &self.snapshotter {
            snapshotter.shutdown();
        }
        info!("Telemetry pipeline stopped");
    }
}

impl std::fmt::Debug for TelemetryPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelemetryPipeline")
            .field("config", &self.config)
            .field("snapshotter", &self.snapshotter)
            .finish_non_exhaustive()
    }
}
