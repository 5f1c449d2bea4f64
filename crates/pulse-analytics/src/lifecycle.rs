//! Application lifecycle observer
//!
//! The only writer of the foreground flag stamped on performance metrics.
//! It also forwards iconification changes to the CPU snapshotter and logs
//! the one-shot startup metrics on the first foreground.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use pulse_core::{AppIconification, Clock, ScreenName};
use tracing::{debug, info};

use crate::cpu::SnapshotterHandle;
use crate::metrics_logger::PerformanceMetricsLogger;
use crate::performance::ForegroundState;

/// Reacts to application create/foreground/background callbacks
pub struct ApplicationLifecycleObserver {
    foreground: ForegroundState,
    metrics_logger: Arc<PerformanceMetricsLogger>,
    snapshotter: Option<SnapshotterHandle>,
    clock: Arc<dyn Clock>,
    created_at_millis: Mutex<Option<i64>>,
    startup_logged: AtomicBool,
}

impl ApplicationLifecycleObserver {
    /// `snapshotter` is `None` when CPU sampling is disabled
    pub fn new(
        foreground: ForegroundState,
        metrics_logger: Arc<PerformanceMetricsLogger>,
        snapshotter: Option<SnapshotterHandle>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            foreground,
            metrics_logger,
            snapshotter,
            clock,
            created_at_millis: Mutex::new(None),
            startup_logged: AtomicBool::new(false),
        }
    }

    /// Record when the application process was created
    pub fn on_app_created(&self, timestamp_millis: i64) {
        *self.created_at_millis.lock() = Some(timestamp_millis);
        debug!(timestamp_millis, "Application created");
    }

    pub async fn on_app_in_foreground(&self) {
        self.foreground.set(true);
        self.notify_snapshotter(AppIconification::Foreground);

        let created_at = *self.created_at_millis.lock();
        let Some(created_at) = created_at else {
            return;
        };
        if self.startup_logged.swap(true, Ordering::AcqRel) {
            return;
        }

        let latency = self.clock.current_time_millis() - created_at;
        info!(latency_millis = latency, "First foreground after creation");
        self.metrics_logger
            .log_startup_latency(latency, ScreenName::ForegroundScreen)
            .await;
        self.metrics_logger
            .log_apk_size(ScreenName::ForegroundScreen)
            .await;
        self.metrics_logger
            .log_storage_usage(ScreenName::ForegroundScreen)
            .await;
    }

    pub async fn on_app_in_background(&self) {
        self.foreground.set(false);
        self.notify_snapshotter(AppIconification::Background);
    }

    pub fn is_app_in_foreground(&self) -> bool {
        self.foreground.is_foreground()
    }

    fn notify_snapshotter(&self, iconification: AppIconification) {
        if let Some(snapshotter) = &self.snapshotter {
            snapshotter.update_app_iconification(iconification);
        }
    }
}

impl std::fmt::Debug for ApplicationLifecycleObserver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApplicationLifecycleObserver")
            .field("foreground", &self.foreground.is_foreground())
            .field("created_at_millis", &*self.created_at_millis.lock())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::PipelineContext;
    use crate::cpu::{CpuPerformanceSnapshotter, CpuSnapshotterConfig};
    use crate::performance::PerformanceMetricsController;
    use pulse_core::mock::{
        FakeClock, FakeConnectivity, FakeMetricsAssessor, RecordingExceptionReporter,
        RecordingUploader,
    };
    use pulse_core::{ConnectionStatus, LoggableMetric};
    use pulse_storage::InMemoryBlobStore;

    struct Harness {
        observer: ApplicationLifecycleObserver,
        metrics: Arc<PerformanceMetricsController>,
        clock: Arc<FakeClock>,
        snapshotter: SnapshotterHandle,
    }

    fn harness() -> Harness {
        let clock = Arc::new(FakeClock::new(10_000));
        let assessor = Arc::new(FakeMetricsAssessor::new());
        let context = PipelineContext::new(
            clock.clone(),
            Arc::new(FakeConnectivity::new(ConnectionStatus::None)),
            Arc::new(RecordingExceptionReporter::new()),
        );
        let metrics = Arc::new(PerformanceMetricsController::new(
            100,
            Arc::new(InMemoryBlobStore::new()),
            Arc::new(RecordingUploader::new()),
            assessor.clone(),
            context.clone(),
        ));
        let logger = Arc::new(PerformanceMetricsLogger::new(
            metrics.clone(),
            assessor.clone(),
            context,
            true,
        ));
        let snapshotter = CpuPerformanceSnapshotter::spawn(
            CpuSnapshotterConfig::default(),
            assessor,
            metrics.clone(),
            clock.clone(),
        );
        let observer = ApplicationLifecycleObserver::new(
            metrics.foreground_state(),
            logger,
            Some(snapshotter.clone()),
            clock.clone(),
        );
        Harness {
            observer,
            metrics,
            clock,
            snapshotter,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_foreground_logs_startup_metrics_once() {
        let h = harness();
        h.observer.on_app_created(10_000);
        h.clock.advance_millis(750);

        h.observer.on_app_in_foreground().await;
        h.observer.on_app_in_background().await;
        h.observer.on_app_in_foreground().await;

        let metrics: Vec<_> = h
            .metrics
            .get_metric_log_store()
            .await
            .unwrap()
            .into_iter()
            .filter(|m| !matches!(m.metric, LoggableMetric::CpuUsage { .. }))
            .map(|m| m.metric)
            .collect();
        assert_eq!(metrics.len(), 3);
        assert_eq!(metrics[0], LoggableMetric::StartupLatency { millis: 750 });
        assert!(matches!(metrics[1], LoggableMetric::ApkSize { .. }));
        assert!(matches!(metrics[2], LoggableMetric::StorageUsage { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_lifecycle_drives_flag_and_snapshotter() {
        let h = harness();
        assert!(!h.observer.is_app_in_foreground());

        h.observer.on_app_in_foreground().await;
        assert!(h.metrics.is_app_in_foreground());
        assert_eq!(
            h.snapshotter.state().await.unwrap().iconification,
            AppIconification::Foreground
        );

        h.observer.on_app_in_background().await;
        assert!(!h.metrics.is_app_in_foreground());
        let state = h.snapshotter.state().await.unwrap();
        assert_eq!(state.iconification, AppIconification::Background);
        assert_eq!(state.switch_epoch, 2);
    }

    #[tokio::test]
    async fn test_foreground_without_creation_skips_startup_metrics() {
        let h = harness();
        h.observer.on_app_in_foreground().await;
        h.snapshotter.shutdown();
        assert_eq!(h.metrics.metric_log_count().await.unwrap(), 0);
    }
}
