//! Performance metrics controller
//!
//! Every metric is stamped with the device state observed when it was
//! recorded: foreground flag, storage and memory tiers, and network type.
//! Metrics are uploaded when online and buffered otherwise, evicting
//! low-priority metrics first.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use pulse_core::{
    LogUploader, LoggableMetric, MetricLog, MetricPriority, NetworkType, RawMetricsAssessor,
    ScreenName,
};
use pulse_storage::{AppendOutcome, BlobStore, BoundedLogStore, EvictionPolicy, TierPredicate};
use tracing::{debug, warn};

use crate::context::PipelineContext;
use crate::diagnostics::report_failure;
use crate::error::TelemetryResult;

/// Blob key of the performance metric store
pub const METRIC_LOG_STORE_NAME: &str = "metric_logs";

const COMPONENT: &str = "performance_metrics";

const METRIC_TIERS: [TierPredicate<MetricLog>; 3] = [
    |m| m.priority == MetricPriority::Low,
    |m| m.priority == MetricPriority::Medium,
    |m| m.priority == MetricPriority::High,
];

/// Eviction policy for performance metrics
pub fn metric_eviction_policy(capacity: usize) -> EvictionPolicy<MetricLog> {
    EvictionPolicy::new(capacity, &METRIC_TIERS)
}

/// Whether the application is currently visible
///
/// Cloned handles share one flag. The lifecycle observer is the only
/// writer; controllers only read it.
#[derive(Debug, Clone, Default)]
pub struct ForegroundState(Arc<AtomicBool>);

impl ForegroundState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_foreground(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    pub(crate) fn set(&self, foreground: bool) {
        self.0.store(foreground, Ordering::Release);
    }
}

/// Records performance metrics and uploads them when connectivity allows
pub struct PerformanceMetricsController {
    store: BoundedLogStore<MetricLog>,
    uploader: Arc<dyn LogUploader<MetricLog>>,
    assessor: Arc<dyn RawMetricsAssessor>,
    context: PipelineContext,
    foreground: ForegroundState,
}

impl PerformanceMetricsController {
    pub fn new(
        capacity: usize,
        backend: Arc<dyn BlobStore>,
        uploader: Arc<dyn LogUploader<MetricLog>>,
        assessor: Arc<dyn RawMetricsAssessor>,
        context: PipelineContext,
    ) -> Self {
        Self {
            store: BoundedLogStore::new(
                METRIC_LOG_STORE_NAME,
                backend,
                metric_eviction_policy(capacity),
            ),
            uploader,
            assessor,
            context,
            foreground: ForegroundState::new(),
        }
    }

    pub async fn prime(&self) -> TelemetryResult<()> {
        Ok(self.store.prime().await?)
    }

    /// Shared handle to the foreground flag stamped on every metric
    pub fn foreground_state(&self) -> ForegroundState {
        self.foreground.clone()
    }

    pub fn is_app_in_foreground(&self) -> bool {
        self.foreground.is_foreground()
    }

    pub fn set_app_in_foreground(&self) {
        self.foreground.set(true);
    }

    pub fn set_app_in_background(&self) {
        self.foreground.set(false);
    }

    /// Record a metric with an explicit priority
    pub async fn log_metric(
        &self,
        timestamp: i64,
        screen: ScreenName,
        metric: LoggableMetric,
        priority: MetricPriority,
    ) {
        let log = self.stamp(timestamp, screen, metric, priority);
        if let Err(e) = self.upload_or_cache(log).await {
            report_failure(
                self.context.exception_reporter.as_ref(),
                COMPONENT,
                "Failed to record performance metric",
                &e,
            );
        }
    }

    /// Record a periodic high-frequency metric (CPU, network)
    pub async fn log_high_priority_metric(
        &self,
        timestamp: i64,
        screen: ScreenName,
        metric: LoggableMetric,
    ) {
        self.log_metric(timestamp, screen, metric, MetricPriority::High)
            .await;
    }

    /// Record a UI-correlated metric (memory)
    pub async fn log_medium_priority_metric(
        &self,
        timestamp: i64,
        screen: ScreenName,
        metric: LoggableMetric,
    ) {
        self.log_metric(timestamp, screen, metric, MetricPriority::Medium)
            .await;
    }

    /// Record a one-shot startup metric (APK size, storage, startup latency)
    pub async fn log_low_priority_metric(
        &self,
        timestamp: i64,
        screen: ScreenName,
        metric: LoggableMetric,
    ) {
        self.log_metric(timestamp, screen, metric, MetricPriority::Low)
            .await;
    }

    /// All buffered metrics, oldest arrival first
    pub async fn get_metric_log_store(&self) -> TelemetryResult<Vec<MetricLog>> {
        Ok(self.store.read_all().await?)
    }

    pub async fn metric_log_count(&self) -> TelemetryResult<usize> {
        Ok(self.store.len().await?)
    }

    pub async fn remove_first_metric_log(&self) -> TelemetryResult<Option<MetricLog>> {
        Ok(self.store.remove_head().await?)
    }

    fn stamp(
        &self,
        timestamp: i64,
        screen: ScreenName,
        metric: LoggableMetric,
        priority: MetricPriority,
    ) -> MetricLog {
        MetricLog {
            timestamp,
            priority,
            screen,
            metric,
            is_app_in_foreground: self.foreground.is_foreground(),
            storage_tier: self.assessor.storage_tier(),
            memory_tier: self.assessor.memory_tier(),
            network_type: NetworkType::from(self.context.connection_status()),
        }
    }

    async fn upload_or_cache(&self, log: MetricLog) -> TelemetryResult<()> {
        if log.network_type != NetworkType::None {
            match self.uploader.send(&log).await {
                Ok(()) => return Ok(()),
                Err(e) => warn!(error = %e, "Metric upload failed, caching"),
            }
        }

        if let AppendOutcome::Evicted(evicted) = self.store.append(log).await? {
            for dropped in &evicted {
                debug!(
                    priority = ?dropped.priority,
                    timestamp = dropped.timestamp,
                    "Evicted buffered metric"
                );
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for PerformanceMetricsController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PerformanceMetricsController")
            .field("store", &self.store)
            .field("foreground", &self.foreground.is_foreground())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulse_core::mock::{
        FakeClock, FakeConnectivity, FakeMetricsAssessor, RecordingExceptionReporter,
        RecordingUploader,
    };
    use pulse_core::{ConnectionStatus, MemoryTier, StorageTier};
    use pulse_storage::InMemoryBlobStore;

    fn controller(
        capacity: usize,
        status: ConnectionStatus,
    ) -> (
        PerformanceMetricsController,
        Arc<FakeConnectivity>,
        Arc<RecordingUploader<MetricLog>>,
    ) {
        let connectivity = Arc::new(FakeConnectivity::new(status));
        let uploader = Arc::new(RecordingUploader::new());
        let context = PipelineContext::new(
            Arc::new(FakeClock::new(0)),
            connectivity.clone(),
            Arc::new(RecordingExceptionReporter::new()),
        );
        let controller = PerformanceMetricsController::new(
            capacity,
            Arc::new(InMemoryBlobStore::new()),
            uploader.clone(),
            Arc::new(FakeMetricsAssessor::new()),
            context,
        );
        (controller, connectivity, uploader)
    }

    fn memory(bytes: u64) -> LoggableMetric {
        LoggableMetric::MemoryUsage {
            total_pss_bytes: bytes,
        }
    }

    #[tokio::test]
    async fn test_metric_is_stamped_with_device_state() {
        let (controller, _, uploader) = controller(10, ConnectionStatus::Cellular);
        controller.set_app_in_foreground();

        controller
            .log_medium_priority_metric(42, ScreenName::Other("home".into()), memory(1))
            .await;

        let sent = uploader.sent();
        assert_eq!(sent.len(), 1);
        let log = &sent[0];
        assert_eq!(log.timestamp, 42);
        assert_eq!(log.priority, MetricPriority::Medium);
        assert!(log.is_app_in_foreground);
        assert_eq!(log.storage_tier, StorageTier::High);
        assert_eq!(log.memory_tier, MemoryTier::Medium);
        assert_eq!(log.network_type, NetworkType::Cellular);
    }

    #[tokio::test]
    async fn test_foreground_flag_read_at_call_time() {
        let (controller, _, _) = controller(10, ConnectionStatus::None);

        controller.set_app_in_foreground();
        controller
            .log_high_priority_metric(1, ScreenName::ForegroundScreen, memory(1))
            .await;
        controller.set_app_in_background();
        controller
            .log_high_priority_metric(2, ScreenName::BackgroundScreen, memory(2))
            .await;

        let flags: Vec<_> = controller
            .get_metric_log_store()
            .await
            .unwrap()
            .iter()
            .map(|m| m.is_app_in_foreground)
            .collect();
        assert_eq!(flags, vec![true, false]);
    }

    #[tokio::test]
    async fn test_eviction_prefers_low_then_medium() {
        let (controller, _, uploader) = controller(3, ConnectionStatus::None);
        let screen = || ScreenName::ForegroundScreen;

        controller.log_low_priority_metric(1, screen(), memory(1)).await;
        controller.log_low_priority_metric(2, screen(), memory(2)).await;
        controller.log_medium_priority_metric(3, screen(), memory(3)).await;
        controller.log_high_priority_metric(4, screen(), memory(4)).await;

        let timestamps: Vec<_> = controller
            .get_metric_log_store()
            .await
            .unwrap()
            .iter()
            .map(|m| m.timestamp)
            .collect();
        assert_eq!(timestamps, vec![2, 3, 4]);
        assert_eq!(uploader.attempts(), 0);
    }

    #[tokio::test]
    async fn test_upload_failure_caches_metric() {
        let (controller, _, uploader) = controller(10, ConnectionStatus::Local);
        uploader.fail_next(1);

        controller
            .log_low_priority_metric(9, ScreenName::ForegroundScreen, memory(9))
            .await;

        assert_eq!(controller.metric_log_count().await.unwrap(), 1);
        let head = controller.remove_first_metric_log().await.unwrap().unwrap();
        assert_eq!(head.network_type, NetworkType::Wifi);
        assert_eq!(controller.metric_log_count().await.unwrap(), 0);
    }

    #[test]
    fn test_foreground_state_is_shared() {
        let state = ForegroundState::new();
        let clone = state.clone();
        state.set(true);
        assert!(clone.is_foreground());
    }
}
