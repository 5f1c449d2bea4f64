//! Convenience wrappers that read raw OS metrics and log them at the
//! priority their kind calls for

use std::sync::Arc;

use pulse_core::{LoggableMetric, RawMetricsAssessor, ScreenName};
use tracing::{debug, trace};

use crate::context::PipelineContext;
use crate::performance::PerformanceMetricsController;

/// Reads raw metrics from the assessor and records them
///
/// Every method is a no-op when collection is disabled.
pub struct PerformanceMetricsLogger {
    controller: Arc<PerformanceMetricsController>,
    assessor: Arc<dyn RawMetricsAssessor>,
    context: PipelineContext,
    enabled: bool,
}

impl PerformanceMetricsLogger {
    pub fn new(
        controller: Arc<PerformanceMetricsController>,
        assessor: Arc<dyn RawMetricsAssessor>,
        context: PipelineContext,
        enabled: bool,
    ) -> Self {
        Self {
            controller,
            assessor,
            context,
            enabled,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub async fn log_apk_size(&self, screen: ScreenName) {
        let bytes = self.assessor.apk_size_bytes();
        self.log_low(screen, LoggableMetric::ApkSize { bytes }).await;
    }

    pub async fn log_storage_usage(&self, screen: ScreenName) {
        let bytes = self.assessor.used_storage_bytes();
        self.log_low(screen, LoggableMetric::StorageUsage { bytes })
            .await;
    }

    /// Log cold-start latency; negative values come from clock skew and are dropped
    pub async fn log_startup_latency(&self, latency_millis: i64, screen: ScreenName) {
        let Ok(millis) = u64::try_from(latency_millis) else {
            debug!(latency_millis, "Ignoring negative startup latency");
            return;
        };
        self.log_low(screen, LoggableMetric::StartupLatency { millis })
            .await;
    }

    pub async fn log_memory_usage(&self, screen: ScreenName) {
        let metric = LoggableMetric::MemoryUsage {
            total_pss_bytes: self.assessor.total_pss_bytes(),
        };
        self.log_medium(screen, metric).await;
    }

    pub async fn log_network_usage(&self, screen: ScreenName) {
        let metric = LoggableMetric::NetworkUsage {
            received_bytes: self.assessor.total_received_bytes(),
            sent_bytes: self.assessor.total_sent_bytes(),
        };
        self.log_high(screen, metric).await;
    }

    pub async fn log_cpu_usage(&self, screen: ScreenName, relative_usage: f64) {
        self.log_high(screen, LoggableMetric::CpuUsage { relative_usage })
            .await;
    }

    async fn log_high(&self, screen: ScreenName, metric: LoggableMetric) {
        if !self.enabled {
            trace!("Performance metrics collection disabled");
            return;
        }
        self.controller
            .log_high_priority_metric(self.context.now_millis(), screen, metric)
            .await;
    }

    async fn log_medium(&self, screen: ScreenName, metric: LoggableMetric) {
        if !self.enabled {
            trace!("Performance metrics collection disabled");
            return;
        }
        self.controller
            .log_medium_priority_metric(self.context.now_millis(), screen, metric)
            .await;
    }

    async fn log_low(&self, screen: ScreenName, metric: LoggableMetric) {
        if !self.enabled {
            trace!("Performance metrics collection disabled");
            return;
        }
        self.controller
            .log_low_priority_metric(self.context.now_millis(), screen, metric)
            .await;
    }
}

impl std::fmt::Debug for PerformanceMetricsLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PerformanceMetricsLogger")
            .field("enabled", &self.enabled)
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
    use pulse_core::{ConnectionStatus, MetricPriority};
    use pulse_storage::InMemoryBlobStore;

    fn logger(enabled: bool) -> (PerformanceMetricsLogger, Arc<PerformanceMetricsController>) {
        let assessor = Arc::new(FakeMetricsAssessor::new());
        let context = PipelineContext::new(
            Arc::new(FakeClock::new(500)),
            Arc::new(FakeConnectivity::new(ConnectionStatus::None)),
            Arc::new(RecordingExceptionReporter::new()),
        );
        let controller = Arc::new(PerformanceMetricsController::new(
            100,
            Arc::new(InMemoryBlobStore::new()),
            Arc::new(RecordingUploader::new()),
            assessor.clone(),
            context.clone(),
        ));
        (
            PerformanceMetricsLogger::new(controller.clone(), assessor, context, enabled),
            controller,
        )
    }

    #[tokio::test]
    async fn test_wrappers_use_kind_priorities() {
        let (logger, controller) = logger(true);
        let screen = || ScreenName::ForegroundScreen;

        logger.log_apk_size(screen()).await;
        logger.log_storage_usage(screen()).await;
        logger.log_startup_latency(250, screen()).await;
        logger.log_memory_usage(screen()).await;
        logger.log_network_usage(screen()).await;
        logger.log_cpu_usage(screen(), 0.25).await;

        let logs = controller.get_metric_log_store().await.unwrap();
        let priorities: Vec<_> = logs.iter().map(|m| m.priority).collect();
        assert_eq!(
            priorities,
            vec![
                MetricPriority::Low,
                MetricPriority::Low,
                MetricPriority::Low,
                MetricPriority::Medium,
                MetricPriority::High,
                MetricPriority::High,
            ]
        );
        assert_eq!(logs[0].metric, LoggableMetric::ApkSize { bytes: 20_000_000 });
        assert_eq!(logs[2].metric, LoggableMetric::StartupLatency { millis: 250 });
        assert_eq!(
            logs[3].metric,
            LoggableMetric::MemoryUsage {
                total_pss_bytes: 150_000_000
            }
        );
        assert_eq!(
            logs[4].metric,
            LoggableMetric::NetworkUsage {
                received_bytes: 1_024,
                sent_bytes: 512
            }
        );
        assert!(logs.iter().all(|m| m.timestamp == 500));
    }

    #[tokio::test]
    async fn test_negative_startup_latency_is_ignored() {
        let (logger, controller) = logger(true);
        logger
            .log_startup_latency(-5, ScreenName::ForegroundScreen)
            .await;
        assert_eq!(controller.metric_log_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_disabled_logger_records_nothing() {
        let (logger, controller) = logger(false);
        logger.log_apk_size(ScreenName::ForegroundScreen).await;
        logger.log_memory_usage(ScreenName::ForegroundScreen).await;
        logger.log_cpu_usage(ScreenName::BackgroundScreen, 0.5).await;
        assert_eq!(controller.metric_log_count().await.unwrap(), 0);
    }
}
