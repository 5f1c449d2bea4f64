//! Performance metric logs
//!
//! Metrics are buffered with a three-tier priority and stamped with the
//! device state observed when they were recorded.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::status::ConnectionStatus;
use crate::traits::LogRecord;

const GIB: u64 = 1024 * 1024 * 1024;

/// Priority of a performance metric
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MetricPriority {
    /// Periodic high-frequency signals (CPU, network bytes)
    High,
    /// UI-correlated signals (memory)
    Medium,
    /// One-shot startup signals (APK size, storage usage, cold start)
    Low,
}

/// Screen a metric is attributed to
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScreenName {
    /// Attributed to the app while it is visible
    ForegroundScreen,
    /// Attributed to the app while it is not visible
    BackgroundScreen,
    /// A concrete screen named by the caller
    Other(String),
}

impl fmt::Display for ScreenName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScreenName::ForegroundScreen => write!(f, "foreground_screen"),
            ScreenName::BackgroundScreen => write!(f, "background_screen"),
            ScreenName::Other(name) => write!(f, "{}", name),
        }
    }
}

/// The measured value of a metric
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LoggableMetric {
    ApkSize { bytes: u64 },
    StorageUsage { bytes: u64 },
    StartupLatency { millis: u64 },
    MemoryUsage { total_pss_bytes: u64 },
    NetworkUsage { received_bytes: u64, sent_bytes: u64 },
    /// Relative CPU usage between two snapshots (0.0 - 1.0 per core budget)
    CpuUsage { relative_usage: f64 },
}

impl LoggableMetric {
    /// Default priority for this kind of metric
    pub fn default_priority(&self) -> MetricPriority {
        match self {
            LoggableMetric::CpuUsage { .. } | LoggableMetric::NetworkUsage { .. } => {
                MetricPriority::High
            }
            LoggableMetric::MemoryUsage { .. } => MetricPriority::Medium,
            LoggableMetric::ApkSize { .. }
            | LoggableMetric::StorageUsage { .. }
            | LoggableMetric::StartupLatency { .. } => MetricPriority::Low,
        }
    }
}

/// Network type observed when a metric was recorded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NetworkType {
    None,
    Wifi,
    Cellular,
    Unrecognized,
}

impl From<ConnectionStatus> for NetworkType {
    fn from(status: ConnectionStatus) -> Self {
        match status {
            ConnectionStatus::None => NetworkType::None,
            ConnectionStatus::Local => NetworkType::Wifi,
            ConnectionStatus::Cellular => NetworkType::Cellular,
            ConnectionStatus::Other => NetworkType::Unrecognized,
        }
    }
}

/// Device storage capacity bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StorageTier {
    Unspecified,
    Low,
    Medium,
    High,
}

impl StorageTier {
    /// Bucket a device by its total storage (≤ 5 GiB low, ≤ 20 GiB medium)
    pub fn classify(total_bytes: u64) -> Self {
        match total_bytes {
            0 => StorageTier::Unspecified,
            b if b <= 5 * GIB => StorageTier::Low,
            b if b <= 20 * GIB => StorageTier::Medium,
            _ => StorageTier::High,
        }
    }
}

/// Device memory capacity bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MemoryTier {
    Unspecified,
    Low,
    Medium,
    High,
}

impl MemoryTier {
    /// Bucket a device by its total memory (≤ 1 GiB low, ≤ 2 GiB medium)
    pub fn classify(total_bytes: u64) -> Self {
        match total_bytes {
            0 => MemoryTier::Unspecified,
            b if b <= GIB => MemoryTier::Low,
            b if b <= 2 * GIB => MemoryTier::Medium,
            _ => MemoryTier::High,
        }
    }
}

/// A buffered performance metric
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricLog {
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
    pub priority: MetricPriority,
    pub screen: ScreenName,
    pub metric: LoggableMetric,
    pub is_app_in_foreground: bool,
    pub storage_tier: StorageTier,
    pub memory_tier: MemoryTier,
    pub network_type: NetworkType,
}

impl LogRecord for MetricLog {
    fn timestamp_millis(&self) -> i64 {
        self.timestamp
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_priorities() {
        assert_eq!(
            LoggableMetric::CpuUsage { relative_usage: 0.1 }.default_priority(),
            MetricPriority::High
        );
        assert_eq!(
            LoggableMetric::NetworkUsage { received_bytes: 1, sent_bytes: 2 }.default_priority(),
            MetricPriority::High
        );
        assert_eq!(
            LoggableMetric::MemoryUsage { total_pss_bytes: 1 }.default_priority(),
            MetricPriority::Medium
        );
        assert_eq!(
            LoggableMetric::StartupLatency { millis: 10 }.default_priority(),
            MetricPriority::Low
        );
    }

    #[test]
    fn test_network_type_classification() {
        assert_eq!(NetworkType::from(ConnectionStatus::None), NetworkType::None);
        assert_eq!(NetworkType::from(ConnectionStatus::Local), NetworkType::Wifi);
        assert_eq!(NetworkType::from(ConnectionStatus::Cellular), NetworkType::Cellular);
        assert_eq!(NetworkType::from(ConnectionStatus::Other), NetworkType::Unrecognized);
    }

    #[test]
    fn test_tier_boundaries() {
        assert_eq!(StorageTier::classify(0), StorageTier::Unspecified);
        assert_eq!(StorageTier::classify(5 * GIB), StorageTier::Low);
        assert_eq!(StorageTier::classify(5 * GIB + 1), StorageTier::Medium);
        assert_eq!(StorageTier::classify(64 * GIB), StorageTier::High);

        assert_eq!(MemoryTier::classify(GIB), MemoryTier::Low);
        assert_eq!(MemoryTier::classify(2 * GIB), MemoryTier::Medium);
        assert_eq!(MemoryTier::classify(3 * GIB), MemoryTier::High);
    }

    #[test]
    fn test_screen_name_display() {
        assert_eq!(ScreenName::ForegroundScreen.to_string(), "foreground_screen");
        assert_eq!(ScreenName::Other("home".into()).to_string(), "home");
    }
}
