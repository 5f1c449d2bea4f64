//! CPU usage snapshots

use serde::{Deserialize, Serialize};

use crate::status::AppIconification;

/// A CPU/time baseline taken at one instant
///
/// Two snapshots taken at different instants give the relative CPU usage
/// of the process over the interval between them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CpuSnapshot {
    /// Wall time elapsed since process start, in milliseconds
    pub app_time_millis: u64,
    /// CPU time consumed by the process, in milliseconds
    pub cpu_time_millis: u64,
    /// Number of online cores when the snapshot was taken
    pub num_cores: u32,
    /// Iconification the snapshot was taken under
    pub iconification: AppIconification,
}

impl CpuSnapshot {
    /// Relative CPU usage between `earlier` and `self`
    ///
    /// Computed as `Δcpu / (Δapp × cores)`. Returns `None` when no wall
    /// time elapsed, no cores were reported, or the counters went backwards.
    pub fn relative_usage_since(&self, earlier: &CpuSnapshot) -> Option<f64> {
        let delta_app = self.app_time_millis.checked_sub(earlier.app_time_millis)?;
        let delta_cpu = self.cpu_time_millis.checked_sub(earlier.cpu_time_millis)?;
        let cores = self.num_cores.max(earlier.num_cores);
        if delta_app == 0 || cores == 0 {
            return None;
        }
        Some(delta_cpu as f64 / (delta_app as f64 * cores as f64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(app: u64, cpu: u64, cores: u32) -> CpuSnapshot {
        CpuSnapshot {
            app_time_millis: app,
            cpu_time_millis: cpu,
            num_cores: cores,
            iconification: AppIconification::Foreground,
        }
    }

    #[test]
    fn test_relative_usage() {
        let earlier = snapshot(1_000, 100, 2);
        let later = snapshot(2_000, 600, 2);
        let usage = later.relative_usage_since(&earlier).unwrap();
        assert!((usage - 0.25).abs() < f64::EPSILON);
    }

    #[test]
    fn test_relative_usage_degenerate() {
        let earlier = snapshot(1_000, 100, 2);
        assert!(earlier.relative_usage_since(&earlier).is_none());
        assert!(snapshot(500, 200, 2).relative_usage_since(&earlier).is_none());
        assert!(snapshot(2_000, 200, 0).relative_usage_since(&snapshot(1_000, 100, 0)).is_none());
    }
}
