//! In-memory collaborator fakes for testing
//!
//! Provides controllable implementations of every collaborator trait so
//! controller and actor logic can be exercised without a device.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use pulse_core::mock::{FakeConnectivity, RecordingUploader};
//! use pulse_core::{ConnectionStatus, EventLog};
//!
//! let connectivity = FakeConnectivity::new(ConnectionStatus::None);
//! let uploader = RecordingUploader::<EventLog>::new();
//!
//! // ... exercise a controller ...
//! connectivity.set_status(ConnectionStatus::Local);
//! assert!(uploader.sent().is_empty());
//! ```

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::error::{AuthError, UploadError};
use crate::metric::{MemoryTier, StorageTier};
use crate::snapshot::CpuSnapshot;
use crate::status::{AppIconification, ConnectionStatus};
use crate::traits::{
    AuthSession, Clock, ConnectivityProvider, ExceptionReporter, LogUploader, RawMetricsAssessor,
};

/// A clock that only moves when told to
#[derive(Debug, Default)]
pub struct FakeClock {
    millis: AtomicI64,
}

impl FakeClock {
    /// Create a clock reading `millis` since the Unix epoch
    pub fn new(millis: i64) -> Self {
        Self {
            millis: AtomicI64::new(millis),
        }
    }

    pub fn set_millis(&self, millis: i64) {
        self.millis.store(millis, Ordering::SeqCst);
    }

    pub fn advance_millis(&self, delta: i64) {
        self.millis.fetch_add(delta, Ordering::SeqCst);
    }
}

impl Clock for FakeClock {
    fn now_utc(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.millis.load(Ordering::SeqCst)).unwrap_or_default()
    }

    fn current_time_millis(&self) -> i64 {
        self.millis.load(Ordering::SeqCst)
    }
}

/// Connectivity provider with a settable status
#[derive(Debug)]
pub struct FakeConnectivity {
    status: Mutex<ConnectionStatus>,
}

impl FakeConnectivity {
    pub fn new(status: ConnectionStatus) -> Self {
        Self {
            status: Mutex::new(status),
        }
    }

    pub fn set_status(&self, status: ConnectionStatus) {
        *self.status.lock() = status;
    }
}

impl ConnectivityProvider for FakeConnectivity {
    fn current_status(&self) -> ConnectionStatus {
        *self.status.lock()
    }
}

/// Uploader that records every log it is asked to send
///
/// Failures can be injected for the next N sends or for all sends. A
/// stalled uploader never completes a send, like a hung connection.
#[derive(Debug)]
pub struct RecordingUploader<T> {
    sent: Mutex<Vec<T>>,
    fail_next: AtomicUsize,
    fail_all: Mutex<bool>,
    stalled: AtomicBool,
    attempts: AtomicUsize,
}

impl<T> Default for RecordingUploader<T> {
    fn default() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail_next: AtomicUsize::new(0),
            fail_all: Mutex::new(false),
            stalled: AtomicBool::new(false),
            attempts: AtomicUsize::new(0),
        }
    }
}

impl<T: Clone> RecordingUploader<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Logs successfully sent so far, in send order
    pub fn sent(&self) -> Vec<T> {
        self.sent.lock().clone()
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().len()
    }

    /// Number of send attempts, including failed ones
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Fail the next `count` sends
    pub fn fail_next(&self, count: usize) {
        self.fail_next.store(count, Ordering::SeqCst);
    }

    /// Fail every send until reset
    pub fn set_failing(&self, failing: bool) {
        *self.fail_all.lock() = failing;
    }

    /// Make subsequent sends hang forever
    pub fn set_stalled(&self, stalled: bool) {
        self.stalled.store(stalled, Ordering::SeqCst);
    }
}

#[async_trait]
impl<T: Clone + Send + Sync> LogUploader<T> for RecordingUploader<T> {
    async fn send(&self, log: &T) -> Result<(), UploadError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.stalled.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if *self.fail_all.lock() {
            return Err(UploadError::network("injected failure"));
        }
        let injected = self
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            return Err(UploadError::network("injected failure"));
        }
        self.sent.lock().push(log.clone());
        Ok(())
    }
}

/// Metrics assessor with fixed readings and scripted CPU usages
#[derive(Debug)]
pub struct FakeMetricsAssessor {
    pub apk_size_bytes: u64,
    pub used_storage_bytes: u64,
    pub total_pss_bytes: u64,
    pub received_bytes: u64,
    pub sent_bytes: u64,
    pub storage_tier: StorageTier,
    pub memory_tier: MemoryTier,
    cpu_usages: Mutex<VecDeque<Option<f64>>>,
    fallback_usage: Option<f64>,
    snapshots_taken: AtomicU64,
}

impl Default for FakeMetricsAssessor {
    fn default() -> Self {
        Self {
            apk_size_bytes: 20_000_000,
            used_storage_bytes: 5_000_000,
            total_pss_bytes: 150_000_000,
            received_bytes: 1_024,
            sent_bytes: 512,
            storage_tier: StorageTier::High,
            memory_tier: MemoryTier::Medium,
            cpu_usages: Mutex::new(VecDeque::new()),
            fallback_usage: Some(0.1),
            snapshots_taken: AtomicU64::new(0),
        }
    }
}

impl FakeMetricsAssessor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return these relative CPU usages, in order, before falling back
    pub fn with_cpu_usages(self, usages: impl IntoIterator<Item = Option<f64>>) -> Self {
        *self.cpu_usages.lock() = usages.into_iter().collect();
        self
    }

    /// Usage reported once the scripted usages run out
    pub fn with_fallback_usage(mut self, usage: Option<f64>) -> Self {
        self.fallback_usage = usage;
        self
    }

    /// Number of CPU snapshots taken so far
    pub fn snapshots_taken(&self) -> u64 {
        self.snapshots_taken.load(Ordering::SeqCst)
    }
}

impl RawMetricsAssessor for FakeMetricsAssessor {
    fn apk_size_bytes(&self) -> u64 {
        self.apk_size_bytes
    }

    fn used_storage_bytes(&self) -> u64 {
        self.used_storage_bytes
    }

    fn total_pss_bytes(&self) -> u64 {
        self.total_pss_bytes
    }

    fn total_received_bytes(&self) -> u64 {
        self.received_bytes
    }

    fn total_sent_bytes(&self) -> u64 {
        self.sent_bytes
    }

    fn storage_tier(&self) -> StorageTier {
        self.storage_tier
    }

    fn memory_tier(&self) -> MemoryTier {
        self.memory_tier
    }

    fn compute_cpu_snapshot(&self, iconification: AppIconification) -> CpuSnapshot {
        let n = self.snapshots_taken.fetch_add(1, Ordering::SeqCst);
        CpuSnapshot {
            app_time_millis: n * 1_000,
            cpu_time_millis: n * 100,
            num_cores: 1,
            iconification,
        }
    }

    fn relative_cpu_usage(&self, _older: &CpuSnapshot, _newer: &CpuSnapshot) -> Option<f64> {
        self.cpu_usages
            .lock()
            .pop_front()
            .unwrap_or(self.fallback_usage)
    }
}

/// How a [`FakeAuthSession`] answers sign-in requests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignInBehavior {
    Succeed,
    Fail,
    Pending,
}

/// Authentication session with scripted sign-in behavior
#[derive(Debug)]
pub struct FakeAuthSession {
    user: Mutex<Option<String>>,
    behavior: Mutex<SignInBehavior>,
    sign_in_attempts: AtomicUsize,
}

impl FakeAuthSession {
    /// A session with no signed-in user
    pub fn signed_out(behavior: SignInBehavior) -> Self {
        Self {
            user: Mutex::new(None),
            behavior: Mutex::new(behavior),
            sign_in_attempts: AtomicUsize::new(0),
        }
    }

    /// A session that already has a user
    pub fn signed_in(user: impl Into<String>) -> Self {
        Self {
            user: Mutex::new(Some(user.into())),
            behavior: Mutex::new(SignInBehavior::Succeed),
            sign_in_attempts: AtomicUsize::new(0),
        }
    }

    pub fn set_behavior(&self, behavior: SignInBehavior) {
        *self.behavior.lock() = behavior;
    }

    pub fn sign_in_attempts(&self) -> usize {
        self.sign_in_attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AuthSession for FakeAuthSession {
    fn current_user(&self) -> Option<String> {
        self.user.lock().clone()
    }

    async fn sign_in_anonymously(&self) -> Result<String, AuthError> {
        self.sign_in_attempts.fetch_add(1, Ordering::SeqCst);
        let behavior = *self.behavior.lock();
        match behavior {
            SignInBehavior::Succeed => {
                let user = "anonymous-user".to_string();
                *self.user.lock() = Some(user.clone());
                Ok(user)
            }
            SignInBehavior::Fail => Err(AuthError::SignInFailed("injected failure".into())),
            SignInBehavior::Pending => Err(AuthError::Pending),
        }
    }
}

/// Exception reporter that keeps the rendered messages
#[derive(Debug, Default)]
pub struct RecordingExceptionReporter {
    reports: Mutex<Vec<String>>,
}

impl RecordingExceptionReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reports(&self) -> Vec<String> {
        self.reports.lock().clone()
    }
}

impl ExceptionReporter for RecordingExceptionReporter {
    fn report(&self, error: &(dyn std::error::Error + Send + Sync)) {
        self.reports.lock().push(error.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_fake_clock() {
        let clock = FakeClock::new(1_000);
        assert_eq!(clock.current_time_millis(), 1_000);
        clock.advance_millis(500);
        assert_eq!(clock.current_time_millis(), 1_500);
        assert_eq!(clock.now_utc().timestamp_millis(), 1_500);
    }

    #[tokio::test]
    async fn test_recording_uploader_failure_injection() {
        let uploader = RecordingUploader::<u32>::new();
        uploader.fail_next(1);

        assert!(uploader.send(&1).await.is_err());
        assert!(uploader.send(&2).await.is_ok());
        assert_eq!(uploader.sent(), vec![2]);
        assert_eq!(uploader.attempts(), 2);

        uploader.set_failing(true);
        assert!(uploader.send(&3).await.is_err());
        assert_eq!(uploader.sent_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_uploader_never_completes() {
        let uploader = RecordingUploader::<u32>::new();
        uploader.set_stalled(true);

        let sent = tokio::time::timeout(Duration::from_secs(3600), uploader.send(&1)).await;
        assert!(sent.is_err());
        assert_eq!(uploader.attempts(), 1);
        assert!(uploader.sent().is_empty());
    }

    #[test]
    fn test_fake_assessor_scripted_usages() {
        let assessor = FakeMetricsAssessor::new()
            .with_cpu_usages([Some(0.5), None])
            .with_fallback_usage(Some(0.2));
        let a = assessor.compute_cpu_snapshot(AppIconification::Foreground);
        let b = assessor.compute_cpu_snapshot(AppIconification::Foreground);

        assert_eq!(assessor.relative_cpu_usage(&a, &b), Some(0.5));
        assert_eq!(assessor.relative_cpu_usage(&a, &b), None);
        assert_eq!(assessor.relative_cpu_usage(&a, &b), Some(0.2));
        assert_eq!(assessor.snapshots_taken(), 2);
    }

    #[tokio::test]
    async fn test_fake_auth_session() {
        let session = FakeAuthSession::signed_out(SignInBehavior::Fail);
        assert!(session.current_user().is_none());
        assert!(session.sign_in_anonymously().await.is_err());

        session.set_behavior(SignInBehavior::Succeed);
        assert!(session.sign_in_anonymously().await.is_ok());
        assert!(session.current_user().is_some());
        assert_eq!(session.sign_in_attempts(), 2);
    }
}
