//! Event analytics controller
//!
//! Events are uploaded immediately when the device is online and buffered
//! otherwise. The buffer keeps essential events over optional ones when it
//! has to evict. Successfully uploaded events are kept in a second
//! bounded store so the upload history can be inspected.

use std::sync::Arc;

use pulse_core::{
    EventContext, EventLog, EventPriority, LogUploader, ProfileId, SyncStatus,
};
use pulse_storage::{AppendOutcome, BlobStore, BoundedLogStore, EvictionPolicy, TierPredicate};
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::context::PipelineContext;
use crate::diagnostics::report_failure;
use crate::error::{TelemetryError, TelemetryResult};
use crate::sync_status::{SyncStatusTracker, UploadProgress};

/// Blob key of the analytics event store
pub const EVENT_LOG_STORE_NAME: &str = "event_logs";

/// Blob key of the uploaded-event history
pub const UPLOADED_EVENT_LOG_STORE_NAME: &str = "uploaded_event_logs";

const COMPONENT: &str = "analytics";

/// Eviction tiers, least important first
const EVENT_TIERS: [TierPredicate<EventLog>; 2] = [
    |e| e.priority == EventPriority::Optional,
    |e| e.priority == EventPriority::Essential,
];

/// Eviction policy for analytics events
pub fn event_eviction_policy(capacity: usize) -> EvictionPolicy<EventLog> {
    EvictionPolicy::new(capacity, &EVENT_TIERS)
}

/// Records analytics events and uploads them when connectivity allows
pub struct AnalyticsController {
    store: BoundedLogStore<EventLog>,
    uploaded: BoundedLogStore<EventLog>,
    uploader: Arc<dyn LogUploader<EventLog>>,
    context: PipelineContext,
    sync_status: SyncStatusTracker,
}

impl AnalyticsController {
    pub fn new(
        capacity: usize,
        backend: Arc<dyn BlobStore>,
        uploader: Arc<dyn LogUploader<EventLog>>,
        context: PipelineContext,
    ) -> Self {
        Self {
            store: BoundedLogStore::new(
                EVENT_LOG_STORE_NAME,
                backend.clone(),
                event_eviction_policy(capacity),
            ),
            uploaded: BoundedLogStore::new(
                UPLOADED_EVENT_LOG_STORE_NAME,
                backend,
                event_eviction_policy(capacity),
            ),
            uploader,
            context,
            sync_status: SyncStatusTracker::new(),
        }
    }

    /// Load the persisted buffer and upload history eagerly
    pub async fn prime(&self) -> TelemetryResult<()> {
        self.store.prime().await?;
        Ok(self.uploaded.prime().await?)
    }

    /// Log an event that must survive eviction pressure, stamped now
    pub async fn log_important_event(&self, context: EventContext, profile_id: Option<ProfileId>) {
        let timestamp = self.context.now_millis();
        self.log_important_event_at(timestamp, context, profile_id).await;
    }

    /// Log an essential event with an explicit timestamp
    pub async fn log_important_event_at(
        &self,
        timestamp: i64,
        context: EventContext,
        profile_id: Option<ProfileId>,
    ) {
        let log = EventLog::new(timestamp, EventPriority::Essential, context, profile_id);
        self.record_or_upload(log).await;
    }

    /// Log an event that may be dropped first under eviction pressure, stamped now
    pub async fn log_optional_event(&self, context: EventContext, profile_id: Option<ProfileId>) {
        let timestamp = self.context.now_millis();
        self.log_optional_event_at(timestamp, context, profile_id).await;
    }

    /// Log an optional event with an explicit timestamp
    pub async fn log_optional_event_at(
        &self,
        timestamp: i64,
        context: EventContext,
        profile_id: Option<ProfileId>,
    ) {
        let log = EventLog::new(timestamp, EventPriority::Optional, context, profile_id);
        self.record_or_upload(log).await;
    }

    /// All buffered events, oldest arrival first
    pub async fn get_event_log_store(&self) -> TelemetryResult<Vec<EventLog>> {
        Ok(self.store.read_all().await?)
    }

    pub async fn event_log_count(&self) -> TelemetryResult<usize> {
        Ok(self.store.len().await?)
    }

    /// Events uploaded so far, oldest upload first
    ///
    /// Bounded like the pending buffer; optional events are forgotten first.
    pub async fn get_uploaded_event_log_store(&self) -> TelemetryResult<Vec<EventLog>> {
        Ok(self.uploaded.read_all().await?)
    }

    pub async fn uploaded_event_log_count(&self) -> TelemetryResult<usize> {
        Ok(self.uploaded.len().await?)
    }

    /// Remove the oldest buffered event after it has been uploaded elsewhere
    pub async fn remove_first_event_log(&self) -> TelemetryResult<Option<EventLog>> {
        Ok(self.store.remove_head().await?)
    }

    /// Upload every buffered event, oldest first
    ///
    /// Each event is removed only after its upload succeeds. On failure
    /// the remaining events stay buffered and the error is returned.
    pub async fn upload_event_logs_and_wait(&self) -> TelemetryResult<UploadProgress> {
        if !self.context.connection_status().is_connected() {
            self.sync_status.set(SyncStatus::NoConnectivity);
            return Err(TelemetryError::NoConnectivity);
        }

        self.sync_status.set(SyncStatus::DataUploading);
        match self.drain().await {
            Ok(progress) => {
                debug!(uploaded = progress.uploaded, "Uploaded buffered events");
                self.sync_status.set(SyncStatus::DataUploaded);
                Ok(progress)
            }
            Err(e) => {
                warn!(error = %e, "Failed to upload buffered events");
                self.sync_status.set(SyncStatus::UploadError);
                Err(e)
            }
        }
    }

    /// Current upload status
    pub fn sync_status(&self) -> SyncStatus {
        self.sync_status.current()
    }

    /// Receive every upload status change
    pub fn subscribe_sync_status(&self) -> watch::Receiver<SyncStatus> {
        self.sync_status.subscribe()
    }

    async fn record_or_upload(&self, log: EventLog) {
        if let Err(e) = self.upload_or_cache(log).await {
            report_failure(
                self.context.exception_reporter.as_ref(),
                COMPONENT,
                "Failed to record analytics event",
                &e,
            );
        }
    }

    async fn upload_or_cache(&self, log: EventLog) -> TelemetryResult<()> {
        if !self.context.connection_status().is_connected() {
            self.sync_status.set(SyncStatus::NoConnectivity);
            return self.cache(log).await;
        }

        self.sync_status.set(SyncStatus::DataUploading);
        match self.uploader.send(&log).await {
            Ok(()) => {
                self.sync_status.set(SyncStatus::DataUploaded);
                self.record_uploaded(log).await;
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Event upload failed, caching");
                self.sync_status.set(SyncStatus::UploadError);
                self.cache(log).await
            }
        }
    }

    async fn cache(&self, log: EventLog) -> TelemetryResult<()> {
        if let AppendOutcome::Evicted(evicted) = self.store.append(log).await? {
            for dropped in &evicted {
                debug!(
                    priority = ?dropped.priority,
                    timestamp = dropped.timestamp,
                    "Evicted buffered event"
                );
            }
        }
        Ok(())
    }

    /// Keep `log` in the upload history; a failure here never undoes the upload
    async fn record_uploaded(&self, log: EventLog) {
        if let Err(e) = self.uploaded.append(log).await {
            report_failure(
                self.context.exception_reporter.as_ref(),
                COMPONENT,
                "Failed to record uploaded analytics event",
                &TelemetryError::from(e),
            );
        }
    }

    async fn drain(&self) -> TelemetryResult<UploadProgress> {
        let total = self.store.len().await?;
        let mut uploaded = 0;

        while uploaded < total {
            let Some(head) = self.store.peek_head().await? else {
                break;
            };
            self.uploader.send(&head).await?;
            self.store.remove_head_if_eq(&head).await?;
            self.record_uploaded(head).await;
            uploaded += 1;
        }

        Ok(UploadProgress { uploaded, total })
    }
}

impl std::fmt::Debug for AnalyticsController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalyticsController")
            .field("store", &self.store)
            .field("sync_status", &self.sync_status.current())
            .finish_non_exhaustive()
    }
}
