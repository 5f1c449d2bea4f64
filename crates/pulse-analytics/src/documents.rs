//! Remote document sync controller
//!
//! Documents are the durable cloud-sync lane. Unlike events and metrics
//! they have no priority: when the buffer is full the oldest document is
//! dropped. Uploading requires an authenticated session, and an anonymous
//! sign-in is attempted when none exists.

use std::sync::Arc;

use pulse_core::{AuthSession, DocumentContext, DocumentLog, LogUploader, ProfileId};
use pulse_storage::{BlobStore, BoundedLogStore, EvictionPolicy};
use tracing::{debug, info, warn};

use crate::context::PipelineContext;
use crate::diagnostics::report_failure;
use crate::error::{TelemetryError, TelemetryResult};
use crate::sync_status::UploadProgress;

/// Blob key of the document sync store
pub const DOCUMENT_LOG_STORE_NAME: &str = "document_logs";

const COMPONENT: &str = "document_sync";

/// Uploads documents to remote storage, buffering them until the device
/// is online and signed in
pub struct DocumentSyncController {
    store: BoundedLogStore<DocumentLog>,
    uploader: Arc<dyn LogUploader<DocumentLog>>,
    auth: Arc<dyn AuthSession>,
    context: PipelineContext,
}

impl DocumentSyncController {
    pub fn new(
        capacity: usize,
        backend: Arc<dyn BlobStore>,
        uploader: Arc<dyn LogUploader<DocumentLog>>,
        auth: Arc<dyn AuthSession>,
        context: PipelineContext,
    ) -> Self {
        Self {
            store: BoundedLogStore::new(
                DOCUMENT_LOG_STORE_NAME,
                backend,
                EvictionPolicy::oldest_first(capacity),
            ),
            uploader,
            auth,
            context,
        }
    }

    pub async fn prime(&self) -> TelemetryResult<()> {
        Ok(self.store.prime().await?)
    }

    /// Upload a document stamped now, or buffer it
    pub async fn upload(&self, context: DocumentContext, profile_id: Option<ProfileId>) {
        let timestamp = self.context.now_millis();
        self.upload_at(timestamp, context, profile_id).await;
    }

    /// Upload a document with an explicit timestamp, or buffer it
    pub async fn upload_at(
        &self,
        timestamp: i64,
        context: DocumentContext,
        profile_id: Option<ProfileId>,
    ) {
        let log = DocumentLog::new(timestamp, context, profile_id);
        if let Err(e) = self.upload_or_cache(log).await {
            report_failure(
                self.context.exception_reporter.as_ref(),
                COMPONENT,
                "Failed to record document",
                &e,
            );
        }
    }

    /// Drain buffered documents, logging instead of returning failures
    pub async fn upload_pending(&self) {
        match self.upload_pending_and_wait().await {
            Ok(progress) => debug!(
                uploaded = progress.uploaded,
                total = progress.total,
                "Uploaded pending documents"
            ),
            Err(TelemetryError::NoConnectivity) => {
                debug!("Offline, pending documents stay buffered")
            }
            Err(e @ (TelemetryError::Auth(_) | TelemetryError::Upload(_))) => {
                warn!(error = %e, "Pending documents stay buffered")
            }
            Err(e) => report_failure(
                self.context.exception_reporter.as_ref(),
                COMPONENT,
                "Failed to upload pending documents",
                &e,
            ),
        }
    }

    /// Upload every buffered document, oldest first
    ///
    /// The head is always uploaded and removed before the next document is
    /// attempted. On failure the remaining documents stay buffered.
    pub async fn upload_pending_and_wait(&self) -> TelemetryResult<UploadProgress> {
        if !self.context.connection_status().is_connected() {
            return Err(TelemetryError::NoConnectivity);
        }

        let total = self.store.len().await?;
        if total == 0 {
            return Ok(UploadProgress::default());
        }

        self.ensure_authenticated().await?;

        let mut uploaded = 0;
        while uploaded < total {
            let Some(head) = self.store.peek_head().await? else {
                break;
            };
            self.uploader.send(&head).await?;
            self.store.remove_head_if_eq(&head).await?;
            uploaded += 1;
        }

        Ok(UploadProgress { uploaded, total })
    }

    /// All buffered documents, oldest first
    pub async fn get_document_log_store(&self) -> TelemetryResult<Vec<DocumentLog>> {
        Ok(self.store.read_all().await?)
    }

    pub async fn document_log_count(&self) -> TelemetryResult<usize> {
        Ok(self.store.len().await?)
    }

    pub async fn remove_first_document_log(&self) -> TelemetryResult<Option<DocumentLog>> {
        Ok(self.store.remove_head().await?)
    }

    async fn upload_or_cache(&self, log: DocumentLog) -> TelemetryResult<()> {
        if !self.context.connection_status().is_connected() {
            return self.cache(log).await;
        }

        if let Err(e) = self.ensure_authenticated().await {
            warn!(error = %e, "Not signed in, caching document");
            return self.cache(log).await;
        }

        match self.uploader.send(&log).await {
            Ok(()) => Ok(()),
            Err(e) => {
                warn!(error = %e, "Document upload failed, caching");
                self.cache(log).await
            }
        }
    }

    async fn cache(&self, log: DocumentLog) -> TelemetryResult<()> {
        let outcome = self.store.append(log).await?;
        if !outcome.evicted().is_empty() {
            debug!(evicted = outcome.evicted().len(), "Dropped oldest buffered documents");
        }
        Ok(())
    }

    async fn ensure_authenticated(&self) -> TelemetryResult<()> {
        if self.auth.current_user().is_some() {
            return Ok(());
        }
        let user = self.auth.sign_in_anonymously().await?;
        info!(user = %user, "Signed in anonymously for document sync");
        Ok(())
    }
}

impl std::fmt::Debug for DocumentSyncController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentSyncController")
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulse_core::mock::{
        FakeAuthSession, FakeClock, FakeConnectivity, RecordingExceptionReporter,
        RecordingUploader, SignInBehavior,
    };
    use pulse_core::{AuthError, ConnectionStatus};
    use pulse_storage::InMemoryBlobStore;

    struct Harness {
        controller: DocumentSyncController,
        connectivity: Arc<FakeConnectivity>,
        auth: Arc<FakeAuthSession>,
        uploader: Arc<RecordingUploader<DocumentLog>>,
    }

    fn harness(capacity: usize, status: ConnectionStatus, auth: FakeAuthSession) -> Harness {
        let connectivity = Arc::new(FakeConnectivity::new(status));
        let auth = Arc::new(auth);
        let uploader = Arc::new(RecordingUploader::new());
        let context = PipelineContext::new(
            Arc::new(FakeClock::new(0)),
            connectivity.clone(),
            Arc::new(RecordingExceptionReporter::new()),
        );
        let controller = DocumentSyncController::new(
            capacity,
            Arc::new(InMemoryBlobStore::new()),
            uploader.clone(),
            auth.clone(),
            context,
        );
        Harness {
            controller,
            connectivity,
            auth,
            uploader,
        }
    }

    fn doc(collection: &str) -> DocumentContext {
        DocumentContext::new(collection)
    }

    #[tokio::test]
    async fn test_signed_in_upload_goes_straight_out() {
        let h = harness(5, ConnectionStatus::Local, FakeAuthSession::signed_in("u1"));

        h.controller.upload_at(1, doc("survey"), None).await;

        assert_eq!(h.uploader.sent_count(), 1);
        assert_eq!(h.auth.sign_in_attempts(), 0);
        assert_eq!(h.controller.document_log_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_anonymous_sign_in_before_upload() {
        let h = harness(
            5,
            ConnectionStatus::Local,
            FakeAuthSession::signed_out(SignInBehavior::Succeed),
        );

        h.controller.upload_at(1, doc("survey"), None).await;
        h.controller.upload_at(2, doc("survey"), None).await;

        assert_eq!(h.uploader.sent_count(), 2);
        assert_eq!(h.auth.sign_in_attempts(), 1);
    }

    #[tokio::test]
    async fn test_auth_failure_caches_document() {
        for behavior in [SignInBehavior::Fail, SignInBehavior::Pending] {
            let h = harness(5, ConnectionStatus::Local, FakeAuthSession::signed_out(behavior));

            h.controller.upload_at(1, doc("survey"), Some(ProfileId(3))).await;

            assert_eq!(h.uploader.attempts(), 0);
            let stored = h.controller.get_document_log_store().await.unwrap();
            assert_eq!(stored.len(), 1);
            assert_eq!(stored[0].profile_id, Some(ProfileId(3)));
        }
    }

    #[tokio::test]
    async fn test_offline_documents_evict_oldest() {
        let h = harness(2, ConnectionStatus::None, FakeAuthSession::signed_in("u1"));

        for t in 1..=3 {
            h.controller.upload_at(t, doc("survey"), None).await;
        }

        let timestamps: Vec<_> = h
            .controller
            .get_document_log_store()
            .await
            .unwrap()
            .iter()
            .map(|d| d.timestamp)
            .collect();
        assert_eq!(timestamps, vec![2, 3]);
        assert_eq!(h.auth.sign_in_attempts(), 0);
    }

    #[tokio::test]
    async fn test_upload_pending_drains_fifo() {
        let h = harness(10, ConnectionStatus::None, FakeAuthSession::signed_in("u1"));
        for (t, name) in [(5, "a"), (1, "b"), (3, "c")] {
            h.controller.upload_at(t, doc(name), None).await;
        }

        h.connectivity.set_status(ConnectionStatus::Cellular);
        let progress = h.controller.upload_pending_and_wait().await.unwrap();

        assert!(progress.is_complete());
        let order: Vec<_> = h
            .uploader
            .sent()
            .into_iter()
            .map(|d| d.context.collection)
            .collect();
        assert_eq!(order, vec!["a", "b", "c"]);
        assert_eq!(h.controller.document_log_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_upload_pending_keeps_remainder_on_failure() {
        let h = harness(10, ConnectionStatus::None, FakeAuthSession::signed_in("u1"));
        for t in 1..=3 {
            h.controller.upload_at(t, doc("survey"), None).await;
        }

        h.connectivity.set_status(ConnectionStatus::Local);
        h.uploader.fail_next(2);
        // First attempt fails on the head
        assert!(h.controller.upload_pending_and_wait().await.is_err());
        assert_eq!(h.controller.document_log_count().await.unwrap(), 3);

        // Second attempt fails again; background variant swallows it
        h.controller.upload_pending().await;
        assert_eq!(h.controller.document_log_count().await.unwrap(), 3);

        let progress = h.controller.upload_pending_and_wait().await.unwrap();
        assert_eq!(progress.uploaded, 3);
    }

    #[tokio::test]
    async fn test_upload_pending_requires_auth() {
        let h = harness(
            10,
            ConnectionStatus::None,
            FakeAuthSession::signed_out(SignInBehavior::Fail),
        );
        h.controller.upload_at(1, doc("survey"), None).await;

        h.connectivity.set_status(ConnectionStatus::Local);
        let err = h.controller.upload_pending_and_wait().await.unwrap_err();

        assert!(matches!(err, TelemetryError::Auth(AuthError::SignInFailed(_))));
        assert_eq!(h.controller.document_log_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_upload_pending_offline_is_noop() {
        let h = harness(10, ConnectionStatus::None, FakeAuthSession::signed_in("u1"));
        h.controller.upload_at(1, doc("survey"), None).await;

        let err = h.controller.upload_pending_and_wait().await.unwrap_err();

        assert!(matches!(err, TelemetryError::NoConnectivity));
        assert_eq!(h.uploader.attempts(), 0);
    }
}
