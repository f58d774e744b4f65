//! Photo lookup state machine

use std::path::Path;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use tracing::{debug, info};

use crate::api::LookupResponse;
use crate::error::{Error, Result};

use super::outcome::LookupOutcome;
use super::upload::PendingUpload;

/// Server seam for the single lookup request
///
/// Implemented by `ApiClient` in production; tests substitute stubs.
#[async_trait]
pub trait LookupBackend: Send + Sync {
    /// Upload the photo and return the raw lookup response
    async fn lookup_photo(&self, upload: &PendingUpload) -> Result<LookupResponse>;
}

/// Where a lookup flow currently stands
#[derive(Debug, Clone, PartialEq)]
pub enum LookupState {
    /// Nothing selected yet
    Idle,
    /// A photo is selected and ready to submit
    ImageSelected,
    /// The upload is in flight
    Submitting,
    /// The server resolved the poster
    Resolved(LookupOutcome),
    /// The last submission failed; retry or reselect
    Failed { message: String },
}

impl LookupState {
    /// Short label for logs
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::ImageSelected => "selected",
            Self::Submitting => "submitting",
            Self::Resolved(_) => "resolved",
            Self::Failed { .. } => "failed",
        }
    }
}

struct FlowInner {
    state: LookupState,
    pending: Option<PendingUpload>,
}

/// Drives one photo lookup at a time, from selection to resolution
///
/// State and payload live under a single lock so transition guards are
/// atomic: while an upload is in flight every other transition is
/// rejected rather than queued, and the completion of that one upload
/// is the only path out of `Submitting`.
pub struct PhotoLookupFlow {
    backend: Arc<dyn LookupBackend>,
    inner: RwLock<FlowInner>,
}

impl std::fmt::Debug for PhotoLookupFlow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhotoLookupFlow")
            .field("state", &self.state())
            .finish()
    }
}

impl PhotoLookupFlow {
    /// Create an idle flow
    pub fn new(backend: Arc<dyn LookupBackend>) -> Self {
        Self {
            backend,
            inner: RwLock::new(FlowInner {
                state: LookupState::Idle,
                pending: None,
            }),
        }
    }

    /// Snapshot of the current state
    pub fn state(&self) -> LookupState {
        self.inner
            .read()
            .ok()
            .map(|inner| inner.state.clone())
            .unwrap_or(LookupState::Idle)
    }

    /// The selected photo, if any
    pub fn pending_upload(&self) -> Option<PendingUpload> {
        self.inner
            .read()
            .ok()
            .and_then(|inner| inner.pending.clone())
    }

    /// Select a photo for lookup
    ///
    /// Allowed whenever no upload is in flight. Selecting over a
    /// previous resolution or failure starts a fresh flow.
    pub fn select_image(&self, upload: PendingUpload) -> Result<()> {
        let Ok(mut inner) = self.inner.write() else {
            return Err(Error::InvalidTransition(
                "lookup state unavailable".to_string(),
            ));
        };

        if matches!(inner.state, LookupState::Submitting) {
            return Err(Error::InvalidTransition(
                "cannot select a photo while an upload is in flight".to_string(),
            ));
        }

        debug!(file = %upload.file_name(), bytes = upload.len(), "photo selected");
        inner.pending = Some(upload);
        inner.state = LookupState::ImageSelected;
        Ok(())
    }

    /// Read, validate, and select a photo from disk
    pub async fn select_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let upload = PendingUpload::from_path(path).await?;
        self.select_image(upload)
    }

    /// Upload the selected photo and resolve the outcome
    ///
    /// Valid from `ImageSelected` and, as a retry, from `Failed`. A
    /// call while a submission is already in flight is rejected before
    /// any request is issued.
    pub async fn submit(&self) -> Result<LookupOutcome> {
        let upload = self.begin_submit()?;

        let resolved = match self.backend.lookup_photo(&upload).await {
            Ok(response) => LookupOutcome::from_response(response),
            Err(e) => Err(e),
        };

        self.complete_submit(resolved)
    }

    /// Drop the pending photo and return to `Idle`
    ///
    /// Rejected while an upload is in flight; the completion of that
    /// upload must be the only writer of its result.
    pub fn reset(&self) -> Result<()> {
        let Ok(mut inner) = self.inner.write() else {
            return Ok(());
        };

        if matches!(inner.state, LookupState::Submitting) {
            return Err(Error::InvalidTransition(
                "cannot reset while an upload is in flight".to_string(),
            ));
        }

        inner.pending = None;
        inner.state = LookupState::Idle;
        Ok(())
    }

    /// Guard the transition into `Submitting` and hand back the payload
    fn begin_submit(&self) -> Result<PendingUpload> {
        let Ok(mut inner) = self.inner.write() else {
            return Err(Error::InvalidTransition(
                "lookup state unavailable".to_string(),
            ));
        };

        match inner.state {
            LookupState::ImageSelected | LookupState::Failed { .. } => {}
            LookupState::Submitting => {
                return Err(Error::InvalidTransition(
                    "a lookup is already in flight".to_string(),
                ));
            }
            LookupState::Idle | LookupState::Resolved(_) => {
                return Err(Error::InvalidTransition(
                    "no photo selected for lookup".to_string(),
                ));
            }
        }

        let Some(upload) = inner.pending.clone() else {
            return Err(Error::InvalidTransition(
                "no photo selected for lookup".to_string(),
            ));
        };

        inner.state = LookupState::Submitting;
        Ok(upload)
    }

    /// Settle the in-flight submission
    fn complete_submit(&self, resolved: Result<LookupOutcome>) -> Result<LookupOutcome> {
        match resolved {
            Ok(outcome) => {
                info!(kind = outcome.kind(), "lookup resolved");
                self.transition(LookupState::Resolved(outcome.clone()));
                Ok(outcome)
            }
            Err(e) => {
                debug!(error = %e, "lookup failed");
                self.transition(LookupState::Failed {
                    message: e.to_string(),
                });
                Err(e)
            }
        }
    }

    fn transition(&self, next: LookupState) {
        if let Ok(mut inner) = self.inner.write() {
            debug!(from = inner.state.name(), to = next.name(), "lookup transition");
            inner.state = next;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

    struct UploadGate {
        entered: Arc<Notify>,
        release: Arc<Notify>,
    }

    /// Scripted backend: responses are consumed in order
    #[derive(Default)]
    struct StubLookupBackend {
        responses: Mutex<VecDeque<Result<LookupResponse>>>,
        calls: AtomicUsize,
        gate: Mutex<Option<UploadGate>>,
    }

    impl StubLookupBackend {
        fn new() -> Self {
            Self::default()
        }

        fn with_response(self, result: Result<LookupResponse>) -> Self {
            self.responses.lock().unwrap().push_back(result);
            self
        }

        /// Make the next upload pause until released
        fn gate_next(&self, entered: Arc<Notify>, release: Arc<Notify>) {
            *self.gate.lock().unwrap() = Some(UploadGate { entered, release });
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl LookupBackend for StubLookupBackend {
        async fn lookup_photo(&self, _upload: &PendingUpload) -> Result<LookupResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let gate = self.gate.lock().unwrap().take();
            if let Some(gate) = gate {
                gate.entered.notify_one();
                gate.release.notified().await;
            }
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| {
                    Err(Error::Api {
                        status: 500,
                        message: "stub has no scripted response".to_string(),
                    })
                })
        }
    }

    fn matched_response(id: i64) -> LookupResponse {
        serde_json::from_value(serde_json::json!({
            "action": "matched",
            "event_id": id,
            "event": {"id": id, "title": "Jazz Night"}
        }))
        .unwrap()
    }

    fn poster() -> PendingUpload {
        PendingUpload::from_bytes(
            "poster.png",
            vec![0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A],
        )
        .unwrap()
    }

    #[test]
    fn test_select_moves_to_image_selected() {
        let flow = PhotoLookupFlow::new(Arc::new(StubLookupBackend::new()));
        assert_eq!(flow.state(), LookupState::Idle);

        flow.select_image(poster()).unwrap();

        assert_eq!(flow.state(), LookupState::ImageSelected);
        assert_eq!(flow.pending_upload().unwrap().file_name(), "poster.png");
    }

    #[tokio::test]
    async fn test_submit_without_selection_is_rejected() {
        let backend = Arc::new(StubLookupBackend::new());
        let flow = PhotoLookupFlow::new(backend.clone());

        let err = flow.submit().await.unwrap_err();

        assert!(matches!(err, Error::InvalidTransition(_)));
        assert_eq!(backend.call_count(), 0);
    }

    #[tokio::test]
    async fn test_submit_resolves_outcome() {
        let backend = Arc::new(StubLookupBackend::new().with_response(Ok(matched_response(42))));
        let flow = PhotoLookupFlow::new(backend.clone());
        flow.select_image(poster()).unwrap();

        let outcome = flow.submit().await.unwrap();

        assert_eq!(outcome.event_id(), Some(42));
        assert_eq!(flow.state(), LookupState::Resolved(outcome));
        assert_eq!(backend.call_count(), 1);
    }

    #[tokio::test]
    async fn test_failed_submit_is_retryable() {
        let backend = Arc::new(
            StubLookupBackend::new()
                .with_response(Err(Error::Api {
                    status: 502,
                    message: "upstream scraper timeout".to_string(),
                }))
                .with_response(Ok(matched_response(3))),
        );
        let flow = PhotoLookupFlow::new(backend.clone());
        flow.select_image(poster()).unwrap();

        let err = flow.submit().await.unwrap_err();
        assert!(matches!(err, Error::Api { status: 502, .. }));
        let LookupState::Failed { message } = flow.state() else {
            panic!("expected Failed");
        };
        assert!(message.contains("upstream scraper timeout"));

        // Same photo, second attempt
        let outcome = flow.submit().await.unwrap();
        assert_eq!(outcome.event_id(), Some(3));
        assert_eq!(backend.call_count(), 2);
    }

    #[tokio::test]
    async fn test_unknown_action_fails_the_submission() {
        let response = serde_json::from_value(serde_json::json!({"action": "vanished"})).unwrap();
        let backend = Arc::new(StubLookupBackend::new().with_response(Ok(response)));
        let flow = PhotoLookupFlow::new(backend);
        flow.select_image(poster()).unwrap();

        let err = flow.submit().await.unwrap_err();

        assert!(matches!(err, Error::Protocol(_)));
        assert!(matches!(flow.state(), LookupState::Failed { .. }));
    }

    #[tokio::test]
    async fn test_second_submit_while_in_flight_is_rejected() {
        let backend = Arc::new(StubLookupBackend::new().with_response(Ok(matched_response(9))));
        let flow = Arc::new(PhotoLookupFlow::new(backend.clone()));
        flow.select_image(poster()).unwrap();

        let entered = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        backend.gate_next(entered.clone(), release.clone());

        let first = {
            let flow = flow.clone();
            tokio::spawn(async move { flow.submit().await })
        };

        // Once the first upload is in flight, everything else bounces
        entered.notified().await;
        assert_eq!(flow.state(), LookupState::Submitting);

        let err = flow.submit().await.unwrap_err();
        assert!(matches!(err, Error::InvalidTransition(_)));

        let err = flow.select_image(poster()).unwrap_err();
        assert!(matches!(err, Error::InvalidTransition(_)));

        let err = flow.reset().unwrap_err();
        assert!(matches!(err, Error::InvalidTransition(_)));

        release.notify_one();
        let outcome = first.await.unwrap().unwrap();

        assert_eq!(outcome.event_id(), Some(9));
        assert_eq!(backend.call_count(), 1);
    }

    #[test]
    fn test_reset_discards_pending_photo() {
        let flow = PhotoLookupFlow::new(Arc::new(StubLookupBackend::new()));
        flow.select_image(poster()).unwrap();

        flow.reset().unwrap();

        assert_eq!(flow.state(), LookupState::Idle);
        assert!(flow.pending_upload().is_none());
    }

    #[tokio::test]
    async fn test_reselect_after_resolution_starts_fresh() {
        let backend = Arc::new(StubLookupBackend::new().with_response(Ok(matched_response(5))));
        let flow = PhotoLookupFlow::new(backend);
        flow.select_image(poster()).unwrap();
        flow.submit().await.unwrap();

        flow.select_image(poster()).unwrap();

        assert_eq!(flow.state(), LookupState::ImageSelected);
    }
}
