use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::domain::{IdempotencyKey, ProcessingTask, TaskSelection, UploadError};
use crate::infra::http::UploadTransport;
use crate::infra::preview::{BlobPreviewRegistry, PreviewHandle, PreviewHost};

use super::{
    CandidateFile, DragPhase, EventDisposition, FileInputControl, IdempotencyKeyGenerator,
    InputUnifier, SelectionSignal, SessionStatus, SubmitBlocker, TimestampKeyGenerator,
    UploadEffect, UploadEvent, UploadJobManager, UploadOutcome, UploadService, UploadSession,
    UploadState, reduce,
};

const SETTLE_POLL_INTERVAL: Duration = Duration::from_millis(20);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitAttempt {
    Started { ticket: u64 },
    Ignored(SubmitBlocker),
}

pub struct UploadControllerBuilder {
    transport: Arc<dyn UploadTransport>,
    previews: Option<Arc<dyn PreviewHost>>,
    keys: Option<Arc<dyn IdempotencyKeyGenerator>>,
    file_input: Option<Arc<dyn FileInputControl>>,
    default_tasks: TaskSelection,
}

impl UploadControllerBuilder {
    pub fn preview_host(mut self, previews: Arc<dyn PreviewHost>) -> Self {
        self.previews = Some(previews);
        self
    }

    pub fn key_generator(mut self, keys: Arc<dyn IdempotencyKeyGenerator>) -> Self {
        self.keys = Some(keys);
        self
    }

    pub fn file_input(mut self, file_input: Arc<dyn FileInputControl>) -> Self {
        self.file_input = Some(file_input);
        self
    }

    pub fn default_tasks(mut self, default_tasks: TaskSelection) -> Self {
        self.default_tasks = default_tasks;
        self
    }

    pub fn build(self) -> Result<UploadController, UploadError> {
        let jobs = UploadJobManager::new(UploadService::new(self.transport))?;
        let input = match self.file_input {
            Some(file_input) => InputUnifier::with_file_input(file_input),
            None => InputUnifier::new(),
        };

        Ok(UploadController {
            state: UploadState::with_default_tasks(self.default_tasks),
            input,
            previews: self
                .previews
                .unwrap_or_else(|| Arc::new(BlobPreviewRegistry::new())),
            keys: self
                .keys
                .unwrap_or_else(|| Arc::new(TimestampKeyGenerator)),
            jobs,
        })
    }
}

/// One upload component: input unification, the session state machine and
/// the background submission worker. Dropping it cancels any in-flight
/// upload and releases the live preview.
pub struct UploadController {
    state: UploadState,
    input: InputUnifier,
    previews: Arc<dyn PreviewHost>,
    keys: Arc<dyn IdempotencyKeyGenerator>,
    jobs: UploadJobManager,
}

impl UploadController {
    pub fn new(transport: Arc<dyn UploadTransport>) -> Result<Self, UploadError> {
        Self::builder(transport).build()
    }

    pub fn builder(transport: Arc<dyn UploadTransport>) -> UploadControllerBuilder {
        UploadControllerBuilder {
            transport,
            previews: None,
            keys: None,
            file_input: None,
            default_tasks: TaskSelection::default(),
        }
    }

    /// Returns true when the picked file started a new session.
    pub fn on_file_picked(
        &mut self,
        files: impl IntoIterator<Item = CandidateFile>,
    ) -> Result<bool, UploadError> {
        let signal = self.input.on_file_picked(files);
        self.apply_selection(signal)
    }

    pub fn on_dropped(
        &mut self,
        files: impl IntoIterator<Item = CandidateFile>,
    ) -> Result<EventDisposition, UploadError> {
        let outcome = self.input.on_dropped(files);
        self.apply_selection(outcome.signal)?;
        Ok(outcome.disposition)
    }

    pub fn on_drag_state_change(&mut self, phase: DragPhase) -> EventDisposition {
        self.input.on_drag_state_change(phase)
    }

    pub fn on_clear(&mut self) -> Result<(), UploadError> {
        let signal = self.input.on_clear();
        self.apply_selection(Some(signal)).map(|_| ())
    }

    pub fn toggle_task(&mut self, task: ProcessingTask) {
        // Toggling never produces effects.
        let _ = reduce(&mut self.state, UploadEvent::TaskToggled(task));
    }

    pub fn submit(&mut self) -> Result<SubmitAttempt, UploadError> {
        if let Some(blocker) = self.state.submit_blocker() {
            return Ok(SubmitAttempt::Ignored(blocker));
        }
        let effects = reduce(&mut self.state, UploadEvent::SubmitRequested);
        let ticket = effects.iter().find_map(|effect| match effect {
            UploadEffect::StartUpload { ticket, .. } => Some(*ticket),
            UploadEffect::CancelUpload { .. } => None,
        });
        self.run_effects(effects)?;
        Ok(ticket.map_or(
            SubmitAttempt::Ignored(SubmitBlocker::InFlight),
            |ticket| SubmitAttempt::Started { ticket },
        ))
    }

    /// Feeds finished uploads back into the state machine. Returns the
    /// number of completions applied.
    pub fn poll(&mut self) -> usize {
        let mut applied = 0;
        for update in self.jobs.drain_updates() {
            let ticket = update.ticket;
            if let Some(result) = update.into_result() {
                let _ = reduce(
                    &mut self.state,
                    UploadEvent::SubmissionFinished { ticket, result },
                );
                applied += 1;
            }
        }
        applied
    }

    /// Polls until the session leaves `Submitting` or the timeout elapses.
    pub fn wait_until_settled(&mut self, timeout: Duration) -> SessionStatus {
        let started = Instant::now();
        loop {
            self.poll();
            let status = self.state.status();
            if status != SessionStatus::Submitting || started.elapsed() >= timeout {
                return status;
            }
            thread::sleep(SETTLE_POLL_INTERVAL);
        }
    }

    pub fn status(&self) -> SessionStatus {
        self.state.status()
    }

    pub fn session(&self) -> Option<&UploadSession> {
        self.state.session()
    }

    pub fn selected_tasks(&self) -> &TaskSelection {
        self.state.selected_tasks()
    }

    pub fn idempotency_key(&self) -> Option<&IdempotencyKey> {
        self.state.idempotency_key()
    }

    pub fn result(&self) -> Option<&UploadOutcome> {
        self.state.result()
    }

    pub fn preview_url(&self) -> Option<&str> {
        self.state.session().map(UploadSession::preview_url)
    }

    pub fn can_submit(&self) -> bool {
        self.state.can_submit()
    }

    pub fn is_drag_active(&self) -> bool {
        self.input.is_drag_active()
    }

    fn apply_selection(&mut self, signal: Option<SelectionSignal>) -> Result<bool, UploadError> {
        let event = match signal {
            Some(SelectionSignal::Accepted(file)) => UploadEvent::SessionCreated {
                preview: PreviewHandle::acquire(Arc::clone(&self.previews), &file),
                idempotency_key: self.keys.generate(),
                file,
            },
            Some(SelectionSignal::Cleared) => UploadEvent::Cleared,
            None => return Ok(false),
        };
        let created = matches!(event, UploadEvent::SessionCreated { .. });
        let effects = reduce(&mut self.state, event);
        self.run_effects(effects)?;
        Ok(created)
    }

    fn run_effects(&mut self, effects: Vec<UploadEffect>) -> Result<(), UploadError> {
        for effect in effects {
            match effect {
                UploadEffect::StartUpload { ticket, request } => {
                    if let Err(error) = self.jobs.start(ticket, request) {
                        let _ = reduce(
                            &mut self.state,
                            UploadEvent::SubmissionFinished {
                                ticket,
                                result: Err(error.clone()),
                            },
                        );
                        return Err(error);
                    }
                }
                UploadEffect::CancelUpload { ticket } => self.jobs.cancel(ticket)?,
            }
        }
        Ok(())
    }
}

impl Drop for UploadController {
    fn drop(&mut self) {
        let effects = reduce(&mut self.state, UploadEvent::Cleared);
        if let Err(error) = self.run_effects(effects) {
            tracing::warn!(%error, "failed to cancel upload during teardown");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex, mpsc};
    use std::thread;
    use std::time::{Duration, Instant};

    use super::{SubmitAttempt, UploadController};
    use crate::app::{
        CandidateFile, DragPhase, EventDisposition, IdempotencyKeyGenerator, SessionStatus,
        SubmitBlocker, UploadOutcome,
    };
    use crate::domain::{
        IdempotencyKey, ProcessingTask, UploadError, UploadReceipt, UploadRequest,
    };
    use crate::infra::http::UploadTransport;
    use crate::infra::preview::BlobPreviewRegistry;

    #[derive(Default)]
    struct ScriptedTransport {
        responses: Mutex<Vec<Result<UploadReceipt, UploadError>>>,
        seen: Mutex<Vec<(String, String)>>,
    }

    impl ScriptedTransport {
        fn with_responses(responses: Vec<Result<UploadReceipt, UploadError>>) -> Self {
            Self {
                responses: Mutex::new(responses),
                seen: Mutex::new(Vec::new()),
            }
        }

        fn seen(&self) -> Vec<(String, String)> {
            self.seen.lock().expect("seen lock poisoned").clone()
        }
    }

    impl UploadTransport for ScriptedTransport {
        fn upload(&self, request: &UploadRequest) -> Result<UploadReceipt, UploadError> {
            self.seen.lock().expect("seen lock poisoned").push((
                request.idempotency_key.as_str().to_string(),
                request.tasks.to_query_value(),
            ));
            let mut responses = self.responses.lock().expect("responses lock poisoned");
            if responses.is_empty() {
                return Err(UploadError::transport("no scripted response"));
            }
            responses.remove(0)
        }

        fn health_check(&self) -> Result<(), UploadError> {
            Ok(())
        }
    }

    /// Holds every upload until the test sends on the release channel.
    struct HeldTransport {
        entered: AtomicBool,
        release: Mutex<mpsc::Receiver<()>>,
    }

    impl UploadTransport for HeldTransport {
        fn upload(&self, _request: &UploadRequest) -> Result<UploadReceipt, UploadError> {
            self.entered.store(true, Ordering::SeqCst);
            let _ = self.release.lock().expect("release lock poisoned").recv();
            Ok(receipt())
        }

        fn health_check(&self) -> Result<(), UploadError> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct SequentialKeys {
        next: AtomicUsize,
    }

    impl IdempotencyKeyGenerator for SequentialKeys {
        fn generate(&self) -> IdempotencyKey {
            let id = self.next.fetch_add(1, Ordering::SeqCst) + 1;
            IdempotencyKey::new(format!("key-{id}")).expect("key should build")
        }
    }

    fn receipt() -> UploadReceipt {
        UploadReceipt {
            job_id: "j1".to_string(),
            photo_id: "p1".to_string(),
        }
    }

    fn jpeg() -> CandidateFile {
        CandidateFile::new("photo.jpg", "image/jpeg", vec![0_u8; 10 * 1024])
    }

    fn controller(
        transport: Arc<ScriptedTransport>,
        previews: Arc<BlobPreviewRegistry>,
    ) -> UploadController {
        UploadController::builder(transport)
            .preview_host(previews)
            .key_generator(Arc::new(SequentialKeys::default()))
            .build()
            .expect("controller should build")
    }

    #[test]
    fn picked_image_submits_and_succeeds() {
        let transport = Arc::new(ScriptedTransport::with_responses(vec![Ok(receipt())]));
        let previews = Arc::new(BlobPreviewRegistry::new());
        let mut controller = controller(transport.clone(), previews.clone());

        assert!(
            controller
                .on_file_picked(vec![jpeg()])
                .expect("pick should apply")
        );
        assert_eq!(controller.status(), SessionStatus::Ready);
        assert_eq!(previews.live_count(), 1);

        let attempt = controller.submit().expect("submit should start");
        assert!(matches!(attempt, SubmitAttempt::Started { .. }));
        assert_eq!(
            controller.wait_until_settled(Duration::from_secs(2)),
            SessionStatus::Succeeded
        );
        assert_eq!(
            controller.result(),
            Some(&UploadOutcome::Succeeded(receipt()))
        );
        assert_eq!(
            transport.seen(),
            vec![("key-1".to_string(), "RESIZE,THUMBNAIL".to_string())]
        );
    }

    #[test]
    fn non_image_pick_does_not_touch_existing_session() {
        let transport = Arc::new(ScriptedTransport::default());
        let previews = Arc::new(BlobPreviewRegistry::new());
        let mut controller = controller(transport, previews.clone());
        controller
            .on_file_picked(vec![jpeg()])
            .expect("pick should apply");

        let created = controller
            .on_file_picked(vec![CandidateFile::new(
                "notes.txt",
                "text/plain",
                b"hi".to_vec(),
            )])
            .expect("pick should apply");

        assert!(!created);
        assert_eq!(
            controller.idempotency_key().map(IdempotencyKey::as_str),
            Some("key-1")
        );
        assert_eq!(previews.live_count(), 1);
    }

    #[test]
    fn retry_after_transport_failure_reuses_key() {
        let transport = Arc::new(ScriptedTransport::with_responses(vec![
            Err(UploadError::transport("connection reset")),
            Ok(receipt()),
        ]));
        let previews = Arc::new(BlobPreviewRegistry::new());
        let mut controller = controller(transport.clone(), previews);
        controller
            .on_file_picked(vec![jpeg()])
            .expect("pick should apply");

        controller.submit().expect("first submit should start");
        assert_eq!(
            controller.wait_until_settled(Duration::from_secs(2)),
            SessionStatus::Failed
        );
        controller.submit().expect("retry should start");
        assert_eq!(
            controller.wait_until_settled(Duration::from_secs(2)),
            SessionStatus::Succeeded
        );

        let seen = transport.seen();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].0, "key-1");
        assert_eq!(seen[1].0, "key-1");
    }

    #[test]
    fn submit_without_session_is_ignored() {
        let transport = Arc::new(ScriptedTransport::default());
        let mut controller = controller(transport.clone(), Arc::new(BlobPreviewRegistry::new()));

        assert_eq!(
            controller.submit().expect("submit should not error"),
            SubmitAttempt::Ignored(SubmitBlocker::NoSession)
        );
        assert!(transport.seen().is_empty());
    }

    #[test]
    fn drop_gestures_are_consumed_and_select_images() {
        let transport = Arc::new(ScriptedTransport::default());
        let mut controller = controller(transport, Arc::new(BlobPreviewRegistry::new()));

        assert_eq!(
            controller.on_drag_state_change(DragPhase::Enter),
            EventDisposition::CONSUMED
        );
        assert!(controller.is_drag_active());

        let disposition = controller
            .on_dropped(vec![jpeg()])
            .expect("drop should apply");
        assert_eq!(disposition, EventDisposition::CONSUMED);
        assert!(!controller.is_drag_active());
        assert_eq!(controller.status(), SessionStatus::Ready);
    }

    #[test]
    fn clear_resets_tasks_key_and_preview() {
        let transport = Arc::new(ScriptedTransport::default());
        let previews = Arc::new(BlobPreviewRegistry::new());
        let mut controller = controller(transport, previews.clone());
        controller
            .on_file_picked(vec![jpeg()])
            .expect("pick should apply");
        controller.toggle_task(ProcessingTask::Watermark);
        assert!(controller.preview_url().is_some());

        controller.on_clear().expect("clear should apply");

        assert_eq!(controller.status(), SessionStatus::Idle);
        assert_eq!(controller.idempotency_key(), None);
        assert_eq!(
            controller.selected_tasks().to_query_value(),
            "RESIZE,THUMBNAIL"
        );
        assert!(!controller.can_submit());
        assert_eq!(previews.live_count(), 0);
    }

    #[test]
    fn dropping_controller_releases_live_preview() {
        let transport = Arc::new(ScriptedTransport::default());
        let previews = Arc::new(BlobPreviewRegistry::new());
        let mut controller = controller(transport, previews.clone());
        controller
            .on_file_picked(vec![jpeg()])
            .expect("pick should apply");

        drop(controller);

        assert_eq!(previews.live_count(), 0);
    }

    #[test]
    fn dropping_controller_mid_flight_cancels_without_waiting() {
        let (release_tx, release_rx) = mpsc::channel();
        let transport = Arc::new(HeldTransport {
            entered: AtomicBool::new(false),
            release: Mutex::new(release_rx),
        });
        let previews = Arc::new(BlobPreviewRegistry::new());
        let mut controller = UploadController::builder(transport.clone())
            .preview_host(previews.clone())
            .key_generator(Arc::new(SequentialKeys::default()))
            .build()
            .expect("controller should build");
        controller
            .on_file_picked(vec![jpeg()])
            .expect("pick should apply");
        controller.submit().expect("submit should start");
        let started = Instant::now();
        while !transport.entered.load(Ordering::SeqCst) {
            assert!(started.elapsed() < Duration::from_secs(2), "upload never started");
            thread::sleep(Duration::from_millis(5));
        }

        let drop_started_at = Instant::now();
        drop(controller);

        assert!(drop_started_at.elapsed() < Duration::from_millis(200));
        assert_eq!(previews.live_count(), 0);
        let _ = release_tx.send(());
    }
}
