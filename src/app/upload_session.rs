use crate::domain::{
    IdempotencyKey, ImageFile, ProcessingTask, TaskSelection, UploadError, UploadReceipt,
    UploadRequest,
};
use crate::infra::preview::PreviewHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionStatus {
    #[default]
    Idle,
    Ready,
    Submitting,
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    Succeeded(UploadReceipt),
    Failed { message: String, retryable: bool },
}

impl UploadOutcome {
    pub fn receipt(&self) -> Option<&UploadReceipt> {
        match self {
            Self::Succeeded(receipt) => Some(receipt),
            Self::Failed { .. } => None,
        }
    }

    pub fn failure_message(&self) -> Option<&str> {
        match self {
            Self::Succeeded(_) => None,
            Self::Failed { message, .. } => Some(message),
        }
    }
}

/// Why a submit request was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitBlocker {
    NoSession,
    EmptyTaskSelection,
    InFlight,
    AlreadySucceeded,
}

#[derive(Debug)]
pub struct UploadSession {
    file: ImageFile,
    preview: PreviewHandle,
    selected_tasks: TaskSelection,
    idempotency_key: IdempotencyKey,
    status: SessionStatus,
    result: Option<UploadOutcome>,
    in_flight: Option<u64>,
    attempts: u32,
}

impl UploadSession {
    fn new(
        file: ImageFile,
        preview: PreviewHandle,
        idempotency_key: IdempotencyKey,
        selected_tasks: TaskSelection,
    ) -> Self {
        Self {
            file,
            preview,
            selected_tasks,
            idempotency_key,
            status: SessionStatus::Ready,
            result: None,
            in_flight: None,
            attempts: 0,
        }
    }

    pub fn file(&self) -> &ImageFile {
        &self.file
    }

    pub fn preview_url(&self) -> &str {
        self.preview.url()
    }

    pub fn selected_tasks(&self) -> &TaskSelection {
        &self.selected_tasks
    }

    pub fn idempotency_key(&self) -> &IdempotencyKey {
        &self.idempotency_key
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn result(&self) -> Option<&UploadOutcome> {
        self.result.as_ref()
    }

    pub fn in_flight_ticket(&self) -> Option<u64> {
        self.in_flight
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    fn submit_blocker(&self) -> Option<SubmitBlocker> {
        match self.status {
            SessionStatus::Submitting => Some(SubmitBlocker::InFlight),
            SessionStatus::Succeeded => Some(SubmitBlocker::AlreadySucceeded),
            SessionStatus::Idle | SessionStatus::Ready | SessionStatus::Failed => self
                .selected_tasks
                .is_empty()
                .then_some(SubmitBlocker::EmptyTaskSelection),
        }
    }

    /// Releases the preview and hands back the ticket of an attempt that is
    /// still running, so the caller can cancel it.
    fn retire(self) -> Option<u64> {
        let Self {
            preview, in_flight, ..
        } = self;
        preview.release();
        in_flight
    }
}

pub enum UploadEvent {
    SessionCreated {
        file: ImageFile,
        preview: PreviewHandle,
        idempotency_key: IdempotencyKey,
    },
    TaskToggled(ProcessingTask),
    SubmitRequested,
    SubmissionFinished {
        ticket: u64,
        result: Result<UploadReceipt, UploadError>,
    },
    Cleared,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadEffect {
    StartUpload { ticket: u64, request: UploadRequest },
    CancelUpload { ticket: u64 },
}

/// The single live session of one upload component, plus the defaults a new
/// session starts from.
#[derive(Debug)]
pub struct UploadState {
    session: Option<UploadSession>,
    default_tasks: TaskSelection,
    next_ticket: u64,
}

impl UploadState {
    pub fn new() -> Self {
        Self::with_default_tasks(TaskSelection::default())
    }

    pub fn with_default_tasks(default_tasks: TaskSelection) -> Self {
        Self {
            session: None,
            default_tasks,
            next_ticket: 1,
        }
    }

    pub fn session(&self) -> Option<&UploadSession> {
        self.session.as_ref()
    }

    pub fn status(&self) -> SessionStatus {
        self.session
            .as_ref()
            .map_or(SessionStatus::Idle, UploadSession::status)
    }

    /// The live session's tasks, or the defaults when no session exists.
    pub fn selected_tasks(&self) -> &TaskSelection {
        self.session
            .as_ref()
            .map_or(&self.default_tasks, UploadSession::selected_tasks)
    }

    pub fn idempotency_key(&self) -> Option<&IdempotencyKey> {
        self.session.as_ref().map(UploadSession::idempotency_key)
    }

    pub fn result(&self) -> Option<&UploadOutcome> {
        self.session.as_ref().and_then(UploadSession::result)
    }

    pub fn submit_blocker(&self) -> Option<SubmitBlocker> {
        match &self.session {
            Some(session) => session.submit_blocker(),
            None => Some(SubmitBlocker::NoSession),
        }
    }

    pub fn can_submit(&self) -> bool {
        self.submit_blocker().is_none()
    }

    /// Retires the live session, if any. Used on clear and teardown.
    fn retire_session(&mut self) -> Vec<UploadEffect> {
        self.session
            .take()
            .and_then(UploadSession::retire)
            .map(|ticket| vec![UploadEffect::CancelUpload { ticket }])
            .unwrap_or_default()
    }
}

impl Default for UploadState {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for UploadState {
    fn drop(&mut self) {
        // Releases the preview only. Cancelling the in-flight attempt is the
        // owner's job: `UploadController` clears before drop, and
        // `UploadJobManager` cancels whatever is still live on shutdown.
        let _ = self.retire_session();
    }
}

pub fn reduce(state: &mut UploadState, event: UploadEvent) -> Vec<UploadEffect> {
    match event {
        UploadEvent::SessionCreated {
            file,
            preview,
            idempotency_key,
        } => create_session(state, file, preview, idempotency_key),
        UploadEvent::TaskToggled(task) => {
            toggle_task(state, task);
            Vec::new()
        }
        UploadEvent::SubmitRequested => submit(state),
        UploadEvent::SubmissionFinished { ticket, result } => {
            finish_submission(state, ticket, result);
            Vec::new()
        }
        UploadEvent::Cleared => {
            let effects = state.retire_session();
            tracing::info!("upload session cleared");
            effects
        }
    }
}

fn create_session(
    state: &mut UploadState,
    file: ImageFile,
    preview: PreviewHandle,
    idempotency_key: IdempotencyKey,
) -> Vec<UploadEffect> {
    let effects = state.retire_session();
    tracing::info!(
        file = %file.name(),
        bytes = file.len(),
        idempotency_key = %idempotency_key,
        "upload session created"
    );
    state.session = Some(UploadSession::new(
        file,
        preview,
        idempotency_key,
        state.default_tasks.clone(),
    ));
    effects
}

fn toggle_task(state: &mut UploadState, task: ProcessingTask) {
    let Some(session) = state.session.as_mut() else {
        tracing::debug!(task = %task, "ignoring task toggle without a session");
        return;
    };
    let selected = session.selected_tasks.toggle(task);
    tracing::debug!(task = %task, selected, "task selection changed");
}

fn submit(state: &mut UploadState) -> Vec<UploadEffect> {
    if let Some(blocker) = state.submit_blocker() {
        tracing::debug!(?blocker, "submit ignored");
        return Vec::new();
    }
    let ticket = state.next_ticket;
    let Some(session) = state.session.as_mut() else {
        return Vec::new();
    };
    state.next_ticket = state.next_ticket.saturating_add(1);

    session.status = SessionStatus::Submitting;
    session.result = None;
    session.in_flight = Some(ticket);
    session.attempts = session.attempts.saturating_add(1);

    let request = UploadRequest {
        file: session.file.clone(),
        tasks: session.selected_tasks.clone(),
        idempotency_key: session.idempotency_key.clone(),
    };
    tracing::info!(
        ticket,
        attempt = session.attempts,
        tasks = %request.tasks.to_query_value(),
        idempotency_key = %request.idempotency_key,
        "submitting upload"
    );
    vec![UploadEffect::StartUpload { ticket, request }]
}

fn finish_submission(
    state: &mut UploadState,
    ticket: u64,
    result: Result<UploadReceipt, UploadError>,
) {
    let Some(session) = state
        .session
        .as_mut()
        .filter(|session| session.in_flight == Some(ticket))
    else {
        tracing::debug!(ticket, "ignoring completion of a retired attempt");
        return;
    };
    session.in_flight = None;

    match result {
        Ok(receipt) => {
            tracing::info!(
                ticket,
                job_id = %receipt.job_id,
                photo_id = %receipt.photo_id,
                "upload succeeded"
            );
            session.status = SessionStatus::Succeeded;
            session.result = Some(UploadOutcome::Succeeded(receipt));
        }
        Err(error) => {
            tracing::warn!(ticket, %error, "upload failed");
            session.status = SessionStatus::Failed;
            session.result = Some(UploadOutcome::Failed {
                message: error.user_message(),
                retryable: error.is_retryable(),
            });
        }
    }
}
