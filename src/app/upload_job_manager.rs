use std::collections::VecDeque;
use std::sync::{Arc, Mutex, mpsc};
use std::thread;

use crate::domain::{IdempotencyKey, UploadError, UploadReceipt, UploadRequest};

use super::{CancellationToken, UploadService};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UploadJobState {
    #[default]
    Idle,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UploadJobUpdate {
    pub ticket: u64,
    pub idempotency_key: IdempotencyKey,
    pub state: UploadJobState,
    pub receipt: Option<UploadReceipt>,
    pub error: Option<UploadError>,
}

impl UploadJobUpdate {
    fn running(ticket: u64, idempotency_key: IdempotencyKey) -> Self {
        Self {
            ticket,
            idempotency_key,
            state: UploadJobState::Running,
            receipt: None,
            error: None,
        }
    }

    fn succeeded(ticket: u64, idempotency_key: IdempotencyKey, receipt: UploadReceipt) -> Self {
        Self {
            ticket,
            idempotency_key,
            state: UploadJobState::Succeeded,
            receipt: Some(receipt),
            error: None,
        }
    }

    fn failed(ticket: u64, idempotency_key: IdempotencyKey, error: UploadError) -> Self {
        Self {
            ticket,
            idempotency_key,
            state: UploadJobState::Failed,
            receipt: None,
            error: Some(error),
        }
    }

    fn cancelled(ticket: u64, idempotency_key: IdempotencyKey) -> Self {
        Self {
            ticket,
            idempotency_key,
            state: UploadJobState::Cancelled,
            receipt: None,
            error: None,
        }
    }

    /// Terminal result for the session reducer; `None` for progress and
    /// cancellation notices.
    pub fn into_result(self) -> Option<Result<UploadReceipt, UploadError>> {
        match self.state {
            UploadJobState::Succeeded => self.receipt.map(Ok),
            UploadJobState::Failed => self.error.map(Err),
            UploadJobState::Idle | UploadJobState::Running | UploadJobState::Cancelled => None,
        }
    }
}

/// Runs upload attempts on a background worker with at most one live attempt.
/// A cancelled attempt is detached: its request may still drain on its own
/// thread, but it holds up neither the next attempt nor teardown.
pub struct UploadJobManager {
    command_tx: mpsc::Sender<WorkerMessage>,
    shared: Arc<Mutex<SharedState>>,
    worker_handle: Option<thread::JoinHandle<()>>,
}

impl UploadJobManager {
    pub fn new(service: UploadService) -> Result<Self, UploadError> {
        let shared = Arc::new(Mutex::new(SharedState::default()));
        let (command_tx, command_rx) = mpsc::channel();
        let worker_tx = command_tx.clone();
        let worker_shared = Arc::clone(&shared);

        let handle = thread::Builder::new()
            .name("photoblast-upload-worker".to_string())
            .spawn(move || worker_loop(service, command_rx, worker_tx, worker_shared))
            .map_err(|error| {
                UploadError::internal(format!("failed to start upload worker thread: {error}"))
            })?;

        Ok(Self {
            command_tx,
            shared,
            worker_handle: Some(handle),
        })
    }

    pub fn start(&self, ticket: u64, request: UploadRequest) -> Result<(), UploadError> {
        self.command_tx
            .send(WorkerMessage::Start { ticket, request })
            .map_err(|error| {
                UploadError::internal(format!(
                    "failed to submit upload to worker queue: {error}"
                ))
            })
    }

    /// Cancels one attempt and reports it `Cancelled` right away. Unknown,
    /// finished or already cancelled tickets are ignored.
    pub fn cancel(&self, ticket: u64) -> Result<(), UploadError> {
        self.command_tx
            .send(WorkerMessage::Cancel { ticket })
            .map_err(|error| {
                UploadError::internal(format!(
                    "failed to submit cancellation command to worker queue: {error}"
                ))
            })
    }

    pub fn state(&self) -> UploadJobState {
        self.shared
            .lock()
            .expect("upload job state lock poisoned")
            .state
    }

    pub fn latest_update(&self) -> Option<UploadJobUpdate> {
        self.shared
            .lock()
            .expect("upload job state lock poisoned")
            .latest
            .clone()
    }

    pub fn drain_updates(&self) -> Vec<UploadJobUpdate> {
        let mut shared = self.shared.lock().expect("upload job state lock poisoned");
        shared.updates.drain(..).collect()
    }
}

impl Drop for UploadJobManager {
    fn drop(&mut self) {
        // The live attempt is cancelled and its request thread detached.
        let _ = self.command_tx.send(WorkerMessage::Shutdown);

        if let Some(handle) = self.worker_handle.take() {
            let _ = handle.join();
        }
    }
}

#[derive(Default)]
struct SharedState {
    state: UploadJobState,
    latest: Option<UploadJobUpdate>,
    updates: VecDeque<UploadJobUpdate>,
}

enum WorkerMessage {
    Start {
        ticket: u64,
        request: UploadRequest,
    },
    Completion {
        ticket: u64,
        result: Result<UploadReceipt, UploadError>,
    },
    Cancel {
        ticket: u64,
    },
    Shutdown,
}

struct RunningJob {
    ticket: u64,
    idempotency_key: IdempotencyKey,
    cancel: CancellationToken,
    task_handle: Option<thread::JoinHandle<()>>,
}

impl RunningJob {
    /// Signals the attempt and detaches its thread. A late `Completion` for
    /// this ticket no longer matches the live job and is dropped.
    fn cancel(self, shared: &Arc<Mutex<SharedState>>) {
        self.cancel.cancel();
        push_update(
            shared,
            UploadJobUpdate::cancelled(self.ticket, self.idempotency_key),
        );
    }

    fn join(mut self) {
        if let Some(task_handle) = self.task_handle.take() {
            let _ = task_handle.join();
        }
    }
}

fn worker_loop(
    service: UploadService,
    command_rx: mpsc::Receiver<WorkerMessage>,
    command_tx: mpsc::Sender<WorkerMessage>,
    shared: Arc<Mutex<SharedState>>,
) {
    let mut in_flight: Option<RunningJob> = None;

    while let Ok(message) = command_rx.recv() {
        match message {
            WorkerMessage::Start { ticket, request } => {
                if let Some(superseded) = in_flight.take() {
                    superseded.cancel(&shared);
                }
                in_flight = Some(spawn_upload_job(
                    &service,
                    &command_tx,
                    &shared,
                    ticket,
                    request,
                ));
            }
            WorkerMessage::Completion { ticket, result } => {
                let Some(finished_job) = in_flight.take_if(|job| job.ticket == ticket) else {
                    continue;
                };

                let key = finished_job.idempotency_key.clone();
                match result {
                    Ok(receipt) => {
                        push_update(&shared, UploadJobUpdate::succeeded(ticket, key, receipt));
                    }
                    Err(UploadError::Cancelled) => {
                        push_update(&shared, UploadJobUpdate::cancelled(ticket, key));
                    }
                    Err(error) => {
                        push_update(&shared, UploadJobUpdate::failed(ticket, key, error));
                    }
                }
                finished_job.join();
            }
            WorkerMessage::Cancel { ticket } => {
                if let Some(cancelled) = in_flight.take_if(|job| job.ticket == ticket) {
                    cancelled.cancel(&shared);
                }
            }
            WorkerMessage::Shutdown => {
                if let Some(cancelled) = in_flight.take() {
                    cancelled.cancel(&shared);
                }
                break;
            }
        }
    }
}

fn spawn_upload_job(
    service: &UploadService,
    command_tx: &mpsc::Sender<WorkerMessage>,
    shared: &Arc<Mutex<SharedState>>,
    ticket: u64,
    request: UploadRequest,
) -> RunningJob {
    let idempotency_key = request.idempotency_key.clone();
    let cancel = CancellationToken::new();
    let cancel_for_thread = cancel.clone();
    let tx_for_thread = command_tx.clone();
    let service_for_thread = service.clone();

    let task_handle = thread::spawn(move || {
        let result = service_for_thread.upload_with_cancel(&request, &cancel_for_thread);
        let _ = tx_for_thread.send(WorkerMessage::Completion { ticket, result });
    });

    push_update(
        shared,
        UploadJobUpdate::running(ticket, idempotency_key.clone()),
    );

    RunningJob {
        ticket,
        idempotency_key,
        cancel,
        task_handle: Some(task_handle),
    }
}

fn push_update(shared: &Arc<Mutex<SharedState>>, update: UploadJobUpdate) {
    let mut shared = shared
        .lock()
        .expect("upload job state lock poisoned during update");
    shared.state = update.state;
    shared.latest = Some(update.clone());
    shared.updates.push_back(update);
}
