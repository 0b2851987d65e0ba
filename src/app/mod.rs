mod cancellation;
mod idempotency;
mod input_unifier;
mod upload_controller;
mod upload_job_manager;
mod upload_service;
mod upload_session;

pub use cancellation::CancellationToken;
pub use idempotency::{IdempotencyKeyGenerator, TimestampKeyGenerator};
pub use input_unifier::{
    CandidateFile, DragPhase, DropOutcome, EventDisposition, FileInputControl, InputUnifier,
    SelectionSignal,
};
pub use upload_controller::{SubmitAttempt, UploadController, UploadControllerBuilder};
pub use upload_job_manager::{UploadJobManager, UploadJobState, UploadJobUpdate};
pub use upload_service::UploadService;
pub use upload_session::{
    SessionStatus, SubmitBlocker, UploadEffect, UploadEvent, UploadOutcome, UploadSession,
    UploadState, reduce,
};
