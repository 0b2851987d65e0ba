use thiserror::Error;

pub const GENERIC_REJECTION_MESSAGE: &str = "Upload failed";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadErrorCategory {
    UserActionRequired,
    TemporaryFailure,
    InternalFailure,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UploadError {
    #[error("validation failed: {message}")]
    Validation { message: String },
    #[error("upload rejected with status {status}")]
    Rejected { status: u16, message: Option<String> },
    #[error("upload request timed out")]
    Timeout,
    #[error("upload transport failed: {message}")]
    Transport { message: String },
    #[error("upload endpoint returned an invalid response: {message}")]
    InvalidResponse { message: String },
    #[error("upload was cancelled")]
    Cancelled,
    #[error("internal error: {message}")]
    Internal { message: String },
}

impl UploadError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    pub fn category(&self) -> UploadErrorCategory {
        match self {
            Self::Validation { .. } | Self::Rejected { .. } => {
                UploadErrorCategory::UserActionRequired
            }
            Self::Timeout | Self::Transport { .. } | Self::Cancelled => {
                UploadErrorCategory::TemporaryFailure
            }
            Self::InvalidResponse { .. } | Self::Internal { .. } => {
                UploadErrorCategory::InternalFailure
            }
        }
    }

    /// Whether resubmitting the same session (same idempotency key) can succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout | Self::Transport { .. } | Self::InvalidResponse { .. } => true,
            Self::Rejected { status, .. } => *status == 429 || *status >= 500,
            Self::Validation { .. } | Self::Cancelled | Self::Internal { .. } => false,
        }
    }

    /// Message shown in the session's `Failed` result.
    pub fn user_message(&self) -> String {
        match self {
            Self::Rejected { message, .. } => message
                .as_deref()
                .map(str::trim)
                .filter(|message| !message.is_empty())
                .unwrap_or(GENERIC_REJECTION_MESSAGE)
                .to_string(),
            Self::Timeout => "Network error: the upload request timed out".to_string(),
            Self::Transport { message } => format!("Network error: {message}"),
            Self::InvalidResponse { message } => {
                format!("Network error: invalid response from server ({message})")
            }
            Self::Validation { message } => format!("Please review the upload: {message}"),
            Self::Cancelled => "The upload was cancelled.".to_string(),
            Self::Internal { message } => {
                format!("An internal error occurred while uploading: {message}")
            }
        }
    }
}
