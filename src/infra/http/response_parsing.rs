use serde::Deserialize;

use crate::domain::{UploadError, UploadReceipt};

const MAX_ERROR_MESSAGE_LEN: usize = 256;

pub(crate) fn truncate_message(body: &str) -> String {
    let compact = body.trim().replace('\n', " ");
    compact.chars().take(MAX_ERROR_MESSAGE_LEN).collect()
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

pub(crate) fn parse_receipt(body: &str) -> Result<UploadReceipt, UploadError> {
    let receipt: UploadReceipt = serde_json::from_str(body).map_err(|err| {
        UploadError::invalid_response(format!("upload response decode failed: {err}"))
    })?;
    if receipt.job_id.trim().is_empty() || receipt.photo_id.trim().is_empty() {
        return Err(UploadError::invalid_response(
            "upload response contained an empty jobId or photoId",
        ));
    }
    Ok(receipt)
}

/// Extracts the server-supplied message from a rejection body, if any.
/// Non-JSON bodies and bodies without a message yield `None`.
pub(crate) fn rejection_message(body: &str) -> Option<String> {
    let envelope = serde_json::from_str::<ErrorEnvelope>(body).ok()?;
    envelope
        .message
        .or(envelope.error)
        .map(|message| truncate_message(&message))
        .filter(|message| !message.is_empty())
}
