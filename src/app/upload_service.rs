use std::sync::Arc;

use crate::domain::{UploadError, UploadReceipt, UploadRequest};
use crate::infra::http::UploadTransport;

use super::CancellationToken;

#[derive(Clone)]
pub struct UploadService {
    transport: Arc<dyn UploadTransport>,
}

impl UploadService {
    pub fn new(transport: Arc<dyn UploadTransport>) -> Self {
        Self { transport }
    }

    pub fn upload(&self, request: &UploadRequest) -> Result<UploadReceipt, UploadError> {
        self.upload_with_cancel(request, &CancellationToken::new())
    }

    /// Runs one attempt. A cancelled attempt reports `Cancelled` even if the
    /// transport call already completed, so a retired session never sees it.
    pub fn upload_with_cancel(
        &self,
        request: &UploadRequest,
        cancel: &CancellationToken,
    ) -> Result<UploadReceipt, UploadError> {
        request.validate()?;
        if cancel.is_cancelled() {
            return Err(UploadError::Cancelled);
        }

        let result = self.transport.upload(request);

        if cancel.is_cancelled() {
            return Err(UploadError::Cancelled);
        }
        result
    }
}
