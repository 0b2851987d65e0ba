use crate::domain::{UploadError, UploadReceipt, UploadRequest};

pub trait UploadTransport: Send + Sync {
    fn upload(&self, request: &UploadRequest) -> Result<UploadReceipt, UploadError>;

    /// Checks that the backend is reachable without uploading anything.
    fn health_check(&self) -> Result<(), UploadError>;
}
