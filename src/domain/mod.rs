mod errors;
mod processing_task;
mod upload_contract;

pub use errors::{GENERIC_REJECTION_MESSAGE, UploadError, UploadErrorCategory};
pub use processing_task::{ProcessingTask, TaskSelection};
pub use upload_contract::{
    IdempotencyKey, ImageFile, UploadReceipt, UploadRequest, content_type_for_path,
    is_image_content_type,
};
