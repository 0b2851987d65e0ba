mod photoblast;
mod response_parsing;
mod transport;

pub use photoblast::{
    DEFAULT_UPLOAD_TIMEOUT, IDEMPOTENCY_KEY_HEADER, PhotoBlastClient, UPLOAD_FILE_FIELD,
};
pub use transport::UploadTransport;
