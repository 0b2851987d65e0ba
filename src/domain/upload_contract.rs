use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;

use super::{TaskSelection, UploadError};

const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// Returns true when a declared content type is `image/<subtype>` with a
/// non-empty subtype, so the multipart part can always carry it.
pub fn is_image_content_type(content_type: &str) -> bool {
    let Some((kind, rest)) = content_type.trim().split_once('/') else {
        return false;
    };
    let subtype = rest.split(';').next().map(str::trim).unwrap_or_default();
    kind.eq_ignore_ascii_case("image")
        && !subtype.is_empty()
        && !subtype.contains(|c: char| c == '/' || c.is_whitespace())
}

/// Declared content type for a local path, by extension.
pub fn content_type_for_path(path: &Path) -> &'static str {
    let Some(extension) = path.extension().and_then(|ext| ext.to_str()) else {
        return FALLBACK_CONTENT_TYPE;
    };

    match extension.to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        "tif" | "tiff" => "image/tiff",
        "avif" => "image/avif",
        "heic" => "image/heic",
        "svg" => "image/svg+xml",
        "txt" => "text/plain",
        "pdf" => "application/pdf",
        _ => FALLBACK_CONTENT_TYPE,
    }
}

/// Selected binary content. Bytes are shared so the worker thread can take a
/// cheap clone while the session keeps ownership of the handle.
#[derive(Clone, PartialEq, Eq)]
pub struct ImageFile {
    name: String,
    content_type: String,
    bytes: Arc<[u8]>,
}

impl ImageFile {
    pub fn new(
        name: impl Into<String>,
        content_type: impl Into<String>,
        bytes: impl Into<Arc<[u8]>>,
    ) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.into(),
            bytes: bytes.into(),
        }
    }

    pub fn from_path(path: &Path) -> Result<Self, UploadError> {
        let bytes = fs::read(path).map_err(|error| {
            UploadError::validation(format!("could not read '{}': {error}", path.display()))
        })?;
        let name = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("upload")
            .to_string();
        Ok(Self::new(name, content_type_for_path(path), bytes))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl fmt::Debug for ImageFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageFile")
            .field("name", &self.name)
            .field("content_type", &self.content_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Client-generated token that lets the backend deduplicate retried uploads.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IdempotencyKey(String);

impl IdempotencyKey {
    pub fn new(value: impl Into<String>) -> Result<Self, UploadError> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(UploadError::validation("idempotency key must not be empty"));
        }
        Ok(Self(value))
    }

    pub(crate) fn from_parts(timestamp_millis: u128, suffix: &str) -> Self {
        Self(format!("{timestamp_millis}-{suffix}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IdempotencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One submission attempt, snapshotted from the live session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRequest {
    pub file: ImageFile,
    pub tasks: TaskSelection,
    pub idempotency_key: IdempotencyKey,
}

impl UploadRequest {
    pub fn validate(&self) -> Result<(), UploadError> {
        if self.tasks.is_empty() {
            return Err(UploadError::validation(
                "at least one processing task must be selected",
            ));
        }
        if !is_image_content_type(self.file.content_type()) {
            return Err(UploadError::validation(format!(
                "file content type '{}' is not an image",
                self.file.content_type()
            )));
        }
        Ok(())
    }
}

/// Successful backend response. Extra fields are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadReceipt {
    pub job_id: String,
    pub photo_id: String,
}
