use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::domain::ImageFile;

const PREVIEW_URL_PREFIX: &str = "blob:photoblast/";

/// Host-managed store of revocable preview references (object URLs).
pub trait PreviewHost: Send + Sync {
    fn create(&self, file: &ImageFile) -> String;

    /// Revoking an unknown or already revoked URL must be a no-op.
    fn revoke(&self, url: &str);
}

/// Owned preview reference. Revoked through its host exactly once, either by
/// `release` or when dropped.
pub struct PreviewHandle {
    url: String,
    host: Arc<dyn PreviewHost>,
    released: bool,
}

impl PreviewHandle {
    pub fn acquire(host: Arc<dyn PreviewHost>, file: &ImageFile) -> Self {
        let url = host.create(file);
        Self {
            url,
            host,
            released: false,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn release(mut self) {
        self.release_once();
    }

    fn release_once(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        self.host.revoke(&self.url);
        tracing::debug!(url = %self.url, "preview released");
    }
}

impl Drop for PreviewHandle {
    fn drop(&mut self) {
        self.release_once();
    }
}

impl fmt::Debug for PreviewHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PreviewHandle")
            .field("url", &self.url)
            .field("released", &self.released)
            .finish()
    }
}

impl PartialEq for PreviewHandle {
    fn eq(&self, other: &Self) -> bool {
        self.url == other.url
    }
}

impl Eq for PreviewHandle {}

/// In-process preview host that keeps the previewed file addressable by a
/// `blob:` style URL until it is revoked.
#[derive(Default)]
pub struct BlobPreviewRegistry {
    next_id: AtomicU64,
    live: Mutex<HashMap<String, ImageFile>>,
}

impl BlobPreviewRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resolve(&self, url: &str) -> Option<ImageFile> {
        self.live
            .lock()
            .expect("preview registry lock poisoned")
            .get(url)
            .cloned()
    }

    pub fn live_count(&self) -> usize {
        self.live
            .lock()
            .expect("preview registry lock poisoned")
            .len()
    }
}

impl PreviewHost for BlobPreviewRegistry {
    fn create(&self, file: &ImageFile) -> String {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let url = format!("{PREVIEW_URL_PREFIX}{id}");
        self.live
            .lock()
            .expect("preview registry lock poisoned")
            .insert(url.clone(), file.clone());
        url
    }

    fn revoke(&self, url: &str) {
        self.live
            .lock()
            .expect("preview registry lock poisoned")
            .remove(url);
    }
}
