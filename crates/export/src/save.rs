//! Persistence seam between the walk and the storage backend.

use async_trait::async_trait;
use derive_more::Display;
use quipx_storage::BackendHandle;
use std::path::Path;

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum SaveKind {
    #[display("thread")]
    Thread,
    #[display("blob")]
    Blob,
}

#[async_trait]
pub trait Saver: Send + Sync {
    /// Persists one exported file. `folder` is the slash-terminated path of
    /// the containing folder, `""` at the export root. Failures are handled by
    /// the implementation.
    async fn save(&self, content: Vec<u8>, file_name: &str, kind: SaveKind, folder: &str);
}

/// Where a saved file lands relative to the export root. Blobs go into a
/// `blobs/` directory next to the documents that reference them.
pub fn save_path(file_name: &str, kind: SaveKind, folder: &str) -> String {
    match kind {
        SaveKind::Thread => format!("{folder}{file_name}"),
        SaveKind::Blob => format!("{folder}blobs/{file_name}"),
    }
}

/// Writes through a storage backend, logging failures.
pub struct StorageSaver {
    backend: BackendHandle,
}
impl StorageSaver {
    pub fn new(backend: BackendHandle) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl Saver for StorageSaver {
    async fn save(&self, content: Vec<u8>, file_name: &str, kind: SaveKind, folder: &str) {
        let path = save_path(file_name, kind, folder);
        match self.backend.write(Path::new(&path), &content).await {
            Ok(()) => tracing::debug!(target = self.backend.name(), %path, %kind, bytes = content.len(), "Saved file"),
            Err(err) => tracing::error!(target = self.backend.name(), %path, %kind, "Couldn't save file: {}", &*err),
        }
    }
}
