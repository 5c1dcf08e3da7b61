//! The [`StorageBackend`] seam and its implementations.

mod archive;
mod local;
#[cfg(any(test, feature = "mock"))]
mod mock;

pub use self::archive::ZipBackend;
pub use self::local::LocalBackend;
#[cfg(any(test, feature = "mock"))]
pub use self::mock::MockBackend;
use crate::error::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Where an export lands.
///
/// Paths are relative to the backend root. Implementations reject paths that
/// fail [`validate_path`](crate::validate_path).
///
/// ```no_run
/// use std::path::Path;
/// use quipx_storage::{StorageBackend, error::Result};
///
/// async fn write_stylesheet(backend: &dyn StorageBackend, css: &str) -> Result<()> {
///     backend.write(Path::new("document.css"), css.as_bytes()).await
/// }
/// ```
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Used in log lines.
    fn name(&self) -> &str;

    /// Creates parent directories and replaces any existing file.
    async fn write(&self, path: &Path, data: &[u8]) -> Result<()>;

    /// Sorted relative paths of the files below `prefix`, or of every file.
    ///
    /// Prefixes match whole components: `Private/Sub` covers
    /// `Private/Sub/a.html` but not `Private/Subfolder/a.html`.
    async fn list(&self, prefix: Option<&Path>) -> Result<Vec<PathBuf>>;

    /// Flushes anything buffered. No writes are accepted afterwards by
    /// backends that need it.
    async fn finish(&self) -> Result<()> {
        Ok(())
    }
}
