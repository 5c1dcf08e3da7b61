//! In-memory backend for tests.

use crate::error::{ErrorKind, Result};
use crate::{StorageBackend, validate_path};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::io::Error as IoError;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

/// Keeps files in a sorted map, so listings come back in path order.
///
/// Writes below a prefix registered with [`MockBackend::failing_under`] fail
/// with an I/O error and store nothing.
///
/// ```
/// use quipx_storage::backend::{MockBackend, StorageBackend};
/// use std::path::Path;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let backend = MockBackend::default();
/// backend.write(Path::new("Private/Plan.html"), b"<html></html>").await.unwrap();
/// assert_eq!(backend.read_string("Private/Plan.html").as_deref(), Some("<html></html>"));
/// # }
/// ```
#[derive(Debug)]
pub struct MockBackend {
    name: String,
    files: Mutex<BTreeMap<PathBuf, Vec<u8>>>,
    failing: Vec<PathBuf>,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self { name: "mock".to_string(), files: Mutex::default(), failing: Vec::new() }
    }
}

impl MockBackend {
    /// Pre-populated backend. Panics on a path that doesn't validate.
    pub fn with_files(files: impl IntoIterator<Item = (impl AsRef<Path>, impl Into<Vec<u8>>)>) -> Self {
        let files = files
            .into_iter()
            .map(|(path, data)| match validate_path(path.as_ref()) {
                Ok(path) => (path, data.into()),
                Err(_) => panic!("invalid path in fixture: {}", path.as_ref().display()),
            })
            .collect();
        Self { files: Mutex::new(files), ..Self::default() }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn failing_under(mut self, prefix: impl Into<PathBuf>) -> Self {
        self.failing.push(prefix.into());
        self
    }

    /// Stored contents of `path`, if it was written.
    pub fn get(&self, path: impl AsRef<Path>) -> Option<Vec<u8>> {
        let path = validate_path(path.as_ref()).ok()?;
        self.files().get(&path).cloned()
    }

    /// Stored file as UTF-8, for assertions on rendered documents.
    pub fn read_string(&self, path: impl AsRef<Path>) -> Option<String> {
        String::from_utf8(self.get(path)?).ok()
    }

    fn files(&self) -> std::sync::MutexGuard<'_, BTreeMap<PathBuf, Vec<u8>>> {
        self.files.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl StorageBackend for MockBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn write(&self, path: &Path, data: &[u8]) -> Result<()> {
        let path = validate_path(path)?;
        if self.failing.iter().any(|prefix| path.starts_with(prefix)) {
            exn::bail!(ErrorKind::Io(path, IoError::other("injected write failure")));
        }
        self.files().insert(path, data.to_vec());
        Ok(())
    }

    async fn list(&self, prefix: Option<&Path>) -> Result<Vec<PathBuf>> {
        let prefix = prefix.map(validate_path).transpose()?;
        Ok(self
            .files()
            .keys()
            .filter(|path| prefix.as_ref().is_none_or(|prefix| path.starts_with(prefix)))
            .cloned()
            .collect())
    }
}
