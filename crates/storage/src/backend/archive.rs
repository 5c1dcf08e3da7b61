//! Export into a single zip archive.

use crate::error::{ErrorKind, Result};
use crate::{StorageBackend, validate_path};
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::fs::File;
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use zip::CompressionMethod;
use zip::write::{SimpleFileOptions, ZipWriter};

#[derive(Debug)]
struct Archive {
    /// `None` once finished.
    writer: Option<ZipWriter<File>>,
    entries: BTreeSet<PathBuf>,
}

/// Deflates every file into one archive.
///
/// Entries can't be replaced, so writing a path twice fails. The archive is
/// only readable after [`finish`](StorageBackend::finish).
///
/// ```no_run
/// use quipx_storage::{StorageBackend, ZipBackend};
/// use std::path::Path;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = ZipBackend::new("zip", "/home/me/exports/quip-export.zip")?;
/// backend.write(Path::new("Private/Plan.html"), b"<html></html>").await?;
/// backend.finish().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ZipBackend {
    name: String,
    path: PathBuf,
    archive: Arc<Mutex<Archive>>,
}
impl ZipBackend {
    /// Creates the archive at `path`, replacing any existing file. Parent
    /// directories are created; the path must be absolute.
    pub fn new(name: impl Into<String>, path: impl AsRef<Path>) -> Result<Self> {
        let (name, path) = (name.into(), path.as_ref().to_path_buf());
        if !path.is_absolute() {
            exn::bail!(ErrorKind::InvalidPath(path));
        }
        if path.is_dir() {
            exn::bail!(ErrorKind::Archive(path, "is a directory".to_string()));
        }
        // Blocking: runs once before the export starts.
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|err| ErrorKind::from_io(err, parent))?;
        }
        let file = File::create(&path).map_err(|err| ErrorKind::from_io(err, &path))?;
        tracing::debug!(backend = %name, path = %path.display(), "Opened zip backend");
        let archive = Archive { writer: Some(ZipWriter::new(file)), entries: BTreeSet::new() };
        Ok(Self { name, path, archive: Arc::new(Mutex::new(archive)) })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn archive(&self) -> std::sync::MutexGuard<'_, Archive> {
        self.archive.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Zip entry names always use `/`.
fn entry_name(path: &Path) -> String {
    path.components()
        .filter_map(|component| match component {
            Component::Normal(segment) => Some(segment.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

fn options() -> SimpleFileOptions {
    SimpleFileOptions::default().compression_method(CompressionMethod::Deflated)
}

#[async_trait]
impl StorageBackend for ZipBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn write(&self, path: &Path, data: &[u8]) -> Result<()> {
        let path = validate_path(path)?;
        let (archive, data) = (Arc::clone(&self.archive), data.to_vec());
        let task = tokio::task::spawn_blocking(move || -> Result<()> {
            let mut archive = archive.lock().unwrap_or_else(PoisonError::into_inner);
            if archive.entries.contains(&path) {
                exn::bail!(ErrorKind::Archive(path, "duplicate entry".to_string()));
            }
            let Some(writer) = archive.writer.as_mut() else {
                exn::bail!(ErrorKind::Archive(path, "archive already finished".to_string()));
            };
            let archive_error = |err: &dyn std::fmt::Display| ErrorKind::Archive(path.clone(), err.to_string());
            writer.start_file(entry_name(&path), options()).map_err(|err| archive_error(&err))?;
            writer.write_all(&data).map_err(|err| archive_error(&err))?;
            archive.entries.insert(path);
            Ok(())
        });
        task.await.map_err(|err| ErrorKind::Archive(self.path.clone(), err.to_string()))?
    }

    async fn list(&self, prefix: Option<&Path>) -> Result<Vec<PathBuf>> {
        let prefix = prefix.map(validate_path).transpose()?;
        Ok(self
            .archive()
            .entries
            .iter()
            .filter(|path| prefix.as_ref().is_none_or(|prefix| path.starts_with(prefix)))
            .cloned()
            .collect())
    }

    /// Writes the central directory. Calling it again does nothing.
    async fn finish(&self) -> Result<()> {
        let Some(writer) = self.archive().writer.take() else {
            return Ok(());
        };
        let path = self.path.clone();
        let task = tokio::task::spawn_blocking(move || -> Result<()> {
            writer.finish().map_err(|err| ErrorKind::Archive(path, err.to_string()))?;
            Ok(())
        });
        let entries = self.archive().entries.len();
        task.await.map_err(|err| ErrorKind::Archive(self.path.clone(), err.to_string()))??;
        tracing::debug!(backend = %self.name, entries, "Finished archive");
        Ok(())
    }
}
