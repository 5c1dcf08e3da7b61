//! Export directory on the local filesystem.

use crate::error::{ErrorKind, Result};
use crate::{StorageBackend, validate_path};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::fs;

/// Extension appended to files that are still being written.
const PARTIAL_EXTENSION: &str = "part";

/// Numbers partial files, so concurrent writes to one path never share one.
static PARTIAL_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Writes below a root directory with `tokio::fs`.
///
/// Every file is written next to its destination first and renamed into place,
/// so an interrupted export never leaves a truncated document behind.
///
/// ```no_run
/// use quipx_storage::backend::LocalBackend;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = LocalBackend::new("local", "/home/me/exports/quip-export")?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct LocalBackend {
    name: String,
    root: PathBuf,
}
impl LocalBackend {
    /// Opens `root`, creating it when missing. The root must be absolute.
    pub fn new(name: impl Into<String>, root: impl AsRef<Path>) -> Result<Self> {
        let (name, root) = (name.into(), root.as_ref().to_path_buf());
        if !root.is_absolute() {
            exn::bail!(ErrorKind::InvalidPath(root));
        }
        match std::fs::metadata(&root) {
            Ok(meta) if meta.is_dir() => {},
            Ok(_) => exn::bail!(ErrorKind::NotADirectory(root)),
            // Blocking: runs once before the export starts.
            Err(_) => std::fs::create_dir_all(&root).map_err(|err| ErrorKind::from_io(err, &root))?,
        }
        tracing::debug!(backend = %name, root = %root.display(), "Opened local backend");
        Ok(Self { name, root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &Path) -> Result<PathBuf> {
        Ok(self.root.join(validate_path(path)?))
    }

    /// Files below `dir`, relative to the root, skipping partial writes.
    async fn walk(&self, dir: PathBuf) -> Result<Vec<PathBuf>> {
        let mut pending = vec![dir];
        let mut files = Vec::new();
        while let Some(dir) = pending.pop() {
            let mut entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => continue,
                Err(err) => exn::bail!(ErrorKind::from_io(err, dir)),
            };
            while let Some(entry) = entries.next_entry().await.map_err(|err| ErrorKind::from_io(err, &dir))? {
                let path = entry.path();
                let file_type = entry.file_type().await.map_err(|err| ErrorKind::from_io(err, &path))?;
                if file_type.is_dir() {
                    pending.push(path);
                } else if file_type.is_file() && !is_partial(&path) {
                    // Entries always live under the root.
                    if let Ok(relative) = path.strip_prefix(&self.root) {
                        files.push(relative.to_path_buf());
                    }
                }
            }
        }
        Ok(files)
    }
}

fn is_partial(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == PARTIAL_EXTENSION)
}

/// `{path}.{pid}-{n}.part`
fn partial_path(path: &Path) -> PathBuf {
    let sequence = PARTIAL_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    let mut partial = path.as_os_str().to_owned();
    partial.push(format!(".{}-{sequence}.{PARTIAL_EXTENSION}", std::process::id()));
    PathBuf::from(partial)
}

#[async_trait]
impl StorageBackend for LocalBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn write(&self, path: &Path, data: &[u8]) -> Result<()> {
        let target = self.resolve(path)?;
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await.map_err(|err| ErrorKind::from_io(err, path))?;
        }
        let partial = partial_path(&target);
        fs::write(&partial, data).await.map_err(|err| ErrorKind::from_io(err, path))?;
        if let Err(err) = fs::rename(&partial, &target).await {
            let _ = fs::remove_file(&partial).await;
            exn::bail!(ErrorKind::from_io(err, path));
        }
        Ok(())
    }

    async fn list(&self, prefix: Option<&Path>) -> Result<Vec<PathBuf>> {
        let start = match prefix {
            Some(prefix) => self.resolve(prefix)?,
            None => self.root.clone(),
        };
        let mut files = if start.is_file() {
            start.strip_prefix(&self.root).map(|p| vec![p.to_path_buf()]).unwrap_or_default()
        } else {
            self.walk(start).await?
        };
        files.sort();
        Ok(files)
    }
}
