//! Storage errors.

use derive_more::{Display, Error};
use std::io::Error as IoError;
use std::path::PathBuf;

pub type Error = exn::Exn<ErrorKind>;
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("file not found: {}", _0.display())]
    NotFound(#[error(not(source))] PathBuf),
    #[display("permission denied: {}", _0.display())]
    PermissionDenied(#[error(not(source))] PathBuf),
    /// The export root exists but isn't a directory.
    #[display("not a directory: {}", _0.display())]
    NotADirectory(#[error(not(source))] PathBuf),
    /// A relative path escapes the export root or can't name a file.
    #[display("invalid path: {}", _0.display())]
    InvalidPath(#[error(not(source))] PathBuf),
    #[display("I/O error on {}: {_1}", _0.display())]
    Io(#[error(not(source))] PathBuf, IoError),
    /// The archive couldn't take an entry, or couldn't be completed.
    #[display("archive error on {}: {_1}", _0.display())]
    Archive(#[error(not(source))] PathBuf, #[error(not(source))] String),
}

impl ErrorKind {
    /// Classifies an I/O failure on `path`.
    pub fn from_io(err: IoError, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound(path),
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied(path),
            _ => Self::Io(path, err),
        }
    }

    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Io(..))
    }
}
