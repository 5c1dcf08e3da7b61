//! Relative path checks.
//!
//! Folder and document titles come from a remote account, so every path a
//! backend receives is normalized before it touches the filesystem.

use crate::error::{ErrorKind, Result};
use std::ffi::OsStr;
use std::path::{Component, Path, PathBuf};

/// Normalizes a path relative to the export root.
///
/// Empty and `.` segments disappear and `..` removes the previous segment.
/// Paths that climb above the root, carry a drive prefix, contain a NUL byte
/// or end up empty are rejected with [`ErrorKind::InvalidPath`].
///
/// ```
/// use std::path::Path;
/// use quipx_storage::validate_path;
///
/// assert_eq!(validate_path("Private//./Notes/Plan.html").unwrap(), Path::new("Private/Notes/Plan.html"));
/// assert!(validate_path("Private/../Shared/blobs/logo.png").is_ok());
/// assert!(validate_path("../outside.html").is_err());
/// ```
pub fn validate(path: impl AsRef<Path>) -> Result<PathBuf> {
    let path = path.as_ref();
    let invalid = || exn::Exn::from(ErrorKind::InvalidPath(path.to_path_buf()));
    let mut segments: Vec<&OsStr> = Vec::new();
    for component in path.components() {
        match component {
            Component::Normal(segment) if segment.as_encoded_bytes().contains(&0) => return Err(invalid()),
            Component::Normal(segment) => segments.push(segment),
            Component::ParentDir => {
                segments.pop().ok_or_else(invalid)?;
            },
            Component::Prefix(_) => return Err(invalid()),
            Component::RootDir | Component::CurDir => {},
        }
    }
    if segments.is_empty() {
        return Err(invalid());
    }
    Ok(segments.iter().collect())
}
