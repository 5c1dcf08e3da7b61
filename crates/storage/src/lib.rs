//! Destinations for exported documents, blobs and stylesheets.
//!
//! Paths handed to a backend are relative to its root and normalized by
//! [`validate_path`] before use.

pub mod backend;
pub mod error;
mod path;

pub use crate::backend::{LocalBackend, StorageBackend, ZipBackend};
pub use crate::path::validate as validate_path;
use std::sync::Arc;

/// Shared handle to a backend, as held by savers.
pub type BackendHandle = Arc<dyn StorageBackend + Send + Sync>;
