//! Export Error Types
//!
//! Only run-fatal conditions and setup mistakes are errors. Failures local to
//! one folder, thread or blob are logged where they happen and the walk
//! carries on.

use derive_more::{Display, Error};

/// An export error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for export operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The current account couldn't be read, so there is no default folder set.
    #[display("couldn't fetch the current user")]
    UserUnavailable,
    /// None of the requested root folders could be fetched.
    #[display("couldn't fetch root folders")]
    RootFoldersUnavailable,
    /// A document or comments template failed to compile or render.
    #[display("invalid template")]
    Template,
    /// A user supplied regular expression didn't compile.
    #[display("invalid pattern: {_0}")]
    InvalidPattern(#[error(not(source))] String),
    /// A builtin asset is missing from the binary.
    #[display("asset not found: {_0}")]
    AssetNotFound(#[error(not(source))] String),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::UserUnavailable | Self::RootFoldersUnavailable)
    }
}
