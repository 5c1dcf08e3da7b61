use derive_more::{Display, Error};
use std::path::PathBuf;

pub type Error = exn::Exn<ErrorKind>;
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// An explicitly requested configuration file doesn't exist.
    #[display("config file not found: {}", _0.display())]
    NotFound(#[error(not(source))] PathBuf),
    /// The file extension doesn't name a supported format.
    #[display("unsupported config format: {}", _0.display())]
    UnsupportedFormat(#[error(not(source))] PathBuf),
    /// Merging or deserializing the configuration layers failed.
    #[display("couldn't load configuration")]
    Load,
    #[display("an access token is required")]
    MissingToken,
    #[display("invalid destination: {}", _0.display())]
    InvalidDestination(#[error(not(source))] PathBuf),
    #[display("invalid exclude pattern: {_0}")]
    InvalidPattern(#[error(not(source))] String),
}
