//! Gateway Error Types
//!
//! Structured errors using `exn` for automatic location tracking. These never
//! leave the crate through the fetch methods of [`Gateway`](crate::Gateway),
//! which log them and return `None`; transports use them to report failures.

use derive_more::{Display, Error};

/// A gateway error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for gateway operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The request never produced a response (DNS, TLS, connection reset...).
    #[display("couldn't fetch {_0}, network error")]
    Network(#[error(not(source))] String),
    /// The server answered with a non-success status that isn't retried.
    #[display("couldn't fetch {url}, received {status}")]
    Status { url: String, status: u16 },
    /// The URL stayed rate-limited for the whole retry budget.
    #[display("couldn't fetch {url}, tried to get it {attempts} times")]
    RetriesExhausted { url: String, attempts: u32 },
    /// The response body wasn't the JSON shape we expected.
    #[display("couldn't decode response of {_0}")]
    Decode(#[error(not(source))] String),
    /// The HTTP client couldn't be constructed.
    #[display("couldn't build HTTP client")]
    Client,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network(_) | Self::RetriesExhausted { .. })
    }
}
