//! Typed access to the remote document store.
//!
//! [`Gateway`] wraps a [`Transport`] and exposes one method per remote
//! resource. Failures never escape as errors: every fetch yields `None` after
//! logging, and rate-limited requests are retried internally.

pub mod error;
mod gateway;
#[cfg(any(test, feature = "mock"))]
mod mock;
pub mod models;
mod stats;
mod transport;

pub use crate::gateway::{Gateway, MAX_RATE_LIMITED_ATTEMPTS};
#[cfg(any(test, feature = "mock"))]
pub use crate::mock::MockTransport;
pub use crate::stats::StatsSnapshot;
pub use crate::transport::{ReqwestTransport, Response, Transport};
