//! HTTP transport seam.
//!
//! The gateway only needs "GET this URL with this token"; everything else
//! (connection pooling, TLS) belongs to the transport implementation.

use crate::error::{ErrorKind, Result};
use async_trait::async_trait;
use exn::ResultExt;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::time::Duration;
use tracing::instrument;

/// A fully buffered HTTP response. Header names are stored lowercase.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}
impl Response {
    pub fn new(status: u16) -> Self {
        Self { status, ..Default::default() }
    }

    pub fn with_header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.headers.insert(name.as_ref().to_ascii_lowercase(), value.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Shorthand for a `200 OK` JSON response.
    pub fn json(body: impl Into<String>) -> Self {
        Self::new(200).with_header("content-type", "application/json").with_body(body.into())
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    pub(crate) fn decode<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        serde_json::from_slice(&self.body).or_raise(|| ErrorKind::Decode(url.to_string()))
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Issue an authenticated GET request.
    ///
    /// Non-success statuses are returned as a [`Response`], not an error;
    /// only failures to obtain a response at all are errors.
    async fn get(&self, url: &str, token: &str) -> Result<Response>;
}

/// Production transport backed by [`reqwest`] with rustls.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}
impl ReqwestTransport {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(30))
            .build()
            .or_raise(|| ErrorKind::Client)?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    #[instrument(level = "trace", skip(self, token))]
    async fn get(&self, url: &str, token: &str) -> Result<Response> {
        let response = self
            .client
            .get(url)
            .bearer_auth(token)
            .send()
            .await
            .or_raise(|| ErrorKind::Network(url.to_string()))?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| Some((name.as_str().to_string(), value.to_str().ok()?.to_string())))
            .collect();
        let body = response.bytes().await.or_raise(|| ErrorKind::Network(url.to_string()))?;
        Ok(Response { status, headers, body: body.to_vec() })
    }
}
