//! Remote Store Gateway.
//!
//! One method per remote resource. Each method records its call category,
//! sends the request through the [`Transport`] and retries rate-limited
//! responses. Any failure is logged here and surfaces as `None`.

use crate::error::{Error, ErrorKind, Result};
use crate::models::{Blob, FolderNode, Message, Rendition, ThreadNode, User};
use crate::stats::{Call, GatewayStats, StatsSnapshot};
use crate::transport::{Response, Transport};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use time::UtcDateTime;

/// Requests to one URL that may be answered 429/503 before it is given up.
///
/// The count is kept per URL for the lifetime of the gateway and never reset,
/// so a URL that exhausted its budget once fails immediately afterwards.
pub const MAX_RATE_LIMITED_ATTEMPTS: u32 = 10;

const DEFAULT_BASE_URL: &str = "https://platform.quip.com:443/1";
const DEFAULT_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(60 * 60);
const RATE_LIMIT_RESET_HEADER: &str = "x-ratelimit-reset";
const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

pub struct Gateway {
    transport: Arc<dyn Transport>,
    token: String,
    base_url: String,
    default_backoff: Duration,
    rate_limited: Mutex<HashMap<String, u32>>,
    stats: GatewayStats,
}
impl Gateway {
    pub fn new(transport: Arc<dyn Transport>, token: impl Into<String>) -> Self {
        Self {
            transport,
            token: token.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            default_backoff: DEFAULT_BACKOFF,
            rate_limited: Mutex::new(HashMap::new()),
            stats: GatewayStats::default(),
        }
    }

    /// Base URL every resource path is appended to, without trailing slash.
    pub fn with_base_url(mut self, base_url: impl AsRef<str>) -> Self {
        self.base_url = base_url.as_ref().trim_end_matches('/').to_string();
        self
    }

    /// Wait used when a rate-limited response carries no usable reset time.
    pub fn with_default_backoff(mut self, backoff: Duration) -> Self {
        self.default_backoff = backoff;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Whether the configured token can read the current account.
    pub async fn check_user(&self) -> bool {
        self.current_user().await.is_some()
    }

    pub async fn current_user(&self) -> Option<User> {
        self.get_json(Call::GetUser, "/users/current".to_string()).await
    }

    pub async fn user(&self, id: &str) -> Option<User> {
        self.get_json(Call::GetUser, format!("/users/{id}")).await
    }

    pub async fn folder(&self, id: &str) -> Option<FolderNode> {
        self.get_json(Call::GetFolder, format!("/folders/{id}")).await
    }

    /// Batch fetch, in the order of `ids`. Ids missing from the response are
    /// skipped; an empty request succeeds without touching the network.
    pub async fn folders<S: AsRef<str>>(&self, ids: &[S]) -> Option<Vec<FolderNode>> {
        if ids.is_empty() {
            return Some(Vec::new());
        }
        let path = format!("/folders/?ids={}", join_ids(ids));
        let mut found: HashMap<String, FolderNode> = self.get_json(Call::GetFolders, path).await?;
        Some(ids.iter().filter_map(|id| found.remove(id.as_ref())).collect())
    }

    pub async fn thread(&self, id: &str) -> Option<ThreadNode> {
        self.get_json(Call::GetThread, format!("/threads/{id}")).await
    }

    /// Batch fetch, with the same ordering rules as [`folders`](Self::folders).
    pub async fn threads<S: AsRef<str>>(&self, ids: &[S]) -> Option<Vec<ThreadNode>> {
        if ids.is_empty() {
            return Some(Vec::new());
        }
        let path = format!("/threads/?ids={}", join_ids(ids));
        let mut found: HashMap<String, ThreadNode> = self.get_json(Call::GetThreads, path).await?;
        Some(ids.iter().filter_map(|id| found.remove(id.as_ref())).collect())
    }

    pub async fn messages(&self, thread_id: &str) -> Option<Vec<Message>> {
        self.get_json(Call::GetMessages, format!("/messages/{thread_id}")).await
    }

    pub async fn blob(&self, container_id: &str, blob_id: &str) -> Option<Blob> {
        let response = self.get(Call::GetBlob, format!("/blob/{container_id}/{blob_id}")).await?;
        let content_type = response.content_type().unwrap_or(DEFAULT_CONTENT_TYPE).to_string();
        Some(Blob { data: response.body, content_type })
    }

    pub async fn rendition(&self, thread_id: &str, rendition: Rendition) -> Option<Vec<u8>> {
        let path = format!("/threads/{thread_id}/export/{}", rendition.extension());
        self.get(Call::GetRendition, path).await.map(|response| response.body)
    }

    async fn get_json<T: DeserializeOwned>(&self, call: Call, path: String) -> Option<T> {
        let response = self.get(call, path.clone()).await?;
        let url = self.url(&path);
        settle(response.decode(&url))
    }

    async fn get(&self, call: Call, path: String) -> Option<Response> {
        self.stats.record(call);
        settle(self.fetch(&path).await)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Sends the request until it succeeds, fails outright, or the URL runs
    /// out of rate-limited attempts.
    async fn fetch(&self, path: &str) -> Result<Response> {
        let url = self.url(path);
        loop {
            self.stats.record_query();
            let response = self.transport.get(&url, &self.token).await?;
            if response.is_success() {
                return Ok(response);
            }
            if !matches!(response.status, 429 | 503) {
                exn::bail!(ErrorKind::Status { url, status: response.status });
            }
            let attempts = self.rate_limited_attempt(&url);
            if attempts >= MAX_RATE_LIMITED_ATTEMPTS {
                exn::bail!(ErrorKind::RetriesExhausted { url, attempts });
            }
            let delay =
                reset_delay(response.header(RATE_LIMIT_RESET_HEADER), UtcDateTime::now(), self.default_backoff);
            tracing::debug!(%url, status = response.status, attempts, delay_ms = delay.as_millis() as u64, "Rate limited; waiting before retrying");
            self.stats.record_retry();
            tokio::time::sleep(delay).await;
        }
    }

    fn rate_limited_attempt(&self, url: &str) -> u32 {
        let mut counts = self.rate_limited.lock().unwrap_or_else(PoisonError::into_inner);
        let count = counts.entry(url.to_string()).or_default();
        *count += 1;
        *count
    }
}

/// Logs a failed fetch and turns it into absence.
fn settle<T>(result: Result<T>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(err) => {
            log_failure(&err);
            None
        },
    }
}

fn log_failure(err: &Error) {
    match &**err {
        ErrorKind::Status { url, status } => tracing::debug!(%url, status, "{}", &**err),
        kind => tracing::error!("{kind}"),
    }
}

fn join_ids<S: AsRef<str>>(ids: &[S]) -> String {
    ids.iter().map(AsRef::as_ref).collect::<Vec<_>>().join(",")
}

/// How long to wait before retrying a rate-limited request.
///
/// `reset` is the value of the reset header in epoch seconds. A missing,
/// malformed or past value falls back to `default`; waits never exceed an
/// hour.
pub(crate) fn reset_delay(reset: Option<&str>, now: UtcDateTime, default: Duration) -> Duration {
    let wait = reset
        .and_then(|value| value.trim().parse::<f64>().ok())
        .filter(|secs| secs.is_finite())
        .map(|secs| secs - now.unix_timestamp() as f64)
        .filter(|wait| *wait > 0.0);
    match wait {
        Some(wait) => Duration::from_secs_f64(wait.min(MAX_BACKOFF.as_secs_f64())),
        None => default.min(MAX_BACKOFF),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MockTransport;
    use crate::models::ThreadKind;
    use rstest::rstest;

    fn gateway(transport: MockTransport) -> (Arc<MockTransport>, Gateway) {
        let transport = Arc::new(transport);
        let gateway = Gateway::new(transport.clone(), "token")
            .with_base_url(MockTransport::BASE_URL)
            .with_default_backoff(Duration::ZERO);
        (transport, gateway)
    }

    fn now() -> UtcDateTime {
        UtcDateTime::from_unix_timestamp(1_700_000_000).unwrap()
    }

    #[rstest]
    #[case(None, Duration::from_secs(1))]
    #[case(Some("garbage"), Duration::from_secs(1))]
    #[case(Some("1699999990"), Duration::from_secs(1))]
    #[case(Some("1700000000"), Duration::from_secs(1))]
    #[case(Some("1700000005"), Duration::from_secs(5))]
    #[case(Some(" 1700000030 "), Duration::from_secs(30))]
    #[case(Some("1800000000"), Duration::from_secs(3600))]
    fn test_reset_delay(#[case] header: Option<&str>, #[case] expected: Duration) {
        assert_eq!(reset_delay(header, now(), Duration::from_secs(1)), expected);
    }

    #[tokio::test]
    async fn test_permanent_rate_limit_gives_up_after_ceiling() {
        let (transport, gateway) = gateway(MockTransport::default().on("/folders/F1", Response::new(429)));
        assert!(gateway.folder("F1").await.is_none());
        assert_eq!(transport.calls_to("/folders/F1"), MAX_RATE_LIMITED_ATTEMPTS as usize);
        let stats = gateway.stats();
        assert_eq!(stats.get_folder, 1);
        assert_eq!(stats.query, 10);
        assert_eq!(stats.retries, 9);
    }

    #[tokio::test]
    async fn test_attempts_are_never_reset() {
        let responses = [Response::new(503), Response::new(503), Response::json(r#"{"folder": {"id": "F1"}}"#)];
        let (transport, gateway) = gateway(MockTransport::default().on_sequence("/folders/F1", responses));
        assert!(gateway.folder("F1").await.is_some());
        assert_eq!(transport.calls_to("/folders/F1"), 3);
        assert_eq!(*gateway.rate_limited.lock().unwrap().get("http://mock.test/1/folders/F1").unwrap(), 2);
    }

    #[tokio::test]
    async fn test_rate_limited_then_success() {
        let body = r#"{"thread": {"id": "T1", "title": "Plan", "type": "document"}, "html": "<p>x</p>"}"#;
        let responses = [Response::new(429).with_header("X-Ratelimit-Reset", "0"), Response::json(body)];
        let (_, gateway) = gateway(MockTransport::default().on_sequence("/threads/T1", responses));
        let thread = gateway.thread("T1").await.unwrap();
        assert_eq!(thread.kind, ThreadKind::Document);
        assert_eq!(gateway.stats().retries, 1);
    }

    #[rstest]
    #[case(400)]
    #[case(403)]
    #[case(404)]
    #[case(500)]
    #[tokio::test]
    async fn test_hard_failures_are_not_retried(#[case] status: u16) {
        let (transport, gateway) = gateway(MockTransport::default().on("/users/current", Response::new(status)));
        assert!(!gateway.check_user().await);
        assert_eq!(transport.calls_to("/users/current"), 1);
    }

    #[tokio::test]
    async fn test_undecodable_body_is_absent() {
        let (_, gateway) = gateway(MockTransport::default().on("/users/current", Response::json("<html>")));
        assert!(gateway.current_user().await.is_none());
    }

    #[tokio::test]
    async fn test_batch_keeps_requested_order() {
        let body = r#"{
            "F2": {"folder": {"id": "F2", "title": "Two"}},
            "F1": {"folder": {"id": "F1", "title": "One"}}
        }"#;
        let (transport, gateway) = gateway(MockTransport::default().on("/folders/?ids=F1,F3,F2", Response::json(body)));
        let folders = gateway.folders(&["F1", "F3", "F2"]).await.unwrap();
        let titles: Vec<_> = folders.iter().map(|f| f.title.as_str()).collect();
        assert_eq!(titles, vec!["One", "Two"]);
        assert_eq!(transport.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_empty_batch_skips_network() {
        let (transport, gateway) = gateway(MockTransport::default());
        let ids: [&str; 0] = [];
        assert_eq!(gateway.threads(&ids).await, Some(vec![]));
        assert!(transport.calls().is_empty());
    }

    #[tokio::test]
    async fn test_blob_keeps_content_type() {
        let response = Response::new(200).with_header("Content-Type", "image/png").with_body(b"\x89PNG".to_vec());
        let (_, gateway) = gateway(MockTransport::default().on("/blob/T1/B1", response));
        let blob = gateway.blob("T1", "B1").await.unwrap();
        assert_eq!(blob.content_type, "image/png");
        assert_eq!(blob.data, b"\x89PNG");
    }

    #[tokio::test]
    async fn test_rendition_path() {
        let response = Response::new(200).with_body(b"%PDF".to_vec());
        let (transport, gateway) = gateway(MockTransport::default().on("/threads/T1/export/pdf", response));
        assert_eq!(gateway.rendition("T1", Rendition::Pdf).await.as_deref(), Some(&b"%PDF"[..]));
        assert!(gateway.rendition("T1", Rendition::Docx).await.is_none());
        assert_eq!(transport.calls(), vec!["/threads/T1/export/pdf", "/threads/T1/export/docx"]);
        assert_eq!(gateway.stats().get_rendition, 2);
    }
}
