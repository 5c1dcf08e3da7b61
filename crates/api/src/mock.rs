//! Scripted transport for testing.

use crate::error::Result;
use crate::transport::{Response, Transport};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, PoisonError};

/// Responses queued for one path. The last one repeats once the queue drains.
struct Route {
    queue: VecDeque<Response>,
    last: Response,
}

/// Transport answering from a table of routes keyed by path and query.
///
/// URLs are matched after stripping [`MockTransport::BASE_URL`], so a gateway
/// configured with that base URL routes `/folders/ABC` to the entry
/// registered as `"/folders/ABC"`. Unknown paths answer `404`. Every
/// request is logged and can be inspected with [`calls`](Self::calls).
///
/// # Examples
///
/// ```
/// use quipx_api::{Gateway, MockTransport, Response};
/// use std::sync::Arc;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let transport = Arc::new(
///     MockTransport::default().on("/users/current", Response::json(r#"{"id": "U1", "name": "Ada"}"#)),
/// );
/// let gateway = Gateway::new(transport.clone(), "token").with_base_url(MockTransport::BASE_URL);
/// assert_eq!(gateway.current_user().await.map(|u| u.name).as_deref(), Some("Ada"));
/// assert_eq!(transport.calls(), vec!["/users/current"]);
/// # }
/// ```
#[derive(Default)]
pub struct MockTransport {
    routes: Mutex<HashMap<String, Route>>,
    calls: Mutex<Vec<String>>,
}
impl MockTransport {
    pub const BASE_URL: &'static str = "http://mock.test/1";

    /// Always answer `path` with `response`.
    pub fn on(self, path: impl Into<String>, response: Response) -> Self {
        self.on_sequence(path, [response])
    }

    /// Answer `path` with each response in turn, then keep repeating the last.
    ///
    /// Panics if `responses` is empty.
    pub fn on_sequence(self, path: impl Into<String>, responses: impl IntoIterator<Item = Response>) -> Self {
        let mut queue: VecDeque<Response> = responses.into_iter().collect();
        let Some(last) = queue.pop_back() else {
            panic!("MockTransport::on_sequence: no responses given");
        };
        self.routes.lock().unwrap_or_else(PoisonError::into_inner).insert(path.into(), Route { queue, last });
        self
    }

    /// Every requested path, in request order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Number of requests made to exactly `path`.
    pub fn calls_to(&self, path: &str) -> usize {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).iter().filter(|p| *p == path).count()
    }

    /// Whether any request path contains `fragment`.
    pub fn requested(&self, fragment: &str) -> bool {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).iter().any(|p| p.contains(fragment))
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn get(&self, url: &str, _token: &str) -> Result<Response> {
        let path = url.strip_prefix(Self::BASE_URL).unwrap_or(url).to_string();
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).push(path.clone());
        let mut routes = self.routes.lock().unwrap_or_else(PoisonError::into_inner);
        let response = match routes.get_mut(&path) {
            Some(route) => route.queue.pop_front().unwrap_or_else(|| route.last.clone()),
            None => Response::new(404),
        };
        Ok(response)
    }
}
