//! In-memory transport with scripted responses

use crate::error::TransportError;
use crate::request::{Method, TransportRequest, TransportResponse};
use crate::transport::Transport;
use futures::future::BoxFuture;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::oneshot;

enum Reply {
    Respond(TransportResponse),
    Fail(String),
    Held {
        response: TransportResponse,
        release: oneshot::Receiver<()>,
    },
}

#[derive(Default)]
struct Inner {
    routes: HashMap<(Method, String), VecDeque<Reply>>,
    requests: Vec<TransportRequest>,
}

/// Transport that answers from scripted routes and records every request
///
/// Replies are queued per `(method, url)`. Queued replies are used in
/// order; the last plain response of a route is reused for any further
/// request. Unrouted requests get a 404 response.
///
/// # Example
///
/// ```
/// use composable_rest::mocks::MockTransport;
/// use composable_rest::request::Method;
/// use serde_json::json;
///
/// let transport = MockTransport::new();
/// transport.respond_json(Method::Get, "http://localhost/pets/", 200, json!([]));
/// assert_eq!(transport.request_count(), 0);
/// ```
#[derive(Clone, Default)]
pub struct MockTransport {
    inner: Arc<Mutex<Inner>>,
}

/// Release handle for a response queued with [`MockTransport::hold`]
#[derive(Debug)]
pub struct HeldResponse {
    release: oneshot::Sender<()>,
}

impl HeldResponse {
    /// Let the held response through
    pub fn release(self) {
        let _ = self.release.send(());
    }
}

impl MockTransport {
    /// Create a transport with no routes
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn push(&self, method: Method, url: &str, reply: Reply) {
        self.lock()
            .routes
            .entry((method, url.to_owned()))
            .or_default()
            .push_back(reply);
    }

    /// Queue a response for a route
    pub fn respond(&self, method: Method, url: &str, response: TransportResponse) {
        self.push(method, url, Reply::Respond(response));
    }

    /// Queue a JSON response; 2xx statuses are successful
    ///
    /// A failed status uses a JSON string body as its error message.
    pub fn respond_json(&self, method: Method, url: &str, status: u16, body: Value) {
        let response = if (200..300).contains(&status) {
            TransportResponse::ok(status, Some(body))
        } else {
            let message = body.as_str().map_or_else(|| body.to_string(), str::to_owned);
            TransportResponse::failed(status, message)
        };
        self.respond(method, url, response);
    }

    /// Queue a successful response without a body (e.g. 204)
    pub fn respond_empty(&self, method: Method, url: &str, status: u16) {
        self.respond(method, url, TransportResponse::ok(status, None));
    }

    /// Queue a network failure for a route
    pub fn fail(&self, method: Method, url: &str, message: &str) {
        self.push(method, url, Reply::Fail(message.to_owned()));
    }

    /// Queue a response that is only delivered once released
    #[must_use]
    pub fn hold(&self, method: Method, url: &str, response: TransportResponse) -> HeldResponse {
        let (release, receiver) = oneshot::channel();
        self.push(
            method,
            url,
            Reply::Held {
                response,
                release: receiver,
            },
        );
        HeldResponse { release }
    }

    /// Every request sent so far, in order
    #[must_use]
    pub fn requests(&self) -> Vec<TransportRequest> {
        self.lock().requests.clone()
    }

    /// Number of requests sent so far
    #[must_use]
    pub fn request_count(&self) -> usize {
        self.lock().requests.len()
    }

    fn next_reply(&self, request: &TransportRequest) -> Option<Reply> {
        let mut inner = self.lock();
        inner.requests.push(request.clone());

        let queue = inner.routes.get_mut(&(request.method, request.url.clone()))?;
        match queue.front() {
            Some(Reply::Respond(response)) if queue.len() == 1 => Some(Reply::Respond(response.clone())),
            _ => queue.pop_front(),
        }
    }
}

impl Transport for MockTransport {
    fn send(&self, request: TransportRequest) -> BoxFuture<'_, Result<TransportResponse, TransportError>> {
        let reply = self.next_reply(&request);
        Box::pin(async move {
            match reply {
                Some(Reply::Respond(response)) => Ok(response),
                Some(Reply::Fail(message)) => Err(TransportError::Network(message)),
                Some(Reply::Held { response, release }) => {
                    // A dropped handle releases as well
                    let _ = release.await;
                    Ok(response)
                },
                None => Ok(TransportResponse::failed(
                    404,
                    format!("No mock route for {} {}", request.method, request.url),
                )),
            }
        })
    }
}
