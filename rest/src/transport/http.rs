//! reqwest-backed transport

use super::Transport;
use crate::error::TransportError;
use crate::request::{Method, TransportRequest, TransportResponse};
use futures::future::BoxFuture;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::time::Duration;

/// Transport over HTTP using a shared `reqwest` client
#[derive(Debug, Clone, Default)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Create a transport with a default client
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a transport around an existing client
    #[must_use]
    pub const fn with_client(client: Client) -> Self {
        Self { client }
    }

    /// Create a transport whose requests give up after `timeout`
    ///
    /// # Errors
    ///
    /// Returns `TransportError::InvalidRequest` if the client cannot be built
    pub fn with_timeout(timeout: Duration) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;
        Ok(Self { client })
    }

    async fn perform(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Patch => reqwest::Method::PATCH,
            Method::Delete => reqwest::Method::DELETE,
        };

        let mut builder = self.client.request(method, &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_builder() {
                TransportError::InvalidRequest(e.to_string())
            } else {
                TransportError::Network(e.to_string())
            }
        })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| TransportError::Decode(e.to_string()))?;

        tracing::debug!(
            method = %request.method,
            url = %request.url,
            status = status.as_u16(),
            "HTTP request completed"
        );

        if status.is_success() {
            let result = if request.method == Method::Delete || text.trim().is_empty() {
                None
            } else {
                Some(serde_json::from_str(&text).map_err(|e| TransportError::Decode(e.to_string()))?)
            };
            Ok(TransportResponse::ok(status.as_u16(), result))
        } else {
            Ok(TransportResponse::failed(status.as_u16(), error_message(&text, status)))
        }
    }
}

impl Transport for HttpTransport {
    fn send(&self, request: TransportRequest) -> BoxFuture<'_, Result<TransportResponse, TransportError>> {
        Box::pin(self.perform(request))
    }
}

/// Best human-readable message in an error body
fn error_message(body: &str, status: StatusCode) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return status
            .canonical_reason()
            .map_or_else(|| format!("Request failed with status {}", status.as_u16()), str::to_owned);
    }

    match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::String(message)) => message,
        Ok(Value::Object(fields)) => ["message", "error", "detail"]
            .iter()
            .find_map(|key| fields.get(*key).and_then(Value::as_str))
            .map_or_else(|| trimmed.to_owned(), str::to_owned),
        _ => trimmed.to_owned(),
    }
}
