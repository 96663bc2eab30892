//! Requests handed to a transport and the records kept of them

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Request headers, ordered by name
pub type Headers = BTreeMap<String, String>;

/// HTTP verb of a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    /// GET (index, read)
    Get,
    /// POST (create)
    Post,
    /// PUT (update)
    Put,
    /// PATCH (partial update)
    Patch,
    /// DELETE (del)
    Delete,
}

impl Method {
    /// All verbs, in flag order
    pub const ALL: [Self; 5] = [Self::Get, Self::Post, Self::Put, Self::Patch, Self::Delete];

    /// Uppercase wire name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }

    /// Whether requests with this verb carry a body
    #[must_use]
    pub const fn has_body(self) -> bool {
        matches!(self, Self::Post | Self::Put | Self::Patch)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Headers sent with every request: JSON content type, then `additional` on top
#[must_use]
pub fn default_headers(additional: &Headers) -> Headers {
    let mut headers = Headers::new();
    headers.insert("Content-Type".to_owned(), "application/json".to_owned());
    headers.extend(additional.iter().map(|(k, v)| (k.clone(), v.clone())));
    headers
}

/// A request ready to be sent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransportRequest {
    /// Target URL
    pub url: String,
    /// HTTP verb
    pub method: Method,
    /// Request headers
    pub headers: Headers,
    /// JSON body, already mapped
    pub body: Option<Value>,
}

/// What a transport returns for any HTTP status
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransportResponse {
    /// Whether the status was 2xx
    pub ok: bool,
    /// HTTP status code
    pub status: u16,
    /// Parsed body of a successful response
    pub result: Option<Value>,
    /// Error text of a failed response
    pub error_message: Option<String>,
}

impl TransportResponse {
    /// Successful response with a JSON body
    #[must_use]
    pub const fn ok(status: u16, result: Option<Value>) -> Self {
        Self {
            ok: true,
            status,
            result,
            error_message: None,
        }
    }

    /// Failed response with an error message
    #[must_use]
    pub fn failed(status: u16, message: impl Into<String>) -> Self {
        Self {
            ok: false,
            status,
            result: None,
            error_message: Some(message.into()),
        }
    }
}

/// Outcome of running the configured validator on a successful response
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum Validation {
    /// The request failed, so nothing was validated
    #[default]
    NotRun,
    /// The validator accepted the payload
    Passed,
    /// The validator rejected the payload
    Failed {
        /// Whether the rejection stopped the state update
        aborted: bool,
    },
}

impl Validation {
    /// Whether the payload was rejected and dropped
    #[must_use]
    pub const fn is_aborted(self) -> bool {
        matches!(self, Self::Failed { aborted: true })
    }
}

/// One completed round trip, as recorded in the request log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedRequest {
    /// Target URL
    pub url: String,
    /// HTTP verb
    pub method: Method,
    /// Headers that were sent
    pub headers: Headers,
    /// Body that was sent
    pub body: Option<Value>,
    /// Whether the status was 2xx
    pub ok: bool,
    /// HTTP status code
    pub status: u16,
    /// Parsed result, after the response mapper
    pub result: Option<Value>,
    /// Error message; present exactly when `ok` is false
    pub error_message: Option<String>,
    /// When the response arrived
    pub settled_at: DateTime<Utc>,
    /// Validation outcome
    pub validation: Validation,
}

impl ResolvedRequest {
    /// Combine a sent request with its response
    ///
    /// A failed response without a message gets a generic one so the
    /// error fields of the state always have text to show.
    #[must_use]
    pub fn settle(request: TransportRequest, response: TransportResponse, settled_at: DateTime<Utc>) -> Self {
        let error_message = if response.ok {
            None
        } else {
            Some(
                response
                    .error_message
                    .filter(|message| !message.is_empty())
                    .unwrap_or_else(|| format!("Request failed with status {}", response.status)),
            )
        };

        Self {
            url: request.url,
            method: request.method,
            headers: request.headers,
            body: request.body,
            ok: response.ok,
            status: response.status,
            result: if response.ok { response.result } else { None },
            error_message,
            settled_at,
            validation: Validation::NotRun,
        }
    }
}
