//! Transport abstraction
//!
//! A transport performs one HTTP round trip. It reports every HTTP status
//! as a [`TransportResponse`]; only failures that prevent a response
//! (connection refused, unreadable body) become a [`TransportError`].

use crate::error::TransportError;
use crate::request::{TransportRequest, TransportResponse};
use futures::future::BoxFuture;

mod http;

pub use http::HttpTransport;

/// Performs HTTP round trips for resources
///
/// Implementations must be cheap to share; a resource holds one behind an
/// `Arc` and calls it from spawned tasks.
pub trait Transport: Send + Sync {
    /// Send a request and wait for its response
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] only when no response could be produced.
    fn send(&self, request: TransportRequest) -> BoxFuture<'_, Result<TransportResponse, TransportError>>;
}
