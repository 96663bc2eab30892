//! REST resources bound to reducer-driven state.
//!
//! This crate connects a REST endpoint to a [`Store`](composable_rest_runtime::Store)
//! following the "Functional Core, Imperative Shell" pattern: the HTTP round
//! trip lives in the [`Resource`] shell, every state change is an action
//! handled by the pure [`RestReducer`].
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │         Imperative Shell (Resource)     │  ← config resolution, URLs
//! │  - Transport round trip                 │  ← in-flight flags
//! │  - Effect handle waiting                │  ← hooks
//! ├─────────────────────────────────────────┤
//! │         Functional Core (RestReducer)   │
//! │  - Response mapping and validation      │  ← testable without HTTP
//! │  - List and record mutations            │
//! │  - Derived request status               │
//! └─────────────────────────────────────────┘
//! ```
//!
//! # Request Flow
//!
//! 1. **Resolve** the call configuration (base, call override, operation overlay)
//! 2. **Build** the URL, headers and mapped body
//! 3. **Raise** the verb's in-flight flag
//! 4. **Send** through the injected [`Transport`]
//! 5. **Settle**: lower the flag, record the request, map, validate, apply
//! 6. **Run** the success or failure hook
//!
//! Without an API target, step 5 applies the payload directly and nothing
//! is sent.
//!
//! # Example
//!
//! ```ignore
//! use composable_rest::{ApiConfig, Config, HttpTransport, Resource, RestEnvironment};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! let pets = Resource::list(
//!     Config::with_api(ApiConfig::new("http://localhost/", "pets")),
//!     RestEnvironment::new(Arc::new(HttpTransport::new())),
//! );
//!
//! pets.index(None).await?;
//! pets.update(json!({"id": 3, "name": "Fifi"}), None).await?;
//!
//! let state = pets.state().await;
//! assert!(!state.is_fetching());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod actions;
pub mod config;
pub mod environment;
pub mod error;
pub mod identify;
pub mod json;
pub mod path;
pub mod reducer;
pub mod request;
pub mod resource;
pub mod state;
pub mod transport;
pub mod url;

#[cfg(feature = "test-utils")]
pub mod mocks;

// Re-export key types for convenience
pub use actions::{RestAction, Settlement};
pub use config::{ApiConfig, Config, ConfigOverride, Identity, InvalidHandling, Operation};
pub use environment::RestEnvironment;
pub use error::{PathError, RestError, Result, TransportError};
pub use json::{Argument, Id, SchemaKind};
pub use path::{KeyPath, PathSegment};
pub use reducer::{ResourceMode, RestReducer};
pub use request::{Headers, Method, ResolvedRequest, TransportRequest, TransportResponse, Validation};
pub use resource::{Resource, RestStore};
pub use state::{BaseState, ComputedState, RestState};
pub use transport::{HttpTransport, Transport};
pub use url::QueryParams;
