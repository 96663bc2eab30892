//! Resource orchestration
//!
//! A [`Resource`] binds one REST collection or record to a [`Store`]. Each
//! operation resolves its configuration, raises the verb flag, performs the
//! round trip through the injected [`Transport`](crate::transport::Transport)
//! and settles the result through the reducer. Calls return once the
//! result is in state and the configured hook has run.
//!
//! Without an API target the resource works in local mode: operations
//! apply their payload directly and no request is made.

use crate::actions::{RestAction, Settlement};
use crate::config::{Config, ConfigOverride, Identity, Operation};
use crate::environment::RestEnvironment;
use crate::error::{PathError, RestError, Result};
use crate::json::{Argument, Id, SchemaKind};
use crate::path::{set_at_path, KeyPath};
use crate::reducer::{ResourceMode, RestReducer};
use crate::request::{default_headers, Method, TransportRequest};
use crate::state::RestState;
use crate::url;
use composable_rest_runtime::Store;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

/// Store specialised for resource state
pub type RestStore = Store<RestState, RestAction, RestEnvironment, RestReducer>;

/// One bound REST resource
///
/// Cloning is cheap and clones share state, so concurrent calls can be
/// issued from separate tasks.
///
/// # Example
///
/// ```ignore
/// let pets = Resource::list(
///     Config::with_api(ApiConfig::new("http://localhost/", "pets")),
///     RestEnvironment::new(Arc::new(HttpTransport::new())),
/// );
///
/// pets.index(None).await?;
/// let state = pets.state().await;
/// println!("{} pets", state.items().map_or(0, <[_]>::len));
/// ```
#[derive(Clone)]
pub struct Resource {
    store: RestStore,
    config: Arc<Config>,
    mode: ResourceMode,
    schema: SchemaKind,
}

impl Resource {
    /// Bind a collection
    #[must_use]
    pub fn list(config: Config, env: RestEnvironment) -> Self {
        Self::new(ResourceMode::List, config, env)
    }

    /// Bind a single record
    #[must_use]
    pub fn record(config: Config, env: RestEnvironment) -> Self {
        Self::new(ResourceMode::Record, config, env)
    }

    fn new(mode: ResourceMode, config: Config, env: RestEnvironment) -> Self {
        config.diagnose();
        let reducer = RestReducer::new(mode, config.identity.clone());
        Self {
            store: Store::new(RestState::new(), reducer, env),
            config: Arc::new(config),
            mode,
            schema: SchemaKind::default(),
        }
    }

    /// Start from seed data instead of an empty state
    #[must_use]
    pub fn with_data(self, seed: Value) -> Self {
        let reducer = RestReducer::new(self.mode, self.config.identity.clone());
        let env = self.store.environment().clone();
        Self {
            store: Store::new(RestState::with_data(seed), reducer, env),
            ..self
        }
    }

    /// Declare the shape of the records, for [`Resource::infer_argument`]
    #[must_use]
    pub fn with_schema(mut self, schema: SchemaKind) -> Self {
        self.schema = schema;
        self
    }

    /// Base configuration
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// List or record
    #[must_use]
    pub const fn mode(&self) -> ResourceMode {
        self.mode
    }

    /// Underlying store
    #[must_use]
    pub const fn store(&self) -> &RestStore {
        &self.store
    }

    /// Classify an untyped value as an id or a payload, using the schema
    #[must_use]
    pub fn infer_argument(&self, value: Value) -> Argument {
        Argument::infer(value, self.schema)
    }

    /// Snapshot of the current state
    pub async fn state(&self) -> RestState {
        self.store.state(Clone::clone).await
    }

    /// Observe every state transition
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<RestAction> {
        self.store.subscribe_actions()
    }

    /// Fetch the whole resource (GET)
    ///
    /// # Errors
    ///
    /// Returns [`RestError`] on transport failure or when no transport is
    /// configured for a remote resource.
    #[tracing::instrument(skip(self, call), fields(resource = %self.label()))]
    pub async fn index(&self, call: Option<&ConfigOverride>) -> Result<()> {
        self.run(Operation::Index, Argument::None, call).await
    }

    /// Create a record (POST)
    ///
    /// # Errors
    ///
    /// Returns [`RestError`] on transport failure or when no transport is
    /// configured for a remote resource.
    #[tracing::instrument(skip(self, data, call), fields(resource = %self.label()))]
    pub async fn create(&self, data: Value, call: Option<&ConfigOverride>) -> Result<()> {
        self.run(Operation::Create, Argument::Data(data), call).await
    }

    /// Fetch one record (GET)
    ///
    /// # Errors
    ///
    /// Returns [`RestError`] on transport failure or when no transport is
    /// configured for a remote resource.
    #[tracing::instrument(skip(self, argument, call), fields(resource = %self.label()))]
    pub async fn read(&self, argument: impl Into<Argument>, call: Option<&ConfigOverride>) -> Result<()> {
        self.run(Operation::Read, argument.into(), call).await
    }

    /// Replace a record (PUT for lists, POST for records)
    ///
    /// # Errors
    ///
    /// Returns [`RestError`] on transport failure or when no transport is
    /// configured for a remote resource.
    #[tracing::instrument(skip(self, argument, call), fields(resource = %self.label()))]
    pub async fn update(&self, argument: impl Into<Argument>, call: Option<&ConfigOverride>) -> Result<()> {
        self.run(Operation::Update, argument.into(), call).await
    }

    /// Partially update a record (PATCH)
    ///
    /// # Errors
    ///
    /// Returns [`RestError`] on transport failure or when no transport is
    /// configured for a remote resource.
    #[tracing::instrument(skip(self, argument, call), fields(resource = %self.label()))]
    pub async fn patch(&self, argument: impl Into<Argument>, call: Option<&ConfigOverride>) -> Result<()> {
        self.run(Operation::Patch, argument.into(), call).await
    }

    /// Delete a record (DELETE)
    ///
    /// # Errors
    ///
    /// Returns [`RestError`] on transport failure or when no transport is
    /// configured for a remote resource.
    #[tracing::instrument(skip(self, argument, call), fields(resource = %self.label()))]
    pub async fn del(&self, argument: impl Into<Argument>, call: Option<&ConfigOverride>) -> Result<()> {
        self.run(Operation::Del, argument.into(), call).await
    }

    /// Reset to the empty state
    ///
    /// # Errors
    ///
    /// Returns [`RestError::Store`] if the resource is shut down.
    pub async fn clear(&self) -> Result<()> {
        self.dispatch(RestAction::Clear).await
    }

    /// Replace an entry (list) or the record locally, without a request
    ///
    /// A key path argument writes a nested value instead. List entries are
    /// located by identity and never appended.
    ///
    /// # Errors
    ///
    /// Returns [`RestError::InvalidArgument`] for an argument without data,
    /// and [`RestError::Path`] for an invalid key path.
    pub async fn update_state(&self, argument: impl Into<Argument>) -> Result<()> {
        match argument.into() {
            Argument::Path { path, value } => self.update_partial_state(path, value).await,
            argument @ (Argument::None | Argument::Id(_)) => Err(RestError::InvalidArgument {
                operation: "update_state",
                reason: format!("expected data, got {}", argument.kind()),
            }),
            argument => self.dispatch(RestAction::UpdateState(argument)).await,
        }
    }

    /// Write a value at a key path into the local data, without a request
    ///
    /// # Errors
    ///
    /// Returns [`RestError::Path`] if the path does not resolve in the
    /// current data.
    pub async fn update_partial_state(&self, path: KeyPath, value: Value) -> Result<()> {
        let check_path = path.clone();
        let check_value = value.clone();
        let mut handle = self
            .store
            .send_if(RestAction::UpdatePartial { path, value }, move |state: &RestState| {
                let data = state.data().ok_or(PathError::NoData)?;
                set_at_path(data, &check_path, check_value)?;
                Ok::<(), RestError>(())
            })
            .await?;
        handle.wait().await;
        Ok(())
    }

    /// Stop accepting operations and wait for running hooks
    ///
    /// # Errors
    ///
    /// Returns [`RestError::Store`] if hooks are still running after `timeout`.
    pub async fn shutdown(&self, timeout: Duration) -> Result<()> {
        self.store.shutdown(timeout).await?;
        Ok(())
    }

    fn label(&self) -> String {
        self.config
            .api
            .as_ref()
            .and_then(|api| api.name.clone().or_else(|| api.url.clone()))
            .unwrap_or_else(|| "local".to_owned())
    }

    async fn dispatch(&self, action: RestAction) -> Result<()> {
        let mut handle = self.store.send(action).await?;
        handle.wait().await;
        Ok(())
    }

    async fn run(&self, operation: Operation, argument: Argument, call: Option<&ConfigOverride>) -> Result<()> {
        let config = self.config.resolve(operation, call);

        let Some(api) = config.api.clone() else {
            if matches!(argument, Argument::Path { .. })
                && !matches!(operation, Operation::Update | Operation::Patch)
            {
                return Err(invalid(operation, "key paths only apply to update and patch"));
            }
            tracing::debug!(operation = %operation, "No API target, applying locally");
            return self.dispatch(RestAction::ApplyLocal { operation, argument }).await;
        };

        if matches!(argument, Argument::Path { .. }) {
            return Err(invalid(operation, "key paths only apply to local state"));
        }
        let transport = self
            .store
            .environment()
            .transport
            .clone()
            .ok_or(RestError::MissingTransport)?;

        let method = self.method(operation);
        let id = self.target_id(operation, &argument);
        let body = if method.has_body() {
            (config.map_body)(argument.data().cloned())
        } else {
            None
        };
        let request = TransportRequest {
            url: url::build(&api, id.as_ref()),
            method,
            headers: default_headers(&api.additional_headers),
            body,
        };

        let guard = InFlight::acquire(&self.store, method).await?;
        tracing::debug!(operation = %operation, method = %method, url = %request.url, "Sending request");

        let response = match transport.send(request.clone()).await {
            Ok(response) => response,
            Err(error) => {
                tracing::error!(operation = %operation, %error, "Transport failed");
                metrics::counter!("rest.transport.failures", "method" => method.as_str()).increment(1);
                guard.release().await;
                return Err(error.into());
            },
        };

        metrics::counter!(
            "rest.requests.total",
            "method" => method.as_str(),
            "ok" => if response.ok { "true" } else { "false" }
        )
        .increment(1);

        let settlement = Settlement {
            operation,
            argument,
            request,
            response,
            config: Arc::new(config),
        };
        let mut handle = match self.store.send(RestAction::Settled(Box::new(settlement))).await {
            Ok(handle) => handle,
            Err(error) => {
                tracing::warn!(operation = %operation, %error, "Response dropped, store is shutting down");
                guard.release().await;
                return Err(error.into());
            },
        };
        guard.disarm();

        // Wait for the hook effect
        handle.wait().await;
        Ok(())
    }

    const fn method(&self, operation: Operation) -> Method {
        match operation {
            Operation::Index | Operation::Read => Method::Get,
            Operation::Create => Method::Post,
            Operation::Update => match self.mode {
                ResourceMode::List => Method::Put,
                ResourceMode::Record => Method::Post,
            },
            Operation::Patch => Method::Patch,
            Operation::Del => Method::Delete,
        }
    }

    /// Id placed in the URL: the explicit one, else (list mode) the payload's key
    fn target_id(&self, operation: Operation, argument: &Argument) -> Option<Id> {
        if let Some(id) = argument.id() {
            return Some(id.clone());
        }
        if self.mode == ResourceMode::Record
            || matches!(operation, Operation::Index | Operation::Create)
        {
            return None;
        }
        let Identity::ByKey(key) = &self.config.identity else {
            return None;
        };
        argument
            .data()
            .and_then(|data| data.get(key.as_str()))
            .and_then(Id::from_value)
    }
}

fn invalid(operation: Operation, reason: &str) -> RestError {
    RestError::InvalidArgument {
        operation: operation.as_str(),
        reason: reason.to_owned(),
    }
}

/// A started request that is counted as finished again unless it settles
///
/// Settling finishes the request in the reducer, so the guard is disarmed
/// then. On a transport error or a rejected settlement it is released
/// explicitly; if the call is dropped mid-flight, dropping the guard
/// releases it from a spawned task. Releases bypass the shutdown gate.
struct InFlight {
    store: RestStore,
    method: Method,
    armed: bool,
}

impl InFlight {
    async fn acquire(store: &RestStore, method: Method) -> Result<Self> {
        store
            .send(RestAction::SetInFlight {
                method,
                in_flight: true,
            })
            .await?;
        Ok(Self {
            store: store.clone(),
            method,
            armed: true,
        })
    }

    fn disarm(mut self) {
        self.armed = false;
    }

    async fn release(mut self) {
        self.armed = false;
        let action = RestAction::SetInFlight {
            method: self.method,
            in_flight: false,
        };
        self.store.send_always(action).await;
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }

        let store = self.store.clone();
        let method = self.method;
        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            runtime.spawn(async move {
                let action = RestAction::SetInFlight {
                    method,
                    in_flight: false,
                };
                store.send_always(action).await;
            });
        } else {
            tracing::warn!(method = %method, "No runtime to lower in-flight flag");
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::ApiConfig;
    use crate::key_path;
    use crate::mocks::MockTransport;
    use serde_json::json;

    fn remote(transport: &MockTransport) -> Resource {
        Resource::list(
            Config::with_api(ApiConfig::new("http://localhost/", "pets")),
            RestEnvironment::new(Arc::new(transport.clone())),
        )
    }

    #[tokio::test]
    async fn verbs_and_urls() {
        let transport = MockTransport::new();
        transport.respond_json(Method::Get, "http://localhost/pets/", 200, json!([]));
        transport.respond_json(Method::Get, "http://localhost/pets/3/", 200, json!({"id": 3}));
        transport.respond_json(Method::Put, "http://localhost/pets/3/", 200, json!({"id": 3}));
        transport.respond_json(Method::Patch, "http://localhost/pets/3/", 200, json!({"id": 3}));
        transport.respond_json(Method::Post, "http://localhost/pets/", 201, json!({"id": 4}));
        transport.respond_empty(Method::Delete, "http://localhost/pets/4/", 204);

        let pets = remote(&transport);
        pets.index(None).await.unwrap();
        pets.read(3_i64, None).await.unwrap();
        pets.update(json!({"id": 3, "name": "Fifi"}), None).await.unwrap();
        pets.patch(Argument::with_id(3_i64, json!({"name": "Fifi"})), None).await.unwrap();
        pets.create(json!({"name": "Milo"}), None).await.unwrap();
        pets.del(json!({"id": 4}), None).await.unwrap();

        let sent: Vec<(Method, String)> = transport
            .requests()
            .into_iter()
            .map(|request| (request.method, request.url))
            .collect();
        assert_eq!(
            sent,
            vec![
                (Method::Get, "http://localhost/pets/".to_owned()),
                (Method::Get, "http://localhost/pets/3/".to_owned()),
                (Method::Put, "http://localhost/pets/3/".to_owned()),
                (Method::Patch, "http://localhost/pets/3/".to_owned()),
                (Method::Post, "http://localhost/pets/".to_owned()),
                (Method::Delete, "http://localhost/pets/4/".to_owned()),
            ]
        );

        let state = pets.state().await;
        assert_eq!(state.data(), Some(&json!([{"id": 3}])));
        assert_eq!(state.requests().len(), 6);
        assert!(!state.is_fetching());
    }

    #[tokio::test]
    async fn bodies_are_mapped_and_only_sent_with_body_verbs() {
        let transport = MockTransport::new();
        transport.respond_json(Method::Post, "http://localhost/pets/", 201, json!({"id": 1}));
        transport.respond_empty(Method::Delete, "http://localhost/pets/1/", 204);

        let call = ConfigOverride::default()
            .with_map_body(|body| body.map(|b| json!({"pet": b})))
            .with_api(ApiConfig::default().header("Authorization", "Bearer abc"));

        let pets = remote(&transport);
        pets.create(json!({"name": "Fifi"}), Some(&call)).await.unwrap();
        pets.del(1_i64, Some(&call)).await.unwrap();

        let requests = transport.requests();
        assert_eq!(requests[0].body, Some(json!({"pet": {"name": "Fifi"}})));
        assert_eq!(requests[0].headers["Authorization"], "Bearer abc");
        assert_eq!(requests[0].headers["Content-Type"], "application/json");
        assert_eq!(requests[1].body, None);
    }

    #[tokio::test]
    async fn record_update_posts() {
        let transport = MockTransport::new();
        transport.respond_json(Method::Post, "http://localhost/me/", 200, json!({"name": "Ann"}));

        let me = Resource::record(
            Config::with_api(ApiConfig::new("http://localhost/", "me")),
            RestEnvironment::new(Arc::new(transport.clone())),
        );
        me.update(json!({"name": "Ann"}), None).await.unwrap();

        assert_eq!(me.state().await.data(), Some(&json!({"name": "Ann"})));
        assert_eq!(transport.requests()[0].method, Method::Post);
    }

    #[tokio::test]
    async fn remote_without_transport_is_an_error() {
        let pets = Resource::list(Config::named("pets"), RestEnvironment::local());
        let error = pets.index(None).await.unwrap_err();
        assert!(matches!(error, RestError::MissingTransport));
        assert!(!pets.state().await.is_getting());
    }

    #[tokio::test]
    async fn key_paths_are_rejected_for_requests() {
        let pets = remote(&MockTransport::new());
        let error = pets
            .update(
                Argument::Path {
                    path: key_path!["name"],
                    value: json!("x"),
                },
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(error, RestError::InvalidArgument { operation: "update", .. }));
    }

    #[tokio::test]
    async fn update_partial_state_reports_bad_paths() {
        let pets = Resource::list(Config::default(), RestEnvironment::local());
        let error = pets.update_partial_state(key_path![0_usize], json!(1)).await.unwrap_err();
        assert!(matches!(error, RestError::Path(PathError::NoData)));

        let pets = pets.with_data(json!([{"name": "Fifi"}]));
        pets.update_partial_state(key_path![0_usize, "name"], json!("Milo")).await.unwrap();
        assert_eq!(pets.state().await.data(), Some(&json!([{"name": "Milo"}])));

        let error = pets
            .update_partial_state(key_path![3_usize, "name"], json!("Milo"))
            .await
            .unwrap_err();
        assert!(matches!(error, RestError::Path(PathError::IndexOutOfBounds { index: 3, len: 1 })));
    }

    #[tokio::test]
    async fn update_state_requires_data() {
        let pets = Resource::list(Config::default(), RestEnvironment::local());
        let error = pets.update_state(3_i64).await.unwrap_err();
        assert!(matches!(error, RestError::InvalidArgument { operation: "update_state", .. }));
    }

    #[tokio::test]
    async fn update_state_replaces_in_place_and_clear_resets() {
        let pets = Resource::list(Config::default(), RestEnvironment::local())
            .with_data(json!([{"id": 3, "name": "Fifi", "type": "dog"}, {"id": 4, "name": "Milo"}]));

        pets.update_state(json!({"id": 3, "name": "Fififi", "type": "dog"})).await.unwrap();
        assert_eq!(
            pets.state().await.data(),
            Some(&json!([{"id": 3, "name": "Fififi", "type": "dog"}, {"id": 4, "name": "Milo"}]))
        );

        pets.clear().await.unwrap();
        assert_eq!(pets.state().await, RestState::default());
    }

    #[tokio::test]
    async fn update_partial_state_after_clear_changes_nothing() {
        let pets = Resource::list(Config::default(), RestEnvironment::local()).with_data(json!([{"name": "Fifi"}]));
        pets.clear().await.unwrap();
        let mut rx = pets.subscribe();

        let error = pets
            .update_partial_state(key_path![0_usize, "name"], json!("Milo"))
            .await
            .unwrap_err();

        assert!(matches!(error, RestError::Path(PathError::NoData)));
        assert!(rx.try_recv().is_err());
        assert_eq!(pets.state().await, RestState::default());
    }

    #[tokio::test]
    async fn shutdown_mid_flight_still_lowers_flag() {
        let transport = MockTransport::new();
        let held = transport.hold(
            Method::Get,
            "http://localhost/pets/",
            crate::request::TransportResponse::ok(200, Some(json!([]))),
        );
        let pets = remote(&transport);

        let call = tokio::spawn({
            let pets = pets.clone();
            async move { pets.index(None).await }
        });
        while !pets.state().await.is_getting() {
            tokio::task::yield_now().await;
        }

        pets.shutdown(Duration::from_millis(50)).await.unwrap();
        held.release();
        let error = call.await.unwrap().unwrap_err();

        assert!(matches!(
            error,
            RestError::Store(composable_rest_runtime::StoreError::ShutdownInProgress)
        ));
        let state = pets.state().await;
        assert!(!state.is_getting());
        assert!(!state.is_fetching());
        assert!(state.requests().is_empty());
    }

    #[tokio::test]
    async fn infer_argument_uses_schema() {
        let pets = Resource::list(Config::default(), RestEnvironment::local());
        assert_eq!(pets.infer_argument(json!(3)), Argument::Id(Id::Number(3)));

        let names = pets.with_schema(SchemaKind::Primitive);
        assert_eq!(names.infer_argument(json!(3)), Argument::Data(json!(3)));
    }

    #[tokio::test]
    async fn dropped_call_releases_flag() {
        let transport = MockTransport::new();
        let held = transport.hold(
            Method::Get,
            "http://localhost/pets/",
            crate::request::TransportResponse::ok(200, Some(json!([]))),
        );
        let pets = remote(&transport);

        let call = tokio::spawn({
            let pets = pets.clone();
            async move { pets.index(None).await }
        });
        while !pets.state().await.is_getting() {
            tokio::task::yield_now().await;
        }

        call.abort();
        let _ = call.await;
        for _ in 0..100 {
            if !pets.state().await.is_getting() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        assert!(!pets.state().await.is_getting());
        assert!(pets.state().await.requests().is_empty());
        drop(held);
    }
}
