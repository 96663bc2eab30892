//! Layered resource configuration
//!
//! A [`Config`] is always fully populated. Partial settings travel as a
//! [`ConfigOverride`] and are layered on top with [`Config::merge`]:
//! fields present in the override replace the base, nested API targets
//! merge field by field, and header/parameter maps merge key by key.
//!
//! Every operation resolves its configuration in two steps: the per-call
//! override is merged into the resource's base config, then the overlay for
//! the operation (`index`, `create`, ...) is merged on top, so the overlay wins.

use crate::request::{Headers, ResolvedRequest};
use crate::url;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Reshapes a response result before it reaches state
pub type MapResponse = Arc<dyn Fn(Option<Value>) -> Option<Value> + Send + Sync>;

/// Reshapes a payload before it is sent
pub type MapBody = Arc<dyn Fn(Option<Value>) -> Option<Value> + Send + Sync>;

/// Decides whether a mapped result may be applied
pub type Validate = Arc<dyn Fn(Option<&Value>) -> bool + Send + Sync>;

/// Runs after a request settled
pub type AfterHook = Arc<dyn Fn(&ResolvedRequest) + Send + Sync>;

/// What to do when the validator rejects a successful response
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvalidHandling {
    /// Apply the payload anyway, without logging
    Silent,
    /// Log a warning, then apply the payload
    Warn,
    /// Log a warning and drop the payload
    #[default]
    Abort,
}

/// How local entries are matched against server entries
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Identity {
    /// Compare the named field
    ByKey(String),
    /// A numeric identifier is the position in the list
    ByPosition,
}

impl Default for Identity {
    fn default() -> Self {
        Self::ByKey("id".to_owned())
    }
}

impl Identity {
    /// Field name used for matching, if any
    #[must_use]
    pub fn key(&self) -> Option<&str> {
        match self {
            Self::ByKey(key) => Some(key),
            Self::ByPosition => None,
        }
    }
}

/// Description of the API target of a resource
///
/// If `url` is set it is used verbatim; otherwise the URL is built from
/// the segments (see [`url::build`]).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ApiConfig {
    /// Scheme and host, e.g. `http://localhost/`
    pub domain: Option<String>,
    /// Path prefix, e.g. `api/v1`
    pub path: Option<String>,
    /// Resource name, e.g. `pets`
    pub name: Option<String>,
    /// Trailing segment after the id
    pub suffix: Option<String>,
    /// Query parameters
    pub params: url::QueryParams,
    /// Headers sent on top of the defaults
    pub additional_headers: Headers,
    /// Complete URL, bypassing the segments
    pub url: Option<String>,
}

impl ApiConfig {
    /// Target built from a domain and a resource name
    #[must_use]
    pub fn new(domain: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            domain: Some(domain.into()),
            name: Some(name.into()),
            ..Self::default()
        }
    }

    /// Target with a fixed URL
    #[must_use]
    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            ..Self::default()
        }
    }

    /// Add a query parameter
    #[must_use]
    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key, value);
        self
    }

    /// Add a request header
    #[must_use]
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.additional_headers.insert(key.into(), value.into());
        self
    }

    /// Layer `other` on top of `self`
    #[must_use]
    pub fn merge(&self, other: &Self) -> Self {
        let mut params = self.params.clone();
        params.extend(other.params.iter());
        let mut additional_headers = self.additional_headers.clone();
        additional_headers.extend(
            other
                .additional_headers
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );

        Self {
            domain: other.domain.clone().or_else(|| self.domain.clone()),
            path: other.path.clone().or_else(|| self.path.clone()),
            name: other.name.clone().or_else(|| self.name.clone()),
            suffix: other.suffix.clone().or_else(|| self.suffix.clone()),
            params,
            additional_headers,
            url: other.url.clone().or_else(|| self.url.clone()),
        }
    }
}

/// Resource operations, each with its own config overlay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    /// Fetch the whole resource
    Index,
    /// Create a record
    Create,
    /// Fetch one record
    Read,
    /// Replace a record
    Update,
    /// Partially update a record
    Patch,
    /// Delete a record
    Del,
}

impl Operation {
    /// Name used in logs and metrics
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Index => "index",
            Self::Create => "create",
            Self::Read => "read",
            Self::Update => "update",
            Self::Patch => "patch",
            Self::Del => "del",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-operation partial configuration
#[derive(Clone, Default, PartialEq)]
pub struct ActionOverlays {
    /// Overlay for `index`
    pub index: Option<Box<ConfigOverride>>,
    /// Overlay for `create`
    pub create: Option<Box<ConfigOverride>>,
    /// Overlay for `read`
    pub read: Option<Box<ConfigOverride>>,
    /// Overlay for `update`
    pub update: Option<Box<ConfigOverride>>,
    /// Overlay for `patch`
    pub patch: Option<Box<ConfigOverride>>,
    /// Overlay for `del`
    pub del: Option<Box<ConfigOverride>>,
}

impl ActionOverlays {
    /// Overlay for an operation
    #[must_use]
    pub fn get(&self, operation: Operation) -> Option<&ConfigOverride> {
        self.slot(operation).as_deref()
    }

    /// Replace the overlay for an operation
    pub fn set(&mut self, operation: Operation, overlay: ConfigOverride) {
        *self.slot_mut(operation) = Some(Box::new(overlay));
    }

    const fn slot(&self, operation: Operation) -> &Option<Box<ConfigOverride>> {
        match operation {
            Operation::Index => &self.index,
            Operation::Create => &self.create,
            Operation::Read => &self.read,
            Operation::Update => &self.update,
            Operation::Patch => &self.patch,
            Operation::Del => &self.del,
        }
    }

    const fn slot_mut(&mut self, operation: Operation) -> &mut Option<Box<ConfigOverride>> {
        match operation {
            Operation::Index => &mut self.index,
            Operation::Create => &mut self.create,
            Operation::Read => &mut self.read,
            Operation::Update => &mut self.update,
            Operation::Patch => &mut self.patch,
            Operation::Del => &mut self.del,
        }
    }

    /// Layer `other` on top of `self`, operation by operation
    #[must_use]
    pub fn merge(&self, other: &Self) -> Self {
        let mut merged = self.clone();
        for operation in [
            Operation::Index,
            Operation::Create,
            Operation::Read,
            Operation::Update,
            Operation::Patch,
            Operation::Del,
        ] {
            if let Some(overlay) = other.get(operation) {
                let next = match self.get(operation) {
                    Some(existing) => existing.merge(overlay),
                    None => overlay.clone(),
                };
                merged.set(operation, next);
            }
        }
        merged
    }

    fn is_empty(&self) -> bool {
        self.index.is_none()
            && self.create.is_none()
            && self.read.is_none()
            && self.update.is_none()
            && self.patch.is_none()
            && self.del.is_none()
    }
}

impl fmt::Debug for ActionOverlays {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (name, overlay) in [
            ("index", &self.index),
            ("create", &self.create),
            ("read", &self.read),
            ("update", &self.update),
            ("patch", &self.patch),
            ("del", &self.del),
        ] {
            if let Some(overlay) = overlay {
                map.entry(&name, overlay);
            }
        }
        map.finish()
    }
}

/// Partial configuration; every field is optional
#[derive(Clone, Default)]
pub struct ConfigOverride {
    /// API target, merged field by field
    pub api: Option<ApiConfig>,
    /// Response mapper
    pub map_response: Option<MapResponse>,
    /// Body mapper
    pub map_body: Option<MapBody>,
    /// Validator
    pub validate: Option<Validate>,
    /// Policy for rejected payloads
    pub invalid_handling: Option<InvalidHandling>,
    /// Hook after a successful request
    pub after_success: Option<AfterHook>,
    /// Hook after a failed request
    pub after_failure: Option<AfterHook>,
    /// Per-operation overlays
    pub actions: ActionOverlays,
}

impl ConfigOverride {
    /// Set the API target
    #[must_use]
    pub fn with_api(mut self, api: ApiConfig) -> Self {
        self.api = Some(api);
        self
    }

    /// Set the response mapper
    #[must_use]
    pub fn with_map_response<F>(mut self, f: F) -> Self
    where
        F: Fn(Option<Value>) -> Option<Value> + Send + Sync + 'static,
    {
        self.map_response = Some(Arc::new(f));
        self
    }

    /// Set the body mapper
    #[must_use]
    pub fn with_map_body<F>(mut self, f: F) -> Self
    where
        F: Fn(Option<Value>) -> Option<Value> + Send + Sync + 'static,
    {
        self.map_body = Some(Arc::new(f));
        self
    }

    /// Set the validator
    #[must_use]
    pub fn with_validate<F>(mut self, f: F) -> Self
    where
        F: Fn(Option<&Value>) -> bool + Send + Sync + 'static,
    {
        self.validate = Some(Arc::new(f));
        self
    }

    /// Set the invalid-payload policy
    #[must_use]
    pub const fn with_invalid_handling(mut self, handling: InvalidHandling) -> Self {
        self.invalid_handling = Some(handling);
        self
    }

    /// Set the success hook
    #[must_use]
    pub fn with_after_success<F>(mut self, f: F) -> Self
    where
        F: Fn(&ResolvedRequest) + Send + Sync + 'static,
    {
        self.after_success = Some(Arc::new(f));
        self
    }

    /// Set the failure hook
    #[must_use]
    pub fn with_after_failure<F>(mut self, f: F) -> Self
    where
        F: Fn(&ResolvedRequest) + Send + Sync + 'static,
    {
        self.after_failure = Some(Arc::new(f));
        self
    }

    /// Set the overlay of one operation
    #[must_use]
    pub fn with_action(mut self, operation: Operation, overlay: Self) -> Self {
        self.actions.set(operation, overlay);
        self
    }

    /// Layer `other` on top of `self`
    #[must_use]
    pub fn merge(&self, other: &Self) -> Self {
        Self {
            api: merge_api(self.api.as_ref(), other.api.as_ref()),
            map_response: other.map_response.clone().or_else(|| self.map_response.clone()),
            map_body: other.map_body.clone().or_else(|| self.map_body.clone()),
            validate: other.validate.clone().or_else(|| self.validate.clone()),
            invalid_handling: other.invalid_handling.or(self.invalid_handling),
            after_success: other.after_success.clone().or_else(|| self.after_success.clone()),
            after_failure: other.after_failure.clone().or_else(|| self.after_failure.clone()),
            actions: self.actions.merge(&other.actions),
        }
    }
}

impl PartialEq for ConfigOverride {
    fn eq(&self, other: &Self) -> bool {
        self.api == other.api
            && opt_fn_eq(self.map_response.as_ref(), other.map_response.as_ref())
            && opt_fn_eq(self.map_body.as_ref(), other.map_body.as_ref())
            && opt_fn_eq(self.validate.as_ref(), other.validate.as_ref())
            && self.invalid_handling == other.invalid_handling
            && opt_fn_eq(self.after_success.as_ref(), other.after_success.as_ref())
            && opt_fn_eq(self.after_failure.as_ref(), other.after_failure.as_ref())
            && self.actions == other.actions
    }
}

impl fmt::Debug for ConfigOverride {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigOverride")
            .field("api", &self.api)
            .field("map_response", &self.map_response.as_ref().map(|_| "<fn>"))
            .field("map_body", &self.map_body.as_ref().map(|_| "<fn>"))
            .field("validate", &self.validate.as_ref().map(|_| "<fn>"))
            .field("invalid_handling", &self.invalid_handling)
            .field("after_success", &self.after_success.as_ref().map(|_| "<fn>"))
            .field("after_failure", &self.after_failure.as_ref().map(|_| "<fn>"))
            .field("actions", &self.actions)
            .finish()
    }
}

/// Fully populated resource configuration
#[derive(Clone)]
pub struct Config {
    /// API target; `None` puts the resource in local mode
    pub api: Option<ApiConfig>,
    /// Matching rule for list entries, fixed per resource
    pub identity: Identity,
    /// Response mapper (identity by default)
    pub map_response: MapResponse,
    /// Body mapper (identity by default)
    pub map_body: MapBody,
    /// Validator (accepts everything by default)
    pub validate: Validate,
    /// Policy for rejected payloads
    pub invalid_handling: InvalidHandling,
    /// Hook after a successful request (no-op by default)
    pub after_success: AfterHook,
    /// Hook after a failed request (no-op by default)
    pub after_failure: AfterHook,
    /// Per-operation overlays
    pub actions: ActionOverlays,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api: None,
            identity: Identity::default(),
            map_response: Arc::new(|result| result),
            map_body: Arc::new(|body| body),
            validate: Arc::new(|_| true),
            invalid_handling: InvalidHandling::default(),
            after_success: Arc::new(|_| {}),
            after_failure: Arc::new(|_| {}),
            actions: ActionOverlays::default(),
        }
    }
}

impl Config {
    /// Default configuration in local mode
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Default configuration targeting `api`
    #[must_use]
    pub fn with_api(api: ApiConfig) -> Self {
        Self {
            api: Some(api),
            ..Self::default()
        }
    }

    /// Default configuration whose API target carries only a resource name
    ///
    /// Usually combined with a call or overlay that supplies the domain.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self::with_api(ApiConfig {
            name: Some(name.into()),
            ..ApiConfig::default()
        })
    }

    /// Replace the identity rule
    #[must_use]
    pub fn identity(mut self, identity: Identity) -> Self {
        self.identity = identity;
        self
    }

    /// Layer a partial configuration on top of this one
    ///
    /// Neither input is modified. `None` returns an equal copy.
    #[must_use]
    pub fn merge(&self, over: Option<&ConfigOverride>) -> Self {
        let Some(over) = over else {
            return self.clone();
        };

        Self {
            api: merge_api(self.api.as_ref(), over.api.as_ref()),
            identity: self.identity.clone(),
            map_response: over.map_response.clone().unwrap_or_else(|| Arc::clone(&self.map_response)),
            map_body: over.map_body.clone().unwrap_or_else(|| Arc::clone(&self.map_body)),
            validate: over.validate.clone().unwrap_or_else(|| Arc::clone(&self.validate)),
            invalid_handling: over.invalid_handling.unwrap_or(self.invalid_handling),
            after_success: over.after_success.clone().unwrap_or_else(|| Arc::clone(&self.after_success)),
            after_failure: over.after_failure.clone().unwrap_or_else(|| Arc::clone(&self.after_failure)),
            actions: self.actions.merge(&over.actions),
        }
    }

    /// Layer a partial configuration on top of this one, consuming it
    #[must_use]
    pub fn overlay(self, over: ConfigOverride) -> Self {
        self.merge(Some(&over))
    }

    /// This configuration as an override that reproduces it when merged
    #[must_use]
    pub fn to_override(&self) -> ConfigOverride {
        ConfigOverride {
            api: self.api.clone(),
            map_response: Some(Arc::clone(&self.map_response)),
            map_body: Some(Arc::clone(&self.map_body)),
            validate: Some(Arc::clone(&self.validate)),
            invalid_handling: Some(self.invalid_handling),
            after_success: Some(Arc::clone(&self.after_success)),
            after_failure: Some(Arc::clone(&self.after_failure)),
            actions: self.actions.clone(),
        }
    }

    /// Configuration for one call of `operation`
    ///
    /// The call override is merged first, then the operation overlay on top.
    #[must_use]
    pub fn resolve(&self, operation: Operation, call: Option<&ConfigOverride>) -> Self {
        let merged = self.merge(call);
        let overlay = merged.actions.get(operation).cloned();
        merged.merge(overlay.as_ref())
    }

    /// Whether requests go to an API target at all
    #[must_use]
    pub const fn is_remote(&self) -> bool {
        self.api.is_some()
    }

    /// Report suspicious settings as warnings
    ///
    /// Returns the problems found; each one is also logged.
    pub fn diagnose(&self) -> Vec<String> {
        let mut problems = Vec::new();

        if let Some(api) = &self.api {
            if url::build(api, None).is_empty() {
                problems.push("API target resolves to an empty URL".to_owned());
            }
        }
        if let Identity::ByKey(key) = &self.identity {
            if key.is_empty() {
                problems.push("Identity key is empty, list entries will never match".to_owned());
            }
        }

        for problem in &problems {
            tracing::warn!(problem = %problem, "Suspicious resource configuration");
        }
        problems
    }
}

impl PartialEq for Config {
    fn eq(&self, other: &Self) -> bool {
        self.api == other.api
            && self.identity == other.identity
            && fn_eq(&self.map_response, &other.map_response)
            && fn_eq(&self.map_body, &other.map_body)
            && fn_eq(&self.validate, &other.validate)
            && self.invalid_handling == other.invalid_handling
            && fn_eq(&self.after_success, &other.after_success)
            && fn_eq(&self.after_failure, &other.after_failure)
            && self.actions == other.actions
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("Config");
        s.field("api", &self.api)
            .field("identity", &self.identity)
            .field("invalid_handling", &self.invalid_handling);
        if !self.actions.is_empty() {
            s.field("actions", &self.actions);
        }
        s.finish_non_exhaustive()
    }
}

fn merge_api(base: Option<&ApiConfig>, over: Option<&ApiConfig>) -> Option<ApiConfig> {
    match (base, over) {
        (Some(base), Some(over)) => Some(base.merge(over)),
        (None, Some(over)) => Some(over.clone()),
        (base, None) => base.cloned(),
    }
}

/// Functions compare by identity of the shared closure
fn fn_eq<T: ?Sized>(a: &Arc<T>, b: &Arc<T>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

fn opt_fn_eq<T: ?Sized>(a: Option<&Arc<T>>, b: Option<&Arc<T>>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => fn_eq(a, b),
        (None, None) => true,
        _ => false,
    }
}
