//! Resource state and the fields derived from it
//!
//! [`BaseState`] is what transitions write. [`ComputedState`] is a pure
//! function of it and is recomputed by [`RestState`] after every write,
//! so the two can never disagree.

use crate::request::{Method, ResolvedRequest};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// Fields written by state transitions
///
/// `data` and `requests` sit behind `Arc`s: a transition replaces them
/// instead of editing them, so snapshots held by readers never change.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BaseState {
    /// A GET is in flight
    pub is_getting: bool,
    /// A POST is in flight
    pub is_posting: bool,
    /// A PUT is in flight
    pub is_putting: bool,
    /// A PATCH is in flight
    pub is_patching: bool,
    /// A DELETE is in flight
    pub is_deleting: bool,
    /// A single record, a list of records, or nothing yet
    pub data: Option<Arc<Value>>,
    /// Every settled request, oldest first
    pub requests: Arc<Vec<ResolvedRequest>>,
    /// Requests in flight per verb; a flag is up while its count is non-zero
    #[serde(skip)]
    pending: [u32; 5],
}

impl BaseState {
    /// In-flight flag of a verb
    #[must_use]
    pub const fn in_flight(&self, method: Method) -> bool {
        match method {
            Method::Get => self.is_getting,
            Method::Post => self.is_posting,
            Method::Put => self.is_putting,
            Method::Patch => self.is_patching,
            Method::Delete => self.is_deleting,
        }
    }

    /// Number of requests of a verb in flight
    #[must_use]
    pub const fn pending(&self, method: Method) -> u32 {
        self.pending[slot(method)]
    }

    /// Count a request of `method` as started and raise its flag
    pub(crate) fn start(&mut self, method: Method) {
        let count = &mut self.pending[slot(method)];
        *count = count.saturating_add(1);
        *self.flag_mut(method) = true;
    }

    /// Count a request of `method` as finished; the flag drops with the last one
    pub(crate) fn stop(&mut self, method: Method) {
        let count = &mut self.pending[slot(method)];
        *count = count.saturating_sub(1);
        let busy = *count > 0;
        *self.flag_mut(method) = busy;
    }

    const fn flag_mut(&mut self, method: Method) -> &mut bool {
        match method {
            Method::Get => &mut self.is_getting,
            Method::Post => &mut self.is_posting,
            Method::Put => &mut self.is_putting,
            Method::Patch => &mut self.is_patching,
            Method::Delete => &mut self.is_deleting,
        }
    }
}

const fn slot(method: Method) -> usize {
    match method {
        Method::Get => 0,
        Method::Post => 1,
        Method::Put => 2,
        Method::Patch => 3,
        Method::Delete => 4,
    }
}

/// Fields derived from [`BaseState`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComputedState {
    /// A POST, PUT, PATCH or DELETE is in flight
    pub is_updating: bool,
    /// Any request is in flight
    pub is_fetching: bool,
    /// Data has been set
    pub is_initialized: bool,
    /// Messages of every failed request, oldest first
    pub error_messages: Vec<String>,
    /// Message of the latest request, if it failed
    pub error_message: Option<String>,
    /// The latest request failed
    pub has_error: bool,
    /// The latest request succeeded but its payload was rejected and dropped
    pub is_rejected: bool,
}

impl ComputedState {
    /// Derive every computed field from base state
    #[must_use]
    pub fn derive(base: &BaseState) -> Self {
        let is_updating = base.is_posting || base.is_putting || base.is_patching || base.is_deleting;
        let latest = base.requests.last();
        let error_message = latest.and_then(|request| request.error_message.clone());

        Self {
            is_updating,
            is_fetching: base.is_getting || is_updating,
            is_initialized: base.data.is_some(),
            error_messages: base
                .requests
                .iter()
                .filter(|request| !request.ok)
                .filter_map(|request| request.error_message.clone())
                .collect(),
            has_error: error_message.is_some(),
            error_message,
            is_rejected: latest.is_some_and(|request| request.validation.is_aborted()),
        }
    }
}

/// State of one bound resource
///
/// Base fields are private to the crate; every change goes through
/// [`RestState::update`], which refreshes the derived fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RestState {
    #[serde(flatten)]
    base: BaseState,
    #[serde(flatten)]
    computed: ComputedState,
}

impl RestState {
    /// Empty state: no data, nothing in flight, no requests
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// State seeded with data
    #[must_use]
    pub fn with_data(data: Value) -> Self {
        Self::from_base(BaseState {
            data: Some(Arc::new(data)),
            ..BaseState::default()
        })
    }

    /// State from explicit base fields
    #[must_use]
    pub fn from_base(base: BaseState) -> Self {
        let computed = ComputedState::derive(&base);
        Self { base, computed }
    }

    /// Apply a change to the base fields and refresh derived fields
    pub(crate) fn update(&mut self, f: impl FnOnce(&mut BaseState)) {
        f(&mut self.base);
        self.computed = ComputedState::derive(&self.base);
    }

    /// Base fields
    #[must_use]
    pub const fn base(&self) -> &BaseState {
        &self.base
    }

    /// Derived fields
    #[must_use]
    pub const fn computed(&self) -> &ComputedState {
        &self.computed
    }

    /// Current data
    #[must_use]
    pub fn data(&self) -> Option<&Value> {
        self.base.data.as_deref()
    }

    /// Current data as a list, if it is one
    #[must_use]
    pub fn items(&self) -> Option<&[Value]> {
        self.data().and_then(Value::as_array).map(Vec::as_slice)
    }

    /// Settled requests, oldest first
    #[must_use]
    pub fn requests(&self) -> &[ResolvedRequest] {
        &self.base.requests
    }

    /// A GET is in flight
    #[must_use]
    pub const fn is_getting(&self) -> bool {
        self.base.is_getting
    }

    /// A POST is in flight
    #[must_use]
    pub const fn is_posting(&self) -> bool {
        self.base.is_posting
    }

    /// A PUT is in flight
    #[must_use]
    pub const fn is_putting(&self) -> bool {
        self.base.is_putting
    }

    /// A PATCH is in flight
    #[must_use]
    pub const fn is_patching(&self) -> bool {
        self.base.is_patching
    }

    /// A DELETE is in flight
    #[must_use]
    pub const fn is_deleting(&self) -> bool {
        self.base.is_deleting
    }

    /// A POST, PUT, PATCH or DELETE is in flight
    #[must_use]
    pub const fn is_updating(&self) -> bool {
        self.computed.is_updating
    }

    /// Any request is in flight
    #[must_use]
    pub const fn is_fetching(&self) -> bool {
        self.computed.is_fetching
    }

    /// Data has been set
    #[must_use]
    pub const fn is_initialized(&self) -> bool {
        self.computed.is_initialized
    }

    /// Messages of every failed request
    #[must_use]
    pub fn error_messages(&self) -> &[String] {
        &self.computed.error_messages
    }

    /// Message of the latest request, if it failed
    #[must_use]
    pub fn error_message(&self) -> Option<&str> {
        self.computed.error_message.as_deref()
    }

    /// The latest request failed
    #[must_use]
    pub const fn has_error(&self) -> bool {
        self.computed.has_error
    }

    /// The latest payload was rejected by the validator and dropped
    #[must_use]
    pub const fn is_rejected(&self) -> bool {
        self.computed.is_rejected
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::request::{Headers, Validation};
    use chrono::Utc;
    use proptest::prelude::*;
    use serde_json::json;

    fn request(ok: bool, message: Option<&str>) -> ResolvedRequest {
        ResolvedRequest {
            url: "http://localhost/pets/".to_owned(),
            method: Method::Get,
            headers: Headers::new(),
            body: None,
            ok,
            status: if ok { 200 } else { 500 },
            result: None,
            error_message: message.map(str::to_owned),
            settled_at: Utc::now(),
            validation: Validation::NotRun,
        }
    }

    #[test]
    fn empty_state() {
        let state = RestState::new();
        assert!(!state.is_fetching());
        assert!(!state.is_initialized());
        assert!(!state.has_error());
        assert!(state.error_messages().is_empty());
    }

    #[test]
    fn error_message_tracks_latest_request() {
        let mut state = RestState::new();
        state.update(|base| {
            base.requests = Arc::new(vec![request(false, Some("first")), request(false, Some("second"))]);
        });
        assert_eq!(state.error_message(), Some("second"));
        assert_eq!(state.error_messages(), ["first", "second"]);

        state.update(|base| {
            let mut requests = (*base.requests).clone();
            requests.push(request(true, None));
            base.requests = Arc::new(requests);
        });
        assert!(!state.has_error());
        assert_eq!(state.error_message(), None);
        assert_eq!(state.error_messages().len(), 2);
    }

    #[test]
    fn flag_stays_up_until_last_request_of_verb_stops() {
        let mut state = RestState::new();
        state.update(|base| {
            base.start(Method::Get);
            base.start(Method::Get);
        });
        assert_eq!(state.base().pending(Method::Get), 2);

        state.update(|base| base.stop(Method::Get));
        assert!(state.is_getting());
        assert!(state.is_fetching());

        state.update(|base| base.stop(Method::Get));
        assert!(!state.is_getting());

        // Extra stops never underflow
        state.update(|base| base.stop(Method::Get));
        assert_eq!(state.base().pending(Method::Get), 0);
        assert!(!state.is_getting());
    }

    #[test]
    fn rejected_payload_is_not_an_error() {
        let mut rejected = request(true, None);
        rejected.validation = Validation::Failed { aborted: true };
        let state = RestState::from_base(BaseState {
            requests: Arc::new(vec![rejected]),
            ..BaseState::default()
        });
        assert!(state.is_rejected());
        assert!(!state.has_error());
    }

    #[test]
    fn serializes_flat_camel_case() {
        let state = RestState::with_data(json!([]));
        let value = serde_json::to_value(&state).unwrap();
        assert_eq!(value["isInitialized"], json!(true));
        assert_eq!(value["data"], json!([]));
        assert_eq!(value["isGetting"], json!(false));
    }

    fn arb_base() -> impl Strategy<Value = BaseState> {
        (
            any::<[bool; 5]>(),
            any::<bool>(),
            proptest::collection::vec((any::<bool>(), any::<bool>()), 0..6),
        )
            .prop_map(|(flags, has_data, requests)| BaseState {
                is_getting: flags[0],
                is_posting: flags[1],
                is_putting: flags[2],
                is_patching: flags[3],
                is_deleting: flags[4],
                data: has_data.then(|| Arc::new(json!([]))),
                pending: [0; 5],
                requests: Arc::new(
                    requests
                        .into_iter()
                        .map(|(ok, aborted)| {
                            let mut r = request(ok, (!ok).then_some("failed"));
                            if ok && aborted {
                                r.validation = Validation::Failed { aborted: true };
                            }
                            r
                        })
                        .collect(),
                ),
            })
    }

    proptest! {
        #[test]
        fn derived_fields_are_pure(base in arb_base()) {
            let first = ComputedState::derive(&base);
            let second = ComputedState::derive(&base);
            prop_assert_eq!(&first, &second);

            let any_flag = Method::ALL.iter().any(|method| base.in_flight(*method));
            prop_assert_eq!(first.is_fetching, any_flag);
            prop_assert_eq!(first.has_error, first.error_message.is_some());
            prop_assert!(!(first.has_error && first.is_rejected));
        }
    }
}
