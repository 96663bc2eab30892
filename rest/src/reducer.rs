//! The resource reducer
//!
//! All state changes of a resource happen here, including the effect of
//! a settled request. Settling is a single action so that lowering the
//! verb flag, recording the request and applying the result are observed
//! together.

use crate::actions::{RestAction, Settlement};
use crate::config::{Identity, InvalidHandling, Operation};
use crate::environment::RestEnvironment;
use crate::identify::{identify, Candidate};
use crate::json::Argument;
use crate::path::{set_at_path, PathSegment};
use crate::request::{ResolvedRequest, Validation};
use crate::state::RestState;
use composable_rest_core::environment::Clock;
use composable_rest_core::{effect::Effect, reducer::Reducer, smallvec, SmallVec};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

type Effects = SmallVec<[Effect<RestAction>; 4]>;

/// Whether a resource holds a list of records or a single record
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceMode {
    /// Ordered list of records
    #[default]
    List,
    /// Single record
    Record,
}

/// Reducer for [`RestState`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestReducer {
    mode: ResourceMode,
    identity: Identity,
}

impl RestReducer {
    /// Create a reducer for a mode and identity rule
    #[must_use]
    pub const fn new(mode: ResourceMode, identity: Identity) -> Self {
        Self { mode, identity }
    }

    /// List reducer matching entries by `id`
    #[must_use]
    pub fn list() -> Self {
        Self::new(ResourceMode::List, Identity::default())
    }

    /// Record reducer
    #[must_use]
    pub fn record() -> Self {
        Self::new(ResourceMode::Record, Identity::default())
    }

    /// Replace the identity rule
    #[must_use]
    pub fn with_identity(mut self, identity: Identity) -> Self {
        self.identity = identity;
        self
    }

    /// Mode of the resource
    #[must_use]
    pub const fn mode(&self) -> ResourceMode {
        self.mode
    }

    /// Identity rule used to locate list entries
    #[must_use]
    pub const fn identity(&self) -> &Identity {
        &self.identity
    }

    fn settle(&self, state: &mut RestState, settlement: Settlement, env: &RestEnvironment) -> Effects {
        let Settlement {
            operation,
            argument,
            request,
            response,
            config,
        } = settlement;
        let method = request.method;
        let mut resolved = ResolvedRequest::settle(request, response, env.clock.now());

        if resolved.ok {
            let result = (config.map_response)(resolved.result.take());
            let valid = (config.validate)(result.as_ref());
            resolved.validation = if valid {
                Validation::Passed
            } else {
                Validation::Failed {
                    aborted: config.invalid_handling == InvalidHandling::Abort,
                }
            };
            if !valid && config.invalid_handling != InvalidHandling::Silent {
                tracing::warn!(
                    operation = %operation,
                    url = %resolved.url,
                    result = ?result,
                    handling = ?config.invalid_handling,
                    "Invalid response data"
                );
            }
            resolved.result = result;
        }

        tracing::debug!(
            operation = %operation,
            method = %method,
            status = resolved.status,
            ok = resolved.ok,
            "Request settled"
        );

        let record = resolved.clone();
        state.update(|base| {
            base.stop(method);
            Arc::make_mut(&mut base.requests).push(record);
        });

        if !resolved.ok {
            let hook = Arc::clone(&config.after_failure);
            return smallvec![Effect::fire_and_forget(async move { hook(&resolved) })];
        }
        if resolved.validation.is_aborted() {
            return SmallVec::new();
        }

        let value = resolved.result.clone().or_else(|| argument.data().cloned());
        self.apply(state, operation, &argument, value);

        let hook = Arc::clone(&config.after_success);
        smallvec![Effect::fire_and_forget(async move { hook(&resolved) })]
    }

    /// Apply the data change of a successful operation
    ///
    /// `value` is the mapped result, or the payload when there is none.
    fn apply(&self, state: &mut RestState, operation: Operation, argument: &Argument, value: Option<Value>) {
        if let Argument::Path { path, value } = argument {
            if matches!(operation, Operation::Update | Operation::Patch) {
                update_partial(state, path, value.clone());
            } else {
                tracing::warn!(operation = %operation, "Key path argument ignored");
            }
            return;
        }

        match self.mode {
            ResourceMode::List => match operation {
                Operation::Index => set_data(state, value),
                Operation::Create | Operation::Read => {
                    if let Some(item) = value {
                        add_item(state, item);
                    }
                },
                Operation::Update => {
                    let Some(item) = value else { return };
                    match self.locate(state, argument, Some(&item)) {
                        Some(index) => replace_item(state, index, item),
                        None => add_item(state, item),
                    }
                },
                Operation::Patch => {
                    let Some(fields) = value else { return };
                    match self.locate(state, argument, Some(&fields)) {
                        Some(index) => merge_item(state, index, fields),
                        None => tracing::debug!("Patched entry not found, list unchanged"),
                    }
                },
                Operation::Del => match self.locate(state, argument, value.as_ref()) {
                    Some(index) => remove_item(state, index),
                    None => tracing::debug!("Deleted entry not found, list unchanged"),
                },
            },
            ResourceMode::Record => match operation {
                Operation::Index | Operation::Create | Operation::Read | Operation::Update => {
                    if let Some(record) = value {
                        set_data(state, Some(record));
                    }
                },
                Operation::Patch => {
                    if let Some(fields) = value {
                        update_data(state, fields);
                    }
                },
                Operation::Del => set_data(state, None),
            },
        }
    }

    /// Replace an existing entry or the record, never appending
    fn update_state(&self, state: &mut RestState, argument: Argument) {
        match (&argument, self.mode) {
            (Argument::Path { path, value }, _) => update_partial(state, path, value.clone()),
            (Argument::Data(record) | Argument::IdAndData { data: record, .. }, ResourceMode::Record) => {
                set_data(state, Some(record.clone()));
            },
            (Argument::Data(item) | Argument::IdAndData { data: item, .. }, ResourceMode::List) => {
                match self.locate(state, &argument, Some(item)) {
                    Some(index) => replace_item(state, index, item.clone()),
                    None => tracing::debug!("Entry not found, list unchanged"),
                }
            },
            (Argument::None | Argument::Id(_), _) => {
                tracing::warn!(argument = argument.kind(), "State update without data ignored");
            },
        }
    }

    /// Position of the entry an operation targets
    ///
    /// The explicit id wins, then the payload, then the result.
    fn locate(&self, state: &RestState, argument: &Argument, value: Option<&Value>) -> Option<usize> {
        let candidate = argument
            .id()
            .map(Candidate::Id)
            .or_else(|| argument.data().map(Candidate::Item))
            .or_else(|| value.map(Candidate::Item))?;
        identify(state.items(), candidate, &self.identity)
    }
}

impl Reducer for RestReducer {
    type State = RestState;
    type Action = RestAction;
    type Environment = RestEnvironment;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        tracing::trace!(action = action.name(), "Reducing resource action");

        match action {
            RestAction::SetInFlight { method, in_flight } => {
                state.update(|base| {
                    if in_flight {
                        base.start(method);
                    } else {
                        base.stop(method);
                    }
                });
            },
            RestAction::AddRequest(request) => {
                state.update(|base| Arc::make_mut(&mut base.requests).push(request));
            },
            RestAction::SetData(data) => set_data(state, Some(data)),
            RestAction::SetItems(items) => set_data(state, Some(Value::Array(items))),
            RestAction::UpdateData(fields) => update_data(state, fields),
            RestAction::AddItem(item) => add_item(state, item),
            RestAction::UpdateItem { index, item } => {
                if in_range(state, "update_item", index) {
                    replace_item(state, index, item);
                }
            },
            RestAction::RemoveItem { index } => {
                if in_range(state, "remove_item", index) {
                    remove_item(state, index);
                }
            },
            RestAction::UpdatePartial { path, value } => update_partial(state, &path, value),
            RestAction::Clear => *state = RestState::default(),
            RestAction::Settled(settlement) => return self.settle(state, *settlement, env),
            RestAction::ApplyLocal { operation, argument } => {
                let value = argument.data().cloned();
                self.apply(state, operation, &argument, value);
            },
            RestAction::UpdateState(argument) => self.update_state(state, argument),
        }

        SmallVec::new()
    }
}

fn set_data(state: &mut RestState, data: Option<Value>) {
    state.update(|base| base.data = data.map(Arc::new));
}

fn update_data(state: &mut RestState, fields: Value) {
    let next = match (state.data(), fields) {
        (Some(Value::Object(current)), Value::Object(fields)) => {
            let mut merged = current.clone();
            merged.extend(fields);
            Value::Object(merged)
        },
        (_, fields) => fields,
    };
    set_data(state, Some(next));
}

fn update_partial(state: &mut RestState, path: &[PathSegment], value: Value) {
    let Some(data) = state.data() else {
        tracing::warn!("Partial update ignored, resource has no data");
        return;
    };
    match set_at_path(data, path, value) {
        Ok(next) => set_data(state, Some(next)),
        Err(error) => tracing::warn!(%error, "Partial update ignored"),
    }
}

/// Length of the list, treating missing data as empty
///
/// Logs and returns `None` when the data is not a list.
fn list_len(state: &RestState, action: &'static str) -> Option<usize> {
    match state.data() {
        None => Some(0),
        Some(Value::Array(items)) => Some(items.len()),
        Some(_) => {
            tracing::warn!(action, "List action ignored, data is not a list");
            None
        },
    }
}

fn in_range(state: &RestState, action: &'static str, index: usize) -> bool {
    match list_len(state, action) {
        Some(len) if index < len => true,
        Some(len) => {
            tracing::warn!(action, index, len, "List position out of range, state unchanged");
            false
        },
        None => false,
    }
}

/// Edit the list in place; shared snapshots are copied first
fn edit_items(state: &mut RestState, f: impl FnOnce(&mut Vec<Value>)) {
    state.update(|base| {
        let data = base
            .data
            .get_or_insert_with(|| Arc::new(Value::Array(Vec::new())));
        if let Value::Array(items) = Arc::make_mut(data) {
            f(items);
        }
    });
}

fn add_item(state: &mut RestState, item: Value) {
    if list_len(state, "add_item").is_some() {
        edit_items(state, |items| items.push(item));
    }
}

fn replace_item(state: &mut RestState, index: usize, item: Value) {
    edit_items(state, |items| {
        if let Some(slot) = items.get_mut(index) {
            *slot = item;
        }
    });
}

fn merge_item(state: &mut RestState, index: usize, fields: Value) {
    edit_items(state, |items| {
        if let Some(slot) = items.get_mut(index) {
            match (slot, fields) {
                (Value::Object(entry), Value::Object(fields)) => entry.extend(fields),
                (slot, fields) => *slot = fields,
            }
        }
    });
}

fn remove_item(state: &mut RestState, index: usize) {
    edit_items(state, |items| {
        if index < items.len() {
            items.remove(index);
        }
    });
}
