//! Actions understood by [`RestReducer`](crate::reducer::RestReducer)

use crate::config::{Config, Operation};
use crate::json::Argument;
use crate::path::KeyPath;
use crate::request::{Method, ResolvedRequest, TransportRequest, TransportResponse};
use serde_json::Value;
use std::sync::Arc;

/// Everything needed to apply a settled round trip to state
#[derive(Debug, Clone)]
pub struct Settlement {
    /// Operation that issued the request
    pub operation: Operation,
    /// Argument of the call, used to identify the affected entry
    pub argument: Argument,
    /// Request as sent
    pub request: TransportRequest,
    /// Response as received, before mapping
    pub response: TransportResponse,
    /// Configuration resolved for the call
    pub config: Arc<Config>,
}

/// State transitions of a resource
#[derive(Debug, Clone)]
pub enum RestAction {
    /// Count a request of a verb as started or finished
    ///
    /// The verb's flag stays raised while any of its requests is in flight.
    SetInFlight {
        /// Verb of the request
        method: Method,
        /// `true` when the request starts, `false` when it ends unsettled
        in_flight: bool,
    },
    /// Append a settled request to the log
    AddRequest(ResolvedRequest),
    /// Replace data wholesale
    SetData(Value),
    /// Replace data with a list
    SetItems(Vec<Value>),
    /// Shallow-merge fields into a record; non-objects replace it
    UpdateData(Value),
    /// Append a list entry
    AddItem(Value),
    /// Replace the list entry at `index`
    UpdateItem {
        /// Position of the entry
        index: usize,
        /// New entry
        item: Value,
    },
    /// Remove the list entry at `index`
    RemoveItem {
        /// Position of the entry
        index: usize,
    },
    /// Overwrite the value at a key path
    UpdatePartial {
        /// Path into the data
        path: KeyPath,
        /// Value to write
        value: Value,
    },
    /// Reset to the empty state
    Clear,
    /// A request settled: lower its flag, record it, apply its result
    Settled(Box<Settlement>),
    /// Apply an operation locally, without a request
    ApplyLocal {
        /// Operation to apply
        operation: Operation,
        /// Argument of the call
        argument: Argument,
    },
    /// Replace an existing entry (list) or the record, without a request
    ///
    /// Unlike a local `update`, an unidentified list entry is not appended.
    UpdateState(Argument),
}

impl RestAction {
    /// Short name for logs
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::SetInFlight { .. } => "set_in_flight",
            Self::AddRequest(_) => "add_request",
            Self::SetData(_) => "set_data",
            Self::SetItems(_) => "set_items",
            Self::UpdateData(_) => "update_data",
            Self::AddItem(_) => "add_item",
            Self::UpdateItem { .. } => "update_item",
            Self::RemoveItem { .. } => "remove_item",
            Self::UpdatePartial { .. } => "update_partial",
            Self::Clear => "clear",
            Self::Settled(_) => "settled",
            Self::ApplyLocal { .. } => "apply_local",
            Self::UpdateState(_) => "update_state",
        }
    }
}
