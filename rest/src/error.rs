//! Error types for REST resource operations

use thiserror::Error;

/// Result type for resource operations
pub type Result<T> = std::result::Result<T, RestError>;

/// Transport-level failures
///
/// HTTP error statuses are never reported through this type; they come back
/// as a response with `ok == false`. Only failures that prevent a response
/// from being produced at all end up here.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection could not be established or was interrupted
    #[error("Network failure: {0}")]
    Network(String),

    /// Request could not be built (bad URL, unencodable body)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Response body could not be read
    #[error("Response decoding failed: {0}")]
    Decode(String),
}

/// Failures of the nested-path write used by partial state updates
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    /// Path has no segments
    #[error("Key path is empty")]
    Empty,

    /// Path is longer than the supported depth
    #[error("Key path has {depth} segments, at most {max} are supported")]
    TooDeep {
        /// Number of segments in the rejected path
        depth: usize,
        /// Maximum supported depth
        max: usize,
    },

    /// There is no data to descend into
    #[error("Resource has no data to update")]
    NoData,

    /// A segment addressed a value that is not an object or array
    #[error("Segment {segment} does not address an object or array")]
    NotAContainer {
        /// Position of the offending segment in the path
        segment: usize,
    },

    /// An index segment was past the end of its array
    #[error("Index {index} is out of bounds for array of length {len}")]
    IndexOutOfBounds {
        /// Requested index
        index: usize,
        /// Length of the array at that point
        len: usize,
    },
}

/// Errors returned by [`Resource`](crate::resource::Resource) operations
#[derive(Debug, Error)]
pub enum RestError {
    /// The transport failed before a response was produced
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The underlying store rejected the action
    #[error(transparent)]
    Store(#[from] composable_rest_runtime::StoreError),

    /// A partial update addressed an invalid path
    #[error(transparent)]
    Path(#[from] PathError),

    /// An API target is configured but no transport was injected
    #[error("Resource has an API target but no transport is configured")]
    MissingTransport,

    /// The argument shape does not fit the operation
    #[error("Invalid argument for {operation}: {reason}")]
    InvalidArgument {
        /// Operation that rejected the argument
        operation: &'static str,
        /// Why the argument was rejected
        reason: String,
    },
}
