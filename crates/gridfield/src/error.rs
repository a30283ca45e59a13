//! Error types for gridded fields.

use process_group::GroupError;
use thiserror::Error;

/// Errors that can occur while building, querying or exchanging grids.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GridError {
    /// Value access with no data buffer, or an out-of-range index.
    #[error("bad data request: {0}")]
    BadDataRequest(String),

    /// Wrap or bracket query on a degenerate axis, or an index outside a non-wrapping axis.
    #[error("bad data index: {0}")]
    BadDataIndex(String),

    /// The grids involved are not compatible.
    #[error("incompatible grid: {0}")]
    BadGrid(String),

    /// A data vector's length does not match the coordinate axes.
    #[error("data does not match coordinates: {0}")]
    BadIncompatCoords(String),

    /// A size-dependent operation was attempted before the axes were set.
    #[error("grid has no dimensions: {0}")]
    BadNoDims(String),

    /// A scratch allocation could not be made.
    #[error("memory request failed: {0}")]
    BadMemReq(String),

    /// Tolerances or format settings failed validation.
    #[error("invalid grid configuration: {0}")]
    BadConfig(String),

    /// A process asked itself for data, or a non-owner tried to serve.
    #[error("bad process request: {0}")]
    BadProcReq(String),

    /// A local-mode metadata or data check failed.
    #[error("bad data load: {0}")]
    BadDataLoad(String),

    /// Coordinate values are not strictly monotonic.
    #[error("non-monotonic coordinates: {0}")]
    NonMonotonic(String),

    /// No attribute with the given key.
    #[error("no such attribute: {0}")]
    MissingAttribute(String),

    /// Serialized payload is truncated or malformed.
    #[error("decode error: {0}")]
    Decode(String),

    /// A protocol message belongs to another exchange.
    #[error("protocol sequence error: {0}")]
    Sequence(String),

    /// The message-passing substrate failed.
    #[error("channel error: {0}")]
    Channel(#[from] GroupError),
}

impl GridError {
    /// Create a BadDataRequest error.
    pub fn bad_data_request(msg: impl Into<String>) -> Self {
        Self::BadDataRequest(msg.into())
    }

    /// Create a BadDataIndex error.
    pub fn bad_data_index(msg: impl Into<String>) -> Self {
        Self::BadDataIndex(msg.into())
    }

    /// Create a BadGrid error.
    pub fn bad_grid(msg: impl Into<String>) -> Self {
        Self::BadGrid(msg.into())
    }

    /// Create a BadIncompatCoords error.
    pub fn incompat_coords(msg: impl Into<String>) -> Self {
        Self::BadIncompatCoords(msg.into())
    }

    /// Create a BadNoDims error.
    pub fn no_dims(msg: impl Into<String>) -> Self {
        Self::BadNoDims(msg.into())
    }

    /// Create a BadMemReq error.
    pub fn mem_req(msg: impl Into<String>) -> Self {
        Self::BadMemReq(msg.into())
    }

    /// Create a BadConfig error.
    pub fn bad_config(msg: impl Into<String>) -> Self {
        Self::BadConfig(msg.into())
    }

    /// Create a BadProcReq error.
    pub fn bad_proc_req(msg: impl Into<String>) -> Self {
        Self::BadProcReq(msg.into())
    }

    /// Create a BadDataLoad error.
    pub fn bad_data_load(msg: impl Into<String>) -> Self {
        Self::BadDataLoad(msg.into())
    }

    /// Create a Decode error.
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    /// Convert a substrate error, turning request-id mismatches into [`GridError::Sequence`].
    pub fn from_group(err: GroupError) -> Self {
        match err {
            GroupError::OutOfSequence { .. } => Self::Sequence(err.to_string()),
            other => Self::Channel(other),
        }
    }
}

/// Result type for grid operations.
pub type GridResult<T> = std::result::Result<T, GridError>;
