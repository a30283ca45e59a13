//! Error types for the message-passing substrate.

use thiserror::Error;

use crate::message::{ProcessId, RequestId, Tag};

/// Errors raised by a [`ProcessGroup`](crate::ProcessGroup).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GroupError {
    /// The destination or source does not belong to the group.
    #[error("process {id} is not a member of a group of size {size}")]
    NoSuchProcess { id: ProcessId, size: usize },

    /// The peer's end of the channel has gone away.
    #[error("channel to process {0} is disconnected")]
    Disconnected(ProcessId),

    /// A receive can never be satisfied (nothing else can send to us).
    #[error("receive on tag {tag} would block forever")]
    Deadlock { tag: Tag },

    /// The message under the requested tag carries a different payload type.
    #[error("tag {tag}: expected {expected} payload, found {found}")]
    UnexpectedPayload {
        tag: Tag,
        expected: &'static str,
        found: &'static str,
    },

    /// The message carries a different number of elements than requested.
    #[error("tag {tag}: expected {expected} elements, found {found}")]
    LengthMismatch { tag: Tag, expected: usize, found: usize },

    /// The message belongs to a different request session.
    #[error("tag {tag}: message belongs to request {found}, expected {expected}")]
    OutOfSequence {
        tag: Tag,
        expected: RequestId,
        found: RequestId,
    },

    /// A blocking receive was attempted from inside an async runtime.
    #[error("process {0} cannot block on its inbox inside an async runtime")]
    BlockingInRuntime(ProcessId),

    /// An internal lock was poisoned by a panicking thread.
    #[error("inbox of process {0} is poisoned")]
    Poisoned(ProcessId),
}

/// Result type for process group operations.
pub type GroupResult<T> = std::result::Result<T, GroupError>;
