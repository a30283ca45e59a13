//! The process group trait and its typed send/receive helpers.

use tracing::trace;

use crate::error::{GroupError, GroupResult};
use crate::message::{Message, Payload, ProcessId, Real, RequestId, Tag};

/// A value received from a peer, with the envelope fields that matter to callers.
#[derive(Debug, Clone, PartialEq)]
pub struct Received<T> {
    pub source: ProcessId,
    pub request: RequestId,
    pub value: T,
}

/// A fixed set of cooperating processes exchanging tagged messages.
///
/// Implementors provide identity, raw [`post`](ProcessGroup::post) /
/// [`fetch`](ProcessGroup::fetch) and request id allocation; the typed
/// helpers are built on top of those. All receives block until a matching
/// message arrives. There is no timeout.
pub trait ProcessGroup: Send + Sync {
    /// This process's id within the group.
    fn id(&self) -> ProcessId;

    /// Number of processes in the group.
    fn size(&self) -> usize;

    /// Allocate a fresh request id originating at this process.
    fn open_request(&self) -> RequestId;

    /// Deliver a message to `dest`.
    fn post(&self, dest: ProcessId, message: Message) -> GroupResult<()>;

    /// Block until a message with `tag` from `source` (any source if `None`) arrives.
    fn fetch(&self, source: Option<ProcessId>, tag: Tag) -> GroupResult<Message>;

    /// True for the process with id 0.
    fn is_root(&self) -> bool {
        self.id() == 0
    }

    fn send_ints(&self, dest: ProcessId, request: RequestId, vals: &[i32], tag: Tag) -> GroupResult<()> {
        self.send_payload(dest, request, Payload::Ints(vals.to_vec()), tag)
    }

    fn send_reals(&self, dest: ProcessId, request: RequestId, vals: &[Real], tag: Tag) -> GroupResult<()> {
        self.send_payload(dest, request, Payload::Reals(vals.to_vec()), tag)
    }

    fn send_doubles(&self, dest: ProcessId, request: RequestId, vals: &[f64], tag: Tag) -> GroupResult<()> {
        self.send_payload(dest, request, Payload::Doubles(vals.to_vec()), tag)
    }

    fn send_string(&self, dest: ProcessId, request: RequestId, text: &str, tag: Tag) -> GroupResult<()> {
        self.send_payload(dest, request, Payload::Text(text.to_string()), tag)
    }

    fn send_payload(&self, dest: ProcessId, request: RequestId, payload: Payload, tag: Tag) -> GroupResult<()> {
        trace!(from = self.id(), to = dest, tag, %request, kind = payload.kind(), len = payload.len(), "send");
        self.post(dest, Message::new(self.id(), tag, request, payload))
    }

    /// Receive exactly `n` ints.
    ///
    /// When `expect` is given, the message must belong to that request.
    fn receive_ints(
        &self,
        source: Option<ProcessId>,
        expect: Option<RequestId>,
        n: usize,
        tag: Tag,
    ) -> GroupResult<Received<Vec<i32>>> {
        let received = self.receive_payload(source, expect, tag)?;
        match received.value {
            Payload::Ints(vals) => finish(received.source, received.request, vals, n, tag),
            other => Err(unexpected(tag, "ints", &other)),
        }
    }

    /// Receive exactly `n` reals.
    fn receive_reals(
        &self,
        source: Option<ProcessId>,
        expect: Option<RequestId>,
        n: usize,
        tag: Tag,
    ) -> GroupResult<Received<Vec<Real>>> {
        let received = self.receive_payload(source, expect, tag)?;
        match received.value {
            Payload::Reals(vals) => finish(received.source, received.request, vals, n, tag),
            other => Err(unexpected(tag, "reals", &other)),
        }
    }

    /// Receive exactly `n` doubles.
    fn receive_doubles(
        &self,
        source: Option<ProcessId>,
        expect: Option<RequestId>,
        n: usize,
        tag: Tag,
    ) -> GroupResult<Received<Vec<f64>>> {
        let received = self.receive_payload(source, expect, tag)?;
        match received.value {
            Payload::Doubles(vals) => finish(received.source, received.request, vals, n, tag),
            other => Err(unexpected(tag, "doubles", &other)),
        }
    }

    fn receive_string(
        &self,
        source: Option<ProcessId>,
        expect: Option<RequestId>,
        tag: Tag,
    ) -> GroupResult<Received<String>> {
        let received = self.receive_payload(source, expect, tag)?;
        match received.value {
            Payload::Text(text) => Ok(Received {
                source: received.source,
                request: received.request,
                value: text,
            }),
            other => Err(unexpected(tag, "string", &other)),
        }
    }

    fn receive_payload(
        &self,
        source: Option<ProcessId>,
        expect: Option<RequestId>,
        tag: Tag,
    ) -> GroupResult<Received<Payload>> {
        let message = self.fetch(source, tag)?;
        trace!(at = self.id(), from = message.source, tag, request = %message.request, "receive");
        if let Some(expected) = expect {
            if message.request != expected {
                return Err(GroupError::OutOfSequence {
                    tag,
                    expected,
                    found: message.request,
                });
            }
        }
        Ok(Received {
            source: message.source,
            request: message.request,
            value: message.payload,
        })
    }
}

fn finish<T>(source: ProcessId, request: RequestId, vals: Vec<T>, n: usize, tag: Tag) -> GroupResult<Received<Vec<T>>> {
    if vals.len() != n {
        return Err(GroupError::LengthMismatch {
            tag,
            expected: n,
            found: vals.len(),
        });
    }
    Ok(Received {
        source,
        request,
        value: vals,
    })
}

fn unexpected(tag: Tag, expected: &'static str, found: &Payload) -> GroupError {
    GroupError::UnexpectedPayload {
        tag,
        expected,
        found: found.kind(),
    }
}
