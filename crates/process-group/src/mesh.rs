//! In-process mesh of group members connected by unbounded channels.
//!
//! Each [`MeshMember`] owns the receiving half of its own inbox and a sender
//! to every member (itself included). Members are `Send` and are meant to be
//! moved onto their own thread, where each one behaves like a separate
//! single-threaded process.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, trace};

use crate::error::{GroupError, GroupResult};
use crate::group::ProcessGroup;
use crate::message::{Message, ProcessId, RequestId, Tag};

/// Builder for a fully connected in-process group.
pub struct LocalMesh;

impl LocalMesh {
    /// Create `size` connected members; member `i` has id `i`.
    pub fn build(size: usize) -> Vec<MeshMember> {
        let (senders, receivers): (Vec<_>, Vec<_>) =
            (0..size).map(|_| mpsc::unbounded_channel::<Message>()).unzip();

        debug!(size, "Built local mesh");

        receivers
            .into_iter()
            .enumerate()
            .map(|(id, rx)| MeshMember {
                id,
                peers: senders.clone(),
                inbox: Mutex::new(Inbox {
                    rx,
                    pending: VecDeque::new(),
                }),
                next_seq: AtomicU64::new(0),
            })
            .collect()
    }
}

struct Inbox {
    rx: UnboundedReceiver<Message>,
    /// Arrived but not yet matched by any receive, in arrival order.
    pending: VecDeque<Message>,
}

/// One process of a [`LocalMesh`].
///
/// Receives block the calling thread while holding the inbox lock, so a
/// member is driven from one plain thread at a time. Called from inside a
/// tokio runtime, a receive that would block fails with
/// [`GroupError::BlockingInRuntime`].
pub struct MeshMember {
    id: ProcessId,
    peers: Vec<UnboundedSender<Message>>,
    inbox: Mutex<Inbox>,
    next_seq: AtomicU64,
}

impl std::fmt::Debug for MeshMember {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MeshMember")
            .field("id", &self.id)
            .field("size", &self.peers.len())
            .finish()
    }
}

impl ProcessGroup for MeshMember {
    fn id(&self) -> ProcessId {
        self.id
    }

    fn size(&self) -> usize {
        self.peers.len()
    }

    fn open_request(&self) -> RequestId {
        RequestId::new(self.id, self.next_seq.fetch_add(1, Ordering::Relaxed))
    }

    fn post(&self, dest: ProcessId, message: Message) -> GroupResult<()> {
        let peer = self.peers.get(dest).ok_or(GroupError::NoSuchProcess {
            id: dest,
            size: self.peers.len(),
        })?;
        peer.send(message).map_err(|_| GroupError::Disconnected(dest))
    }

    fn fetch(&self, source: Option<ProcessId>, tag: Tag) -> GroupResult<Message> {
        if let Some(s) = source {
            if s >= self.peers.len() {
                return Err(GroupError::NoSuchProcess {
                    id: s,
                    size: self.peers.len(),
                });
            }
        }

        let mut inbox = self.inbox.lock().map_err(|_| GroupError::Poisoned(self.id))?;

        if let Some(pos) = inbox.pending.iter().position(|m| m.matches(source, tag)) {
            if let Some(message) = inbox.pending.remove(pos) {
                return Ok(message);
            }
        }

        if tokio::runtime::Handle::try_current().is_ok() {
            return Err(GroupError::BlockingInRuntime(self.id));
        }

        loop {
            // Every member holds a sender to its own inbox, so this only
            // returns None if the mesh is being torn down.
            let message = inbox
                .rx
                .blocking_recv()
                .ok_or(GroupError::Disconnected(self.id))?;
            if message.matches(source, tag) {
                return Ok(message);
            }
            trace!(at = self.id, from = message.source, tag = message.tag, "stashing unmatched message");
            inbox.pending.push_back(message);
        }
    }
}
