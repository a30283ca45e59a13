//! A group of one process.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use crate::error::{GroupError, GroupResult};
use crate::group::ProcessGroup;
use crate::message::{Message, ProcessId, RequestId, Tag};

/// Single-process group.
///
/// Messages posted to self are queued and can be fetched back; a fetch with
/// nothing queued fails with [`GroupError::Deadlock`] since no other process
/// exists to satisfy it.
#[derive(Debug, Default)]
pub struct SerialGroup {
    queue: Mutex<VecDeque<Message>>,
    next_seq: AtomicU64,
}

impl SerialGroup {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProcessGroup for SerialGroup {
    fn id(&self) -> ProcessId {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn open_request(&self) -> RequestId {
        RequestId::new(0, self.next_seq.fetch_add(1, Ordering::Relaxed))
    }

    fn post(&self, dest: ProcessId, message: Message) -> GroupResult<()> {
        if dest != 0 {
            return Err(GroupError::NoSuchProcess { id: dest, size: 1 });
        }
        self.queue
            .lock()
            .map_err(|_| GroupError::Poisoned(0))?
            .push_back(message);
        Ok(())
    }

    fn fetch(&self, source: Option<ProcessId>, tag: Tag) -> GroupResult<Message> {
        let mut queue = self.queue.lock().map_err(|_| GroupError::Poisoned(0))?;
        match queue.iter().position(|m| m.matches(source, tag)) {
            Some(pos) => queue.remove(pos).ok_or(GroupError::Deadlock { tag }),
            None => Err(GroupError::Deadlock { tag }),
        }
    }
}
