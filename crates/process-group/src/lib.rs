//! Message-passing substrate for cooperating grid processes.
//!
//! A [`ProcessGroup`] gives a process its identity within a fixed set of
//! peers and lets it exchange typed, tagged messages with them. Receives name
//! an optional source and a tag; delivery is FIFO per (source, tag) pair.
//!
//! Every message also carries a [`RequestId`]. A requester allocates one per
//! exchange with [`ProcessGroup::open_request`] and all messages belonging to
//! that exchange, in both directions, carry it. Receivers can insist on a
//! particular id, which turns the protocol's ordering contract into something
//! checked at runtime instead of something assumed.
//!
//! Two implementations are provided:
//!
//! - [`SerialGroup`]: a group of one, for single-process runs.
//! - [`LocalMesh`]: an in-process mesh whose members can be moved onto
//!   threads and behave like separate single-threaded processes.
//!
//! # Example
//!
//! ```
//! use process_group::{LocalMesh, ProcessGroup};
//!
//! let mut members = LocalMesh::build(2).into_iter();
//! let a = members.next().unwrap();
//! let b = members.next().unwrap();
//!
//! let request = a.open_request();
//! a.send_ints(1, request, &[7, 8, 9], 42).unwrap();
//!
//! let got = b.receive_ints(Some(0), Some(request), 3, 42).unwrap();
//! assert_eq!(got.value, vec![7, 8, 9]);
//! assert_eq!(got.source, 0);
//! ```

pub mod error;
pub mod group;
pub mod mesh;
pub mod message;
pub mod serial;

pub use error::{GroupError, GroupResult};
pub use group::{ProcessGroup, Received};
pub use mesh::{LocalMesh, MeshMember};
pub use message::{Message, Payload, ProcessId, Real, RequestId, Tag};
pub use serial::SerialGroup;
