//! Message envelope and identifiers.

use std::fmt;

/// Index of a process within its group, `0..size`.
pub type ProcessId = usize;

/// Message tag.
pub type Tag = i32;

/// Floating point type used for gridded values and coordinates.
pub type Real = f32;

/// Identifies one request/reply exchange.
///
/// The originating process allocates the id; the sequence number is unique
/// per origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId {
    pub origin: ProcessId,
    pub seq: u64,
}

impl RequestId {
    pub fn new(origin: ProcessId, seq: u64) -> Self {
        Self { origin, seq }
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.origin, self.seq)
    }
}

/// Typed message body.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Ints(Vec<i32>),
    Reals(Vec<Real>),
    Doubles(Vec<f64>),
    Text(String),
}

impl Payload {
    /// Short name of the payload type, for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Ints(_) => "ints",
            Self::Reals(_) => "reals",
            Self::Doubles(_) => "doubles",
            Self::Text(_) => "string",
        }
    }

    /// Number of elements carried (bytes for text).
    pub fn len(&self) -> usize {
        match self {
            Self::Ints(v) => v.len(),
            Self::Reals(v) => v.len(),
            Self::Doubles(v) => v.len(),
            Self::Text(s) => s.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A tagged message in flight between two processes.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub source: ProcessId,
    pub tag: Tag,
    pub request: RequestId,
    pub payload: Payload,
}

impl Message {
    pub fn new(source: ProcessId, tag: Tag, request: RequestId, payload: Payload) -> Self {
        Self {
            source,
            tag,
            request,
            payload,
        }
    }

    /// True if this message satisfies a receive for `source` (any if `None`) and `tag`.
    pub fn matches(&self, source: Option<ProcessId>, tag: Tag) -> bool {
        self.tag == tag && source.map_or(true, |s| s == self.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_matching() {
        let msg = Message::new(3, 1000, RequestId::new(3, 1), Payload::Ints(vec![2005]));
        assert!(msg.matches(None, 1000));
        assert!(msg.matches(Some(3), 1000));
        assert!(!msg.matches(Some(2), 1000));
        assert!(!msg.matches(Some(3), 1005));
    }

    #[test]
    fn test_payload_kind_and_len() {
        assert_eq!(Payload::Reals(vec![1.0, 2.0]).kind(), "reals");
        assert_eq!(Payload::Reals(vec![1.0, 2.0]).len(), 2);
        assert_eq!(Payload::Text("abc".into()).kind(), "string");
        assert!(Payload::Doubles(vec![]).is_empty());
    }

    #[test]
    fn test_request_id_display() {
        assert_eq!(RequestId::new(2, 17).to_string(), "2#17");
    }
}
