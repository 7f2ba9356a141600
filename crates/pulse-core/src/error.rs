//! Shared error types.
//!
//! Contract violations (mismatched begin/end, nesting overflow, unbalanced
//! stacks at tick) are deliberately *not* errors: they panic, since they
//! indicate instrumentation bugs rather than runtime conditions. The enums
//! here cover the recoverable surfaces: consumer queries against the frame
//! window.

use std::error::Error;
use std::fmt;

use crate::id::{FrameId, TrackId};

/// Errors from the consumer query API.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QueryError {
    /// The requested track index was never registered.
    UnknownTrack {
        /// The offending track index.
        track: TrackId,
    },
    /// The requested frame has been evicted from the ring buffer.
    Evicted {
        /// The requested frame.
        frame: FrameId,
    },
    /// The requested frame is not yet fully resolved (still recording, or
    /// GPU readback for it is pending).
    NotResolved {
        /// The requested frame.
        frame: FrameId,
    },
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownTrack { track } => write!(f, "track {track} is not registered"),
            Self::Evicted { frame } => {
                write!(f, "frame {frame} has been evicted from the ring buffer")
            }
            Self::NotResolved { frame } => write!(f, "frame {frame} is not resolved yet"),
        }
    }
}

impl Error for QueryError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages_name_the_subject() {
        let e = QueryError::UnknownTrack { track: TrackId(7) };
        assert!(e.to_string().contains('7'));
        let e = QueryError::Evicted { frame: FrameId(12) };
        assert!(e.to_string().contains("12"));
        let e = QueryError::NotResolved { frame: FrameId(3) };
        assert!(e.to_string().contains("not resolved"));
    }
}
