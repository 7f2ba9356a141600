//! Strongly-typed identifiers for tracks, queues, and frames.

use std::fmt;

/// Identifies a track within a profiler session.
///
/// Tracks are registered on first use and assigned sequential indices.
/// `TrackId(n)` corresponds to the n-th registered track; the index is
/// stable for the lifetime of the session and registration order is
/// preserved for observers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TrackId(pub u32);

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for TrackId {
    fn from(v: u32) -> Self {
        Self(v)
    }
}

/// Identifies a GPU command queue registered with the profiler.
///
/// `QueueId(n)` corresponds to the n-th queue passed at GPU pipeline
/// construction. Pairing of GPU begin/end events is scoped to a single
/// queue; a `QueueId` never refers to a different queue mid-session.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueueId(pub u32);

impl fmt::Display for QueueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for QueueId {
    fn from(v: u32) -> Self {
        Self(v)
    }
}

/// Monotonically increasing frame counter.
///
/// Incremented once per [`tick`](https://docs.rs/pulse-engine); never
/// wraps. Ring-buffer slots are addressed as `frame % history_size`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameId(pub u64);

impl FrameId {
    /// The ring-buffer slot index for this frame given a history size.
    pub fn slot(self, history_size: usize) -> usize {
        (self.0 % history_size as u64) as usize
    }
}

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for FrameId {
    fn from(v: u64) -> Self {
        Self(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_slot_wraps_by_history() {
        assert_eq!(FrameId(0).slot(8), 0);
        assert_eq!(FrameId(7).slot(8), 7);
        assert_eq!(FrameId(8).slot(8), 0);
        assert_eq!(FrameId(13).slot(8), 5);
    }

    #[test]
    fn ids_display_as_raw_values() {
        assert_eq!(TrackId(3).to_string(), "3");
        assert_eq!(QueueId(1).to_string(), "1");
        assert_eq!(FrameId(42).to_string(), "42");
    }
}
