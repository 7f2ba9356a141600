//! The event data model: named timed intervals with nesting depth.

use crate::id::{QueueId, TrackId};

/// Maximum nesting depth for any producer's event stack.
///
/// Exceeding this bound indicates a runaway instrumentation scope and is
/// treated as a contract violation (fatal), not a resource limit.
pub const MAX_EVENT_DEPTH: usize = 32;

/// The kind of producer a track represents.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TrackKind {
    /// A CPU thread recording events via a thread recorder.
    CpuThread,
    /// A GPU command queue; events arrive after async readback.
    GpuQueue,
    /// The synthetic presentation track derived from present statistics.
    Present,
}

/// Reference to a name string stored in a frame's scratch arena.
///
/// Resolution goes through the owning frame slot's name store; the
/// reference is only meaningful for the frame whose arena produced it.
/// `serial` identifies the page (pool-unique per handout), `offset` and
/// `len` the byte range within it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NameRef {
    /// Pool-unique serial of the page holding the bytes.
    pub serial: u32,
    /// Byte offset of the string within the page.
    pub offset: u32,
    /// Byte length of the string.
    pub len: u32,
}

impl NameRef {
    /// The empty name (resolves to `""` without touching any page).
    pub const EMPTY: NameRef = NameRef {
        serial: 0,
        offset: 0,
        len: 0,
    };
}

/// A single named, timed interval.
///
/// Events are written in phases: a CPU begin fills everything except
/// `end_ticks`; a GPU begin additionally leaves `queue`, `depth`, and both
/// timestamps for later phases (submission sets queue and depth, readback
/// sets the calibrated timestamps). Once both timestamps are set the event
/// is immutable. Zero ticks denote "unset": a GPU event whose query never
/// resolved stays invalid and is skipped by readers.
#[derive(Clone, Copy, Debug, Default)]
pub struct Event {
    /// Name reference into the owning frame's scratch arena.
    pub name: NameRef,
    /// Source file of the call site, if supplied.
    pub file: &'static str,
    /// Source line of the call site.
    pub line: u32,
    /// Packed `0xBBGGRR` display color.
    pub color: u32,
    /// Nesting depth at begin time (0 = top level).
    pub depth: u8,
    /// The track this event belongs to.
    pub track: TrackId,
    /// Owning GPU queue; meaningful only for [`TrackKind::GpuQueue`] events.
    pub queue: QueueId,
    /// Begin timestamp in session ticks; 0 = unset.
    pub begin_ticks: u64,
    /// End timestamp in session ticks; 0 = unset.
    pub end_ticks: u64,
}

impl Event {
    /// Whether both timestamps have been set.
    ///
    /// GPU events whose timestamp query was dropped (slot exhaustion) or
    /// never paired stay invalid and must not be surfaced to consumers.
    pub fn is_valid(&self) -> bool {
        self.begin_ticks != 0 && self.end_ticks != 0
    }

    /// Duration in ticks. Zero for invalid events.
    pub fn duration_ticks(&self) -> u64 {
        if self.is_valid() {
            self.end_ticks - self.begin_ticks
        } else {
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_event_is_invalid() {
        let ev = Event::default();
        assert!(!ev.is_valid());
        assert_eq!(ev.duration_ticks(), 0);
    }

    #[test]
    fn event_with_both_timestamps_is_valid() {
        let ev = Event {
            begin_ticks: 100,
            end_ticks: 250,
            ..Event::default()
        };
        assert!(ev.is_valid());
        assert_eq!(ev.duration_ticks(), 150);
    }

    #[test]
    fn half_open_event_is_invalid() {
        let ev = Event {
            begin_ticks: 100,
            ..Event::default()
        };
        assert!(!ev.is_valid());
    }

    #[test]
    fn empty_name_ref_is_zeroed() {
        assert_eq!(NameRef::EMPTY, NameRef::default());
    }
}
