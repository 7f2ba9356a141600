//! Per-track frame slots: the ring-buffered event storage.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Mutex;

use pulse_arena::{NameStore, PagePool};
use pulse_core::{Event, FrameId, TrackId, TrackKind};

/// Frame tag for a slot that has never recorded.
const UNTAGGED: u64 = u64::MAX;

/// Event storage for one track in one ring-buffer frame.
///
/// Index allocation is a `fetch_add` on `len`; each event cell sits behind
/// its own mutex so a reader can never observe a half-written event. The
/// `frame` tag tells readers which frame the slot currently holds, which is
/// how evicted-frame reads are detected without any shared bookkeeping.
pub(crate) struct FrameSlot {
    frame: AtomicU64,
    events: Vec<Mutex<Event>>,
    len: AtomicU32,
    open: AtomicU32,
    names: Mutex<NameStore>,
}

impl FrameSlot {
    fn new(capacity: u32, frame: Option<FrameId>) -> Self {
        let tag = frame.map_or(UNTAGGED, |f| f.0);
        Self {
            frame: AtomicU64::new(tag),
            events: (0..capacity).map(|_| Mutex::new(Event::default())).collect(),
            len: AtomicU32::new(0),
            open: AtomicU32::new(0),
            names: Mutex::new(NameStore::new(FrameId(tag))),
        }
    }

    /// The frame this slot currently holds, if it has ever recorded.
    pub fn frame(&self) -> Option<FrameId> {
        let tag = self.frame.load(Ordering::Acquire);
        (tag != UNTAGGED).then_some(FrameId(tag))
    }

    /// Events recorded so far, clamped to capacity.
    pub fn len(&self) -> u32 {
        self.len
            .load(Ordering::Acquire)
            .min(self.events.len() as u32)
    }

    /// Begin/end pairs currently open on this slot.
    pub fn open_events(&self) -> u32 {
        self.open.load(Ordering::Acquire)
    }

    /// Store a begin-phase event (end ticks unset). Returns the event
    /// index, or `None` when the slot is full.
    pub fn add_begin(&self, pool: &PagePool, name: &str, mut event: Event) -> Option<u32> {
        let index = self.len.fetch_add(1, Ordering::Relaxed);
        if index >= self.events.len() as u32 {
            return None;
        }
        event.name = self.names.lock().expect("name store poisoned").push(pool, name);
        *self.events[index as usize].lock().expect("event cell poisoned") = event;
        self.open.fetch_add(1, Ordering::AcqRel);
        Some(index)
    }

    /// Close a begin-phase event.
    pub fn set_end(&self, index: u32, end_ticks: u64) {
        self.events[index as usize]
            .lock()
            .expect("event cell poisoned")
            .end_ticks = end_ticks;
        self.open.fetch_sub(1, Ordering::AcqRel);
    }

    /// Store a complete event (both timestamps set), copying `name` into
    /// this slot's arena. Used for GPU readback and present finalization.
    pub fn add_complete(&self, pool: &PagePool, name: &str, mut event: Event) -> Option<u32> {
        let index = self.len.fetch_add(1, Ordering::Relaxed);
        if index >= self.events.len() as u32 {
            return None;
        }
        event.name = self.names.lock().expect("name store poisoned").push(pool, name);
        *self.events[index as usize].lock().expect("event cell poisoned") = event;
        Some(index)
    }

    /// Run `f` over every valid event in the slot, with its resolved name.
    pub fn for_each(&self, mut f: impl FnMut(&Event, &str)) {
        let names = self.names.lock().expect("name store poisoned");
        for cell in self.events.iter().take(self.len() as usize) {
            let event = *cell.lock().expect("event cell poisoned");
            if !event.is_valid() {
                continue;
            }
            f(&event, names.resolve(event.name).unwrap_or(""));
        }
    }

    /// Rebind the slot to a new frame, releasing the old frame's pages.
    ///
    /// This is ring-buffer eviction: the slot's previous frame becomes
    /// unreadable the moment the tag changes.
    pub fn reset(&self, pool: &PagePool, frame: FrameId) {
        debug_assert_eq!(self.open.load(Ordering::Acquire), 0);
        self.len.store(0, Ordering::Relaxed);
        self.names
            .lock()
            .expect("name store poisoned")
            .reset(pool, frame);
        self.frame.store(frame.0, Ordering::Release);
    }

    /// Overshoot of the allocation counter past capacity (dropped events).
    pub fn overflow(&self) -> u32 {
        self.len
            .load(Ordering::Relaxed)
            .saturating_sub(self.events.len() as u32)
    }
}

/// One event track: a producer identity plus its ring of frame slots.
pub(crate) struct Track {
    id: TrackId,
    kind: TrackKind,
    producer: u64,
    name: Mutex<String>,
    slots: Vec<FrameSlot>,
}

impl Track {
    /// Create a track whose slot for `current` is live immediately; the
    /// remaining slots stay untagged until the ring reaches them.
    pub fn new(
        id: TrackId,
        kind: TrackKind,
        producer: u64,
        name: String,
        history_size: usize,
        capacity: u32,
        current: FrameId,
    ) -> Self {
        let live = current.slot(history_size);
        let slots = (0..history_size)
            .map(|i| FrameSlot::new(capacity, (i == live).then_some(current)))
            .collect();
        Self {
            id,
            kind,
            producer,
            name: Mutex::new(name),
            slots,
        }
    }

    pub fn id(&self) -> TrackId {
        self.id
    }

    pub fn kind(&self) -> TrackKind {
        self.kind
    }

    pub fn producer(&self) -> u64 {
        self.producer
    }

    pub fn name(&self) -> String {
        self.name.lock().expect("track name poisoned").clone()
    }

    pub fn rename(&self, name: &str) {
        *self.name.lock().expect("track name poisoned") = name.to_owned();
    }

    /// The ring slot that holds (or will hold) `frame`.
    pub fn slot(&self, frame: FrameId) -> &FrameSlot {
        &self.slots[frame.slot(self.slots.len())]
    }

    /// The ring slot for `frame` only if it actually holds that frame.
    pub fn slot_for(&self, frame: FrameId) -> Option<&FrameSlot> {
        let slot = self.slot(frame);
        (slot.frame() == Some(frame)).then_some(slot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn event_at(begin: u64) -> Event {
        Event {
            begin_ticks: begin,
            ..Event::default()
        }
    }

    #[test]
    fn begin_end_round_trip() {
        let pool = PagePool::new();
        let slot = FrameSlot::new(8, Some(FrameId(0)));
        let idx = slot.add_begin(&pool, "Update", event_at(10)).expect("capacity");
        assert_eq!(slot.open_events(), 1);
        slot.set_end(idx, 25);
        assert_eq!(slot.open_events(), 0);

        let mut seen = Vec::new();
        slot.for_each(|ev, name| seen.push((name.to_owned(), ev.begin_ticks, ev.end_ticks)));
        assert_eq!(seen, vec![("Update".to_owned(), 10, 25)]);
    }

    #[test]
    fn half_open_events_are_skipped_by_readers() {
        let pool = PagePool::new();
        let slot = FrameSlot::new(8, Some(FrameId(0)));
        slot.add_begin(&pool, "Open", event_at(10));
        let mut count = 0;
        slot.for_each(|_, _| count += 1);
        assert_eq!(count, 0);
    }

    #[test]
    fn overflow_drops_and_is_counted() {
        let pool = PagePool::new();
        let slot = FrameSlot::new(2, Some(FrameId(0)));
        assert!(slot.add_begin(&pool, "a", event_at(1)).is_some());
        assert!(slot.add_begin(&pool, "b", event_at(2)).is_some());
        assert!(slot.add_begin(&pool, "c", event_at(3)).is_none());
        assert_eq!(slot.overflow(), 1);
        assert_eq!(slot.len(), 2);
    }

    #[test]
    fn reset_rebinds_and_releases_pages() {
        let pool = PagePool::new();
        let slot = FrameSlot::new(4, Some(FrameId(0)));
        let idx = slot.add_begin(&pool, "old", event_at(1)).unwrap();
        slot.set_end(idx, 2);
        slot.reset(&pool, FrameId(8));
        assert_eq!(slot.frame(), Some(FrameId(8)));
        assert_eq!(slot.len(), 0);
        assert_eq!(pool.pages_free(), 1);
    }

    #[test]
    fn slot_for_rejects_wrong_frame() {
        let track = Track::new(
            TrackId(0),
            TrackKind::CpuThread,
            1,
            "worker".to_owned(),
            4,
            8,
            FrameId(0),
        );
        assert!(track.slot_for(FrameId(0)).is_some());
        // Same ring position, different frame.
        assert!(track.slot_for(FrameId(4)).is_none());
        // Untagged slot.
        assert!(track.slot_for(FrameId(2)).is_none());
    }

    #[test]
    fn concurrent_begins_get_distinct_indices() {
        let pool = Arc::new(PagePool::new());
        let slot = Arc::new(FrameSlot::new(64, Some(FrameId(0))));
        let handles: Vec<_> = (0..4u64)
            .map(|t| {
                let pool = Arc::clone(&pool);
                let slot = Arc::clone(&slot);
                std::thread::spawn(move || {
                    let mut indices = Vec::new();
                    for i in 0..16 {
                        let idx = slot
                            .add_begin(&pool, "w", event_at(1 + t * 16 + i))
                            .expect("capacity");
                        slot.set_end(idx, 1000);
                        indices.push(idx);
                    }
                    indices
                })
            })
            .collect();
        let mut all: Vec<u32> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        all.sort_unstable();
        all.dedup();
        assert_eq!(all.len(), 64);
        assert_eq!(slot.open_events(), 0);
    }
}
