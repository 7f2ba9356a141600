//! Present correlation: turning swapchain statistics into display bars.
//!
//! The host calls [`request`] when it submits a present and, at some later
//! point and from any thread, [`report`] with the actual display time. The
//! correlator buffers a bounded ring of in-flight presents and finalizes
//! them oldest-first at every tick: a present's display bar can only be
//! closed once a *later* present with known display time exists.
//!
//! [`request`]: PresentCorrelator::request
//! [`report`]: PresentCorrelator::report

use std::sync::Mutex;

use crossbeam_channel::{unbounded, Receiver, Sender};

use pulse_core::FrameId;

/// In-flight presents tracked at once; the oldest entry is discarded when
/// the ring overflows.
const PRESENT_RING: usize = 32;

/// Bar name for a present that reached the screen.
pub(crate) const PRESENT_NAME: &str = "Present";
/// Bar name for a present that was conclusively dropped.
pub(crate) const DISCARDED_NAME: &str = "Discarded";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum EntryState {
    /// Submitted, statistics not yet in.
    Requested,
    /// Statistics arrived with a display time.
    Displayed,
    /// Statistics arrived with display time 0: never shown.
    Dropped,
    /// A later present was reported, this one never was.
    Missed,
}

#[derive(Clone, Copy, Debug)]
struct PresentEntry {
    id: u64,
    request_ticks: u64,
    display_ticks: u64,
    frame: FrameId,
    state: EntryState,
}

const EMPTY_ENTRY: PresentEntry = PresentEntry {
    id: 0,
    request_ticks: 0,
    display_ticks: 0,
    frame: FrameId(0),
    state: EntryState::Requested,
};

/// The last present whose display time is known but whose bar is still
/// open (it closes at the next known display time).
#[derive(Clone, Copy, Debug)]
struct Anchor {
    display_ticks: u64,
    frame: FrameId,
}

struct CorrelatorState {
    entries: Vec<PresentEntry>,
    /// Total presents requested; `head % PRESENT_RING` is the next write.
    head: u64,
    /// Entries below this are finalized or discarded.
    cursor: u64,
    anchor: Option<Anchor>,
    /// Highest present id any report has named.
    max_reported: Option<u64>,
}

/// Correlates present requests with display statistics.
pub(crate) struct PresentCorrelator {
    state: Mutex<CorrelatorState>,
    tx: Sender<(u64, u64)>,
    rx: Receiver<(u64, u64)>,
}

impl PresentCorrelator {
    pub fn new() -> Self {
        let (tx, rx) = unbounded();
        Self {
            state: Mutex::new(CorrelatorState {
                entries: vec![EMPTY_ENTRY; PRESENT_RING],
                head: 0,
                cursor: 0,
                anchor: None,
                max_reported: None,
            }),
            tx,
            rx,
        }
    }

    /// Record a present submission for `frame`.
    ///
    /// # Panics
    ///
    /// Panics unless `id` is strictly greater than every id requested
    /// before it.
    pub fn request(&self, id: u64, request_ticks: u64, frame: FrameId) {
        let mut s = self.state.lock().expect("present state poisoned");
        if s.head > 0 {
            let last = s.entries[((s.head - 1) % PRESENT_RING as u64) as usize];
            assert!(id > last.id, "present ids must increase");
            debug_assert!(request_ticks >= last.request_ticks);
        }
        if s.head - s.cursor == PRESENT_RING as u64 {
            // Overwriting the oldest unfinalized entry discards it.
            s.cursor += 1;
        }
        let pos = (s.head % PRESENT_RING as u64) as usize;
        s.entries[pos] = PresentEntry {
            id,
            request_ticks,
            display_ticks: 0,
            frame,
            state: EntryState::Requested,
        };
        s.head += 1;
    }

    /// Report display statistics for a present, from any thread.
    ///
    /// `display_ticks == 0` means the present was conclusively dropped.
    pub fn report(&self, id: u64, display_ticks: u64) {
        // The channel only disconnects when the correlator is gone.
        let _ = self.tx.send((id, display_ticks));
    }

    /// Drain pending reports and finalize every conclusively known entry.
    ///
    /// `emit(frame, name, begin_ticks, end_ticks, depth)` is called for
    /// each produced bar; bars for evicted frames are the caller's to
    /// reject.
    pub fn process(&self, emit: &mut dyn FnMut(FrameId, &str, u64, u64, u8)) {
        let mut s = self.state.lock().expect("present state poisoned");
        for (id, display_ticks) in self.rx.try_iter() {
            s.max_reported = Some(s.max_reported.map_or(id, |m| m.max(id)));
            for k in s.cursor..s.head {
                let pos = (k % PRESENT_RING as u64) as usize;
                if s.entries[pos].id == id && s.entries[pos].state == EntryState::Requested {
                    s.entries[pos].state = if display_ticks == 0 {
                        EntryState::Dropped
                    } else {
                        EntryState::Displayed
                    };
                    s.entries[pos].display_ticks = display_ticks;
                    break;
                }
            }
        }
        // A present older than the newest report that never got one of its
        // own will never be reported.
        if let Some(max) = s.max_reported {
            for k in s.cursor..s.head {
                let pos = (k % PRESENT_RING as u64) as usize;
                if s.entries[pos].state == EntryState::Requested && s.entries[pos].id < max {
                    s.entries[pos].state = EntryState::Missed;
                }
            }
        }
        self.finalize(&mut s, emit);
    }

    fn finalize(
        &self,
        s: &mut CorrelatorState,
        emit: &mut dyn FnMut(FrameId, &str, u64, u64, u8),
    ) {
        loop {
            if s.anchor.is_none() {
                // Without a preceding known display time nothing before the
                // first displayed entry can be placed; discard up to it.
                let mut found = false;
                while s.cursor < s.head {
                    let e = s.entries[(s.cursor % PRESENT_RING as u64) as usize];
                    match e.state {
                        EntryState::Displayed => {
                            s.anchor = Some(Anchor {
                                display_ticks: e.display_ticks,
                                frame: e.frame,
                            });
                            s.cursor += 1;
                            found = true;
                            break;
                        }
                        EntryState::Dropped | EntryState::Missed => s.cursor += 1,
                        EntryState::Requested => return,
                    }
                }
                if !found {
                    return;
                }
                continue;
            }

            // Scan for the next displayed entry; everything in between is
            // dropped or missed and gets an interpolated position.
            let mut run = Vec::new();
            let mut next = None;
            let mut k = s.cursor;
            while k < s.head {
                let e = s.entries[(k % PRESENT_RING as u64) as usize];
                match e.state {
                    EntryState::Requested => break,
                    EntryState::Displayed => {
                        next = Some(e);
                        break;
                    }
                    EntryState::Dropped | EntryState::Missed => {
                        run.push(e);
                        k += 1;
                    }
                }
            }
            let Some(next) = next else { return };
            let anchor = s.anchor.take().expect("anchor checked above");

            // Uniform refresh spacing between the two known display times.
            let span = next.display_ticks.saturating_sub(anchor.display_ticks);
            let step = span / (run.len() as u64 + 1);

            // Chain of shown bars: anchor, the missed entries (assumed
            // displayed at their interpolated slot), then `next`. Dropped
            // entries never change what is on screen, so the previous bar
            // extends across them.
            let mut open = (anchor.display_ticks, anchor.frame);
            for (i, e) in run.iter().enumerate() {
                let at = anchor.display_ticks + step * (i as u64 + 1);
                match e.state {
                    EntryState::Missed => {
                        emit(open.1, PRESENT_NAME, open.0, at, 0);
                        open = (at, e.frame);
                    }
                    EntryState::Dropped => {
                        emit(e.frame, DISCARDED_NAME, at, at + step / 4, 1);
                    }
                    _ => unreachable!("run holds only dropped or missed entries"),
                }
            }
            emit(open.1, PRESENT_NAME, open.0, next.display_ticks, 0);

            s.anchor = Some(Anchor {
                display_ticks: next.display_ticks,
                frame: next.frame,
            });
            s.cursor = k + 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Bar = (FrameId, String, u64, u64, u8);

    fn collect(c: &PresentCorrelator) -> Vec<Bar> {
        let mut bars = Vec::new();
        c.process(&mut |frame, name, begin, end, depth| {
            bars.push((frame, name.to_owned(), begin, end, depth));
        });
        bars
    }

    #[test]
    fn displayed_bar_spans_to_next_display() {
        let c = PresentCorrelator::new();
        c.request(1, 10, FrameId(0));
        c.request(2, 20, FrameId(1));
        c.report(1, 1_000);
        c.report(2, 2_000);
        let bars = collect(&c);
        assert_eq!(
            bars,
            vec![(FrameId(0), "Present".to_owned(), 1_000, 2_000, 0)]
        );
        // Entry 2 is now the anchor; its bar closes on the next report.
        c.request(3, 30, FrameId(2));
        c.report(3, 3_000);
        let bars = collect(&c);
        assert_eq!(
            bars,
            vec![(FrameId(1), "Present".to_owned(), 2_000, 3_000, 0)]
        );
    }

    #[test]
    fn unreported_entries_stay_pending() {
        let c = PresentCorrelator::new();
        c.request(1, 10, FrameId(0));
        c.report(1, 1_000);
        c.request(2, 20, FrameId(1));
        assert!(collect(&c).is_empty());
    }

    #[test]
    fn dropped_present_becomes_discarded_bar() {
        let c = PresentCorrelator::new();
        c.request(1, 10, FrameId(0));
        c.request(2, 20, FrameId(1));
        c.request(3, 30, FrameId(2));
        c.report(1, 1_000);
        c.report(2, 0);
        c.report(3, 3_000);
        let bars = collect(&c);
        // The anchor's image stays on screen across the dropped present.
        assert_eq!(
            bars,
            vec![
                (FrameId(1), "Discarded".to_owned(), 2_000, 2_250, 1),
                (FrameId(0), "Present".to_owned(), 1_000, 3_000, 0),
            ]
        );
    }

    #[test]
    fn missed_present_is_interpolated() {
        let c = PresentCorrelator::new();
        c.request(1, 10, FrameId(0));
        c.request(2, 20, FrameId(1));
        c.request(3, 30, FrameId(2));
        c.report(1, 1_000);
        // Entry 2 never gets statistics; entry 3 does.
        c.report(3, 3_000);
        let bars = collect(&c);
        assert_eq!(
            bars,
            vec![
                (FrameId(0), "Present".to_owned(), 1_000, 2_000, 0),
                (FrameId(1), "Present".to_owned(), 2_000, 3_000, 0),
            ]
        );
    }

    #[test]
    fn entries_before_first_display_are_discarded() {
        let c = PresentCorrelator::new();
        c.request(1, 10, FrameId(0));
        c.request(2, 20, FrameId(1));
        c.report(1, 0);
        c.report(2, 2_000);
        // Entry 1 dropped with no anchor before it: nothing to emit.
        assert!(collect(&c).is_empty());
        // But entry 2 anchors the stream.
        c.request(3, 30, FrameId(2));
        c.report(3, 3_000);
        let bars = collect(&c);
        assert_eq!(
            bars,
            vec![(FrameId(1), "Present".to_owned(), 2_000, 3_000, 0)]
        );
    }

    #[test]
    fn ring_overflow_discards_oldest() {
        let c = PresentCorrelator::new();
        for i in 0..(PRESENT_RING as u64 + 4) {
            c.request(i + 1, (i + 1) * 10, FrameId(i));
        }
        // Only the newest PRESENT_RING entries survive; reporting the
        // overwritten ones does nothing.
        c.report(1, 1_000);
        assert!(collect(&c).is_empty());
    }

    #[test]
    #[should_panic(expected = "present ids must increase")]
    fn non_increasing_request_ids_are_fatal() {
        let c = PresentCorrelator::new();
        c.request(2, 10, FrameId(0));
        c.request(1, 20, FrameId(0));
    }

    #[test]
    fn out_of_order_reports_are_tolerated() {
        let c = PresentCorrelator::new();
        c.request(1, 10, FrameId(0));
        c.request(2, 20, FrameId(1));
        c.request(3, 30, FrameId(2));
        c.report(3, 3_000);
        c.report(1, 1_000);
        c.report(2, 2_000);
        let bars = collect(&c);
        assert_eq!(
            bars,
            vec![
                (FrameId(0), "Present".to_owned(), 1_000, 2_000, 0),
                (FrameId(1), "Present".to_owned(), 2_000, 3_000, 0),
            ]
        );
    }
}
