//! Frame generations, submission ordering, and timestamp readback.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use smallvec::SmallVec;

use pulse_arena::{NameStore, PagePool};
use pulse_core::{Event, FrameId, QueueId, TrackId, MAX_EVENT_DEPTH};

use crate::backend::QueueCalibration;
use crate::config::GpuConfig;
use crate::heap::QueryHeap;
use crate::list::{ListOp, ListRecorder};

/// Sentinel for a timestamp slot that was never allocated.
pub(crate) const INVALID_SLOT: u32 = u32::MAX;

/// Paired begin/end timestamp slots for one event, fixed at submission.
#[derive(Debug, Clone, Copy)]
pub(crate) struct QueryRecord {
    pub begin_slot: u32,
    pub end_slot: u32,
}

impl QueryRecord {
    const INVALID: Self = Self {
        begin_slot: INVALID_SLOT,
        end_slot: INVALID_SLOT,
    };

    fn is_resolved(&self) -> bool {
        self.begin_slot != INVALID_SLOT && self.end_slot != INVALID_SLOT
    }
}

/// Event storage for one in-flight frame generation.
pub(crate) struct GpuFrame {
    pub events: Vec<Mutex<Event>>,
    pub len: AtomicU32,
    closed_len: AtomicU32,
    pub names: Mutex<NameStore>,
    records: Mutex<Vec<QueryRecord>>,
}

impl GpuFrame {
    fn new(capacity: u32, frame: FrameId) -> Self {
        Self {
            events: (0..capacity).map(|_| Mutex::new(Event::default())).collect(),
            len: AtomicU32::new(0),
            closed_len: AtomicU32::new(0),
            names: Mutex::new(NameStore::new(frame)),
            records: Mutex::new(vec![QueryRecord::INVALID; capacity as usize]),
        }
    }

    /// Claim the next event cell, or `None` when the generation is full.
    pub fn allocate(&self) -> Option<u32> {
        let index = self.len.fetch_add(1, Ordering::Relaxed);
        (index < self.events.len() as u32).then_some(index)
    }

    fn reset(&self, pool: &PagePool, frame: FrameId) {
        self.len.store(0, Ordering::Relaxed);
        self.closed_len.store(0, Ordering::Relaxed);
        self.names.lock().expect("name store poisoned").reset(pool, frame);
        for record in self
            .records
            .lock()
            .expect("query records poisoned")
            .iter_mut()
        {
            *record = QueryRecord::INVALID;
        }
    }
}

/// One profiled queue: its heap binding, clock calibration, and track.
pub(crate) struct QueueInfo {
    pub name: String,
    pub heap: usize,
    pub calibration: QueueCalibration,
    pub track: TrackId,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct OpenSlot {
    pub slot: Option<u32>,
    pub event: Option<u32>,
}

/// Per-queue LIFO stacks, live only inside `execute_command_lists`.
struct SubmitState {
    stacks: Vec<SmallVec<[OpenSlot; MAX_EVENT_DEPTH]>>,
}

/// Host callbacks fired around every GPU region, pause or not.
///
/// The usual occupants are graphics-debugger marker calls, so the region
/// shows up in an external capture even while profiling is paused.
#[derive(Default)]
pub struct GpuHooks {
    /// Called at every region begin with the region name.
    pub on_begin: Option<Box<dyn Fn(&str) + Send + Sync>>,
    /// Called at every region end.
    pub on_end: Option<Box<dyn Fn() + Send + Sync>>,
}

/// Counters produced by one tick's readback and generation turnover.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReadbackMetrics {
    /// Events delivered to the sink with calibrated timestamps.
    pub resolved: u64,
    /// Events skipped because a slot was never allocated or written.
    pub unresolved: u64,
    /// Heaps that forced a fence wait to reclaim their generation.
    pub stalls: u32,
}

pub(crate) struct PipelineShared {
    pub pool: Arc<PagePool>,
    pub heaps: Vec<QueryHeap>,
    pub queues: Vec<QueueInfo>,
    pub frames: Vec<GpuFrame>,
    pub frame_latency: u32,
    pub current_frame: AtomicU64,
    pub paused: AtomicBool,
    pub unsubmitted: AtomicU32,
    pub dropped_events: AtomicU64,
    submit: Mutex<SubmitState>,
    pub hooks: GpuHooks,
}

impl PipelineShared {
    /// The generation currently recording.
    pub fn current(&self) -> (FrameId, &GpuFrame) {
        let frame = FrameId(self.current_frame.load(Ordering::Acquire));
        let gen = frame.slot(self.frame_latency as usize);
        (frame, &self.frames[gen])
    }
}

/// The GPU timestamp query pipeline.
///
/// Cheap to clone conceptually (recorders hold the shared state), but the
/// engine owns the single `GpuPipeline` value and drives its frame
/// turnover from the scheduler tick.
pub struct GpuPipeline {
    shared: Arc<PipelineShared>,
    readback_cursor: AtomicU64,
}

impl GpuPipeline {
    /// Build the pipeline and open frame 0 for recording.
    ///
    /// `tracks` carries the registry track assigned to each queue, in
    /// config order.
    pub fn new(
        config: GpuConfig,
        hooks: GpuHooks,
        pool: Arc<PagePool>,
        tracks: Vec<TrackId>,
    ) -> Result<Self, crate::config::GpuConfigError> {
        config.validate()?;
        debug_assert_eq!(tracks.len(), config.queues.len());
        let latency = config.frame_latency;
        let heaps: Vec<QueryHeap> = config
            .heaps
            .into_iter()
            .map(|h| QueryHeap::new(h.backend, h.max_queries, latency))
            .collect();
        for heap in &heaps {
            heap.begin_generation(FrameId(0));
        }
        let queues: Vec<QueueInfo> = config
            .queues
            .into_iter()
            .zip(tracks)
            .map(|(q, track)| QueueInfo {
                name: q.name,
                heap: q.heap,
                calibration: q.calibration,
                track,
            })
            .collect();
        let frames = (0..latency)
            .map(|g| GpuFrame::new(config.max_events_per_frame, FrameId(u64::from(g))))
            .collect();
        let stacks = queues.iter().map(|_| SmallVec::new()).collect();
        Ok(Self {
            shared: Arc::new(PipelineShared {
                pool,
                heaps,
                queues,
                frames,
                frame_latency: latency,
                current_frame: AtomicU64::new(0),
                paused: AtomicBool::new(false),
                unsubmitted: AtomicU32::new(0),
                dropped_events: AtomicU64::new(0),
                submit: Mutex::new(SubmitState { stacks }),
                hooks,
            }),
            readback_cursor: AtomicU64::new(0),
        })
    }

    /// Number of profiled queues.
    pub fn queue_count(&self) -> usize {
        self.shared.queues.len()
    }

    /// Display name of a queue.
    pub fn queue_name(&self, queue: QueueId) -> &str {
        &self.shared.queues[queue.0 as usize].name
    }

    /// Registry track events from this queue land on.
    pub fn queue_track(&self, queue: QueueId) -> TrackId {
        self.shared.queues[queue.0 as usize].track
    }

    /// The frame currently open for recording.
    pub fn current_frame(&self) -> FrameId {
        FrameId(self.shared.current_frame.load(Ordering::Acquire))
    }

    /// First frame whose GPU results have not been read back yet.
    pub fn readback_cursor(&self) -> FrameId {
        FrameId(self.readback_cursor.load(Ordering::Acquire))
    }

    /// Events dropped because a generation's capacity was exhausted.
    pub fn dropped_events(&self) -> u64 {
        self.shared.dropped_events.load(Ordering::Relaxed)
    }

    /// Stop or resume accepting new regions. Recording threads observe the
    /// flag on their next begin; the engine only flips it between frames.
    pub fn set_paused(&self, paused: bool) {
        self.shared.paused.store(paused, Ordering::Release);
    }

    /// Start recording a command list that will execute on `queue`.
    ///
    /// # Panics
    ///
    /// Panics if `queue` is not a configured queue.
    pub fn list_recorder(&self, queue: QueueId) -> ListRecorder {
        let index = queue.0 as usize;
        assert!(
            index < self.shared.queues.len(),
            "unknown queue {queue} passed to list_recorder"
        );
        let heap = self.shared.queues[index].heap;
        ListRecorder::new(Arc::clone(&self.shared), queue, heap)
    }

    /// Establish the submission order of `lists` on `queue`.
    ///
    /// Replays every list's ops against the queue's LIFO stack: each end
    /// pairs with the most recent unmatched begin across all lists in the
    /// batch (and earlier batches this frame), which fixes the event's
    /// nesting depth and owning queue.
    ///
    /// # Panics
    ///
    /// Panics if a list was recorded for a queue on a different heap, if
    /// an end has no matching begin, or if nesting exceeds
    /// [`MAX_EVENT_DEPTH`].
    pub fn execute_command_lists(&self, queue: QueueId, lists: Vec<ListRecorder>) {
        let shared = &self.shared;
        let queue_index = queue.0 as usize;
        let info = &shared.queues[queue_index];
        let (_, frame) = shared.current();
        let mut records = frame.records.lock().expect("query records poisoned");
        let mut submit = shared.submit.lock().expect("submit state poisoned");
        let stack = &mut submit.stacks[queue_index];
        for mut list in lists {
            assert_eq!(
                shared.queues[list.queue().0 as usize].heap,
                info.heap,
                "command list for queue {} submitted on {} (different query heap)",
                list.queue(),
                queue
            );
            let had_ops = !list.ops().is_empty();
            for op in list.take_ops() {
                match op {
                    ListOp::Begin { slot, event } => {
                        assert!(
                            stack.len() < MAX_EVENT_DEPTH,
                            "gpu region nesting exceeds {MAX_EVENT_DEPTH} on queue {queue}"
                        );
                        if let Some(e) = event {
                            let mut cell =
                                frame.events[e as usize].lock().expect("event cell poisoned");
                            cell.queue = queue;
                            cell.track = info.track;
                        }
                        stack.push(OpenSlot { slot, event });
                    }
                    ListOp::End { slot } => {
                        let open = stack
                            .pop()
                            .unwrap_or_else(|| panic!("gpu end without begin on queue {queue}"));
                        if let Some(e) = open.event {
                            let depth = stack.len() as u8;
                            frame.events[e as usize]
                                .lock()
                                .expect("event cell poisoned")
                                .depth = depth;
                            records[e as usize] = QueryRecord {
                                begin_slot: open.slot.unwrap_or(INVALID_SLOT),
                                end_slot: slot.unwrap_or(INVALID_SLOT),
                            };
                        }
                    }
                }
            }
            for page in list.take_pages() {
                frame
                    .names
                    .lock()
                    .expect("name store poisoned")
                    .seal(&shared.pool, page);
            }
            if had_ops {
                shared.unsubmitted.fetch_sub(1, Ordering::AcqRel);
            }
        }
    }

    /// End-of-frame consistency check.
    ///
    /// # Panics
    ///
    /// Panics if a recorded command list was never submitted or a queue's
    /// begin/end stack is unbalanced. Both mean the frame's nesting data
    /// is unusable, so this is fatal rather than a metric.
    pub fn assert_submitted_and_balanced(&self) {
        let unsubmitted = self.shared.unsubmitted.load(Ordering::Acquire);
        assert_eq!(
            unsubmitted, 0,
            "{unsubmitted} command list(s) recorded this frame but never submitted"
        );
        let submit = self.shared.submit.lock().expect("submit state poisoned");
        for (index, stack) in submit.stacks.iter().enumerate() {
            assert!(
                stack.is_empty(),
                "queue {} has {} gpu region(s) still open at frame end",
                QueueId(index as u32),
                stack.len()
            );
        }
    }

    /// Freeze the current frame's event count ahead of resolve.
    pub fn close_frame(&self) {
        let (_, frame) = self.shared.current();
        let len = frame.len.load(Ordering::Acquire);
        frame
            .closed_len
            .store(len.min(frame.events.len() as u32), Ordering::Release);
        let overshoot = len.saturating_sub(frame.events.len() as u32);
        if overshoot > 0 {
            self.shared
                .dropped_events
                .fetch_add(u64::from(overshoot), Ordering::Relaxed);
        }
    }

    /// Submit the readback copies for the frame just closed.
    pub fn resolve_closed(&self) {
        let frame = self.current_frame();
        for heap in &self.shared.heaps {
            heap.resolve(frame);
        }
    }

    /// Deliver every fully resolved frame, oldest first.
    ///
    /// The sink receives the queue's track, the frame the event belongs
    /// to, the event with calibrated session-clock timestamps, and the
    /// region name (valid only for the duration of the call).
    pub fn readback(
        &self,
        sink: &mut dyn FnMut(TrackId, FrameId, Event, &str),
        metrics: &mut ReadbackMetrics,
    ) {
        let shared = &self.shared;
        let bound = self.shared.current_frame.load(Ordering::Acquire);
        let mut cursor = self.readback_cursor.load(Ordering::Acquire);
        while cursor < bound {
            let frame = FrameId(cursor);
            if !shared.heaps.iter().all(|h| h.is_frame_complete(frame)) {
                break;
            }
            self.read_one(frame, sink, metrics);
            cursor += 1;
            self.readback_cursor.store(cursor, Ordering::Release);
        }
    }

    fn read_one(
        &self,
        frame: FrameId,
        sink: &mut dyn FnMut(TrackId, FrameId, Event, &str),
        metrics: &mut ReadbackMetrics,
    ) {
        let shared = &self.shared;
        let gen = &shared.frames[frame.slot(shared.frame_latency as usize)];
        let records = gen.records.lock().expect("query records poisoned");
        let names = gen.names.lock().expect("name store poisoned");
        debug_assert_eq!(names.frame(), frame, "generation holds a different frame");
        let count = gen.closed_len.load(Ordering::Acquire);
        for index in 0..count as usize {
            let record = records[index];
            if !record.is_resolved() {
                metrics.unresolved += 1;
                continue;
            }
            let mut event = *gen.events[index].lock().expect("event cell poisoned");
            let info = &shared.queues[event.queue.0 as usize];
            let heap = &shared.heaps[info.heap];
            let (raw_begin, raw_end) = heap.with_data(frame, |data| {
                (
                    data.get(record.begin_slot as usize).copied().unwrap_or(0),
                    data.get(record.end_slot as usize).copied().unwrap_or(0),
                )
            });
            // A zero timestamp means the host never wrote the slot.
            if raw_begin == 0 || raw_end == 0 {
                metrics.unresolved += 1;
                continue;
            }
            event.begin_ticks = info.calibration.to_cpu_ticks(raw_begin);
            event.end_ticks = info.calibration.to_cpu_ticks(raw_end);
            let name = names.resolve(event.name).unwrap_or("");
            sink(info.track, frame, event, name);
            metrics.resolved += 1;
        }
    }

    /// Turn over to `new_frame`: reclaim its generation (stalling on the
    /// fence if the previous occupant is still in flight), drain any
    /// frames the stall completed, then reset the generation's storage.
    pub fn advance(
        &self,
        new_frame: FrameId,
        sink: &mut dyn FnMut(TrackId, FrameId, Event, &str),
        metrics: &mut ReadbackMetrics,
    ) {
        let shared = &self.shared;
        for heap in &shared.heaps {
            if heap.begin_generation(new_frame) {
                metrics.stalls += 1;
            }
        }
        shared.current_frame.store(new_frame.0, Ordering::Release);
        // The evicted frame is complete after the waits above; it must be
        // drained before its storage is reset.
        self.readback(sink, metrics);
        if let Some(evicted) = new_frame.0.checked_sub(u64::from(shared.frame_latency)) {
            debug_assert!(
                self.readback_cursor.load(Ordering::Acquire) > evicted,
                "frame {evicted} evicted before readback"
            );
        }
        let gen = &shared.frames[new_frame.slot(shared.frame_latency as usize)];
        gen.reset(&shared.pool, new_frame);
    }
}
