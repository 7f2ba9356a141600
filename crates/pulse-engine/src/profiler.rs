//! The profiler session: frame scheduler and consumer queries.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use pulse_arena::PagePool;
use pulse_core::{
    color_for_name, ticks_to_ms, Event, FrameId, QueryError, QueueId, SessionClock, TrackId,
    TrackKind, CPU_HUE_RANGE,
};
use pulse_gpu::{GpuPipeline, ListRecorder, ReadbackMetrics};

use crate::config::{ConfigError, ProfilerConfig};
use crate::metrics::{FrameStats, TickMetrics};
use crate::present::PresentCorrelator;
use crate::recorder::{CpuHooks, ThreadRecorder};
use crate::registry::{TrackInfo, TrackRegistry};
use crate::track::Track;

/// Name of the implicit per-frame root event on the driver track.
const ROOT_EVENT: &str = "CPU Frame";

/// State shared between the profiler, its recorders, and the tick.
pub(crate) struct EngineShared {
    pub clock: SessionClock,
    pub pool: Arc<PagePool>,
    pub registry: TrackRegistry,
    pub current_frame: AtomicU64,
    pub paused: AtomicBool,
    pub cpu_hooks: CpuHooks,
    pub dropped_cpu_events: AtomicU64,
    pub dropped_gpu_events: AtomicU64,
    pub thread_serial: AtomicU64,
    pub history_size: usize,
}

impl EngineShared {
    pub fn current_frame(&self) -> FrameId {
        FrameId(self.current_frame.load(Ordering::Acquire))
    }
}

/// The resolved half-open range of readable frames.
///
/// `oldest` is the earliest frame still in the ring; `newest` is one past
/// the last frame whose data (including async GPU readback) is complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameWindow {
    /// Earliest readable frame.
    pub oldest: FrameId,
    /// One past the newest readable frame.
    pub newest: FrameId,
}

impl FrameWindow {
    /// Whether no frame is readable yet.
    pub fn is_empty(&self) -> bool {
        self.oldest >= self.newest
    }

    /// Whether `frame` can be read.
    pub fn contains(&self, frame: FrameId) -> bool {
        frame >= self.oldest && frame < self.newest
    }
}

/// Read-only view of one recorded event, valid inside the
/// [`read_frame`](Profiler::read_frame) callback.
pub struct EventView<'a> {
    event: &'a Event,
    name: &'a str,
}

impl EventView<'_> {
    /// Region name.
    pub fn name(&self) -> &str {
        self.name
    }

    /// Source file of the call site ("" when not supplied).
    pub fn file(&self) -> &'static str {
        self.event.file
    }

    /// Source line of the call site.
    pub fn line(&self) -> u32 {
        self.event.line
    }

    /// Packed `0xBBGGRR` display color.
    pub fn color(&self) -> u32 {
        self.event.color
    }

    /// Nesting depth (0 = top level).
    pub fn depth(&self) -> u8 {
        self.event.depth
    }

    /// Owning queue, for events on a GPU track.
    pub fn queue(&self) -> QueueId {
        self.event.queue
    }

    /// Begin timestamp in session ticks.
    pub fn begin_ticks(&self) -> u64 {
        self.event.begin_ticks
    }

    /// End timestamp in session ticks.
    pub fn end_ticks(&self) -> u64 {
        self.event.end_ticks
    }

    /// Duration in session ticks.
    pub fn duration_ticks(&self) -> u64 {
        self.event.duration_ticks()
    }

    /// Begin timestamp in fractional milliseconds.
    pub fn begin_ms(&self) -> f64 {
        ticks_to_ms(self.event.begin_ticks)
    }

    /// Duration in fractional milliseconds.
    pub fn duration_ms(&self) -> f64 {
        ticks_to_ms(self.event.duration_ticks())
    }
}

struct TickState {
    root_open: Option<u32>,
    frame_begin_ticks: u64,
    stats: FrameStats,
    latency_stalls: u64,
    pending_pause: Option<bool>,
}

/// A profiler session.
///
/// One per process, usually behind an `Arc`. All methods take `&self`;
/// [`tick`](Profiler::tick) must be called by exactly one thread, between
/// frames, while no recorder is mid-region.
pub struct Profiler {
    shared: Arc<EngineShared>,
    gpu: Option<GpuPipeline>,
    present: PresentCorrelator,
    present_track: Arc<Track>,
    root_track: Arc<Track>,
    tick_state: Mutex<TickState>,
    closed_frames: AtomicU64,
    metrics: Mutex<TickMetrics>,
}

fn open_root(shared: &EngineShared, track: &Track, frame: FrameId, now: u64) -> Option<u32> {
    let event = Event {
        color: color_for_name(ROOT_EVENT, CPU_HUE_RANGE),
        track: track.id(),
        begin_ticks: now,
        ..Event::default()
    };
    track.slot(frame).add_begin(&shared.pool, ROOT_EVENT, event)
}

/// Move a resolved GPU event into its queue track's frame slot, copying
/// the name into that slot's arena.
fn ingest_gpu(shared: &EngineShared, track_id: TrackId, frame: FrameId, event: Event, name: &str) {
    let Some(track) = shared.registry.get(track_id) else {
        return;
    };
    let Some(slot) = track.slot_for(frame) else {
        shared.dropped_gpu_events.fetch_add(1, Ordering::Relaxed);
        return;
    };
    if slot.add_complete(&shared.pool, name, event).is_none() {
        shared.dropped_gpu_events.fetch_add(1, Ordering::Relaxed);
    }
}

impl Profiler {
    /// Build a session from a validated configuration.
    ///
    /// The session clock starts here, frame 0 opens immediately, and the
    /// driver track's root event begins.
    pub fn new(config: ProfilerConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let ProfilerConfig {
            history_size,
            max_events_per_frame,
            gpu,
            gpu_hooks,
            cpu_hooks,
        } = config;
        let pool = Arc::new(PagePool::new());
        let shared = Arc::new(EngineShared {
            clock: SessionClock::new(),
            pool: Arc::clone(&pool),
            registry: TrackRegistry::new(history_size, max_events_per_frame),
            current_frame: AtomicU64::new(0),
            paused: AtomicBool::new(false),
            cpu_hooks,
            dropped_cpu_events: AtomicU64::new(0),
            dropped_gpu_events: AtomicU64::new(0),
            thread_serial: AtomicU64::new(1),
            history_size,
        });
        let root_track = shared
            .registry
            .register("Frame", TrackKind::CpuThread, 0, FrameId(0));
        let present_track = shared
            .registry
            .register("Present", TrackKind::Present, 0, FrameId(0));
        let gpu = match gpu {
            Some(cfg) => {
                let tracks: Vec<TrackId> = cfg
                    .queues
                    .iter()
                    .enumerate()
                    .map(|(i, q)| {
                        shared
                            .registry
                            .register(&q.name, TrackKind::GpuQueue, i as u64, FrameId(0))
                            .id()
                    })
                    .collect();
                Some(GpuPipeline::new(cfg, gpu_hooks, Arc::clone(&pool), tracks)?)
            }
            None => None,
        };
        let now = shared.clock.now_ticks();
        let root_open = open_root(&shared, &root_track, FrameId(0), now);
        Ok(Self {
            shared,
            gpu,
            present: PresentCorrelator::new(),
            present_track,
            root_track,
            tick_state: Mutex::new(TickState {
                root_open,
                frame_begin_ticks: now,
                stats: FrameStats::new(history_size),
                latency_stalls: 0,
                pending_pause: None,
            }),
            closed_frames: AtomicU64::new(0),
            metrics: Mutex::new(TickMetrics::default()),
        })
    }

    /// Register the calling thread and return its recorder.
    ///
    /// # Panics
    ///
    /// Panics if this thread already holds a live recorder.
    pub fn register_thread(&self, name: &str) -> ThreadRecorder {
        let serial = self.shared.thread_serial.fetch_add(1, Ordering::Relaxed);
        let track = self.shared.registry.register(
            name,
            TrackKind::CpuThread,
            serial,
            self.shared.current_frame(),
        );
        ThreadRecorder::new(Arc::clone(&self.shared), track)
    }

    /// Register (or rename) a track by producer identity.
    ///
    /// Idempotent per `(kind, producer)`: the first call wins the index,
    /// later calls only change the display name.
    pub fn register_track(&self, name: &str, kind: TrackKind, producer: u64) -> TrackId {
        self.shared
            .registry
            .register(name, kind, producer, self.shared.current_frame())
            .id()
    }

    /// Start recording a GPU command list for `queue`.
    ///
    /// # Panics
    ///
    /// Panics if the session was configured without a GPU pipeline.
    pub fn list_recorder(&self, queue: QueueId) -> ListRecorder {
        self.gpu_pipeline().list_recorder(queue)
    }

    /// Establish the submission order of recorded command lists on `queue`.
    ///
    /// # Panics
    ///
    /// Panics if the session was configured without a GPU pipeline, or on
    /// the pairing violations described at
    /// [`GpuPipeline::execute_command_lists`].
    pub fn execute_command_lists(&self, queue: QueueId, lists: Vec<ListRecorder>) {
        self.gpu_pipeline().execute_command_lists(queue, lists);
    }

    fn gpu_pipeline(&self) -> &GpuPipeline {
        self.gpu
            .as_ref()
            .expect("profiler was configured without a gpu pipeline")
    }

    /// Record a present submission with a host-chosen strictly increasing
    /// id. No-op while paused.
    ///
    /// # Panics
    ///
    /// Panics if `id` does not increase over the previous present.
    pub fn present(&self, id: u64) {
        if self.shared.paused.load(Ordering::Acquire) {
            return;
        }
        self.present.request(
            id,
            self.shared.clock.now_ticks(),
            self.shared.current_frame(),
        );
    }

    /// Report display statistics for a present, from any thread.
    ///
    /// `display_ticks == 0` marks the present as dropped.
    pub fn report_present(&self, id: u64, display_ticks: u64) {
        self.present.report(id, display_ticks);
    }

    /// Queue a pause or resume; it takes effect at the next tick, so a
    /// frame is never half-recorded.
    pub fn set_paused(&self, paused: bool) {
        self.tick_state
            .lock()
            .expect("tick state poisoned")
            .pending_pause = Some(paused);
    }

    /// Whether recording is currently paused.
    pub fn is_paused(&self) -> bool {
        self.shared.paused.load(Ordering::Acquire)
    }

    /// The frame currently being recorded.
    pub fn current_frame(&self) -> FrameId {
        self.shared.current_frame()
    }

    /// Close the current frame and open the next.
    ///
    /// Must be called once per frame by a single thread while every
    /// recorder is between regions and every recorded command list has
    /// been submitted.
    ///
    /// # Panics
    ///
    /// Panics if any producer stack is unbalanced or a recorded command
    /// list was never submitted.
    pub fn tick(&self) {
        let mut ts = self.tick_state.lock().expect("tick state poisoned");
        let now = self.shared.clock.now_ticks();
        let frame = self.shared.current_frame();

        // Close the root event before the balance check so the driver
        // track reads as balanced like everyone else.
        if let Some(index) = ts.root_open.take() {
            self.root_track.slot(frame).set_end(index, now);
        }

        for track in self.shared.registry.all() {
            let open = track.slot(frame).open_events();
            assert_eq!(
                open,
                0,
                "track '{}' has {open} open event(s) at tick",
                track.name()
            );
        }
        if let Some(gpu) = &self.gpu {
            gpu.assert_submitted_and_balanced();
        }

        // CPU-side content of `frame` is final from here on, even when
        // this tick applies a pause instead of advancing.
        self.closed_frames.store(frame.0 + 1, Ordering::Release);

        let mut m = *self.metrics.lock().expect("metrics poisoned");
        m.frame = frame;
        let mut rb = ReadbackMetrics::default();

        let shared = &self.shared;
        let mut sink = |track: TrackId, f: FrameId, event: Event, name: &str| {
            ingest_gpu(shared, track, f, event, name);
        };

        if let Some(gpu) = &self.gpu {
            gpu.close_frame();
            gpu.readback(&mut sink, &mut rb);
        }

        let present_track = &self.present_track;
        self.present
            .process(&mut |f: FrameId, name: &str, begin: u64, end: u64, depth: u8| {
                let Some(slot) = present_track.slot_for(f) else {
                    return;
                };
                let event = Event {
                    color: color_for_name(name, CPU_HUE_RANGE),
                    depth,
                    track: present_track.id(),
                    begin_ticks: begin,
                    end_ticks: end,
                    ..Event::default()
                };
                let _ = slot.add_complete(&shared.pool, name, event);
            });

        if let Some(paused) = ts.pending_pause.take() {
            self.shared.paused.store(paused, Ordering::Release);
            if let Some(gpu) = &self.gpu {
                gpu.set_paused(paused);
            }
        }

        if !self.shared.paused.load(Ordering::Acquire) {
            let new_frame = FrameId(frame.0 + 1);
            if let Some(gpu) = &self.gpu {
                gpu.resolve_closed();
            }
            self.shared.current_frame.store(new_frame.0, Ordering::Release);
            // Ring turnover: rebinding each track's slot to the new frame
            // evicts the slot's previous occupant and recycles its pages.
            for track in self.shared.registry.all() {
                track.slot(new_frame).reset(&self.shared.pool, new_frame);
            }
            if let Some(gpu) = &self.gpu {
                gpu.advance(new_frame, &mut sink, &mut rb);
            }
            let frame_ms = ticks_to_ms(now - ts.frame_begin_ticks);
            ts.stats.record(frame_ms, &mut m);
            ts.frame_begin_ticks = now;
            ts.root_open = open_root(
                &self.shared,
                &self.root_track,
                new_frame,
                self.shared.clock.now_ticks(),
            );
        }

        ts.latency_stalls += u64::from(rb.stalls);
        m.dropped_cpu_events = self.shared.dropped_cpu_events.load(Ordering::Relaxed);
        m.dropped_gpu_events = self.shared.dropped_gpu_events.load(Ordering::Relaxed)
            + self.gpu.as_ref().map_or(0, GpuPipeline::dropped_events);
        m.gpu_resolved = rb.resolved;
        m.gpu_unresolved = rb.unresolved;
        m.latency_stalls = ts.latency_stalls;
        m.pages_created = self.shared.pool.pages_created();
        *self.metrics.lock().expect("metrics poisoned") = m;
    }

    /// Registered tracks, in registration order.
    pub fn tracks(&self) -> Vec<TrackInfo> {
        self.shared.registry.infos()
    }

    /// The range of frames that can currently be read.
    pub fn frame_window(&self) -> FrameWindow {
        let current = self.shared.current_frame();
        let newest = match &self.gpu {
            // GPU readback trails the CPU by the pipeline latency.
            Some(gpu) => gpu.readback_cursor(),
            None => FrameId(self.closed_frames.load(Ordering::Acquire)),
        };
        let oldest = FrameId(current.0.saturating_sub(self.shared.history_size as u64 - 1));
        FrameWindow { oldest, newest }
    }

    /// Iterate a track's valid events for one resolved frame.
    pub fn read_frame(
        &self,
        track: TrackId,
        frame: FrameId,
        mut f: impl FnMut(EventView<'_>),
    ) -> Result<(), QueryError> {
        let t = self
            .shared
            .registry
            .get(track)
            .ok_or(QueryError::UnknownTrack { track })?;
        let window = self.frame_window();
        if frame >= window.newest {
            return Err(QueryError::NotResolved { frame });
        }
        if frame < window.oldest {
            return Err(QueryError::Evicted { frame });
        }
        let slot = t.slot_for(frame).ok_or(QueryError::Evicted { frame })?;
        slot.for_each(|event, name| f(EventView { event, name }));
        Ok(())
    }

    /// The latest tick's observability snapshot.
    pub fn metrics(&self) -> TickMetrics {
        *self.metrics.lock().expect("metrics poisoned")
    }
}
