//! Per-thread CPU event recording.

use std::cell::Cell;
use std::marker::PhantomData;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use smallvec::SmallVec;

use pulse_core::{color_for_name, Event, QueueId, TrackId, CPU_HUE_RANGE, MAX_EVENT_DEPTH};

use crate::profiler::EngineShared;
use crate::track::Track;

/// Stack entry for an event that was dropped (capacity) or elided
/// (paused). Keeps begin/end balanced without storage.
const TOMBSTONE: u32 = u32::MAX;

thread_local! {
    static THREAD_REGISTERED: Cell<bool> = const { Cell::new(false) };
}

/// Callbacks fired around every CPU region, pause or not.
///
/// Mirrors the GPU hooks: the usual occupants are external-tracer marker
/// calls that should see regions even while Pulse itself is paused.
#[derive(Default)]
pub struct CpuHooks {
    /// Called at every region begin with the region name.
    pub on_begin: Option<Box<dyn Fn(&str) + Send + Sync>>,
    /// Called at every region end.
    pub on_end: Option<Box<dyn Fn() + Send + Sync>>,
}

/// Records nested CPU events for one thread.
///
/// Obtained from [`Profiler::register_thread`]; one per thread, and it
/// stays on that thread (the type is neither `Send` nor `Sync`). Begin and
/// end never block on anything besides the owning track's uncontended name
/// store.
///
/// [`Profiler::register_thread`]: crate::Profiler::register_thread
pub struct ThreadRecorder {
    shared: Arc<EngineShared>,
    track: Arc<Track>,
    stack: SmallVec<[u32; MAX_EVENT_DEPTH]>,
    _not_send: PhantomData<*const ()>,
}

impl ThreadRecorder {
    /// # Panics
    ///
    /// Panics if this thread already holds a live recorder.
    pub(crate) fn new(shared: Arc<EngineShared>, track: Arc<Track>) -> Self {
        THREAD_REGISTERED.with(|flag| {
            assert!(
                !flag.get(),
                "thread already registered a profiler recorder"
            );
            flag.set(true);
        });
        Self {
            shared,
            track,
            stack: SmallVec::new(),
            _not_send: PhantomData,
        }
    }

    /// The track this recorder writes to.
    pub fn track(&self) -> TrackId {
        self.track.id()
    }

    /// Current nesting depth.
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Open a region with a hashed color and no source location.
    pub fn begin(&mut self, name: &str) {
        self.begin_at(name, None, "", 0);
    }

    /// Open a region.
    ///
    /// Depth is the stack depth at this call. When the frame's event
    /// capacity is exhausted (or the profiler is paused) the region is
    /// dropped but the stack still tracks it, so `end` stays balanced.
    ///
    /// # Panics
    ///
    /// Panics if nesting exceeds [`MAX_EVENT_DEPTH`].
    pub fn begin_at(&mut self, name: &str, color: Option<u32>, file: &'static str, line: u32) {
        if let Some(hook) = &self.shared.cpu_hooks.on_begin {
            hook(name);
        }
        assert!(
            self.stack.len() < MAX_EVENT_DEPTH,
            "cpu region nesting exceeds {MAX_EVENT_DEPTH} on track '{}'",
            self.track.name()
        );
        if self.shared.paused.load(Ordering::Acquire) {
            self.stack.push(TOMBSTONE);
            return;
        }
        let frame = self.shared.current_frame();
        let slot = self.track.slot(frame);
        let event = Event {
            file,
            line,
            color: color.unwrap_or_else(|| color_for_name(name, CPU_HUE_RANGE)),
            depth: self.stack.len() as u8,
            track: self.track.id(),
            queue: QueueId(0),
            begin_ticks: self.shared.clock.now_ticks(),
            ..Event::default()
        };
        match slot.add_begin(&self.shared.pool, name, event) {
            Some(index) => self.stack.push(index),
            None => {
                self.shared.dropped_cpu_events.fetch_add(1, Ordering::Relaxed);
                self.stack.push(TOMBSTONE);
            }
        }
    }

    /// Close the most recently opened region.
    ///
    /// # Panics
    ///
    /// Panics on an end without a matching begin.
    pub fn end(&mut self) {
        if let Some(hook) = &self.shared.cpu_hooks.on_end {
            hook();
        }
        let index = self.stack.pop().unwrap_or_else(|| {
            panic!(
                "cpu region end without begin on track '{}'",
                self.track.name()
            )
        });
        if index == TOMBSTONE {
            return;
        }
        let frame = self.shared.current_frame();
        self.track
            .slot(frame)
            .set_end(index, self.shared.clock.now_ticks());
    }
}

impl Drop for ThreadRecorder {
    fn drop(&mut self) {
        THREAD_REGISTERED.with(|flag| flag.set(false));
    }
}
