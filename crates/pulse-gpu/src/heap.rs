//! Query heap generations: slot allocation, resolve, fence tracking.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use pulse_core::FrameId;

use crate::backend::QueryBackend;

/// Lifecycle of one heap generation.
///
/// `Free → Recording → Pending → Free`, advanced by
/// [`QueryHeap::begin_generation`] and [`QueryHeap::resolve`]. A generation
/// returns to `Free` only when its resolve fence has signaled; reusing it
/// earlier forces a bounded fence wait so readback data is never clobbered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Generation {
    Free,
    Recording { frame: FrameId },
    Pending { fence: u64 },
}

struct HeapState {
    generations: Vec<Generation>,
    // Monotonic cache of the backend fence, so steady-state completeness
    // checks take one backend poll per tick at most.
    last_completed: u64,
}

/// One timestamp query heap cycled across `frame_latency` generations.
///
/// Slot allocation is a single `fetch_add` on the recording generation's
/// cursor and can run from any thread. Everything else (begin, resolve,
/// readback) is driven by the scheduler tick and serialized behind the
/// state mutex.
pub struct QueryHeap {
    backend: Mutex<Box<dyn QueryBackend>>,
    max_queries: u32,
    frame_latency: u32,
    cursor: AtomicU32,
    state: Mutex<HeapState>,
}

impl QueryHeap {
    /// Wrap a backend into a heap with `frame_latency` generations.
    pub fn new(backend: Box<dyn QueryBackend>, max_queries: u32, frame_latency: u32) -> Self {
        Self {
            backend: Mutex::new(backend),
            max_queries,
            frame_latency,
            cursor: AtomicU32::new(0),
            state: Mutex::new(HeapState {
                generations: vec![Generation::Free; frame_latency as usize],
                last_completed: 0,
            }),
        }
    }

    /// Timestamp slots per generation.
    pub fn max_queries(&self) -> u32 {
        self.max_queries
    }

    /// Allocate a slot in the recording generation.
    ///
    /// Returns `None` when the generation is full; the caller drops the
    /// measurement rather than block. The cursor may overshoot
    /// `max_queries` under contention, which is why it is clamped on read.
    pub fn allocate_slot(&self) -> Option<u32> {
        let slot = self.cursor.fetch_add(1, Ordering::Relaxed);
        (slot < self.max_queries).then_some(slot)
    }

    /// Slots handed out in the recording generation, clamped to capacity.
    pub fn used_slots(&self) -> u32 {
        self.cursor.load(Ordering::Relaxed).min(self.max_queries)
    }

    /// Open `frame`'s generation for recording.
    ///
    /// Returns `true` if the call had to block on the fence because the
    /// generation's previous occupant had not finished resolving. Must not
    /// be called while another generation of this heap is still recording.
    pub fn begin_generation(&self, frame: FrameId) -> bool {
        let mut state = self.state.lock().expect("heap state poisoned");
        let index = frame.slot(self.frame_latency as usize);
        let mut stalled = false;
        match state.generations[index] {
            Generation::Free => {}
            Generation::Pending { fence } => {
                if state.last_completed < fence {
                    let mut backend = self.backend.lock().expect("heap backend poisoned");
                    state.last_completed = backend.completed_fence();
                    if state.last_completed < fence {
                        backend.wait_for_fence(fence);
                        state.last_completed = fence;
                        stalled = true;
                    }
                }
            }
            Generation::Recording { frame: open } => {
                unreachable!("generation for frame {open} is still recording");
            }
        }
        state.generations[index] = Generation::Recording { frame };
        self.cursor.store(0, Ordering::Relaxed);
        stalled
    }

    /// Submit the readback copy for `frame`'s generation.
    ///
    /// The fence is signaled with `frame + 1`, so a completed fence value
    /// of `n` means every frame below `n` has readable data.
    pub fn resolve(&self, frame: FrameId) {
        let mut state = self.state.lock().expect("heap state poisoned");
        let index = frame.slot(self.frame_latency as usize);
        debug_assert_eq!(
            state.generations[index],
            Generation::Recording { frame },
            "resolving a generation that is not recording frame {frame}"
        );
        let fence = frame.0 + 1;
        let count = self.used_slots();
        self.backend
            .lock()
            .expect("heap backend poisoned")
            .resolve(index as u32, count, fence);
        state.generations[index] = Generation::Pending { fence };
    }

    /// Whether `frame`'s resolved timestamps are CPU-visible.
    pub fn is_frame_complete(&self, frame: FrameId) -> bool {
        let mut state = self.state.lock().expect("heap state poisoned");
        let needed = frame.0 + 1;
        if state.last_completed >= needed {
            return true;
        }
        let completed = self
            .backend
            .lock()
            .expect("heap backend poisoned")
            .completed_fence();
        state.last_completed = state.last_completed.max(completed);
        state.last_completed >= needed
    }

    /// Run `f` over the readback data of `frame`'s generation.
    ///
    /// Only meaningful after [`is_frame_complete`](Self::is_frame_complete)
    /// returned `true` for the frame.
    pub fn with_data<R>(&self, frame: FrameId, f: impl FnOnce(&[u64]) -> R) -> R {
        let index = frame.slot(self.frame_latency as usize);
        let backend = self.backend.lock().expect("heap backend poisoned");
        f(backend.read(index as u32))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;

    #[derive(Default)]
    struct BackendLog {
        resolves: Vec<(u32, u32, u64)>,
        waits: Vec<u64>,
    }

    /// Backend that records calls and completes fences on demand.
    struct ScriptedBackend {
        data: Vec<Vec<u64>>,
        completed: u64,
        log: Arc<Mutex<BackendLog>>,
    }

    impl ScriptedBackend {
        fn new(generations: usize, slots: usize) -> Self {
            Self {
                data: vec![vec![0; slots]; generations],
                completed: 0,
                log: Arc::default(),
            }
        }
    }

    impl QueryBackend for ScriptedBackend {
        fn resolve(&mut self, generation: u32, count: u32, fence_value: u64) {
            self.log
                .lock()
                .unwrap()
                .resolves
                .push((generation, count, fence_value));
        }
        fn completed_fence(&mut self) -> u64 {
            self.completed
        }
        fn wait_for_fence(&mut self, fence_value: u64) {
            self.log.lock().unwrap().waits.push(fence_value);
            self.completed = self.completed.max(fence_value);
        }
        fn read(&self, generation: u32) -> &[u64] {
            &self.data[generation as usize]
        }
    }

    #[test]
    fn slots_allocate_until_capacity() {
        let heap = QueryHeap::new(Box::new(ScriptedBackend::new(2, 4)), 3, 2);
        heap.begin_generation(FrameId(0));
        assert_eq!(heap.allocate_slot(), Some(0));
        assert_eq!(heap.allocate_slot(), Some(1));
        assert_eq!(heap.allocate_slot(), Some(2));
        assert_eq!(heap.allocate_slot(), None);
        assert_eq!(heap.allocate_slot(), None);
        assert_eq!(heap.used_slots(), 3);
    }

    #[test]
    fn resolve_signals_frame_plus_one() {
        let backend = ScriptedBackend::new(2, 8);
        let log = Arc::clone(&backend.log);
        let heap = QueryHeap::new(Box::new(backend), 8, 2);
        heap.begin_generation(FrameId(0));
        heap.allocate_slot();
        heap.allocate_slot();
        heap.resolve(FrameId(0));
        assert_eq!(log.lock().unwrap().resolves, vec![(0, 2, 1)]);
        // Fence 1 has not signaled yet.
        assert!(!heap.is_frame_complete(FrameId(0)));
    }

    #[test]
    fn frame_completes_once_fence_signals() {
        let mut backend = ScriptedBackend::new(2, 8);
        backend.completed = 1;
        let heap = QueryHeap::new(Box::new(backend), 8, 2);
        assert!(heap.is_frame_complete(FrameId(0)));
        assert!(!heap.is_frame_complete(FrameId(1)));
    }

    #[test]
    fn reusing_an_unresolved_generation_stalls() {
        let heap = QueryHeap::new(Box::new(ScriptedBackend::new(2, 8)), 8, 2);
        heap.begin_generation(FrameId(0));
        heap.resolve(FrameId(0));
        heap.begin_generation(FrameId(1));
        heap.resolve(FrameId(1));
        // Frame 2 reuses generation 0, whose fence (1) never signaled.
        let stalled = heap.begin_generation(FrameId(2));
        assert!(stalled);
        // After the forced wait the frame reads as complete.
        assert!(heap.is_frame_complete(FrameId(0)));
    }

    #[test]
    fn begin_generation_resets_the_cursor() {
        let heap = QueryHeap::new(Box::new(ScriptedBackend::new(2, 8)), 2, 2);
        heap.begin_generation(FrameId(0));
        heap.allocate_slot();
        heap.allocate_slot();
        assert_eq!(heap.allocate_slot(), None);
        heap.resolve(FrameId(0));
        heap.begin_generation(FrameId(1));
        assert_eq!(heap.allocate_slot(), Some(0));
    }
}
