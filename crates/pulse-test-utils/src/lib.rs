//! Shared test fixtures for the Pulse workspace.
//!
//! The centerpiece is [`FencedBackend`], an in-memory [`QueryBackend`]
//! whose fence is controlled by the test through a [`BackendProbe`]:
//! timestamps are written directly into slots, `resolve` copies them into
//! the readback area immediately, and the fence only advances when the
//! probe signals it. A forced `wait_for_fence` "catches the GPU up" and is
//! counted, so latency-stall paths are testable deterministically.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use pulse_gpu::{GpuConfig, HeapConfig, QueryBackend, QueueCalibration, QueueConfig};

struct Fence {
    slots: Vec<Vec<AtomicU64>>,
    completed: AtomicU64,
    forced_waits: AtomicU64,
}

/// Test-side handle to a [`FencedBackend`].
#[derive(Clone)]
pub struct BackendProbe {
    fence: Arc<Fence>,
}

impl BackendProbe {
    /// Write a raw GPU timestamp into a slot, as the hardware would.
    pub fn write_slot(&self, generation: u32, slot: u32, value: u64) {
        self.fence.slots[generation as usize][slot as usize].store(value, Ordering::Relaxed);
    }

    /// Signal the fence up to `value`.
    pub fn signal(&self, value: u64) {
        let prev = self.fence.completed.load(Ordering::Relaxed);
        self.fence.completed.store(prev.max(value), Ordering::Relaxed);
    }

    /// Number of times the backend was forced to block on the fence.
    pub fn forced_waits(&self) -> u64 {
        self.fence.forced_waits.load(Ordering::Relaxed)
    }
}

/// In-memory query backend with a probe-controlled fence.
pub struct FencedBackend {
    fence: Arc<Fence>,
    readback: Vec<Vec<u64>>,
}

impl FencedBackend {
    /// Create a backend with `generations` readback areas of `slots`
    /// timestamp slots each, plus the probe that drives it.
    pub fn new(generations: u32, slots: u32) -> (Self, BackendProbe) {
        let fence = Arc::new(Fence {
            slots: (0..generations)
                .map(|_| (0..slots).map(|_| AtomicU64::new(0)).collect())
                .collect(),
            completed: AtomicU64::new(0),
            forced_waits: AtomicU64::new(0),
        });
        let backend = Self {
            fence: Arc::clone(&fence),
            readback: vec![vec![0; slots as usize]; generations as usize],
        };
        (backend, BackendProbe { fence })
    }
}

impl QueryBackend for FencedBackend {
    fn resolve(&mut self, generation: u32, count: u32, _fence_value: u64) {
        let gen = generation as usize;
        for i in 0..count as usize {
            self.readback[gen][i] = self.fence.slots[gen][i].load(Ordering::Relaxed);
        }
    }

    fn completed_fence(&mut self) -> u64 {
        self.fence.completed.load(Ordering::Relaxed)
    }

    fn wait_for_fence(&mut self, fence_value: u64) {
        self.fence.forced_waits.fetch_add(1, Ordering::Relaxed);
        let prev = self.fence.completed.load(Ordering::Relaxed);
        self.fence
            .completed
            .store(prev.max(fence_value), Ordering::Relaxed);
    }

    fn read(&self, generation: u32) -> &[u64] {
        &self.readback[generation as usize]
    }
}

/// A single-heap, single-queue GPU configuration with identity clock
/// calibration, ready for `ProfilerConfig::gpu`.
pub fn single_queue_gpu(
    frame_latency: u32,
    max_events_per_frame: u32,
    max_queries: u32,
) -> (GpuConfig, BackendProbe) {
    let (backend, probe) = FencedBackend::new(frame_latency, max_queries);
    let config = GpuConfig {
        frame_latency,
        max_events_per_frame,
        heaps: vec![HeapConfig {
            backend: Box::new(backend),
            max_queries,
        }],
        queues: vec![QueueConfig {
            name: "Direct".to_owned(),
            heap: 0,
            calibration: QueueCalibration::identity(),
        }],
    };
    (config, probe)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fence_only_advances_when_signaled() {
        let (mut backend, probe) = FencedBackend::new(2, 4);
        assert_eq!(backend.completed_fence(), 0);
        probe.signal(3);
        assert_eq!(backend.completed_fence(), 3);
        // Signaling backwards never regresses.
        probe.signal(1);
        assert_eq!(backend.completed_fence(), 3);
    }

    #[test]
    fn resolve_copies_written_slots() {
        let (mut backend, probe) = FencedBackend::new(2, 4);
        probe.write_slot(1, 0, 111);
        probe.write_slot(1, 1, 222);
        backend.resolve(1, 2, 1);
        assert_eq!(&backend.read(1)[..2], &[111, 222]);
    }

    #[test]
    fn forced_wait_catches_up_and_counts() {
        let (mut backend, probe) = FencedBackend::new(2, 4);
        backend.wait_for_fence(5);
        assert_eq!(backend.completed_fence(), 5);
        assert_eq!(probe.forced_waits(), 1);
    }
}
