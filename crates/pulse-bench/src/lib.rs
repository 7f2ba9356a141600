//! Benchmark profiles for the Pulse frame profiler.
//!
//! Provides pre-built [`ProfilerConfig`] profiles shared by the Criterion
//! benches:
//!
//! - [`cpu_profile`]: CPU-only session with a configurable event budget
//! - [`gpu_profile`]: one direct queue on a probe-driven backend

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use pulse_engine::ProfilerConfig;
use pulse_test_utils::{single_queue_gpu, BackendProbe};

/// Build a CPU-only profile with the given per-frame event budget.
pub fn cpu_profile(max_events_per_frame: u32) -> ProfilerConfig {
    ProfilerConfig {
        history_size: 8,
        max_events_per_frame,
        ..ProfilerConfig::default()
    }
}

/// Build a profile with a single direct queue at two frames of latency.
///
/// The returned probe lets benches pre-write timestamps and keep the fence
/// ahead of the ring so generation reuse never blocks.
pub fn gpu_profile(max_events_per_frame: u32) -> (ProfilerConfig, BackendProbe) {
    let (gpu, probe) = single_queue_gpu(2, max_events_per_frame, 64);
    let config = ProfilerConfig {
        history_size: 8,
        max_events_per_frame,
        gpu: Some(gpu),
        ..ProfilerConfig::default()
    };
    (config, probe)
}
