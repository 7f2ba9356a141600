//! Pulse: an in-process frame profiler for real-time applications.
//!
//! This is the top-level facade crate that re-exports the public API from
//! all Pulse sub-crates. For most users, adding `pulse` as a single
//! dependency is sufficient.
//!
//! # Quick start
//!
//! ```rust
//! use pulse::prelude::*;
//!
//! // One profiler per process, ticked once per frame by the driver thread.
//! let profiler = Profiler::new(ProfilerConfig::default()).unwrap();
//!
//! // Each participating thread registers once and records nested regions.
//! let mut recorder = profiler.register_thread("worker");
//! recorder.begin("update");
//! recorder.begin("physics");
//! recorder.end();
//! recorder.end();
//! let track = recorder.track();
//!
//! // The driver closes the frame; closed frames become readable.
//! profiler.tick();
//!
//! let mut names = Vec::new();
//! profiler
//!     .read_frame(track, FrameId(0), |ev| names.push(ev.name().to_owned()))
//!     .unwrap();
//! assert_eq!(names, vec!["update".to_owned(), "physics".to_owned()]);
//! ```
//!
//! # Modules
//!
//! Each module corresponds to a sub-crate. Use them for types not in the
//! prelude:
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `pulse-core` | IDs, the event model, clock, colors, errors |
//! | [`gpu`] | `pulse-gpu` | Query backend trait, heap and pipeline config |
//! | [`engine`] | `pulse-engine` | The profiler session, recorders, metrics |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Core types, IDs, and the event model (`pulse-core`).
///
/// Contains [`types::Event`], the session clock, name-to-color hashing,
/// and the shared error types.
pub use pulse_core as types;

/// GPU timestamp query pipeline (`pulse-gpu`).
///
/// Implement [`gpu::QueryBackend`] over your graphics API's timestamp
/// queries and fences, then describe heaps and queues with
/// [`gpu::GpuConfig`].
pub use pulse_gpu as gpu;

/// The profiler session, recorders, and frame scheduling (`pulse-engine`).
///
/// [`engine::Profiler`] is the entry point; it owns the track registry,
/// the frame ring, and the per-tick readback and present correlation.
pub use pulse_engine as engine;

/// Common imports for typical Pulse usage.
///
/// ```rust
/// use pulse::prelude::*;
/// ```
///
/// This imports the most frequently used types: the profiler session and
/// its config, recorders, IDs, and the per-tick metrics snapshot.
pub mod prelude {
    // IDs and the event model
    pub use pulse_core::{Event, FrameId, QueryError, QueueId, TrackId, TrackKind};

    // GPU integration surface
    pub use pulse_gpu::{
        GpuConfig, HeapConfig, ListRecorder, QueryBackend, QueueCalibration, QueueConfig,
    };

    // The session
    pub use pulse_engine::{
        EventView, FrameWindow, Profiler, ProfilerConfig, ThreadRecorder, TickMetrics, TrackInfo,
    };
}
