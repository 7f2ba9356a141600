//! Frame scheduler, track registry, and recorders for the Pulse profiler.
//!
//! A [`Profiler`] session organizes concurrently produced CPU and GPU
//! events into per-frame storage and exposes a rolling window of resolved
//! frames:
//!
//! - CPU threads record nested regions through a [`ThreadRecorder`].
//! - GPU command lists record through the query pipeline in `pulse-gpu`;
//!   resolved events migrate onto their queue's track a few frames later.
//! - Swapchain statistics turn into display bars on the present track.
//! - [`Profiler::tick`], called once per frame by the driver thread,
//!   closes the frame, runs GPU readback and present correlation, and
//!   advances the ring.
//!
//! Contract violations (unbalanced begin/end, over-deep nesting,
//! unsubmitted command lists) panic; resource exhaustion degrades by
//! dropping events and counting them in [`TickMetrics`].

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod config;
pub mod metrics;
mod present;
mod profiler;
mod recorder;
mod registry;
mod track;

pub use config::{ConfigError, ProfilerConfig};
pub use metrics::TickMetrics;
pub use profiler::{EventView, FrameWindow, Profiler};
pub use recorder::{CpuHooks, ThreadRecorder};
pub use registry::TrackInfo;
