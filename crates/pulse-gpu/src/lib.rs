//! GPU timestamp query pipeline for the Pulse frame profiler.
//!
//! Command lists are recorded on arbitrary threads in arbitrary order and
//! only acquire a total order at submission. The pipeline therefore works
//! in three phases:
//!
//! 1. **Recording**: a [`ListRecorder`] captures begin/end ops on one
//!    command list, allocating a timestamp slot and an event per begin.
//! 2. **Submission**: [`GpuPipeline::execute_command_lists`] replays each
//!    list's ops against a per-queue LIFO stack, pairing begin/end slots
//!    into query records and fixing event depth and queue ownership. This
//!    is the only point where GPU nesting is computable.
//! 3. **Readback**: once a frame generation's fence signals, raw
//!    timestamps are calibrated into the CPU clock domain and the finished
//!    events migrate into their queue's track.
//!
//! The host supplies the hardware through the [`QueryBackend`] trait:
//! timestamp slots with async CPU-visible copy, a fence, and a per-queue
//! clock calibration. Any backend modeling those three primitives works.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod backend;
pub mod config;
pub mod heap;
pub mod list;
pub mod pipeline;

pub use backend::{QueryBackend, QueueCalibration};
pub use config::{GpuConfig, GpuConfigError, HeapConfig, QueueConfig};
pub use heap::QueryHeap;
pub use list::ListRecorder;
pub use pipeline::{GpuHooks, GpuPipeline, ReadbackMetrics};
