//! Core types for the Pulse frame profiler.
//!
//! This is the leaf crate with zero internal dependencies. It defines
//! the fundamental abstractions used throughout the Pulse workspace:
//! type IDs, the event data model, the session clock, name-to-color
//! hashing, and shared error types.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod color;
pub mod error;
pub mod event;
pub mod id;
pub mod time;

pub use color::{color_for_name, CPU_HUE_RANGE, GPU_HUE_RANGE};
pub use error::QueryError;
pub use event::{Event, NameRef, TrackKind, MAX_EVENT_DEPTH};
pub use id::{FrameId, QueueId, TrackId};
pub use time::{ticks_to_ms, SessionClock, CPU_TICK_FREQUENCY, TICKS_PER_MS};
