//! Frame-tagged scratch string arena for the Pulse frame profiler.
//!
//! Event names are copied into fixed-size pages at begin time so the
//! caller's string does not have to outlive the call. Pages are handed out
//! by a shared [`PagePool`] stamped with the requesting frame, filled by a
//! single producer without locking, and end up owned by the frame slot's
//! [`NameStore`] where readers resolve [`NameRef`]s. A page's buffer
//! returns to the pool free list only when its frame slot is evicted from
//! the ring buffer, never on an in-place reset of a live frame.
//!
//! The pool mutex is touched once per page handout and once per release;
//! per-string writes go to a page the producer owns exclusively.
//!
//! [`NameRef`]: pulse_core::NameRef

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod pool;
pub mod store;

pub use pool::{Page, PagePool, PAGE_SIZE};
pub use store::{NameStore, NameWriter};
