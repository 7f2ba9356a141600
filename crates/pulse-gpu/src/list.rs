//! Command-list region recording.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use pulse_arena::{NameWriter, Page};
use pulse_core::{color_for_name, Event, QueueId, GPU_HUE_RANGE};

use crate::pipeline::PipelineShared;

/// One recorded begin or end, replayed in order at submission.
pub(crate) enum ListOp {
    /// Region open. `slot`/`event` are `None` when the frame's capacity
    /// was exhausted; the op is still recorded so pairing stays sound.
    Begin { slot: Option<u32>, event: Option<u32> },
    /// Region close, paired with a begin at submission time.
    End { slot: Option<u32> },
}

/// Records GPU regions for one command list.
///
/// Safe to use from any thread; several recorders can run concurrently.
/// Region begins and ends do not have to balance within one list (a
/// region may open on one list and close on another), but every recorder
/// with at least one op must reach
/// [`execute_command_lists`](crate::GpuPipeline::execute_command_lists)
/// before the frame ends.
pub struct ListRecorder {
    shared: Arc<PipelineShared>,
    queue: QueueId,
    heap: usize,
    ops: Vec<ListOp>,
    names: NameWriter,
}

impl ListRecorder {
    pub(crate) fn new(shared: Arc<PipelineShared>, queue: QueueId, heap: usize) -> Self {
        Self {
            shared,
            queue,
            heap,
            ops: Vec::new(),
            names: NameWriter::new(),
        }
    }

    /// The queue this list was recorded for.
    pub fn queue(&self) -> QueueId {
        self.queue
    }

    pub(crate) fn ops(&self) -> &[ListOp] {
        &self.ops
    }

    pub(crate) fn take_ops(&mut self) -> Vec<ListOp> {
        std::mem::take(&mut self.ops)
    }

    pub(crate) fn take_pages(&mut self) -> Vec<Page> {
        self.names.take_pages()
    }

    /// Open a region with a hashed color and no source location.
    pub fn begin(&mut self, name: &str) -> Option<u32> {
        self.begin_at(name, None, "", 0)
    }

    /// Open a region.
    ///
    /// Returns the timestamp slot the host must write a GPU timestamp
    /// into, or `None` when the region is dropped (pipeline paused, or
    /// the frame's event or query capacity is exhausted). Hooks fire
    /// either way.
    pub fn begin_at(
        &mut self,
        name: &str,
        color: Option<u32>,
        file: &'static str,
        line: u32,
    ) -> Option<u32> {
        if let Some(hook) = &self.shared.hooks.on_begin {
            hook(name);
        }
        if self.shared.paused.load(Ordering::Acquire) {
            return None;
        }
        if self.ops.is_empty() {
            self.shared.unsubmitted.fetch_add(1, Ordering::AcqRel);
        }
        let (frame, generation) = self.shared.current();
        let event = generation.allocate();
        let slot = event.and_then(|_| self.shared.heaps[self.heap].allocate_slot());
        if let Some(e) = event {
            let name_ref = self.names.push(&self.shared.pool, frame, name);
            let info = &self.shared.queues[self.queue.0 as usize];
            let mut cell = generation.events[e as usize]
                .lock()
                .expect("event cell poisoned");
            *cell = Event {
                name: name_ref,
                file,
                line,
                color: color.unwrap_or_else(|| color_for_name(name, GPU_HUE_RANGE)),
                depth: 0,
                track: info.track,
                queue: self.queue,
                begin_ticks: 0,
                end_ticks: 0,
            };
        }
        self.ops.push(ListOp::Begin { slot, event });
        slot
    }

    /// Close the most recently opened region (resolved at submission).
    ///
    /// Returns the timestamp slot for the host to write, or `None` when
    /// paused or out of slots.
    pub fn end(&mut self) -> Option<u32> {
        if let Some(hook) = &self.shared.hooks.on_end {
            hook();
        }
        if self.shared.paused.load(Ordering::Acquire) {
            return None;
        }
        if self.ops.is_empty() {
            self.shared.unsubmitted.fetch_add(1, Ordering::AcqRel);
        }
        let slot = self.shared.heaps[self.heap].allocate_slot();
        self.ops.push(ListOp::End { slot });
        slot
    }
}
