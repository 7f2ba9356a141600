//! GPU pipeline configuration and validation.

use std::error::Error;
use std::fmt;

use crate::backend::{QueryBackend, QueueCalibration};

/// One timestamp query heap and the backend that services it.
pub struct HeapConfig {
    /// Host-supplied query backend for this heap.
    pub backend: Box<dyn QueryBackend>,
    /// Timestamp slots per generation.
    pub max_queries: u32,
}

impl fmt::Debug for HeapConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HeapConfig")
            .field("max_queries", &self.max_queries)
            .finish_non_exhaustive()
    }
}

/// One GPU queue to be profiled.
#[derive(Debug)]
pub struct QueueConfig {
    /// Display name for the queue's track.
    pub name: String,
    /// Index into [`GpuConfig::heaps`] of the heap this queue's command
    /// lists draw slots from.
    pub heap: usize,
    /// Clock calibration for this queue.
    pub calibration: QueueCalibration,
}

/// Configuration for the GPU query pipeline.
#[derive(Debug)]
pub struct GpuConfig {
    /// Frames in flight between recording and readback.
    pub frame_latency: u32,
    /// Event capacity per frame generation; events past this are dropped.
    pub max_events_per_frame: u32,
    /// Query heaps, one per backend device/heap pair.
    pub heaps: Vec<HeapConfig>,
    /// Profiled queues.
    pub queues: Vec<QueueConfig>,
}

impl GpuConfig {
    /// Check structural validity before the pipeline is built.
    pub fn validate(&self) -> Result<(), GpuConfigError> {
        if self.frame_latency == 0 {
            return Err(GpuConfigError::ZeroLatency);
        }
        if self.max_events_per_frame == 0 {
            return Err(GpuConfigError::ZeroEventCapacity);
        }
        if self.heaps.is_empty() {
            return Err(GpuConfigError::NoHeaps);
        }
        if self.queues.is_empty() {
            return Err(GpuConfigError::NoQueues);
        }
        for (index, heap) in self.heaps.iter().enumerate() {
            if heap.max_queries == 0 {
                return Err(GpuConfigError::ZeroQueryCapacity { heap: index });
            }
        }
        for (index, queue) in self.queues.iter().enumerate() {
            if queue.heap >= self.heaps.len() {
                return Err(GpuConfigError::HeapIndexOutOfRange {
                    queue: index,
                    heap: queue.heap,
                });
            }
            if queue.calibration.gpu_frequency == 0 {
                return Err(GpuConfigError::ZeroGpuFrequency { queue: index });
            }
        }
        Ok(())
    }
}

/// Rejected GPU configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GpuConfigError {
    /// `frame_latency` must be at least 1.
    ZeroLatency,
    /// `max_events_per_frame` must be at least 1.
    ZeroEventCapacity,
    /// At least one heap is required.
    NoHeaps,
    /// At least one queue is required.
    NoQueues,
    /// A heap has no timestamp slots.
    ZeroQueryCapacity {
        /// Index of the offending heap.
        heap: usize,
    },
    /// A queue references a heap index that does not exist.
    HeapIndexOutOfRange {
        /// Index of the offending queue.
        queue: usize,
        /// The out-of-range heap index.
        heap: usize,
    },
    /// A queue's calibration reports a zero GPU frequency.
    ZeroGpuFrequency {
        /// Index of the offending queue.
        queue: usize,
    },
}

impl fmt::Display for GpuConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ZeroLatency => write!(f, "frame_latency must be at least 1"),
            Self::ZeroEventCapacity => {
                write!(f, "max_events_per_frame must be at least 1")
            }
            Self::NoHeaps => write!(f, "at least one query heap is required"),
            Self::NoQueues => write!(f, "at least one queue is required"),
            Self::ZeroQueryCapacity { heap } => {
                write!(f, "heap {heap} has zero query capacity")
            }
            Self::HeapIndexOutOfRange { queue, heap } => {
                write!(f, "queue {queue} references nonexistent heap {heap}")
            }
            Self::ZeroGpuFrequency { queue } => {
                write!(f, "queue {queue} reports a GPU frequency of zero")
            }
        }
    }
}

impl Error for GpuConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    struct NullBackend;

    impl QueryBackend for NullBackend {
        fn resolve(&mut self, _generation: u32, _count: u32, _fence_value: u64) {}
        fn completed_fence(&mut self) -> u64 {
            0
        }
        fn wait_for_fence(&mut self, _fence_value: u64) {}
        fn read(&self, _generation: u32) -> &[u64] {
            &[]
        }
    }

    fn valid() -> GpuConfig {
        GpuConfig {
            frame_latency: 2,
            max_events_per_frame: 64,
            heaps: vec![HeapConfig {
                backend: Box::new(NullBackend),
                max_queries: 128,
            }],
            queues: vec![QueueConfig {
                name: "Direct".to_owned(),
                heap: 0,
                calibration: QueueCalibration::identity(),
            }],
        }
    }

    #[test]
    fn valid_config_passes() {
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn zero_latency_is_rejected() {
        let mut cfg = valid();
        cfg.frame_latency = 0;
        assert_eq!(cfg.validate(), Err(GpuConfigError::ZeroLatency));
    }

    #[test]
    fn bad_heap_index_is_rejected() {
        let mut cfg = valid();
        cfg.queues[0].heap = 3;
        assert_eq!(
            cfg.validate(),
            Err(GpuConfigError::HeapIndexOutOfRange { queue: 0, heap: 3 })
        );
    }

    #[test]
    fn zero_frequency_is_rejected() {
        let mut cfg = valid();
        cfg.queues[0].calibration.gpu_frequency = 0;
        assert_eq!(
            cfg.validate(),
            Err(GpuConfigError::ZeroGpuFrequency { queue: 0 })
        );
    }

    #[test]
    fn zero_query_capacity_is_rejected() {
        let mut cfg = valid();
        cfg.heaps[0].max_queries = 0;
        assert_eq!(
            cfg.validate(),
            Err(GpuConfigError::ZeroQueryCapacity { heap: 0 })
        );
    }
}
