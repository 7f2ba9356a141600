//! Profiler configuration and validation.

use std::error::Error;
use std::fmt;

use pulse_gpu::{GpuConfig, GpuConfigError, GpuHooks};

use crate::recorder::CpuHooks;

/// Configuration for a profiler session.
///
/// Validated once at [`Profiler::new`]; the session never reconfigures.
///
/// [`Profiler::new`]: crate::Profiler::new
pub struct ProfilerConfig {
    /// Frames kept in the rolling window. Must exceed the GPU frame
    /// latency, or resolved GPU events would land in already-evicted
    /// frames.
    pub history_size: usize,
    /// CPU event capacity per track per frame; excess events are dropped
    /// for the rest of the frame and counted in the tick metrics.
    pub max_events_per_frame: u32,
    /// GPU query pipeline configuration; `None` profiles CPU only.
    pub gpu: Option<GpuConfig>,
    /// Callbacks fired around GPU regions (pause or not).
    pub gpu_hooks: GpuHooks,
    /// Callbacks fired around CPU regions (pause or not).
    pub cpu_hooks: CpuHooks,
}

impl Default for ProfilerConfig {
    fn default() -> Self {
        Self {
            history_size: 8,
            max_events_per_frame: 1024,
            gpu: None,
            gpu_hooks: GpuHooks::default(),
            cpu_hooks: CpuHooks::default(),
        }
    }
}

impl ProfilerConfig {
    /// Check structural validity.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.history_size < 2 {
            return Err(ConfigError::HistoryTooSmall {
                history: self.history_size,
            });
        }
        if self.max_events_per_frame == 0 {
            return Err(ConfigError::ZeroEventCapacity);
        }
        if let Some(gpu) = &self.gpu {
            gpu.validate()?;
            if self.history_size <= gpu.frame_latency as usize {
                return Err(ConfigError::HistoryWithinLatency {
                    history: self.history_size,
                    latency: gpu.frame_latency,
                });
            }
        }
        Ok(())
    }
}

/// Rejected profiler configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The rolling window needs at least two frames (one recording, one
    /// readable).
    HistoryTooSmall {
        /// The configured history size.
        history: usize,
    },
    /// `max_events_per_frame` must be at least 1.
    ZeroEventCapacity,
    /// The history window does not cover the GPU frame latency.
    HistoryWithinLatency {
        /// The configured history size.
        history: usize,
        /// The configured GPU frame latency.
        latency: u32,
    },
    /// The GPU section failed its own validation.
    Gpu(GpuConfigError),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HistoryTooSmall { history } => {
                write!(f, "history_size {history} is below the minimum of 2")
            }
            Self::ZeroEventCapacity => write!(f, "max_events_per_frame must be at least 1"),
            Self::HistoryWithinLatency { history, latency } => write!(
                f,
                "history_size {history} must exceed the GPU frame latency {latency}"
            ),
            Self::Gpu(err) => write!(f, "gpu config: {err}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Gpu(err) => Some(err),
            _ => None,
        }
    }
}

impl From<GpuConfigError> for ConfigError {
    fn from(err: GpuConfigError) -> Self {
        Self::Gpu(err)
    }
}
