//! Per-tick observability counters and frame-time statistics.

use pulse_core::FrameId;

/// Snapshot of the profiler's health, refreshed at every tick.
///
/// This is the whole observability surface: counters for work done and
/// work dropped during the frame just closed, plus frame-time statistics
/// over the history window. Sustained `latency_stalls` mean the configured
/// GPU frame latency is too small for the workload.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TickMetrics {
    /// The frame the tick closed.
    pub frame: FrameId,
    /// CPU events dropped to capacity overflow, cumulative.
    pub dropped_cpu_events: u64,
    /// GPU events dropped to capacity overflow, cumulative.
    pub dropped_gpu_events: u64,
    /// GPU events delivered by readback during this tick.
    pub gpu_resolved: u64,
    /// GPU events skipped during this tick (query never paired or written).
    pub gpu_unresolved: u64,
    /// Forced fence waits at generation reuse, cumulative.
    pub latency_stalls: u64,
    /// Scratch pages ever allocated by the pool.
    pub pages_created: usize,
    /// Duration of the frame just closed, in milliseconds.
    pub frame_ms: f64,
    /// Simple moving average over the history window.
    pub frame_ms_avg: f64,
    /// Minimum over the history window.
    pub frame_ms_min: f64,
    /// Maximum over the history window.
    pub frame_ms_max: f64,
}

/// Rolling window of recent frame durations.
pub(crate) struct FrameStats {
    samples: Vec<f64>,
    filled: usize,
    next: usize,
}

impl FrameStats {
    pub fn new(window: usize) -> Self {
        Self {
            samples: vec![0.0; window],
            filled: 0,
            next: 0,
        }
    }

    /// Record one frame duration and fold the window statistics into `m`.
    pub fn record(&mut self, frame_ms: f64, m: &mut TickMetrics) {
        self.samples[self.next] = frame_ms;
        self.next = (self.next + 1) % self.samples.len();
        self.filled = (self.filled + 1).min(self.samples.len());

        let mut min = f64::INFINITY;
        let mut max = 0.0f64;
        let mut sum = 0.0;
        for &s in &self.samples[..self.filled] {
            min = min.min(s);
            max = max.max(s);
            sum += s;
        }
        m.frame_ms = frame_ms;
        m.frame_ms_avg = sum / self.filled as f64;
        m.frame_ms_min = min;
        m.frame_ms_max = max;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_cover_only_recorded_samples() {
        let mut stats = FrameStats::new(4);
        let mut m = TickMetrics::default();
        stats.record(10.0, &mut m);
        assert_eq!(m.frame_ms, 10.0);
        assert_eq!(m.frame_ms_avg, 10.0);
        assert_eq!(m.frame_ms_min, 10.0);
        assert_eq!(m.frame_ms_max, 10.0);

        stats.record(20.0, &mut m);
        assert_eq!(m.frame_ms_avg, 15.0);
        assert_eq!(m.frame_ms_min, 10.0);
        assert_eq!(m.frame_ms_max, 20.0);
    }

    #[test]
    fn window_evicts_old_samples() {
        let mut stats = FrameStats::new(2);
        let mut m = TickMetrics::default();
        stats.record(100.0, &mut m);
        stats.record(10.0, &mut m);
        stats.record(20.0, &mut m);
        // The 100 ms sample has rolled out.
        assert_eq!(m.frame_ms_max, 20.0);
        assert_eq!(m.frame_ms_min, 10.0);
        assert_eq!(m.frame_ms_avg, 15.0);
    }
}
