//! The GPU capability contract: timestamp slots, fence, calibration.

use pulse_core::CPU_TICK_FREQUENCY;

/// Per-queue GPU-to-CPU clock calibration.
///
/// Captured once at queue registration: a pair of simultaneous readings of
/// the GPU and CPU clocks plus the GPU tick frequency. Treated as a fixed
/// approximation for the whole session; drift is not re-validated.
#[derive(Clone, Copy, Debug)]
pub struct QueueCalibration {
    /// GPU clock reading at the calibration instant.
    pub gpu_calibration_ticks: u64,
    /// Session clock reading at the calibration instant.
    pub cpu_calibration_ticks: u64,
    /// GPU timestamp frequency in Hz.
    pub gpu_frequency: u64,
}

impl QueueCalibration {
    /// Calibration where GPU ticks already are session ticks.
    ///
    /// Useful for tests and for software queues timed with the CPU clock.
    pub fn identity() -> Self {
        Self {
            gpu_calibration_ticks: 0,
            cpu_calibration_ticks: 0,
            gpu_frequency: CPU_TICK_FREQUENCY,
        }
    }

    /// Convert a GPU timestamp into session ticks.
    ///
    /// `cpu = cpu_calib + (gpu - gpu_calib) * cpu_freq / gpu_freq`, widened
    /// through `u128` so large tick values cannot overflow mid-multiply.
    /// Timestamps from before the calibration instant clamp to it.
    pub fn to_cpu_ticks(&self, gpu_ticks: u64) -> u64 {
        let delta = gpu_ticks.saturating_sub(self.gpu_calibration_ticks) as u128;
        let scaled = delta * CPU_TICK_FREQUENCY as u128 / self.gpu_frequency as u128;
        self.cpu_calibration_ticks
            .saturating_add(scaled.min(u64::MAX as u128) as u64)
    }
}

/// Host-supplied access to hardware timestamp queries.
///
/// The backend owns a fixed set of timestamp slots organized as
/// `frame_latency` independent generations, a CPU-visible readback area,
/// and a fence. Implementations must guarantee:
///
/// - [`resolve`](QueryBackend::resolve) asynchronously copies the first
///   `count` slots of `generation` into the readback area and signals the
///   fence with `fence_value` once the copy is visible to the CPU.
/// - [`completed_fence`](QueryBackend::completed_fence) returns the highest
///   signaled fence value (0 before any signal; fence values handed to
///   `resolve` are therefore always ≥ 1).
/// - [`read`](QueryBackend::read) returns the readback area for a
///   generation; contents are defined only for slots covered by a resolve
///   whose fence has signaled.
pub trait QueryBackend: Send {
    /// Submit the async copy of `count` slots for `generation`, signaling
    /// `fence_value` on completion.
    fn resolve(&mut self, generation: u32, count: u32, fence_value: u64);

    /// Highest fence value signaled so far.
    fn completed_fence(&mut self) -> u64;

    /// Block until the fence reaches `fence_value`.
    ///
    /// The bounded fallback used when a generation must be reused before
    /// its previous occupant's results arrived; never on the steady path.
    fn wait_for_fence(&mut self, fence_value: u64);

    /// Readback data for a generation, one `u64` raw timestamp per slot.
    fn read(&self, generation: u32) -> &[u64];
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_calibration_is_passthrough() {
        let c = QueueCalibration::identity();
        assert_eq!(c.to_cpu_ticks(0), 0);
        assert_eq!(c.to_cpu_ticks(123_456), 123_456);
    }

    #[test]
    fn calibration_scales_by_frequency_ratio() {
        // GPU at 1 MHz: one GPU tick is 1000 session ticks (ns).
        let c = QueueCalibration {
            gpu_calibration_ticks: 100,
            cpu_calibration_ticks: 5_000,
            gpu_frequency: 1_000_000,
        };
        assert_eq!(c.to_cpu_ticks(100), 5_000);
        assert_eq!(c.to_cpu_ticks(101), 6_000);
        assert_eq!(c.to_cpu_ticks(200), 105_000);
    }

    #[test]
    fn pre_calibration_timestamps_clamp() {
        let c = QueueCalibration {
            gpu_calibration_ticks: 1_000,
            cpu_calibration_ticks: 777,
            gpu_frequency: CPU_TICK_FREQUENCY,
        };
        assert_eq!(c.to_cpu_ticks(500), 777);
    }

    #[test]
    fn large_values_do_not_overflow() {
        let c = QueueCalibration {
            gpu_calibration_ticks: 0,
            cpu_calibration_ticks: 0,
            gpu_frequency: 1,
        };
        // Saturates instead of wrapping.
        assert_eq!(c.to_cpu_ticks(u64::MAX), u64::MAX);
    }
}
