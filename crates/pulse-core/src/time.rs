//! Session-local monotonic clock and tick conversions.
//!
//! All timestamps in Pulse are expressed as "session ticks": nanoseconds
//! since the clock was created. GPU timestamps are converted into this
//! domain through per-queue calibration. Tick value 0 is reserved as the
//! "unset" sentinel, so the clock never returns it.

use std::time::Instant;

/// Number of session ticks per millisecond.
pub const TICKS_PER_MS: u64 = 1_000_000;

/// Session tick frequency in Hz (ticks are nanoseconds).
///
/// Used as the CPU side of GPU clock calibration.
pub const CPU_TICK_FREQUENCY: u64 = 1_000_000_000;

/// Convert session ticks to fractional milliseconds.
pub fn ticks_to_ms(ticks: u64) -> f64 {
    ticks as f64 / TICKS_PER_MS as f64
}

/// Monotonic clock anchored at profiler construction.
///
/// Cheap to read from any thread. Readings are strictly positive: zero
/// remains available as the "timestamp unset" sentinel on [`Event`]s.
///
/// [`Event`]: crate::event::Event
#[derive(Clone, Copy, Debug)]
pub struct SessionClock {
    epoch: Instant,
}

impl SessionClock {
    /// Create a clock anchored at the current instant.
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }

    /// Nanoseconds elapsed since the session epoch, offset so the result
    /// is never zero.
    pub fn now_ticks(&self) -> u64 {
        // Saturates rather than wraps after ~584 years of session time.
        (self.epoch.elapsed().as_nanos() as u64).saturating_add(1)
    }
}

impl Default for SessionClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticks_are_never_zero() {
        let clock = SessionClock::new();
        assert!(clock.now_ticks() > 0);
    }

    #[test]
    fn ticks_are_monotonic() {
        let clock = SessionClock::new();
        let a = clock.now_ticks();
        let b = clock.now_ticks();
        assert!(b >= a);
    }

    #[test]
    fn ms_conversion() {
        assert_eq!(ticks_to_ms(TICKS_PER_MS), 1.0);
        assert_eq!(ticks_to_ms(TICKS_PER_MS / 2), 0.5);
        assert_eq!(ticks_to_ms(0), 0.0);
    }
}
