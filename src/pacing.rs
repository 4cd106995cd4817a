//! Frame-rate governor
//!
//! Caps the rate at which captured frames enter the pipeline, independent
//! of how fast the capture backend pushes. Excess frames are dropped, not
//! delayed.

use std::time::{Duration, Instant};

use log::debug;

/// Drops frames arriving faster than the target interval.
pub struct PacingGovernor {
    interval: Duration,
    last_accepted: Option<Instant>,
}

impl PacingGovernor {
    /// Governor for a `fps` ceiling. `fps` must be positive (validated by
    /// the configuration layer).
    pub fn new(fps: u32) -> Self {
        Self {
            interval: Duration::from_micros(1_000_000 / u64::from(fps.max(1))),
            last_accepted: None,
        }
    }

    /// Decide whether a frame arriving at `now` enters the pipeline.
    ///
    /// The first call after construction or [`reset`](Self::reset) records
    /// the baseline and rejects, so a spuriously fast first pair of frames
    /// cannot slip through.
    pub fn should_accept(&mut self, now: Instant) -> bool {
        match self.last_accepted {
            None => {
                self.last_accepted = Some(now);
                false
            }
            Some(last) => {
                let elapsed = now.saturating_duration_since(last);
                if elapsed < self.interval {
                    debug!(
                        "frame dropped: {:.3} ms since last accept (interval {:.3} ms)",
                        elapsed.as_secs_f64() * 1000.0,
                        self.interval.as_secs_f64() * 1000.0
                    );
                    false
                } else {
                    self.last_accepted = Some(now);
                    true
                }
            }
        }
    }

    /// Forget the baseline; used when a capture session restarts.
    pub fn reset(&mut self) {
        self.last_accepted = None;
    }

    /// Target interval between accepted frames.
    pub fn interval(&self) -> Duration {
        self.interval
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn baseline_then_interval_gated_accepts() {
        // fps=10 => 100 ms interval
        let mut governor = PacingGovernor::new(10);
        let t0 = Instant::now();

        assert!(!governor.should_accept(t0)); // baseline
        assert!(governor.should_accept(t0 + Duration::from_millis(100)));
        assert!(!governor.should_accept(t0 + Duration::from_millis(150)));
        assert!(governor.should_accept(t0 + Duration::from_millis(210)));
    }

    #[test]
    fn reset_requires_a_new_baseline() {
        let mut governor = PacingGovernor::new(30);
        let t0 = Instant::now();
        governor.should_accept(t0);
        assert!(governor.should_accept(t0 + Duration::from_secs(1)));

        governor.reset();
        assert!(!governor.should_accept(t0 + Duration::from_secs(2)));
    }

    #[test]
    fn non_monotonic_timestamps_do_not_panic() {
        let mut governor = PacingGovernor::new(30);
        let t0 = Instant::now();
        governor.should_accept(t0 + Duration::from_secs(1));
        assert!(!governor.should_accept(t0));
    }
}
