//! Interval gating for housekeeping work.
//!
//! Several maintenance operations (orderbook validity checks, side-stream
//! saves, queue statistics) must run at most once per configured interval.
//! [`IntervalGate`] holds the next-fire deadline explicitly; callers test
//! it on every loop iteration and only perform the work when it fires.

use std::time::{Duration, Instant};

/// Gate that opens at most once per interval.
///
/// The first call to [`fire`](IntervalGate::fire) always returns `true`;
/// subsequent calls return `true` only after the interval has elapsed
/// since the last firing.
#[derive(Debug, Clone)]
pub struct IntervalGate {
    interval: Duration,
    next_fire: Instant,
}

impl IntervalGate {
    /// Create a gate that is immediately ready to fire.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_fire: Instant::now(),
        }
    }

    /// Create a gate whose first firing is one full interval away.
    pub fn starting_closed(interval: Duration) -> Self {
        Self {
            interval,
            next_fire: Instant::now() + interval,
        }
    }

    /// The configured interval.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Returns `true` and arms the next deadline if the interval has
    /// elapsed; otherwise returns `false` without side effects.
    pub fn fire(&mut self) -> bool {
        let now = Instant::now();
        if now >= self.next_fire {
            self.next_fire = now + self.interval;
            true
        } else {
            false
        }
    }
}

/// Single-shot latch for work that must happen exactly once, such as the
/// one-time log lines recording feed anchors.
#[derive(Debug, Clone, Default)]
pub struct RunOnce {
    fired: bool,
}

impl RunOnce {
    /// Create an unfired latch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` on the first call only.
    pub fn fire(&mut self) -> bool {
        if self.fired {
            false
        } else {
            self.fired = true;
            true
        }
    }

    /// Whether the latch has fired.
    pub fn has_fired(&self) -> bool {
        self.fired
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    #[test]
    fn gate_fires_immediately_then_waits() {
        let mut gate = IntervalGate::new(Duration::from_millis(50));
        assert!(gate.fire());
        assert!(!gate.fire());
    }

    #[test]
    fn gate_reopens_after_interval() {
        let mut gate = IntervalGate::new(Duration::from_millis(5));
        assert!(gate.fire());
        sleep(Duration::from_millis(10));
        assert!(gate.fire());
    }

    #[test]
    fn closed_gate_does_not_fire_early() {
        let mut gate = IntervalGate::starting_closed(Duration::from_secs(60));
        assert!(!gate.fire());
    }

    #[test]
    fn run_once_fires_once() {
        let mut once = RunOnce::new();
        assert!(once.fire());
        assert!(!once.fire());
        assert!(once.has_fired());
    }
}
