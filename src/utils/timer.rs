//! Monotonic timer for latency measurement and interval bookkeeping.

use std::time::{Duration, Instant};

/// A monotonic stopwatch.
///
/// The timer starts running when constructed. `elapsed` reads the time
/// since the last reset, `lap` reads and resets in one step, and `delta`
/// reads the time since the previous `delta` call (useful for measuring
/// per-item latency inside a loop).
#[derive(Debug, Clone)]
pub struct Timer {
    started: Instant,
    last_delta: Instant,
}

impl Timer {
    /// Create a timer that starts immediately.
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            started: now,
            last_delta: now,
        }
    }

    /// Time elapsed since construction or the last `reset`/`lap`.
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Restart the timer.
    pub fn reset(&mut self) {
        self.started = Instant::now();
        self.last_delta = self.started;
    }

    /// Return the elapsed time and restart the timer.
    pub fn lap(&mut self) -> Duration {
        let elapsed = self.started.elapsed();
        self.reset();
        elapsed
    }

    /// Time elapsed since the previous `delta` call (or construction on
    /// the first call).
    pub fn delta(&mut self) -> Duration {
        let now = Instant::now();
        let delta = now.duration_since(self.last_delta);
        self.last_delta = now;
        delta
    }

    /// Render a duration as `HH:MM:SS.ss`, the format used by summary logs.
    pub fn format_hms(duration: Duration) -> String {
        let total = duration.as_secs_f64();
        let hours = (total / 3600.0) as u64;
        let minutes = ((total % 3600.0) / 60.0) as u64;
        let seconds = total % 60.0;
        format!("{hours:02}:{minutes:02}:{seconds:05.2}")
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}
