//! Wall-Clock Timing
//!
//! A [`TimingSample`] brackets exactly one runner invocation. It is created
//! immediately before the call, closed immediately after it returns (success
//! or failure) and handed to the reporter, which keeps only the elapsed time.

use std::time::{Duration, Instant};

/// Start and end of one measured invocation
#[derive(Debug, Clone, Copy)]
pub struct TimingSample {
    started: Instant,
    finished: Instant,
}

impl TimingSample {
    /// Elapsed wall-clock time
    #[inline]
    pub fn elapsed(&self) -> Duration {
        self.finished.saturating_duration_since(self.started)
    }

    /// Instant the invocation started
    pub fn started(&self) -> Instant {
        self.started
    }

    /// Instant the invocation returned
    pub fn finished(&self) -> Instant {
        self.finished
    }
}

/// Running stopwatch
pub struct Timer {
    start: Instant,
}

impl Timer {
    /// Start a new timer
    #[inline(always)]
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Stop the timer
    #[inline(always)]
    pub fn stop(self) -> TimingSample {
        TimingSample {
            started: self.start,
            finished: Instant::now(),
        }
    }
}

/// Run `f` and time it.
///
/// The outcome is returned untouched alongside the sample, so a failing
/// invocation is timed just like a successful one.
#[inline]
pub fn measure<T, F>(f: F) -> (T, TimingSample)
where
    F: FnOnce() -> T,
{
    let timer = Timer::start();
    let outcome = f();
    (outcome, timer.stop())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_measure_sleep() {
        let ((), sample) = measure(|| std::thread::sleep(Duration::from_millis(10)));
        let elapsed = sample.elapsed();

        assert!(elapsed >= Duration::from_millis(10));
        // Generous upper bound for loaded CI machines
        assert!(elapsed < Duration::from_millis(200));
        assert!(sample.finished() >= sample.started());
    }

    #[test]
    fn test_measure_times_failures() {
        let (outcome, sample): (Result<(), &str>, _) = measure(|| {
            std::thread::sleep(Duration::from_millis(5));
            Err("boom")
        });

        assert_eq!(outcome, Err("boom"));
        assert!(sample.elapsed() >= Duration::from_millis(5));
    }

    #[test]
    fn test_timer_monotonic() {
        let timer = Timer::start();
        let sample = timer.stop();
        assert!(sample.elapsed() < Duration::from_millis(50));
    }
}
