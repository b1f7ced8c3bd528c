//! Speedup ratios

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Baseline elapsed time divided by candidate elapsed time.
///
/// A zero candidate is reported through a sentinel instead of dividing by
/// zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum Speedup {
    /// Finite ratio (1.0 = same, >1.0 = faster than baseline)
    Ratio(f64),
    /// Candidate took no measurable time, baseline did
    Infinite,
    /// Neither run took measurable time
    Undefined,
}

impl Speedup {
    /// Compute the speedup of `candidate` relative to `baseline`.
    pub fn compute(baseline: Duration, candidate: Duration) -> Self {
        match (baseline.is_zero(), candidate.is_zero()) {
            (_, false) => Speedup::Ratio(baseline.as_secs_f64() / candidate.as_secs_f64()),
            (false, true) => Speedup::Infinite,
            (true, true) => Speedup::Undefined,
        }
    }

    /// The ratio, if finite
    pub fn ratio(&self) -> Option<f64> {
        match *self {
            Speedup::Ratio(r) => Some(r),
            Speedup::Infinite | Speedup::Undefined => None,
        }
    }
}

impl fmt::Display for Speedup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Speedup::Ratio(r) => write!(f, "{r:.2}x"),
            Speedup::Infinite => write!(f, "inf"),
            Speedup::Undefined => write!(f, "n/a"),
        }
    }
}
