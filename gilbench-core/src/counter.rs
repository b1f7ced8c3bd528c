//! Shared Counter
//!
//! A single integer mutated concurrently by several threads. [`RacyCounter`]
//! reads and writes the cell in two separate steps, so increments from
//! different threads can interleave and overwrite each other. That loss is
//! the point of the demonstration and is not to be fixed here.
//! [`LockedCounter`] holds a mutex guard across the whole read-modify-write,
//! so its final value is always exact.

use std::hint::black_box;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

/// An integer cell shared between threads
pub trait Counter: Sync {
    /// Add one
    fn increment(&self);

    /// Current value
    fn value(&self) -> u64;

    /// Set back to zero
    fn reset(&self);

    /// Label used in reports
    fn name(&self) -> &'static str;
}

/// Counter whose increment is a plain load followed by a plain store.
///
/// Every access is atomic on its own, so there is no undefined behaviour,
/// but nothing stops another thread from storing between our load and our
/// store. The later store wins and the other increment is lost.
#[derive(Debug, Default)]
pub struct RacyCounter {
    cell: AtomicU64,
}

impl RacyCounter {
    /// New counter at zero
    pub fn new() -> Self {
        Self::default()
    }
}

impl Counter for RacyCounter {
    #[inline(never)]
    fn increment(&self) {
        let current = self.cell.load(Ordering::Relaxed);
        // Widen the window between read and write
        let next = black_box(current) + 1;
        self.cell.store(next, Ordering::Relaxed);
    }

    fn value(&self) -> u64 {
        self.cell.load(Ordering::SeqCst)
    }

    fn reset(&self) {
        self.cell.store(0, Ordering::SeqCst);
    }

    fn name(&self) -> &'static str {
        "racy"
    }
}

/// Counter guarded by a mutex held for the full read-modify-write
#[derive(Debug, Default)]
pub struct LockedCounter {
    cell: Mutex<u64>,
}

impl LockedCounter {
    /// New counter at zero
    pub fn new() -> Self {
        Self::default()
    }

    fn with_guard<T>(&self, f: impl FnOnce(&mut u64) -> T) -> T {
        // A poisoned lock still holds a consistent u64
        let mut guard = self.cell.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut guard)
    }
}

impl Counter for LockedCounter {
    fn increment(&self) {
        self.with_guard(|value| {
            let current = *value;
            *value = black_box(current) + 1;
        });
    }

    fn value(&self) -> u64 {
        self.with_guard(|value| *value)
    }

    fn reset(&self) {
        self.with_guard(|value| *value = 0);
    }

    fn name(&self) -> &'static str {
        "locked"
    }
}

/// Result of one race between threads on a shared counter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RaceOutcome {
    /// threads × increments
    pub expected: u64,
    /// Final counter value
    pub actual: u64,
    /// Increments that were overwritten
    pub lost: u64,
}

impl RaceOutcome {
    /// True when no increment was lost
    pub fn is_exact(&self) -> bool {
        self.lost == 0
    }
}

/// Reset `counter`, then let `threads` threads each increment it
/// `increments` times.
///
/// The threads are scoped to this call and joined before it returns.
pub fn race<C: Counter + ?Sized>(counter: &C, threads: usize, increments: u64) -> RaceOutcome {
    counter.reset();

    std::thread::scope(|scope| {
        for _ in 0..threads {
            scope.spawn(|| {
                for _ in 0..increments {
                    counter.increment();
                }
            });
        }
    });

    let expected = (threads as u64).saturating_mul(increments);
    let actual = counter.value();
    tracing::debug!(
        counter = counter.name(),
        threads,
        increments,
        actual,
        "race finished"
    );
    RaceOutcome {
        expected,
        actual,
        lost: expected.saturating_sub(actual),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cores() -> usize {
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    }

    #[test]
    fn test_single_thread_is_exact_for_both() {
        assert!(race(&RacyCounter::new(), 1, 10_000).is_exact());
        assert!(race(&LockedCounter::new(), 1, 10_000).is_exact());
    }

    #[test]
    fn test_locked_counter_never_loses() {
        let counter = LockedCounter::new();
        for _ in 0..5 {
            let outcome = race(&counter, 5, 20_000);
            assert_eq!(outcome.expected, 100_000);
            assert_eq!(outcome.actual, 100_000);
            assert_eq!(outcome.lost, 0);
        }
    }

    #[test]
    fn test_racy_counter_never_exceeds_expected() {
        let counter = RacyCounter::new();
        for _ in 0..5 {
            let outcome = race(&counter, 4, 50_000);
            assert!(outcome.actual <= outcome.expected);
            assert_eq!(outcome.lost, outcome.expected - outcome.actual);
        }
    }

    #[test]
    fn test_racy_counter_loses_increments() {
        if cores() < 2 {
            eprintln!("skipping: needs at least 2 cores");
            return;
        }
        let counter = RacyCounter::new();
        let lost_once = (0..50).any(|_| !race(&counter, 4, 200_000).is_exact());
        assert!(lost_once, "no lost update observed in 50 trials");
    }

    #[test]
    fn test_race_resets_counter() {
        let counter = LockedCounter::new();
        counter.increment();
        counter.increment();
        let outcome = race(&counter, 2, 3);
        assert_eq!(outcome.actual, 6);
    }

    #[test]
    fn test_zero_threads() {
        let outcome = race(&RacyCounter::new(), 0, 1_000);
        assert_eq!(outcome, RaceOutcome { expected: 0, actual: 0, lost: 0 });
    }

    #[test]
    fn test_counter_through_trait_object() {
        let counters: Vec<Box<dyn Counter>> =
            vec![Box::new(RacyCounter::new()), Box::new(LockedCounter::new())];
        let names: Vec<_> = counters.iter().map(|c| c.name()).collect();
        assert_eq!(names, vec!["racy", "locked"]);
        assert!(race(counters[1].as_ref(), 3, 1_000).is_exact());
    }
}
