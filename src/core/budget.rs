//! Wall-clock time budget
//!
//! A run gets one deadline measured from its start. Workers consult it before
//! claiming the next unit of work; nothing in flight is ever interrupted. Once
//! the deadline has been observed as passed the guard stays tripped, so every
//! worker sees the same answer from then on.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Deadline shared by all workers of a run
#[derive(Debug)]
pub struct TimeBudget {
    started: Instant,
    limit: Option<Duration>,
    check_limit: Option<u64>,
    checks: AtomicU64,
    tripped: AtomicBool,
}

impl TimeBudget {
    /// Start a budget of `limit` from now; `None` never expires
    pub fn new(limit: Option<Duration>) -> Self {
        Self {
            started: Instant::now(),
            limit,
            check_limit: None,
            checks: AtomicU64::new(0),
            tripped: AtomicBool::new(false),
        }
    }

    /// Budget that allows `checks` passing checks and trips on the next one.
    /// Replays a suspension at the same point every time.
    pub fn after_checks(checks: u64) -> Self {
        Self {
            check_limit: Some(checks),
            ..Self::unbounded()
        }
    }

    /// Budget that never expires
    pub fn unbounded() -> Self {
        Self::new(None)
    }

    /// Check the deadline, latching the result once it has passed
    pub fn is_exceeded(&self) -> bool {
        if self.tripped.load(Ordering::Acquire) {
            return true;
        }
        if let Some(check_limit) = self.check_limit {
            if self.checks.fetch_add(1, Ordering::AcqRel) >= check_limit {
                self.tripped.store(true, Ordering::Release);
                return true;
            }
        }
        match self.limit {
            Some(limit) if self.started.elapsed() >= limit => {
                if !self.tripped.swap(true, Ordering::AcqRel) {
                    tracing::info!("Time budget of {:?} exhausted", limit);
                }
                true
            }
            _ => false,
        }
    }

    /// Time since the run started
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unbounded_never_trips() {
        let budget = TimeBudget::unbounded();
        for _ in 0..100 {
            assert!(!budget.is_exceeded());
        }
    }

    #[test]
    fn test_zero_budget_trips_immediately() {
        let budget = TimeBudget::new(Some(Duration::ZERO));
        assert!(budget.is_exceeded());
    }

    #[test]
    fn test_trip_is_seen_by_every_worker() {
        let budget = std::sync::Arc::new(TimeBudget::after_checks(0));
        assert!(budget.is_exceeded());

        std::thread::scope(|s| {
            for _ in 0..4 {
                let budget = std::sync::Arc::clone(&budget);
                s.spawn(move || assert!(budget.is_exceeded()));
            }
        });
    }

    #[test]
    fn test_check_limited_budget() {
        let budget = TimeBudget::after_checks(2);
        assert!(!budget.is_exceeded());
        assert!(!budget.is_exceeded());
        assert!(budget.is_exceeded());
        assert!(budget.is_exceeded());
    }

    #[test]
    fn test_short_budget_elapses() {
        let budget = TimeBudget::new(Some(Duration::from_millis(10)));
        std::thread::sleep(Duration::from_millis(20));
        assert!(budget.is_exceeded());
    }
}
