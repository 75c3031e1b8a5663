//! Batch scheduling of top-level units
//!
//! Splits the pending top-level folders into contiguous worker slices of
//! `ceil(n / W)` units and dispatches them either one slice after another or
//! with one thread per slice. Every unit is gated on the shared time budget
//! and followed by a short pause; nothing already started is rolled back.

use crate::config::DispatchMode;
use crate::core::{TimeBudget, WorkUnit};
use crate::progress::ProgressReporter;
use crossbeam::channel::unbounded;
use std::sync::Arc;
use std::time::Duration;

/// Split `items` into at most `workers` contiguous slices of `ceil(n / workers)`
pub fn partition<T>(items: &[T], workers: usize) -> Vec<&[T]> {
    if items.is_empty() {
        return Vec::new();
    }
    let slice_len = items.len().div_ceil(workers.max(1));
    items.chunks(slice_len).collect()
}

/// Outcome of dispatching a list of units
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchReport {
    /// Per-unit completion, in input order
    pub completed: Vec<bool>,
}

impl DispatchReport {
    /// Length of the leading run of completed units
    pub fn completed_prefix(&self) -> usize {
        self.completed.iter().take_while(|done| **done).count()
    }

    /// Check if every unit completed
    pub fn all_complete(&self) -> bool {
        self.completed.iter().all(|done| *done)
    }

    /// Number of completed units, wherever they are
    pub fn completed_count(&self) -> usize {
        self.completed.iter().filter(|done| **done).count()
    }
}

/// Task scheduler for top-level units
pub struct BatchScheduler {
    workers: usize,
    mode: DispatchMode,
    unit_delay: Duration,
    budget: Arc<TimeBudget>,
    progress: Option<Arc<ProgressReporter>>,
}

impl BatchScheduler {
    /// Create a scheduler with `workers` slices
    pub fn new(workers: usize, mode: DispatchMode, budget: Arc<TimeBudget>) -> Self {
        Self {
            workers: workers.max(1),
            mode,
            unit_delay: Duration::ZERO,
            budget,
            progress: None,
        }
    }

    /// Pause after every unit
    pub fn with_unit_delay(mut self, delay: Duration) -> Self {
        self.unit_delay = delay;
        self
    }

    /// Set progress reporter
    pub fn with_progress(mut self, progress: Arc<ProgressReporter>) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Run `run_unit` over `units`; it returns `false` when the unit was cut short.
    pub fn dispatch<F>(&self, units: &[WorkUnit], run_unit: F) -> DispatchReport
    where
        F: Fn(&WorkUnit) -> bool + Sync,
    {
        let slices = partition(units, self.workers);
        tracing::info!(
            "Dispatching {} units over {} slices ({:?})",
            units.len(),
            slices.len(),
            self.mode
        );

        let mut completed = vec![false; units.len()];
        match self.mode {
            DispatchMode::Sequential => {
                let mut offset = 0;
                for slice in &slices {
                    if self.budget.is_exceeded() {
                        break;
                    }
                    self.run_slice(slice, offset, &run_unit, |position, done| {
                        completed[position] = done;
                    });
                    offset += slice.len();
                }
            }
            DispatchMode::Pooled => {
                let (tx, rx) = unbounded::<(usize, bool)>();
                std::thread::scope(|scope| {
                    let mut offset = 0;
                    for (worker_id, slice) in slices.iter().enumerate() {
                        let tx = tx.clone();
                        let run_unit = &run_unit;
                        let start = offset;
                        scope.spawn(move || {
                            self.run_slice(slice, start, run_unit, |position, done| {
                                let _ = tx.send((position, done));
                            });
                            tracing::debug!("Worker {} finished its slice", worker_id);
                        });
                        offset += slice.len();
                    }
                    drop(tx);

                    for (position, done) in rx.iter() {
                        completed[position] = done;
                    }
                });
            }
        }

        let report = DispatchReport { completed };
        tracing::info!(
            "Dispatch finished: {}/{} units complete",
            report.completed_count(),
            units.len()
        );
        report
    }

    fn run_slice<F, R>(&self, slice: &[WorkUnit], offset: usize, run_unit: &F, mut record: R)
    where
        F: Fn(&WorkUnit) -> bool + Sync,
        R: FnMut(usize, bool),
    {
        for (i, unit) in slice.iter().enumerate() {
            if self.budget.is_exceeded() {
                tracing::debug!("Budget exhausted before {}", unit.folder);
                return;
            }

            let done = run_unit(unit);
            record(offset + i, done);

            if done {
                if let Some(progress) = &self.progress {
                    progress.unit_done(&unit.folder.name);
                }
            }
            if !self.unit_delay.is_zero() {
                std::thread::sleep(self.unit_delay);
            }
            if !done {
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Node, NodeKind};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn units(n: usize) -> Vec<WorkUnit> {
        WorkUnit::from_folders(
            (0..n)
                .map(|i| Node {
                    id: format!("f{}", i),
                    name: format!("folder{}", i),
                    kind: NodeKind::Folder,
                })
                .collect(),
        )
    }

    #[test]
    fn test_partition_sizes() {
        let items: Vec<u32> = (0..10).collect();
        let slices = partition(&items, 3);
        assert_eq!(slices.iter().map(|s| s.len()).collect::<Vec<_>>(), vec![4, 4, 2]);
        assert_eq!(slices[1], &[4, 5, 6, 7]);

        assert_eq!(partition(&items, 20).len(), 10);
        assert!(partition::<u32>(&[], 4).is_empty());
        assert_eq!(partition(&items, 0).len(), 1);
    }

    #[test]
    fn test_sequential_runs_everything_in_order() {
        let scheduler = BatchScheduler::new(3, DispatchMode::Sequential, Arc::new(TimeBudget::unbounded()));
        let order = std::sync::Mutex::new(Vec::new());

        let report = scheduler.dispatch(&units(7), |unit| {
            order.lock().unwrap().push(unit.index);
            true
        });

        assert!(report.all_complete());
        assert_eq!(*order.lock().unwrap(), (0..7).collect::<Vec<_>>());
    }

    #[test]
    fn test_pooled_runs_everything() {
        let scheduler = BatchScheduler::new(4, DispatchMode::Pooled, Arc::new(TimeBudget::unbounded()));
        let count = AtomicUsize::new(0);

        let report = scheduler.dispatch(&units(9), |_| {
            count.fetch_add(1, Ordering::SeqCst);
            true
        });

        assert_eq!(count.load(Ordering::SeqCst), 9);
        assert_eq!(report.completed_prefix(), 9);
    }

    #[test]
    fn test_budget_stops_sequential_dispatch() {
        // slice boundary check + two unit checks pass, then the guard trips
        let budget = Arc::new(TimeBudget::after_checks(3));
        let scheduler = BatchScheduler::new(1, DispatchMode::Sequential, budget);

        let report = scheduler.dispatch(&units(5), |_| true);
        assert!(!report.all_complete());
        assert_eq!(report.completed_prefix(), 2);
        assert_eq!(report.completed_count(), 2);
    }

    #[test]
    fn test_cut_short_unit_ends_its_slice() {
        let scheduler = BatchScheduler::new(1, DispatchMode::Sequential, Arc::new(TimeBudget::unbounded()));
        let report = scheduler.dispatch(&units(4), |unit| unit.index != 1);

        assert_eq!(report.completed, vec![true, false, false, false]);
        assert_eq!(report.completed_prefix(), 1);
    }

    #[test]
    fn test_prefix_ignores_out_of_order_completion() {
        let report = DispatchReport {
            completed: vec![true, false, true, true],
        };
        assert_eq!(report.completed_prefix(), 1);
        assert_eq!(report.completed_count(), 3);
    }
}
