//! Run counters

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Counters updated by every worker during a run
#[derive(Debug, Default)]
pub struct RunStats {
    /// Files copied into either tree
    pub files_copied: AtomicU64,
    /// Folders created in either tree
    pub folders_created: AtomicU64,
    /// Destination nodes found already present and reused
    pub nodes_reused: AtomicU64,
    /// Source nodes left out of the public tree
    pub nodes_excluded: AtomicU64,
    /// Open grants removed
    pub grants_removed: AtomicU64,
    /// Writer grants inserted
    pub grants_inserted: AtomicU64,
    /// Per-item failures that were logged and skipped
    pub failures: AtomicU64,
    /// Top-level units fully replicated
    pub units_completed: AtomicU64,
}

impl RunStats {
    /// Add one to a counter
    pub fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Freeze the counters into a plain summary
    pub fn snapshot(&self, elapsed: Duration) -> RunSummary {
        RunSummary {
            files_copied: self.files_copied.load(Ordering::Relaxed),
            folders_created: self.folders_created.load(Ordering::Relaxed),
            nodes_reused: self.nodes_reused.load(Ordering::Relaxed),
            nodes_excluded: self.nodes_excluded.load(Ordering::Relaxed),
            grants_removed: self.grants_removed.load(Ordering::Relaxed),
            grants_inserted: self.grants_inserted.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            units_completed: self.units_completed.load(Ordering::Relaxed),
            elapsed,
        }
    }
}

/// Point-in-time copy of [`RunStats`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Files copied into either tree
    pub files_copied: u64,
    /// Folders created in either tree
    pub folders_created: u64,
    /// Destination nodes reused
    pub nodes_reused: u64,
    /// Nodes left out of the public tree
    pub nodes_excluded: u64,
    /// Open grants removed
    pub grants_removed: u64,
    /// Writer grants inserted
    pub grants_inserted: u64,
    /// Per-item failures
    pub failures: u64,
    /// Top-level units fully replicated
    pub units_completed: u64,
    /// Wall-clock time of the run
    pub elapsed: Duration,
}

impl RunSummary {
    /// Check if no per-item failure was recorded
    pub fn is_clean(&self) -> bool {
        self.failures == 0
    }

    /// Print summary to console
    pub fn print_summary(&self) {
        println!("\n{}", console::style("=== Replication Summary ===").bold());
        println!("Units completed: {}", self.units_completed);
        println!("Files copied:    {}", self.files_copied);
        println!("Folders created: {}", self.folders_created);
        println!("Reused:          {}", self.nodes_reused);
        println!("Excluded:        {}", self.nodes_excluded);
        println!("Grants removed:  {}", self.grants_removed);
        println!("Grants added:    {}", self.grants_inserted);
        println!("Duration:        {}", humantime::format_duration(round_to_millis(self.elapsed)));

        if self.failures > 0 {
            println!("\n{}", console::style(format!("Failures: {} (see log)", self.failures)).yellow());
        }
    }
}

fn round_to_millis(d: Duration) -> Duration {
    Duration::from_millis(d.as_millis() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot() {
        let stats = RunStats::default();
        RunStats::bump(&stats.files_copied);
        RunStats::bump(&stats.files_copied);
        RunStats::bump(&stats.failures);

        let summary = stats.snapshot(Duration::from_secs(3));
        assert_eq!(summary.files_copied, 2);
        assert!(!summary.is_clean());
        assert_eq!(summary.elapsed, Duration::from_secs(3));
    }
}
