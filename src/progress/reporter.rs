//! Progress reporter implementation
//!
//! Uses indicatif for a unit-level progress bar with a status spinner.

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::sync::atomic::{AtomicU64, Ordering};

/// Progress reporter for replication runs
pub struct ProgressReporter {
    /// Multi-progress container
    multi: MultiProgress,
    /// Top-level unit progress bar
    units_bar: ProgressBar,
    /// Current status message
    status: ProgressBar,
    /// Units finished so far
    units_done: AtomicU64,
}

impl ProgressReporter {
    /// Create a new progress reporter
    pub fn new() -> Self {
        let multi = MultiProgress::new();

        let status = multi.add(ProgressBar::new_spinner());
        status.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );

        let units_bar = multi.add(ProgressBar::new(0));
        units_bar.set_style(
            ProgressStyle::default_bar()
                .template("{prefix:.bold.dim} [{bar:40.cyan/blue}] {pos}/{len} folders ({elapsed})")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> "),
        );
        units_bar.set_prefix("Units");

        Self {
            multi,
            units_bar,
            status,
            units_done: AtomicU64::new(0),
        }
    }

    /// Create a disabled progress reporter (for quiet mode and tests)
    pub fn disabled() -> Self {
        let reporter = Self::new();
        reporter.multi.set_draw_target(ProgressDrawTarget::hidden());
        reporter
    }

    /// Set the number of units this run will attempt
    pub fn set_total_units(&self, total: u64) {
        self.units_bar.set_length(total);
    }

    /// Record one finished unit
    pub fn unit_done(&self, name: &str) {
        self.units_done.fetch_add(1, Ordering::Relaxed);
        self.units_bar.inc(1);
        self.status.set_message(format!("finished {}", name));
    }

    /// Set current status message
    pub fn set_status(&self, msg: &str) {
        self.status.set_message(msg.to_string());
    }

    /// Units finished so far
    pub fn units_done(&self) -> u64 {
        self.units_done.load(Ordering::Relaxed)
    }

    /// Finish progress with success message
    pub fn finish_success(&self, message: &str) {
        self.status.finish_with_message(format!("✓ {}", message));
        self.units_bar.finish();
    }

    /// Finish progress leaving the bar where it stopped
    pub fn finish_suspended(&self, message: &str) {
        self.status.finish_with_message(format!("‖ {}", message));
        self.units_bar.abandon();
    }

    #[cfg(test)]
    pub(crate) fn status_message(&self) -> String {
        self.status.message()
    }

    /// Finish progress with error message
    pub fn finish_error(&self, message: &str) {
        self.status.finish_with_message(format!("✗ {}", message));
        self.units_bar.abandon();
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}
