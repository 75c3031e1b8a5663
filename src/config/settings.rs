//! Configuration settings for DualCopy
//!
//! Defines all configuration options, CLI arguments, and defaults
//! for a replication run.

use crate::error::{DualCopyError, Result};
use crate::tree::DEFAULT_EXCLUSION_MARKER;
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// DualCopy - resumable instructor/public folder replication
#[derive(Parser, Debug, Clone)]
#[command(name = "dualcopy")]
#[command(author = "DualCopy Team")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Replicate a folder tree into a privileged copy and a filtered public copy")]
#[command(long_about = r#"
DualCopy duplicates a folder tree into two copies: a full "(priv)" copy and a
public copy that leaves out anything whose name carries the exclusion marker.
Every copied node is shared with the editor set and stripped of link/domain
sharing. Runs are bounded by a time budget; an interrupted run leaves a
checkpoint that `resume` picks up.

Examples:
  dualcopy --store drive.json start SRC_ID PARENT_ID "Course 2024"
  dualcopy --store drive.json --budget 5m resume
  dualcopy --store drive.json status
"#)]
pub struct CliArgs {
    /// Store snapshot to operate on
    #[arg(long, env = "DUALCOPY_STORE", value_name = "PATH")]
    pub store: PathBuf,

    /// Durable checkpoint file
    #[arg(long, env = "DUALCOPY_STATE", default_value = "dualcopy-state.json", value_name = "PATH")]
    pub state: PathBuf,

    #[command(flatten)]
    pub run: RunArgs,

    /// Verbose output (can be repeated: -v, -vv, -vvv)
    #[arg(short = 'v', long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (no progress bar or summary)
    #[arg(short = 'q', long, global = true)]
    pub quiet: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// Subcommand
    #[command(subcommand)]
    pub command: Commands,
}

/// Options shared by `start` and `resume`
#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Wall-clock budget per invocation (e.g. 5m, 90s); "none" for unbounded
    #[arg(long, default_value = "5m", value_name = "DURATION")]
    pub budget: String,

    /// Number of workers top-level folders are split across
    #[arg(short = 'w', long, default_value = "4", value_name = "NUM")]
    pub workers: usize,

    /// Dispatch workers one after another or concurrently
    #[arg(long, value_enum, default_value = "pooled")]
    pub dispatch: DispatchMode,

    /// Name marker excluding a node from the public copy
    #[arg(long, env = "DUALCOPY_MARKER", default_value = DEFAULT_EXCLUSION_MARKER, value_name = "TEXT")]
    pub marker: String,

    /// Node whose writers/owners become the editor set
    #[arg(long, env = "DUALCOPY_PERMISSIONS_SOURCE", value_name = "ID")]
    pub permissions_source: Option<String>,

    /// Remote call rate limit (e.g. 10, 10/s, 600/m)
    #[arg(long, value_name = "RATE")]
    pub rate_limit: Option<String>,

    /// Pause after each top-level folder (e.g. 200ms)
    #[arg(long, default_value = "200ms", value_name = "DURATION")]
    pub unit_delay: String,

    /// Pause after each group of permission updates
    #[arg(long, default_value = "100ms", value_name = "DURATION")]
    pub permission_delay: String,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Start a new replication
    #[command(name = "start")]
    Start {
        /// Source root folder id
        source: String,
        /// Folder the two destination roots are created in
        parent: String,
        /// Name of the public root; the privileged root gets the prefix
        name: String,
    },

    /// Continue from the saved checkpoint
    #[command(name = "resume")]
    Resume,

    /// Show the saved checkpoint, if any
    #[command(name = "status")]
    Status,

    /// Discard the saved checkpoint
    #[command(name = "clear")]
    Clear,

    /// Print the tree under a node
    #[command(name = "tree")]
    Tree {
        /// Root node id
        id: String,
    },
}

/// How worker slices are dispatched
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DispatchMode {
    /// One slice after another on the calling thread
    Sequential,
    /// One thread per slice, sharing the rate limiter and deadline
    #[default]
    Pooled,
}

/// Runtime configuration for a replication run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplicationConfig {
    /// Substring excluding a node from the public tree
    pub exclusion_marker: String,
    /// Prefix of the privileged root's name
    pub instructor_prefix: String,
    /// Node whose grants define the editor set
    pub permissions_source_id: Option<String>,
    /// Wall-clock budget per invocation; `None` is unbounded
    pub time_budget: Option<Duration>,
    /// Worker count
    pub workers: usize,
    /// Dispatch mode
    pub dispatch: DispatchMode,
    /// Nodes per permission group
    pub permission_batch_size: usize,
    /// Pause after each permission group
    pub permission_batch_delay: Duration,
    /// Pause after each top-level unit
    pub unit_delay: Duration,
    /// Remote calls per minute; `None` is unthrottled
    pub api_calls_per_minute: Option<u32>,
}

impl Default for ReplicationConfig {
    fn default() -> Self {
        Self {
            exclusion_marker: DEFAULT_EXCLUSION_MARKER.to_string(),
            instructor_prefix: DEFAULT_EXCLUSION_MARKER.to_string(),
            permissions_source_id: None,
            time_budget: Some(Duration::from_secs(5 * 60)),
            workers: 4,
            dispatch: DispatchMode::Pooled,
            permission_batch_size: crate::acl::DEFAULT_PERMISSION_BATCH_SIZE,
            permission_batch_delay: Duration::from_millis(100),
            unit_delay: Duration::from_millis(200),
            api_calls_per_minute: None,
        }
    }
}

impl ReplicationConfig {
    /// Configuration with no pauses and no budget, for tests and tooling
    pub fn unthrottled() -> Self {
        Self {
            time_budget: None,
            permission_batch_delay: Duration::ZERO,
            unit_delay: Duration::ZERO,
            ..Default::default()
        }
    }

    /// Name of the privileged destination root
    pub fn instructor_root_name(&self, destination_name: &str) -> String {
        format!("{}{}", self.instructor_prefix, destination_name)
    }

    /// Reject settings the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(DualCopyError::config("worker count must be at least 1"));
        }
        if self.permission_batch_size == 0 {
            return Err(DualCopyError::config("permission batch size must be at least 1"));
        }
        if self.exclusion_marker.is_empty() {
            tracing::warn!("Empty exclusion marker: the public copy will contain everything");
        }
        Ok(())
    }

    /// Build from CLI run options
    pub fn from_cli(args: &RunArgs) -> Result<Self> {
        let rate = match &args.rate_limit {
            Some(rate) => Some(
                crate::store::ApiLimiter::parse_calls_per_minute(rate)
                    .ok_or_else(|| DualCopyError::config(format!("Invalid rate limit: {}", rate)))?,
            ),
            None => None,
        };

        let config = Self {
            exclusion_marker: args.marker.clone(),
            permissions_source_id: args.permissions_source.clone(),
            time_budget: parse_budget(&args.budget)?,
            workers: args.workers,
            dispatch: args.dispatch,
            unit_delay: parse_duration(&args.unit_delay)?,
            permission_batch_delay: parse_duration(&args.permission_delay)?,
            api_calls_per_minute: rate,
            ..Default::default()
        };
        config.validate()?;
        Ok(config)
    }
}

/// Parse a human-readable duration ("5m", "90s", "250ms")
pub fn parse_duration(text: &str) -> Result<Duration> {
    humantime::parse_duration(text.trim())
        .map_err(|e| DualCopyError::config(format!("Invalid duration '{}': {}", text, e)))
}

/// Parse a budget; "none", "unbounded" and "0" disable the deadline
pub fn parse_budget(text: &str) -> Result<Option<Duration>> {
    match text.trim().to_lowercase().as_str() {
        "none" | "unbounded" | "0" => Ok(None),
        other => parse_duration(other).map(Some),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_budget() {
        assert_eq!(parse_budget("5m").unwrap(), Some(Duration::from_secs(300)));
        assert_eq!(parse_budget("90s").unwrap(), Some(Duration::from_secs(90)));
        assert_eq!(parse_budget("none").unwrap(), None);
        assert!(parse_budget("soon").is_err());
    }

    #[test]
    fn test_instructor_root_name() {
        let config = ReplicationConfig::default();
        assert_eq!(config.instructor_root_name("Course"), "(priv)Course");
    }

    #[test]
    fn test_validate() {
        let mut config = ReplicationConfig::unthrottled();
        assert!(config.validate().is_ok());
        config.workers = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_cli() {
        let args = CliArgs::parse_from([
            "dualcopy",
            "--store",
            "drive.json",
            "--budget",
            "2m",
            "--workers",
            "3",
            "--rate-limit",
            "600/m",
            "start",
            "src",
            "parent",
            "Course",
        ]);
        let config = ReplicationConfig::from_cli(&args.run).unwrap();
        assert_eq!(config.time_budget, Some(Duration::from_secs(120)));
        assert_eq!(config.workers, 3);
        assert_eq!(config.api_calls_per_minute, Some(600));
        assert!(matches!(args.command, Commands::Start { .. }));
    }

    #[test]
    fn test_sub_second_rates_are_not_rounded() {
        for (rate, expected) in [("30/m", 30), ("90/m", 90), ("2/s", 120)] {
            let args = CliArgs::parse_from(["dualcopy", "--store", "d.json", "--rate-limit", rate, "resume"]);
            let config = ReplicationConfig::from_cli(&args.run).unwrap();
            assert_eq!(config.api_calls_per_minute, Some(expected), "{}", rate);
        }

        let args = CliArgs::parse_from(["dualcopy", "--store", "d.json", "--rate-limit", "0/m", "resume"]);
        assert!(ReplicationConfig::from_cli(&args.run).is_err());
    }
}
