//! Replication runs
//!
//! Ties the pieces together for one invocation: derive the editor set, create
//! (or reopen) the destination roots, copy the root files, then hand the
//! top-level folders to the scheduler. When the budget trips the run ends with
//! a saved [`Checkpoint`]; when every folder completes the checkpoint is
//! cleared. Failures before dispatch abort the run and leave state untouched.

use crate::acl::{EditorSet, PermissionSync};
use crate::config::ReplicationConfig;
use crate::core::{BatchScheduler, DestinationPair, Replicator, TimeBudget, WorkUnit};
use crate::error::{DualCopyError, Result};
use crate::progress::{ProgressReporter, RunStats, RunSummary};
use crate::store::{ApiLimiter, DocumentStore, Node, ThrottledStore};
use crate::sync::{Checkpoint, CheckpointManager, StateStore};
use crate::tree::{FilterPolicy, Scanner};
use std::sync::Arc;

/// How an invocation ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every top-level folder was replicated; no checkpoint remains
    Completed(RunSummary),
    /// The budget ran out; `checkpoint` was persisted
    Suspended {
        /// Saved progress
        checkpoint: Checkpoint,
        /// Counters of this invocation
        summary: RunSummary,
    },
    /// `resume` found no checkpoint
    NothingToResume,
    /// A fatal error ended the run before or instead of dispatch
    Aborted(String),
}

impl RunOutcome {
    /// Check if the run finished cleanly
    pub fn is_complete(&self) -> bool {
        matches!(self, RunOutcome::Completed(_))
    }

    /// Check if the run left a checkpoint
    pub fn is_suspended(&self) -> bool {
        matches!(self, RunOutcome::Suspended { .. })
    }

    /// Checkpoint written by a suspension
    pub fn checkpoint(&self) -> Option<&Checkpoint> {
        match self {
            RunOutcome::Suspended { checkpoint, .. } => Some(checkpoint),
            _ => None,
        }
    }

    /// Counters of this invocation, when it reached dispatch
    pub fn summary(&self) -> Option<&RunSummary> {
        match self {
            RunOutcome::Completed(summary) | RunOutcome::Suspended { summary, .. } => Some(summary),
            _ => None,
        }
    }
}

/// Entry point for starting and resuming replications
pub struct Replication {
    store: Arc<dyn DocumentStore>,
    checkpoints: CheckpointManager,
    config: ReplicationConfig,
    progress: Option<Arc<ProgressReporter>>,
}

impl Replication {
    /// Create a replication over `store`, keeping its checkpoint in `state`.
    ///
    /// With `api_calls_per_minute` set, every store call goes through one shared
    /// token bucket.
    pub fn new(store: Arc<dyn DocumentStore>, state: Arc<dyn StateStore>, config: ReplicationConfig) -> Self {
        let store = match config.api_calls_per_minute {
            Some(rate) => {
                let limiter = ApiLimiter::per_minute(rate);
                tracing::debug!("Throttling store calls to {}/min", limiter.calls_per_minute());
                Arc::new(ThrottledStore::new(store, limiter)) as Arc<dyn DocumentStore>
            }
            None => store,
        };

        Self {
            store,
            checkpoints: CheckpointManager::new(state),
            config,
            progress: None,
        }
    }

    /// Set progress reporter
    pub fn with_progress(mut self, progress: Arc<ProgressReporter>) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Configuration in use
    pub fn config(&self) -> &ReplicationConfig {
        &self.config
    }

    /// Checkpoint access
    pub fn checkpoints(&self) -> &CheckpointManager {
        &self.checkpoints
    }

    /// Replicate `source_root_id` into two new roots under
    /// `destination_parent_id`: `"(priv)" + destination_name` and
    /// `destination_name`.
    pub fn start(
        &self,
        source_root_id: &str,
        destination_parent_id: &str,
        destination_name: &str,
        worker_count: usize,
    ) -> RunOutcome {
        let budget = TimeBudget::new(self.config.time_budget);
        self.start_with_budget(source_root_id, destination_parent_id, destination_name, worker_count, budget)
    }

    /// [`start`](Self::start) with an explicit budget
    pub fn start_with_budget(
        &self,
        source_root_id: &str,
        destination_parent_id: &str,
        destination_name: &str,
        worker_count: usize,
        budget: TimeBudget,
    ) -> RunOutcome {
        let result = self.try_start(
            source_root_id,
            destination_parent_id,
            destination_name,
            worker_count,
            Arc::new(budget),
        );
        self.conclude("start", result)
    }

    /// Continue the run recorded in the checkpoint with a fresh budget
    pub fn resume(&self) -> RunOutcome {
        self.resume_with_budget(TimeBudget::new(self.config.time_budget))
    }

    /// [`resume`](Self::resume) with an explicit budget
    pub fn resume_with_budget(&self, budget: TimeBudget) -> RunOutcome {
        let result = self.try_resume(Arc::new(budget));
        self.conclude("resume", result)
    }

    fn conclude(&self, operation: &str, result: Result<RunOutcome>) -> RunOutcome {
        match result {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!("Replication {} aborted: {}", operation, e);
                if let Some(progress) = &self.progress {
                    progress.finish_error(&format!("Aborted: {}", e));
                }
                RunOutcome::Aborted(e.to_string())
            }
        }
    }

    fn try_start(
        &self,
        source_root_id: &str,
        destination_parent_id: &str,
        destination_name: &str,
        worker_count: usize,
        budget: Arc<TimeBudget>,
    ) -> Result<RunOutcome> {
        if let Ok(Some(pending)) = self.checkpoints.load() {
            tracing::warn!("Starting over a pending checkpoint ({})", pending);
        }

        let source = self.folder(source_root_id)?;
        let parent = self.folder(destination_parent_id)?;
        let stats = Arc::new(RunStats::default());
        let replicator = self.replicator(Arc::clone(&budget), Arc::clone(&stats))?;

        let instructor = self
            .store
            .create_folder(&parent.id, &self.config.instructor_root_name(destination_name))
            .map_err(|e| e.with_context("creating privileged root"))?;
        RunStats::bump(&stats.folders_created);
        let public = self
            .store
            .create_folder(&parent.id, destination_name)
            .map_err(|e| e.with_context("creating public root"))?;
        RunStats::bump(&stats.folders_created);

        let pair = DestinationPair { instructor, public };
        tracing::info!("Replicating {} into {} and {}", source, pair.instructor, pair.public);
        replicator.secure_pair(&pair);

        self.status("Copying root files");
        replicator.copy_root_files(&source, &pair);

        let units = WorkUnit::from_folders(Scanner::new(Arc::clone(&self.store)).folders(&source)?);
        self.dispatch(&replicator, &source, &pair, units, 0, worker_count, &budget, &stats)
    }

    fn try_resume(&self, budget: Arc<TimeBudget>) -> Result<RunOutcome> {
        let checkpoint = match self.checkpoints.load()? {
            Some(checkpoint) => checkpoint,
            None => {
                tracing::info!("No checkpoint found; nothing to resume");
                return Ok(RunOutcome::NothingToResume);
            }
        };
        tracing::info!("Resuming: {}", checkpoint);

        let source = self.folder(&checkpoint.source_root_id)?;
        let pair = DestinationPair {
            instructor: self.folder(&checkpoint.instructor_root_id)?,
            public: self.folder(&checkpoint.public_root_id)?,
        };
        let folders = Scanner::new(Arc::clone(&self.store)).folders(&source)?;

        let stats = Arc::new(RunStats::default());
        let replicator = self.replicator(Arc::clone(&budget), Arc::clone(&stats))?;

        if checkpoint.processed_count == 0 {
            self.status("Copying root files");
            replicator.copy_root_files(&source, &pair);
        }

        let offset = checkpoint.processed_count.min(folders.len());
        if offset < checkpoint.processed_count {
            tracing::warn!(
                "Checkpoint counts {} folders but the source now has {}",
                checkpoint.processed_count,
                folders.len()
            );
        }
        let units: Vec<WorkUnit> = WorkUnit::from_folders(folders).into_iter().skip(offset).collect();

        self.dispatch(&replicator, &source, &pair, units, offset, self.config.workers, &budget, &stats)
    }

    #[allow(clippy::too_many_arguments)]
    fn dispatch(
        &self,
        replicator: &Replicator,
        source: &Node,
        pair: &DestinationPair,
        units: Vec<WorkUnit>,
        offset: usize,
        workers: usize,
        budget: &Arc<TimeBudget>,
        stats: &Arc<RunStats>,
    ) -> Result<RunOutcome> {
        if let Some(progress) = &self.progress {
            progress.set_total_units(units.len() as u64);
        }
        self.status("Replicating folders");

        let mut scheduler = BatchScheduler::new(workers, self.config.dispatch, Arc::clone(budget))
            .with_unit_delay(self.config.unit_delay);
        if let Some(progress) = &self.progress {
            scheduler = scheduler.with_progress(Arc::clone(progress));
        }

        let report = scheduler.dispatch(&units, |unit| {
            let done = replicator.replicate_unit(unit, pair);
            if done {
                RunStats::bump(&stats.units_completed);
            }
            done
        });
        let summary = stats.snapshot(budget.elapsed());

        if report.all_complete() {
            if let Err(e) = self.checkpoints.clear() {
                tracing::error!("Run complete but the checkpoint could not be cleared: {}", e);
            }
            tracing::info!("Replication complete: {} folders", offset + units.len());
            if let Some(progress) = &self.progress {
                progress.finish_success("Replication complete");
            }
            return Ok(RunOutcome::Completed(summary));
        }

        let checkpoint = Checkpoint::new(
            pair.instructor.id.clone(),
            pair.public.id.clone(),
            source.id.clone(),
            offset + report.completed_prefix(),
        );
        self.checkpoints.save(&checkpoint)?;
        tracing::info!(
            "Time budget reached after {}; run `resume` to continue",
            humantime::format_duration(std::time::Duration::from_secs(budget.elapsed().as_secs()))
        );
        if let Some(progress) = &self.progress {
            progress.finish_suspended("Suspended, checkpoint saved");
        }
        Ok(RunOutcome::Suspended { checkpoint, summary })
    }

    fn replicator(&self, budget: Arc<TimeBudget>, stats: Arc<RunStats>) -> Result<Replicator> {
        let editors = EditorSet::derive(self.store.as_ref(), self.config.permissions_source_id.as_deref())?;
        let permissions = PermissionSync::new(Arc::clone(&self.store), Arc::new(editors), Arc::clone(&stats))
            .with_batching(self.config.permission_batch_size, self.config.permission_batch_delay);

        Ok(Replicator::new(
            Arc::clone(&self.store),
            permissions,
            budget,
            stats,
            FilterPolicy::public(self.config.exclusion_marker.clone()),
        )
        .with_file_batch_size(self.config.permission_batch_size))
    }

    fn folder(&self, id: &str) -> Result<Node> {
        let node = self.store.get_node(id)?;
        if !node.is_folder() {
            return Err(DualCopyError::NotAFolder(node.id));
        }
        Ok(node)
    }

    fn status(&self, message: &str) {
        if let Some(progress) = &self.progress {
            progress.set_status(message);
        }
    }
}
