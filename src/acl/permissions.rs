//! Grant reconciliation
//!
//! Brings a node's grants to "editor set, nothing open": every `anyone` and
//! `domain` grant is removed and each editor holds write access. Each remote
//! call is attempted independently; a failure is logged and counted, never
//! raised, so one bad grant cannot stall a batch.

use super::EditorSet;
use crate::progress::RunStats;
use crate::store::{DocumentStore, Node, Role};
use std::sync::Arc;
use std::time::Duration;

/// Nodes synchronized per group before pausing
pub const DEFAULT_PERMISSION_BATCH_SIZE: usize = 5;

/// Outcome of synchronizing one or more nodes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Open grants removed
    pub removed: usize,
    /// Writer grants inserted
    pub inserted: usize,
    /// Calls that failed
    pub failures: usize,
}

impl SyncReport {
    fn merge(&mut self, other: SyncReport) {
        self.removed += other.removed;
        self.inserted += other.inserted;
        self.failures += other.failures;
    }
}

/// Reconciles node grants to a fixed editor set
#[derive(Clone)]
pub struct PermissionSync {
    store: Arc<dyn DocumentStore>,
    editors: Arc<EditorSet>,
    stats: Arc<RunStats>,
    batch_size: usize,
    batch_delay: Duration,
}

impl PermissionSync {
    /// Create a synchronizer for `editors`
    pub fn new(store: Arc<dyn DocumentStore>, editors: Arc<EditorSet>, stats: Arc<RunStats>) -> Self {
        Self {
            store,
            editors,
            stats,
            batch_size: DEFAULT_PERMISSION_BATCH_SIZE,
            batch_delay: Duration::ZERO,
        }
    }

    /// Set the group size and the pause after each group
    pub fn with_batching(mut self, batch_size: usize, batch_delay: Duration) -> Self {
        self.batch_size = batch_size.max(1);
        self.batch_delay = batch_delay;
        self
    }

    /// Editor set in use
    pub fn editors(&self) -> &EditorSet {
        &self.editors
    }

    /// Reconcile one node. Running it again with the same editors changes nothing.
    pub fn sync(&self, node: &Node) -> SyncReport {
        let mut report = SyncReport::default();

        let grants = match self.store.list_permissions(&node.id) {
            Ok(grants) => grants,
            Err(e) => {
                tracing::warn!("Could not list grants on {}: {}", node, e);
                self.failed(&mut report);
                Vec::new()
            }
        };

        for grant in grants.iter().filter(|g| g.is_open()) {
            match self.store.remove_permission(&node.id, &grant.id) {
                Ok(()) => {
                    tracing::debug!("Removed {:?} grant {} from {}", grant.scope, grant.id, node);
                    report.removed += 1;
                    RunStats::bump(&self.stats.grants_removed);
                }
                Err(e) => {
                    tracing::warn!("Could not remove grant {} from {}: {}", grant.id, node, e);
                    self.failed(&mut report);
                }
            }
        }

        for editor in self.editors.iter() {
            if grants.iter().any(|g| g.gives_edit_to(editor)) {
                continue;
            }
            match self.store.insert_permission(&node.id, editor, Role::Writer, false) {
                Ok(_) => {
                    report.inserted += 1;
                    RunStats::bump(&self.stats.grants_inserted);
                }
                Err(e) => {
                    tracing::warn!("Could not grant {} on {}: {}", editor, node, e);
                    self.failed(&mut report);
                }
            }
        }

        report
    }

    /// Reconcile nodes in groups of `batch_size`, pausing after each group
    pub fn sync_batch(&self, nodes: &[Node]) -> SyncReport {
        let mut report = SyncReport::default();

        for group in nodes.chunks(self.batch_size) {
            for node in group {
                report.merge(self.sync(node));
            }
            if !self.batch_delay.is_zero() {
                std::thread::sleep(self.batch_delay);
            }
        }

        report
    }

    fn failed(&self, report: &mut SyncReport) {
        report.failures += 1;
        RunStats::bump(&self.stats.failures);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, PermissionGrant, Scope};
    use std::time::Instant;

    fn setup() -> (Arc<MemoryStore>, PermissionSync, Node) {
        let store = Arc::new(MemoryStore::new("me@x.org"));
        let root = store.add_root("root");
        let node = store.add_file(&root.id, "doc").unwrap();
        store.add_grant(&node.id, Scope::Anyone, Role::Reader, None).unwrap();
        store.add_grant(&node.id, Scope::Domain, Role::Writer, Some("x.org")).unwrap();
        store.add_grant(&node.id, Scope::User, Role::Reader, Some("ta@x.org")).unwrap();

        let editors = Arc::new(EditorSet::new(["ta@x.org", "prof@x.org"]));
        let sync = PermissionSync::new(store.clone(), editors, Arc::new(RunStats::default()));
        (store, sync, node)
    }

    fn sorted(mut grants: Vec<PermissionGrant>) -> Vec<PermissionGrant> {
        grants.sort_by(|a, b| a.id.cmp(&b.id));
        grants
    }

    #[test]
    fn test_sync_removes_open_and_adds_editors() {
        let (store, sync, node) = setup();
        let report = sync.sync(&node);

        assert_eq!(report.removed, 2);
        assert_eq!(report.inserted, 2);
        assert_eq!(report.failures, 0);

        let grants = store.list_permissions(&node.id).unwrap();
        assert!(grants.iter().all(|g| !g.is_open()));
        assert!(grants.iter().any(|g| g.gives_edit_to("ta@x.org")));
        assert!(grants.iter().any(|g| g.gives_edit_to("prof@x.org")));
        assert_eq!(grants.len(), 2);
    }

    #[test]
    fn test_sync_is_idempotent() {
        let (store, sync, node) = setup();
        sync.sync(&node);
        let first = sorted(store.list_permissions(&node.id).unwrap());

        let report = sync.sync(&node);
        let second = sorted(store.list_permissions(&node.id).unwrap());

        assert_eq!(report, SyncReport::default());
        assert_eq!(first, second);
    }

    #[test]
    fn test_failures_are_isolated() {
        let (store, sync, node) = setup();
        store.inject_failure("remove_permission", &node.id);

        let report = sync.sync(&node);
        assert_eq!(report.failures, 2);
        assert_eq!(report.inserted, 2);
    }

    #[test]
    fn test_sync_batch_pauses_per_group() {
        let (store, sync, node) = setup();
        let other = store.add_file(&store.add_root("r2").id, "x").unwrap();
        let sync = sync.with_batching(1, Duration::from_millis(20));

        let start = Instant::now();
        let report = sync.sync_batch(&[node, other]);
        assert!(start.elapsed() >= Duration::from_millis(40));
        assert_eq!(report.inserted, 4);
    }
}
