//! Recursive tree duplication
//!
//! One recursive routine copies a source folder into one destination folder
//! under a [`FilterPolicy`]. It runs once per destination tree: with
//! `IncludeAll` for the privileged copy and with the exclusion marker for the
//! public copy, so the two trees diverge exactly at excluded nodes.
//!
//! Destination children that already exist (same name and kind, matched in
//! order) are reused rather than duplicated, which lets an interrupted unit be
//! replayed on resume and converge to the same tree.

use crate::acl::PermissionSync;
use crate::core::TimeBudget;
use crate::error::Result;
use crate::progress::RunStats;
use crate::store::{DocumentStore, Node, NodeKind};
use crate::tree::{FilterPolicy, Scanner};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

/// Privileged and public destination folders mirroring one source level
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DestinationPair {
    /// Full copy
    pub instructor: Node,
    /// Filtered copy
    pub public: Node,
}

/// A top-level source folder handed to a worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkUnit {
    /// Position among the source root's subfolders
    pub index: usize,
    /// Source folder
    pub folder: Node,
    /// How many earlier siblings share this folder's name
    pub rank: usize,
}

impl WorkUnit {
    /// Build units for `folders` in order, ranking duplicate names
    pub fn from_folders(folders: Vec<Node>) -> Vec<WorkUnit> {
        let mut seen: HashMap<String, usize> = HashMap::new();
        folders
            .into_iter()
            .enumerate()
            .map(|(index, folder)| {
                let count = seen.entry(folder.name.clone()).or_insert(0);
                let rank = *count;
                *count += 1;
                WorkUnit { index, folder, rank }
            })
            .collect()
    }
}

/// Existing children of a destination folder, keyed by kind and name
#[derive(Debug, Default)]
struct DestinationIndex {
    existing: HashMap<(NodeKind, String), VecDeque<Node>>,
}

impl DestinationIndex {
    fn load(store: &dyn DocumentStore, dest: &Node) -> Self {
        let mut index = Self::default();
        match store.list_children(&dest.id) {
            Ok(children) => {
                for child in children {
                    index
                        .existing
                        .entry((child.kind, child.name.clone()))
                        .or_default()
                        .push_back(child);
                }
            }
            Err(e) => {
                // Treated as empty: worst case a replay duplicates this level.
                tracing::warn!("Could not list destination {}: {}", dest, e);
            }
        }
        index
    }

    fn take(&mut self, kind: NodeKind, name: &str) -> Option<Node> {
        self.existing
            .get_mut(&(kind, name.to_string()))
            .and_then(VecDeque::pop_front)
    }
}

/// Copies source subtrees into destination trees
#[derive(Clone)]
pub struct Replicator {
    store: Arc<dyn DocumentStore>,
    scanner: Scanner,
    permissions: PermissionSync,
    budget: Arc<TimeBudget>,
    stats: Arc<RunStats>,
    public_filter: FilterPolicy,
    file_batch_size: usize,
    top_level: Arc<Mutex<()>>,
}

impl Replicator {
    /// Create a replicator
    pub fn new(
        store: Arc<dyn DocumentStore>,
        permissions: PermissionSync,
        budget: Arc<TimeBudget>,
        stats: Arc<RunStats>,
        public_filter: FilterPolicy,
    ) -> Self {
        Self {
            scanner: Scanner::new(Arc::clone(&store)),
            store,
            permissions,
            budget,
            stats,
            public_filter,
            file_batch_size: crate::acl::DEFAULT_PERMISSION_BATCH_SIZE,
            top_level: Arc::new(Mutex::new(())),
        }
    }

    /// Files copied per batch before the budget is consulted
    pub fn with_file_batch_size(mut self, size: usize) -> Self {
        self.file_batch_size = size.max(1);
        self
    }

    /// Policy applied to the public tree
    pub fn public_filter(&self) -> &FilterPolicy {
        &self.public_filter
    }

    /// Reconcile grants on both destination roots
    pub fn secure_pair(&self, pair: &DestinationPair) {
        self.permissions.sync(&pair.instructor);
        self.permissions.sync(&pair.public);
    }

    /// Copy `source`'s contents into `dest` under `filter`.
    ///
    /// Returns `false` only when the budget ran out before the whole subtree
    /// was copied; per-item failures are logged and do not affect the result.
    pub fn copy_subtree(&self, source: &Node, dest: &Node, filter: &FilterPolicy) -> bool {
        self.permissions.sync(dest);

        let listing = match self.scanner.list(source) {
            Ok(listing) => listing,
            Err(e) => {
                tracing::warn!("Skipping {}: {}", source, e);
                RunStats::bump(&self.stats.failures);
                return true;
            }
        };
        let mut index = DestinationIndex::load(self.store.as_ref(), dest);

        let batches: Vec<&[Node]> = listing.files.chunks(self.file_batch_size).collect();
        for (i, batch) in batches.iter().enumerate() {
            let copied = self.copy_files(batch, dest, &mut index, filter);
            self.permissions.sync_batch(&copied);

            let more_work = i + 1 < batches.len() || !listing.folders.is_empty();
            if more_work && self.budget.is_exceeded() {
                tracing::debug!("Budget exhausted while copying files of {}", source);
                return false;
            }
        }

        for folder in &listing.folders {
            if filter.excluded(&folder.name) {
                tracing::debug!("Excluded {} from {} tree", folder, filter.label());
                RunStats::bump(&self.stats.nodes_excluded);
                continue;
            }
            if self.budget.is_exceeded() {
                tracing::debug!("Budget exhausted before {}", folder);
                return false;
            }

            let child = match self.ensure_folder(&mut index, dest, &folder.name) {
                Ok(child) => child,
                Err(e) => {
                    tracing::warn!("Could not create folder for {} in {}: {}", folder, dest, e);
                    RunStats::bump(&self.stats.failures);
                    continue;
                }
            };

            if !self.copy_subtree(folder, &child, filter) {
                return false;
            }
        }

        true
    }

    /// Copy the files sitting directly under the source root into both roots.
    ///
    /// Runs once per start (and on resume while no unit has completed). Each
    /// copy is reconciled on its own rather than through the batched path, and
    /// the budget is not consulted.
    pub fn copy_root_files(&self, source_root: &Node, pair: &DestinationPair) {
        let files = match self.scanner.files(source_root) {
            Ok(files) => files,
            Err(e) => {
                tracing::warn!("Could not list root files of {}: {}", source_root, e);
                RunStats::bump(&self.stats.failures);
                return;
            }
        };
        tracing::info!("Copying {} root files", files.len());

        for (dest, filter) in [
            (&pair.instructor, &FilterPolicy::IncludeAll),
            (&pair.public, &self.public_filter),
        ] {
            let mut index = DestinationIndex::load(self.store.as_ref(), dest);
            for node in self.copy_files(&files, dest, &mut index, filter) {
                self.permissions.sync(&node);
            }
        }
    }

    /// Replicate one top-level folder into both trees: privileged first, then public.
    pub fn replicate_unit(&self, unit: &WorkUnit, pair: &DestinationPair) -> bool {
        let source = &unit.folder;
        tracing::info!("Replicating {}", source);

        let instructor_dest = match self.ensure_ranked_folder(&pair.instructor, &source.name, unit.rank) {
            Ok(node) => node,
            Err(e) => {
                tracing::warn!("Could not create privileged folder for {}: {}", source, e);
                RunStats::bump(&self.stats.failures);
                return true;
            }
        };
        if !self.copy_subtree(source, &instructor_dest, &FilterPolicy::IncludeAll) {
            return false;
        }

        if self.public_filter.excluded(&source.name) {
            tracing::debug!("Excluded {} from public tree", source);
            RunStats::bump(&self.stats.nodes_excluded);
            return true;
        }
        if self.budget.is_exceeded() {
            return false;
        }

        let public_dest = match self.ensure_ranked_folder(&pair.public, &source.name, unit.rank) {
            Ok(node) => node,
            Err(e) => {
                tracing::warn!("Could not create public folder for {}: {}", source, e);
                RunStats::bump(&self.stats.failures);
                return true;
            }
        };
        self.copy_subtree(source, &public_dest, &self.public_filter)
    }

    /// Copy admitted files into `dest`, returning the new copies
    fn copy_files(
        &self,
        files: &[Node],
        dest: &Node,
        index: &mut DestinationIndex,
        filter: &FilterPolicy,
    ) -> Vec<Node> {
        let mut copied = Vec::with_capacity(files.len());

        for file in files {
            if filter.excluded(&file.name) {
                tracing::debug!("Excluded {} from {} tree", file, filter.label());
                RunStats::bump(&self.stats.nodes_excluded);
                continue;
            }
            if index.take(NodeKind::File, &file.name).is_some() {
                RunStats::bump(&self.stats.nodes_reused);
                continue;
            }

            match self.store.copy_file(&file.id, &dest.id) {
                Ok(node) => {
                    tracing::debug!("Copied {} into {}", file, dest);
                    RunStats::bump(&self.stats.files_copied);
                    copied.push(node);
                }
                Err(e) if e.is_transient() => {
                    tracing::warn!("Could not copy {} into {}: {}", file, dest, e);
                    RunStats::bump(&self.stats.failures);
                }
                Err(e) => {
                    tracing::error!("Copy of {} into {} failed: {}", file, dest, e);
                    RunStats::bump(&self.stats.failures);
                }
            }
        }

        copied
    }

    fn ensure_folder(&self, index: &mut DestinationIndex, parent: &Node, name: &str) -> Result<Node> {
        if let Some(existing) = index.take(NodeKind::Folder, name) {
            RunStats::bump(&self.stats.nodes_reused);
            return Ok(existing);
        }
        let created = self.store.create_folder(&parent.id, name)?;
        RunStats::bump(&self.stats.folders_created);
        Ok(created)
    }

    /// Reuse the `rank`-th folder named `name` under `parent`, creating it
    /// (and any lower-ranked ones still missing) when absent.
    ///
    /// Serialized across workers so that the k-th folder of a name always
    /// belongs to the unit of rank k, whatever order the units run in.
    fn ensure_ranked_folder(&self, parent: &Node, name: &str, rank: usize) -> Result<Node> {
        let _guard = self.top_level.lock().unwrap_or_else(|e| e.into_inner());

        let mut existing: Vec<Node> = self
            .store
            .list_children(&parent.id)?
            .into_iter()
            .filter(|n| n.is_folder() && n.name == name)
            .collect();

        if existing.len() > rank {
            RunStats::bump(&self.stats.nodes_reused);
            return Ok(existing.swap_remove(rank));
        }
        while existing.len() <= rank {
            existing.push(self.store.create_folder(&parent.id, name)?);
            RunStats::bump(&self.stats.folders_created);
        }
        Ok(existing.swap_remove(rank))
    }
}
