//! In-memory document store
//!
//! Thread-safe tree of folders and files with per-node grants. Can be loaded
//! from and saved to a JSON snapshot, which is how the CLI operates on a tree
//! between invocations.

use super::{DocumentStore, Node, NodeKind, PermissionGrant, Role, Scope};
use crate::error::{DualCopyError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredNode {
    node: Node,
    #[serde(default)]
    parent: Option<String>,
    #[serde(default)]
    children: Vec<String>,
    #[serde(default)]
    grants: Vec<PermissionGrant>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StoreState {
    identity: String,
    next_id: u64,
    nodes: BTreeMap<String, StoredNode>,
}

impl StoreState {
    fn allocate(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}-{:06}", prefix, self.next_id)
    }

    fn get(&self, id: &str) -> Result<&StoredNode> {
        self.nodes
            .get(id)
            .ok_or_else(|| DualCopyError::NotFound(id.to_string()))
    }

    fn get_mut(&mut self, id: &str) -> Result<&mut StoredNode> {
        self.nodes
            .get_mut(id)
            .ok_or_else(|| DualCopyError::NotFound(id.to_string()))
    }

    fn folder(&self, id: &str) -> Result<&StoredNode> {
        let stored = self.get(id)?;
        if !stored.node.is_folder() {
            return Err(DualCopyError::NotAFolder(id.to_string()));
        }
        Ok(stored)
    }

    fn insert_child(&mut self, parent_id: &str, name: &str, kind: NodeKind) -> Result<Node> {
        self.folder(parent_id)?;
        let id = self.allocate(match kind {
            NodeKind::File => "file",
            NodeKind::Folder => "folder",
        });
        let node = Node {
            id: id.clone(),
            name: name.to_string(),
            kind,
        };
        self.nodes.insert(
            id.clone(),
            StoredNode {
                node: node.clone(),
                parent: Some(parent_id.to_string()),
                children: Vec::new(),
                grants: Vec::new(),
            },
        );
        self.get_mut(parent_id)?.children.push(id);
        Ok(node)
    }

    /// New nodes start with a single owner grant for the acting identity
    fn grant_owner(&mut self, node_id: &str) -> Result<()> {
        let grant = PermissionGrant {
            id: self.allocate("grant"),
            scope: Scope::User,
            role: Role::Owner,
            identity: Some(self.identity.clone()),
        };
        self.get_mut(node_id)?.grants.push(grant);
        Ok(())
    }
}

/// In-memory [`DocumentStore`]
#[derive(Debug)]
pub struct MemoryStore {
    state: RwLock<StoreState>,
    /// `(operation, node_id)` pairs that fail on purpose
    failures: RwLock<HashSet<(String, String)>>,
    /// Total store calls served
    calls: AtomicU64,
}

impl MemoryStore {
    /// Create an empty store acting as `identity`
    pub fn new(identity: impl Into<String>) -> Self {
        Self::from_state(StoreState {
            identity: identity.into(),
            ..Default::default()
        })
    }

    fn from_state(state: StoreState) -> Self {
        Self {
            state: RwLock::new(state),
            failures: RwLock::new(HashSet::new()),
            calls: AtomicU64::new(0),
        }
    }

    /// Load a store from a JSON snapshot
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .map_err(|e| DualCopyError::Io(e).with_context(format!("opening {}", path.display())))?;
        let state: StoreState = serde_json::from_reader(BufReader::new(file))?;
        Ok(Self::from_state(state))
    }

    /// Save the store to a JSON snapshot (temp file + rename)
    pub fn save(&self, path: &Path) -> Result<()> {
        let temp_path = path.with_extension("tmp");
        {
            let mut writer = BufWriter::new(File::create(&temp_path)?);
            let state = self.read();
            serde_json::to_writer_pretty(&mut writer, &*state)?;
            writer.flush()?;
        }
        std::fs::rename(&temp_path, path)?;
        Ok(())
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, StoreState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, StoreState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Create a parentless folder (a drive root)
    pub fn add_root(&self, name: &str) -> Node {
        let mut state = self.write();
        let id = state.allocate("folder");
        let node = Node {
            id: id.clone(),
            name: name.to_string(),
            kind: NodeKind::Folder,
        };
        state.nodes.insert(
            id,
            StoredNode {
                node: node.clone(),
                parent: None,
                children: Vec::new(),
                grants: Vec::new(),
            },
        );
        node
    }

    /// Add a folder under `parent_id`
    pub fn add_folder(&self, parent_id: &str, name: &str) -> Result<Node> {
        self.write().insert_child(parent_id, name, NodeKind::Folder)
    }

    /// Add a file under `parent_id`
    pub fn add_file(&self, parent_id: &str, name: &str) -> Result<Node> {
        self.write().insert_child(parent_id, name, NodeKind::File)
    }

    /// Attach a grant directly, bypassing the upsert rule of `insert_permission`
    pub fn add_grant(
        &self,
        node_id: &str,
        scope: Scope,
        role: Role,
        identity: Option<&str>,
    ) -> Result<PermissionGrant> {
        let mut state = self.write();
        let id = state.allocate("grant");
        let grant = PermissionGrant {
            id,
            scope,
            role,
            identity: identity.map(str::to_string),
        };
        state.get_mut(node_id)?.grants.push(grant.clone());
        Ok(grant)
    }

    /// Make `operation` fail for `node_id` from now on
    pub fn inject_failure(&self, operation: &str, node_id: &str) {
        self.failures
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert((operation.to_string(), node_id.to_string()));
    }

    /// Number of store calls served so far
    pub fn call_count(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }

    /// Relative paths of every node under `root_id`, folders suffixed with `/`,
    /// sorted. Duplicate names appear once per node.
    pub fn tree_paths(&self, root_id: &str) -> Result<Vec<String>> {
        let state = self.read();
        let mut paths = Vec::new();
        let mut stack = vec![(root_id.to_string(), String::new())];

        while let Some((id, prefix)) = stack.pop() {
            for child_id in &state.folder(&id)?.children {
                let child = state.get(child_id)?;
                let path = format!("{}{}", prefix, child.node.name);
                if child.node.is_folder() {
                    paths.push(format!("{}/", path));
                    stack.push((child_id.clone(), format!("{}/", path)));
                } else {
                    paths.push(path);
                }
            }
        }

        paths.sort();
        Ok(paths)
    }

    /// Every node id under `root_id`, excluding the root itself
    pub fn descendant_ids(&self, root_id: &str) -> Result<Vec<String>> {
        let state = self.read();
        let mut ids = Vec::new();
        let mut stack = vec![root_id.to_string()];
        while let Some(id) = stack.pop() {
            for child_id in &state.get(&id)?.children {
                ids.push(child_id.clone());
                stack.push(child_id.clone());
            }
        }
        Ok(ids)
    }

    /// Indented listing of the tree under `root_id`
    pub fn render_tree(&self, root_id: &str) -> Result<String> {
        fn walk(state: &StoreState, id: &str, depth: usize, out: &mut String) -> Result<()> {
            let stored = state.get(id)?;
            let marker = if stored.node.is_folder() { "/" } else { "" };
            out.push_str(&format!(
                "{}{}{} [{}]\n",
                "  ".repeat(depth),
                stored.node.name,
                marker,
                stored.node.id
            ));
            for child in &stored.children {
                walk(state, child, depth + 1, out)?;
            }
            Ok(())
        }

        let state = self.read();
        let mut out = String::new();
        walk(&state, root_id, 0, &mut out)?;
        Ok(out)
    }

    fn check(&self, operation: &'static str, node_id: &str) -> Result<()> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        let failures = self.failures.read().unwrap_or_else(|e| e.into_inner());
        if failures.contains(&(operation.to_string(), node_id.to_string())) {
            return Err(DualCopyError::store(operation, node_id, "injected failure"));
        }
        Ok(())
    }
}

impl DocumentStore for MemoryStore {
    fn get_node(&self, id: &str) -> Result<Node> {
        self.check("get_node", id)?;
        Ok(self.read().get(id)?.node.clone())
    }

    fn list_children(&self, folder_id: &str) -> Result<Vec<Node>> {
        self.check("list_children", folder_id)?;
        let state = self.read();
        state
            .folder(folder_id)?
            .children
            .iter()
            .map(|id| state.get(id).map(|s| s.node.clone()))
            .collect()
    }

    fn create_folder(&self, parent_id: &str, name: &str) -> Result<Node> {
        self.check("create_folder", parent_id)?;
        let mut state = self.write();
        let node = state.insert_child(parent_id, name, NodeKind::Folder)?;
        state.grant_owner(&node.id)?;
        Ok(node)
    }

    fn copy_file(&self, file_id: &str, dest_folder_id: &str) -> Result<Node> {
        self.check("copy_file", file_id)?;
        let mut state = self.write();
        let source = state.get(file_id)?.node.clone();
        if source.is_folder() {
            return Err(DualCopyError::store("copy_file", file_id, "cannot copy a folder"));
        }
        // Copies inherit no grants from the source file.
        let node = state.insert_child(dest_folder_id, &source.name, NodeKind::File)?;
        state.grant_owner(&node.id)?;
        Ok(node)
    }

    fn list_permissions(&self, node_id: &str) -> Result<Vec<PermissionGrant>> {
        self.check("list_permissions", node_id)?;
        Ok(self.read().get(node_id)?.grants.clone())
    }

    fn insert_permission(
        &self,
        node_id: &str,
        identity: &str,
        role: Role,
        _notify: bool,
    ) -> Result<PermissionGrant> {
        self.check("insert_permission", node_id)?;
        let mut state = self.write();
        let grant_id = state.allocate("grant");
        let stored = state.get_mut(node_id)?;

        if let Some(existing) = stored
            .grants
            .iter_mut()
            .find(|g| g.scope == Scope::User && g.identity.as_deref() == Some(identity))
        {
            if existing.role != Role::Owner {
                existing.role = role;
            }
            return Ok(existing.clone());
        }

        let grant = PermissionGrant {
            id: grant_id,
            scope: Scope::User,
            role,
            identity: Some(identity.to_string()),
        };
        stored.grants.push(grant.clone());
        Ok(grant)
    }

    fn remove_permission(&self, node_id: &str, grant_id: &str) -> Result<()> {
        self.check("remove_permission", node_id)?;
        let mut state = self.write();
        let stored = state.get_mut(node_id)?;
        let position = stored
            .grants
            .iter()
            .position(|g| g.id == grant_id)
            .ok_or_else(|| DualCopyError::store("remove_permission", node_id, "no such grant"))?;
        if stored.grants[position].role == Role::Owner {
            return Err(DualCopyError::store(
                "remove_permission",
                node_id,
                "owner grant cannot be removed",
            ));
        }
        stored.grants.remove(position);
        Ok(())
    }

    fn current_identity(&self) -> Result<String> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        Ok(self.read().identity.clone())
    }
}
