//! Remote document store abstraction
//!
//! The replication engine never talks to a concrete backend directly. It sees
//! folders, files and their access grants through [`DocumentStore`], which a
//! deployment backs with its hierarchical document service. [`MemoryStore`] is
//! the bundled implementation used by the CLI snapshots and the test-suite.

mod memory;
mod throttle;

pub use memory::*;
pub use throttle::{ApiLimiter, ThrottledStore};

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of a store node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    /// Leaf document
    File,
    /// Container of files and folders
    Folder,
}

/// Reference to a file or folder in the remote store
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Node {
    /// Opaque store identifier
    pub id: String,
    /// Display name
    pub name: String,
    /// File or folder
    pub kind: NodeKind,
}

impl Node {
    /// Check if this node is a folder
    pub fn is_folder(&self) -> bool {
        self.kind == NodeKind::Folder
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}' ({})", self.name, self.id)
    }
}

/// Audience a grant applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    /// A single identity
    User,
    /// Anyone holding the link
    Anyone,
    /// Everyone in a domain
    Domain,
}

/// Access level of a grant
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Read-only access
    Reader,
    /// Edit access
    Writer,
    /// Ownership
    Owner,
}

/// A single access grant on a node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionGrant {
    /// Grant identifier, unique per node
    pub id: String,
    /// Audience
    pub scope: Scope,
    /// Access level
    pub role: Role,
    /// Identity for `user` grants (domain name for `domain` grants)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity: Option<String>,
}

impl PermissionGrant {
    /// Grants that open the node beyond named identities
    pub fn is_open(&self) -> bool {
        matches!(self.scope, Scope::Anyone | Scope::Domain)
    }

    /// Whether this grant lets `identity` edit the node
    pub fn gives_edit_to(&self, identity: &str) -> bool {
        self.scope == Scope::User
            && self.role >= Role::Writer
            && self.identity.as_deref() == Some(identity)
    }
}

/// Operations the engine needs from the remote hierarchical document store.
///
/// Every call may fail independently; callers decide whether a failure is
/// fatal (root lookups) or per-item (copies, grant edits).
pub trait DocumentStore: Send + Sync {
    /// Look up a node by id
    fn get_node(&self, id: &str) -> Result<Node>;

    /// Immediate children of a folder, in store order
    fn list_children(&self, folder_id: &str) -> Result<Vec<Node>>;

    /// Create a folder named `name` under `parent_id`
    fn create_folder(&self, parent_id: &str, name: &str) -> Result<Node>;

    /// Copy a file into `dest_folder_id`, keeping its name
    fn copy_file(&self, file_id: &str, dest_folder_id: &str) -> Result<Node>;

    /// Grants currently present on a node
    fn list_permissions(&self, node_id: &str) -> Result<Vec<PermissionGrant>>;

    /// Grant `role` to a user identity. Granting to an identity that already
    /// holds a user grant updates that grant instead of adding a second one.
    fn insert_permission(
        &self,
        node_id: &str,
        identity: &str,
        role: Role,
        notify: bool,
    ) -> Result<PermissionGrant>;

    /// Remove one grant by id
    fn remove_permission(&self, node_id: &str, grant_id: &str) -> Result<()>;

    /// Identity the store is acting as
    fn current_identity(&self) -> Result<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grant_wire_shape() {
        let grant = PermissionGrant {
            id: "g1".into(),
            scope: Scope::Anyone,
            role: Role::Reader,
            identity: None,
        };
        let json = serde_json::to_string(&grant).unwrap();
        assert_eq!(json, r#"{"id":"g1","scope":"anyone","role":"reader"}"#);

        let parsed: PermissionGrant =
            serde_json::from_str(r#"{"id":"g2","scope":"user","role":"writer","identity":"a@x.org"}"#)
                .unwrap();
        assert_eq!(parsed.scope, Scope::User);
        assert!(parsed.gives_edit_to("a@x.org"));
        assert!(!parsed.is_open());
    }

    #[test]
    fn test_owner_counts_as_editor() {
        let grant = PermissionGrant {
            id: "g3".into(),
            scope: Scope::User,
            role: Role::Owner,
            identity: Some("o@x.org".into()),
        };
        assert!(grant.gives_edit_to("o@x.org"));
        assert!(!grant.gives_edit_to("other@x.org"));
    }
}
