//! Editor set derivation

use crate::error::Result;
use crate::store::{DocumentStore, PermissionGrant, Role, Scope};
use std::collections::BTreeSet;

/// Identities granted write access to every copied node.
///
/// Computed once at run start and never modified afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EditorSet {
    identities: BTreeSet<String>,
}

impl EditorSet {
    /// Build from explicit identities
    pub fn new<I, S>(identities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            identities: identities.into_iter().map(Into::into).collect(),
        }
    }

    /// Users holding `writer` or `owner` on the source; `fallback` alone when none do
    pub fn from_grants(grants: &[PermissionGrant], fallback: &str) -> Self {
        let identities: BTreeSet<String> = grants
            .iter()
            .filter(|g| g.scope == Scope::User && matches!(g.role, Role::Writer | Role::Owner))
            .filter_map(|g| g.identity.clone())
            .collect();

        if identities.is_empty() {
            return Self::new([fallback]);
        }
        Self { identities }
    }

    /// Read the permissions-source node's grants. Without a source, or when it
    /// names no editors, the set is just the invoking identity.
    pub fn derive(store: &dyn DocumentStore, permissions_source: Option<&str>) -> Result<Self> {
        let invoking = store.current_identity()?;

        let editors = match permissions_source {
            Some(source_id) => {
                let grants = store
                    .list_permissions(source_id)
                    .map_err(|e| e.with_context("reading permissions source"))?;
                Self::from_grants(&grants, &invoking)
            }
            None => Self::new([invoking]),
        };

        tracing::info!("Editor set: {} identities", editors.len());
        tracing::debug!("Editors: {:?}", editors.identities);
        Ok(editors)
    }

    /// Iterate identities in sorted order
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.identities.iter().map(String::as_str)
    }

    /// Check membership
    pub fn contains(&self, identity: &str) -> bool {
        self.identities.contains(identity)
    }

    /// Number of identities
    pub fn len(&self) -> usize {
        self.identities.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.identities.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn grant(identity: &str, role: Role) -> PermissionGrant {
        PermissionGrant {
            id: format!("g-{}", identity),
            scope: Scope::User,
            role,
            identity: Some(identity.to_string()),
        }
    }

    #[test]
    fn test_writers_and_owners_deduplicated() {
        let grants = vec![
            grant("u1", Role::Writer),
            grant("u2", Role::Owner),
            grant("u3", Role::Reader),
            grant("u1", Role::Writer),
        ];
        let editors = EditorSet::from_grants(&grants, "me");
        assert_eq!(editors, EditorSet::new(["u1", "u2"]));
    }

    #[test]
    fn test_empty_grants_fall_back_to_invoker() {
        let editors = EditorSet::from_grants(&[], "me");
        assert_eq!(editors.iter().collect::<Vec<_>>(), vec!["me"]);
    }

    #[test]
    fn test_open_grants_do_not_count() {
        let grants = vec![PermissionGrant {
            id: "g".into(),
            scope: Scope::Domain,
            role: Role::Writer,
            identity: Some("x.org".into()),
        }];
        assert_eq!(EditorSet::from_grants(&grants, "me"), EditorSet::new(["me"]));
    }

    #[test]
    fn test_derive_from_store() {
        let store = MemoryStore::new("me@x.org");
        let source = store.add_root("permissions");
        store.add_grant(&source.id, Scope::User, Role::Writer, Some("ta@x.org")).unwrap();

        let editors = EditorSet::derive(&store, Some(source.id.as_str())).unwrap();
        assert!(editors.contains("ta@x.org"));
        assert!(!editors.contains("me@x.org"));

        let default = EditorSet::derive(&store, None).unwrap();
        assert_eq!(default, EditorSet::new(["me@x.org"]));

        assert!(EditorSet::derive(&store, Some("missing")).is_err());
    }
}
