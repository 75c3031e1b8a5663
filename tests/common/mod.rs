//! Shared fixtures for the integration tests

#![allow(dead_code)]

use dualcopy::prelude::*;
use std::sync::Arc;

pub const MARKER: &str = "(priv)";
pub const EDITORS: [&str; 2] = ["prof@example.org", "ta@example.org"];

/// A store with a source root, a destination parent and a permissions source
pub struct Course {
    pub store: Arc<MemoryStore>,
    pub source: Node,
    pub parent: Node,
    pub roster: Node,
}

impl Course {
    pub fn new() -> Self {
        let store = Arc::new(MemoryStore::new("me@example.org"));
        let source = store.add_root("course");
        let parent = store.add_root("shared");
        let roster = store.add_root("roster");
        store.add_grant(&roster.id, Scope::User, Role::Owner, Some(EDITORS[0])).unwrap();
        store.add_grant(&roster.id, Scope::User, Role::Writer, Some(EDITORS[1])).unwrap();
        store.add_grant(&roster.id, Scope::User, Role::Reader, Some("student@example.org")).unwrap();
        store.add_grant(&roster.id, Scope::Anyone, Role::Reader, None).unwrap();

        Self {
            store,
            source,
            parent,
            roster,
        }
    }

    pub fn config(&self, dispatch: DispatchMode) -> ReplicationConfig {
        ReplicationConfig {
            permissions_source_id: Some(self.roster.id.clone()),
            dispatch,
            ..ReplicationConfig::unthrottled()
        }
    }

    pub fn replication(&self, state: Arc<dyn StateStore>, dispatch: DispatchMode) -> Replication {
        Replication::new(self.store.clone(), state, self.config(dispatch))
    }

    /// Destination root created under the parent with `name`
    pub fn root(&self, name: &str) -> Node {
        self.store
            .list_children(&self.parent.id)
            .unwrap()
            .into_iter()
            .find(|n| n.name == name)
            .unwrap_or_else(|| panic!("no root named {}", name))
    }

    pub fn instructor(&self) -> Node {
        self.root("(priv)Course")
    }

    pub fn public(&self) -> Node {
        self.root("Course")
    }

    /// Source paths with no excluded component
    pub fn public_view(&self) -> Vec<String> {
        self.store
            .tree_paths(&self.source.id)
            .unwrap()
            .into_iter()
            .filter(|path| path.trim_end_matches('/').split('/').all(|part| !part.contains(MARKER)))
            .collect()
    }

    /// Fail unless every node under `root` (root included) is closed to
    /// link/domain sharing and editable by every editor
    pub fn assert_secured(&self, root: &Node) {
        let mut ids = self.store.descendant_ids(&root.id).unwrap();
        ids.push(root.id.clone());
        for id in ids {
            let grants = self.store.list_permissions(&id).unwrap();
            assert!(grants.iter().all(|g| !g.is_open()), "open grant on {}", id);
            for editor in EDITORS {
                assert!(grants.iter().any(|g| g.gives_edit_to(editor)), "{} cannot edit {}", editor, id);
            }
        }
    }
}

/// Build a typical course tree
pub fn populate(course: &Course) {
    let store = &course.store;
    let source = &course.source;
    store.add_file(&source.id, "syllabus").unwrap();
    store.add_file(&source.id, "grading (priv)").unwrap();

    for week in 1..=4 {
        let folder = store.add_folder(&source.id, &format!("week{}", week)).unwrap();
        store.add_file(&folder.id, "slides").unwrap();
        store.add_file(&folder.id, "notes").unwrap();
        store.add_file(&folder.id, "answers (priv)").unwrap();
        let labs = store.add_folder(&folder.id, "labs").unwrap();
        store.add_file(&labs.id, "lab").unwrap();
        store.add_file(&labs.id, "lab solution (priv)").unwrap();
        let exam = store.add_folder(&folder.id, "quiz (priv)").unwrap();
        store.add_file(&exam.id, "questions").unwrap();
    }

    let staff = store.add_folder(&source.id, "staff (priv)").unwrap();
    store.add_file(&staff.id, "meeting notes").unwrap();
}
