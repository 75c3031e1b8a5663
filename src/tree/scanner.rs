//! Folder enumeration
//!
//! Lists the immediate children of a folder, split into files and folders.
//! Order is whatever the store reports; nothing downstream relies on it.

use crate::error::{DualCopyError, Result};
use crate::store::{DocumentStore, Node, NodeKind};
use std::sync::Arc;

/// Immediate children of one folder
#[derive(Debug, Clone, Default)]
pub struct Listing {
    /// Child files
    pub files: Vec<Node>,
    /// Child folders
    pub folders: Vec<Node>,
}

impl Listing {
    /// Total number of children
    pub fn len(&self) -> usize {
        self.files.len() + self.folders.len()
    }

    /// Check if the folder is empty
    pub fn is_empty(&self) -> bool {
        self.files.is_empty() && self.folders.is_empty()
    }
}

/// Read-only folder enumerator over a document store
#[derive(Clone)]
pub struct Scanner {
    store: Arc<dyn DocumentStore>,
}

impl Scanner {
    /// Create a scanner over `store`
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// List a folder's children. Calling again re-reads the store.
    pub fn list(&self, folder: &Node) -> Result<Listing> {
        if !folder.is_folder() {
            return Err(DualCopyError::NotAFolder(folder.id.clone()));
        }

        let children = self
            .store
            .list_children(&folder.id)
            .map_err(|e| e.with_context(format!("listing {}", folder)))?;

        let mut listing = Listing::default();
        for child in children {
            match child.kind {
                NodeKind::File => listing.files.push(child),
                NodeKind::Folder => listing.folders.push(child),
            }
        }

        tracing::trace!(
            "Listed {}: {} files, {} folders",
            folder,
            listing.files.len(),
            listing.folders.len()
        );
        Ok(listing)
    }

    /// Child files only
    pub fn files(&self, folder: &Node) -> Result<Vec<Node>> {
        Ok(self.list(folder)?.files)
    }

    /// Child folders only
    pub fn folders(&self, folder: &Node) -> Result<Vec<Node>> {
        Ok(self.list(folder)?.folders)
    }
}
