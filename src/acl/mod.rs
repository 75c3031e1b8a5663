//! Access control for copied nodes
//!
//! Derives the editor set once per run and reconciles every copied node's
//! grants to exactly that set, stripping link-sharing and domain grants.

mod editors;
mod permissions;

pub use editors::EditorSet;
pub use permissions::{PermissionSync, SyncReport, DEFAULT_PERMISSION_BATCH_SIZE};
