//! # DualCopy - Resumable Dual-Tree Replication
//!
//! DualCopy duplicates a folder tree held in a remote hierarchical document
//! store into two access-controlled copies: a full privileged copy and a
//! public copy that leaves out every node whose name carries an exclusion
//! marker, at any depth.
//!
//! ## Features
//!
//! - **Filtered Duplication**: One recursive pass per copy, diverging only at excluded nodes
//! - **Editor ACL Sync**: Link and domain sharing stripped, editors granted write access
//! - **Time Budget**: Work stops between units when the wall-clock budget runs out
//! - **Checkpoint/Resume**: A suspended run picks up where it left off
//! - **Worker Pool**: Top-level folders split into slices, sequential or threaded
//! - **Rate Limiting**: Shared token bucket over every store call
//!
//! ## Quick Start
//!
//! ```no_run
//! use dualcopy::prelude::*;
//! use std::sync::Arc;
//!
//! let store = Arc::new(MemoryStore::load(std::path::Path::new("drive.json")).unwrap());
//! let state = Arc::new(FileStateStore::new("dualcopy-state.json"));
//!
//! let replication = Replication::new(store, state, ReplicationConfig::default());
//! match replication.start("folder-000001", "folder-000002", "Course 2024", 4) {
//!     RunOutcome::Completed(summary) => summary.print_summary(),
//!     RunOutcome::Suspended { checkpoint, .. } => println!("Suspended: {}", checkpoint),
//!     other => println!("{:?}", other),
//! }
//! ```
//!
//! ## Resuming
//!
//! ```no_run
//! use dualcopy::prelude::*;
//! use std::sync::Arc;
//!
//! # let store = Arc::new(MemoryStore::new("me@example.org"));
//! let state = Arc::new(FileStateStore::new("dualcopy-state.json"));
//! let replication = Replication::new(store, state, ReplicationConfig::default());
//!
//! while replication.resume().is_suspended() {}
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod acl;
pub mod config;
pub mod core;
pub mod error;
pub mod progress;
pub mod store;
pub mod sync;
pub mod tree;

// Re-export commonly used types
pub use config::{DispatchMode, ReplicationConfig};
pub use core::{Replication, RunOutcome};
pub use error::{DualCopyError, Result};
pub use progress::ProgressReporter;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for convenient imports
pub mod prelude {
    //! Convenient re-exports for common usage
    //!
    //! ```no_run
    //! use dualcopy::prelude::*;
    //! ```

    pub use crate::acl::{EditorSet, PermissionSync};
    pub use crate::config::{DispatchMode, ReplicationConfig};
    pub use crate::core::{BatchScheduler, Replication, Replicator, RunOutcome, TimeBudget, WorkUnit};
    pub use crate::error::{DualCopyError, Result};
    pub use crate::progress::{ProgressReporter, RunStats, RunSummary};
    pub use crate::store::{DocumentStore, MemoryStore, Node, NodeKind, PermissionGrant, Role, Scope};
    pub use crate::sync::{Checkpoint, CheckpointManager, FileStateStore, MemoryStateStore, StateStore};
    pub use crate::tree::{FilterPolicy, Scanner};
}
