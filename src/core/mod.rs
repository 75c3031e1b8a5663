//! Core replication engine
//!
//! The recursive dual-tree copier, the time budget that bounds an invocation,
//! the scheduler that spreads top-level folders over workers, and the run
//! driver that checkpoints and resumes.

mod budget;
mod replication;
mod replicator;
mod scheduler;

pub use budget::*;
pub use replication::*;
pub use replicator::*;
pub use scheduler::*;
