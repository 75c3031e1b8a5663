//! Progress reporting module
//!
//! Run counters shared by all workers, plus an optional progress bar over
//! top-level units for interactive use.

mod reporter;
mod stats;

pub use reporter::*;
pub use stats::*;
