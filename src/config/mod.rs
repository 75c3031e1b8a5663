//! Configuration module
//!
//! CLI arguments and the runtime settings of a replication run.

mod settings;

pub use settings::*;
