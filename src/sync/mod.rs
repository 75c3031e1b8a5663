//! Checkpoint persistence
//!
//! A suspended run leaves exactly one record behind: the [`Checkpoint`]. It is
//! written through a [`StateStore`] as a single multi-key update and removed
//! once a run finishes cleanly.

mod checkpoint;
mod state;

pub use checkpoint::*;
pub use state::*;
