//! Source tree access
//!
//! Enumerates folder contents through the document store and decides which
//! nodes belong in the public copy.

mod filter;
mod scanner;

pub use filter::*;
pub use scanner::*;
