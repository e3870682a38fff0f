//! Quarry Core - Domain types shared across the Quarry workspace.

mod types;

pub use types::*;
