//! Database CRUD operations.

pub mod chunks;
pub mod documents;
pub mod stats;
pub mod vectors;
