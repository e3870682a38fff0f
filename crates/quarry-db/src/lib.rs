//! Quarry DB - SQLite storage layer for documents, chunks, and embeddings.

mod database;
mod error;
mod migrations;
mod operations;

pub use database::Database;
pub use error::{DbError, DbResult};
pub use operations::vectors::{l2_distance, similarity_from_distance, vector_from_bytes, vector_to_bytes};
