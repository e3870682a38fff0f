//! Error types for retrieval operations.

use thiserror::Error;

/// Errors that can occur during search or RAG.
#[derive(Error, Debug)]
pub enum RetrievalError {
    #[error("Embedding error: {0}")]
    Embedding(#[from] quarry_ollama::OllamaError),

    #[error("Database error: {0}")]
    Database(#[from] quarry_db::DbError),
}

/// Result type for retrieval operations.
pub type RetrievalResult<T> = Result<T, RetrievalError>;
