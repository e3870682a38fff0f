//! Error types for the ingestion pipeline.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for ingestion operations.
pub type IngestResult<T> = Result<T, IngestError>;

/// Errors that can occur during ingestion.
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] quarry_db::DbError),

    #[error("Config error: {0}")]
    Config(#[from] quarry_config::ConfigError),

    #[error("Embedding error: {0}")]
    Embedding(#[from] quarry_ollama::OllamaError),

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    #[error("Could not decode {path} as UTF-8, UTF-16, or Latin-1")]
    DecodingError { path: PathBuf },

    #[error("Extraction failed for {path}: {message}")]
    ExtractionError { path: PathBuf, message: String },
}
