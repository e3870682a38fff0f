//! Quarry Ollama - local model integration for embeddings and generation.

mod boundary;
mod client;
mod error;
mod types;

pub use boundary::{EmbeddingProvider, Generation, TextGenerator};
pub use client::OllamaClient;
pub use error::{OllamaError, OllamaResult};
pub use types::{
    GenerateOptions, GenerateRequest, GenerateResponse, ListModelsResponse, ModelInfo,
};
