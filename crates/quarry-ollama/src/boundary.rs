//! Model provider traits.
//!
//! The ingestion pipeline and retrieval engine depend on these traits rather
//! than on `OllamaClient` directly, so tests can substitute deterministic
//! fakes without a running server.

use crate::client::OllamaClient;
use crate::error::OllamaResult;
use crate::types::{GenerateOptions, GenerateRequest};
use async_trait::async_trait;

/// Produces embedding vectors for text.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single text.
    async fn embed(&self, text: &str) -> OllamaResult<Vec<f32>>;

    /// Embed a batch of texts, in order. The default issues sequential
    /// single-text requests; Ollama has no batch embedding endpoint.
    async fn embed_batch(&self, texts: &[String]) -> OllamaResult<Vec<Vec<f32>>> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for text in texts {
            embeddings.push(self.embed(text).await?);
        }
        Ok(embeddings)
    }

    /// Name of the model producing the vectors, recorded alongside them.
    fn model_name(&self) -> &str;
}

/// Output of a text generation call.
#[derive(Debug, Clone)]
pub struct Generation {
    pub text: String,
    pub thinking: Option<String>,
    pub prompt_tokens: Option<u32>,
    pub completion_tokens: Option<u32>,
}

/// Produces free-form text from a prompt.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(
        &self,
        model: &str,
        prompt: &str,
        max_tokens: Option<i32>,
        enable_thinking: bool,
    ) -> OllamaResult<Generation>;
}

#[async_trait]
impl EmbeddingProvider for OllamaClient {
    async fn embed(&self, text: &str) -> OllamaResult<Vec<f32>> {
        self.embed_text(text).await
    }

    fn model_name(&self) -> &str {
        self.embedding_model()
    }
}

#[async_trait]
impl TextGenerator for OllamaClient {
    async fn generate(
        &self,
        model: &str,
        prompt: &str,
        max_tokens: Option<i32>,
        enable_thinking: bool,
    ) -> OllamaResult<Generation> {
        let mut request = GenerateRequest::new(model, prompt);
        if enable_thinking {
            request = request.with_think(true);
        }
        if let Some(num_predict) = max_tokens {
            request = request.with_options(GenerateOptions::new().with_num_predict(num_predict));
        }

        let response = OllamaClient::generate(self, request).await?;
        Ok(Generation {
            text: response.response,
            thinking: response.thinking,
            prompt_tokens: response.prompt_eval_count,
            completion_tokens: response.eval_count,
        })
    }
}
