//! Retrieval-augmented generation.
//!
//! One request flows query enhancement -> retrieval -> prompt assembly ->
//! generation. Retrieval failures degrade to plain generation; they never
//! reach the caller as errors.

use crate::engine::RetrievalEngine;
use crate::error::RetrievalResult;
use quarry_config::RagConfig;
use quarry_core::{SearchQuery, SearchResult};
use quarry_ollama::TextGenerator;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};

/// One prior exchange in the conversation.
#[derive(Debug, Clone)]
pub struct ConversationTurn {
    pub role: TurnRole,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnRole {
    User,
    Assistant,
}

impl ConversationTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: TurnRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: TurnRole::Assistant,
            content: content.into(),
        }
    }
}

/// Provenance for one retrieved match, surfaced to the caller.
#[derive(Debug, Clone, Serialize)]
pub struct RetrievalMatchInfo {
    pub similarity: f32,
    pub source: String,
}

/// What retrieval contributed to an answer.
#[derive(Debug, Clone, Serialize)]
pub struct RetrievalInfo {
    pub total_matches: usize,
    pub matches: Vec<RetrievalMatchInfo>,
    pub search_time_ms: f64,
}

/// A generated answer plus its retrieval provenance.
#[derive(Debug, Clone)]
pub struct RagResponse {
    pub answer: String,
    pub thinking: Option<String>,
    /// None when retrieval was disabled, failed, or found nothing.
    pub retrieval: Option<RetrievalInfo>,
}

/// Coordinates retrieval and generation for conversational queries.
pub struct RagOrchestrator {
    engine: RetrievalEngine,
    generator: Arc<dyn TextGenerator>,
    config: RagConfig,
    model: String,
}

impl RagOrchestrator {
    pub fn new(
        engine: RetrievalEngine,
        generator: Arc<dyn TextGenerator>,
        config: RagConfig,
        model: impl Into<String>,
    ) -> Self {
        Self {
            engine,
            generator,
            config,
            model: model.into(),
        }
    }

    /// Answer a query, augmenting the prompt with retrieved context when
    /// retrieval is enabled and produces matches. Generation errors
    /// propagate; retrieval errors do not.
    pub async fn ask(
        &self,
        query: &str,
        history: &[ConversationTurn],
        max_tokens: Option<i32>,
        enable_thinking: bool,
    ) -> RetrievalResult<RagResponse> {
        let retrieval = if self.config.enable_retrieval {
            self.perform_retrieval(query, history).await
        } else {
            None
        };

        let context = retrieval.as_ref().filter(|result| result.has_results());
        let prompt = self.assemble_prompt(query, history, context);

        let generation = self
            .generator
            .generate(&self.model, &prompt, max_tokens, enable_thinking)
            .await?;

        Ok(RagResponse {
            answer: generation.text,
            thinking: generation.thinking,
            retrieval: retrieval.map(|result| RetrievalInfo {
                total_matches: result.total_matches,
                matches: result
                    .matches
                    .iter()
                    .map(|m| RetrievalMatchInfo {
                        similarity: m.similarity,
                        source: m.filepath.clone(),
                    })
                    .collect(),
                search_time_ms: result.search_time_ms,
            }),
        })
    }

    /// Run the retrieval stage. Any failure is logged and treated as "no
    /// context found" so generation still proceeds.
    async fn perform_retrieval(
        &self,
        query: &str,
        history: &[ConversationTurn],
    ) -> Option<SearchResult> {
        let search_text = if self.config.retrieval_query_enhancement {
            self.enhance_query(query, history)
        } else {
            query.to_string()
        };

        let search_query = SearchQuery::new(search_text)
            .with_max_results(self.config.max_retrieval_results)
            .with_min_similarity(self.config.min_similarity_score);

        match self.engine.search(&search_query).await {
            Ok(result) if result.has_results() => {
                debug!(
                    "Retrieved {} context chunks for '{}'",
                    result.total_matches, query
                );
                Some(result)
            }
            Ok(_) => None,
            Err(e) => {
                warn!("Retrieval failed, answering without context: {}", e);
                None
            }
        }
    }

    /// Rewrite the query with terms from the recent conversation so
    /// references and ellipsis still retrieve well. Only short turns are
    /// borrowed; long ones would drown the query.
    fn enhance_query(&self, query: &str, history: &[ConversationTurn]) -> String {
        let recent_terms: Vec<&str> = history
            .iter()
            .rev()
            .take(2)
            .filter(|turn| turn.content.chars().count() < 100)
            .map(|turn| turn.content.as_str())
            .collect();

        if recent_terms.is_empty() {
            query.trim().to_string()
        } else {
            let joined: Vec<&str> = recent_terms.into_iter().rev().collect();
            format!("{} context: {}", query.trim(), joined.join(" "))
        }
    }

    /// Build the generation prompt: the conversation so far as a transcript,
    /// then the (possibly context-augmented) question.
    fn assemble_prompt(
        &self,
        query: &str,
        history: &[ConversationTurn],
        context: Option<&SearchResult>,
    ) -> String {
        let body = match context {
            Some(result) => self.augment_query(query, result),
            None => query.to_string(),
        };

        if history.is_empty() {
            return body;
        }

        let transcript: Vec<String> = history
            .iter()
            .map(|turn| {
                let speaker = match turn.role {
                    TurnRole::User => "User",
                    TurnRole::Assistant => "Assistant",
                };
                format!("{}: {}", speaker, turn.content)
            })
            .collect();

        format!(
            "Previous conversation:\n{}\n\n{}",
            transcript.join("\n"),
            body
        )
    }

    /// Interleave retrieved context into the generation prompt, numbered and
    /// optionally tagged with each match's source path.
    fn augment_query(&self, query: &str, result: &SearchResult) -> String {
        let context_parts: Vec<String> = result
            .matches
            .iter()
            .take(self.config.max_retrieval_results)
            .enumerate()
            .map(|(i, m)| {
                let source_info = if self.config.include_source_metadata {
                    format!(" (Source: {})", m.filepath)
                } else {
                    String::new()
                };
                format!("{}. {}{}", i + 1, m.chunk.content.trim(), source_info)
            })
            .collect();

        format!(
            "{}\n\nBased on the following relevant information from the knowledge base:\n\n{}\n\nPlease provide a comprehensive answer using this context where relevant.",
            query,
            context_parts.join("\n")
        )
    }
}
