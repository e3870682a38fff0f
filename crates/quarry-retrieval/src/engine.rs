//! Semantic search over the chunk corpus.

use crate::error::RetrievalResult;
use quarry_core::{Chunk, ChunkId, DocumentMatch, SearchQuery, SearchResult};
use quarry_db::Database;
use quarry_ollama::EmbeddingProvider;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// A search hit with the chunks surrounding it in its document.
#[derive(Debug, Clone)]
pub struct ContextualMatch {
    pub matched: DocumentMatch,
    /// Neighbors by sequence index, in order, excluding the match itself.
    pub surrounding: Vec<Chunk>,
}

/// Read-only nearest-neighbor search. Never mutates the corpus.
pub struct RetrievalEngine {
    db: Database,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl RetrievalEngine {
    pub fn new(db: Database, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self { db, embedder }
    }

    /// Embed the query text and return the nearest chunks, best first.
    /// Scalar filters apply before the distance scan; the similarity floor
    /// applies after scoring.
    pub async fn search(&self, query: &SearchQuery) -> RetrievalResult<SearchResult> {
        let embed_start = Instant::now();
        let query_vector = self.embedder.embed(&query.query_text).await?;
        let embedding_time_ms = embed_start.elapsed().as_secs_f64() * 1000.0;

        let search_start = Instant::now();
        let mut matches = self
            .db
            .vector_search(&query_vector, query, query.max_results)?;

        if let Some(min_similarity) = query.min_similarity {
            matches.retain(|m| m.similarity >= min_similarity);
        }
        let search_time_ms = search_start.elapsed().as_secs_f64() * 1000.0;

        debug!(
            "Search for '{}' returned {} matches in {:.1}ms",
            query.query_text,
            matches.len(),
            search_time_ms
        );

        Ok(SearchResult {
            query: query.query_text.clone(),
            total_matches: matches.len(),
            matches,
            search_time_ms,
            embedding_time_ms,
        })
    }

    /// Search, then fetch up to `context_size` chunks on each side of every
    /// match from the same document, clipped at document boundaries.
    pub async fn search_with_context(
        &self,
        query: &SearchQuery,
        context_size: usize,
    ) -> RetrievalResult<Vec<ContextualMatch>> {
        let result = self.search(query).await?;

        let mut contextual = Vec::with_capacity(result.matches.len());
        for matched in result.matches {
            let surrounding = if context_size > 0 {
                let lo = matched.chunk.chunk_index - context_size as i32;
                let hi = matched.chunk.chunk_index + context_size as i32;
                self.db
                    .get_chunks_in_range(&matched.chunk.document_id, lo, hi)?
                    .into_iter()
                    .filter(|c| c.chunk_index != matched.chunk.chunk_index)
                    .collect()
            } else {
                Vec::new()
            };
            contextual.push(ContextualMatch {
                matched,
                surrounding,
            });
        }
        Ok(contextual)
    }

    /// Chunks most similar to an existing chunk, excluding the chunk itself.
    pub async fn find_related(
        &self,
        chunk_id: &ChunkId,
        max_results: usize,
    ) -> RetrievalResult<Vec<DocumentMatch>> {
        let chunk = self.db.get_chunk(chunk_id)?;
        let vector = self.embedder.embed(&chunk.content).await?;

        // Fetch one extra row since the chunk matches itself at distance 0
        let query = SearchQuery::new(&chunk.content).with_max_results(max_results + 1);
        let mut matches = self.db.vector_search(&vector, &query, max_results + 1)?;
        matches.retain(|m| &m.chunk.id != chunk_id);
        matches.truncate(max_results);
        Ok(matches)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use quarry_core::{ChunkStrategy, ContentType, Document};
    use quarry_ollama::{OllamaError, OllamaResult};

    /// Embeds text as a one-dimensional vector of its character count, so
    /// distances between texts are length differences.
    pub(crate) struct LengthEmbedder;

    #[async_trait]
    impl EmbeddingProvider for LengthEmbedder {
        async fn embed(&self, text: &str) -> OllamaResult<Vec<f32>> {
            Ok(vec![text.chars().count() as f32])
        }

        fn model_name(&self) -> &str {
            "length-embed"
        }
    }

    pub(crate) struct FailingEmbedder;

    #[async_trait]
    impl EmbeddingProvider for FailingEmbedder {
        async fn embed(&self, _text: &str) -> OllamaResult<Vec<f32>> {
            Err(OllamaError::ServerNotRunning {
                host: "http://localhost:11434".to_string(),
            })
        }

        fn model_name(&self) -> &str {
            "length-embed"
        }
    }

    pub(crate) fn seed_document(db: &Database, name: &str, chunk_texts: &[&str]) -> Document {
        let mut doc = Document::new(
            name,
            format!("/tmp/{name}"),
            format!("hash-{name}"),
            ContentType::Text,
            100,
        );
        doc.mark_processed(chunk_texts.len() as i64);
        let chunks: Vec<Chunk> = chunk_texts
            .iter()
            .enumerate()
            .map(|(i, text)| Chunk::new(doc.id.clone(), i as i32, *text, ChunkStrategy::Sentence))
            .collect();
        let embeddings: Vec<Vec<f32>> = chunk_texts
            .iter()
            .map(|text| vec![text.chars().count() as f32])
            .collect();
        db.insert_document_tree(&doc, &chunks, &embeddings, "length-embed")
            .unwrap();
        doc
    }

    fn engine() -> (RetrievalEngine, Database) {
        let db = Database::open_in_memory().unwrap();
        (RetrievalEngine::new(db.clone(), Arc::new(LengthEmbedder)), db)
    }

    #[tokio::test]
    async fn test_search_orders_by_similarity() {
        let (engine, db) = engine();
        // Query "abcd" embeds as [4]; lengths 4, 6, 14 give distances 0, 2, 10
        seed_document(&db, "a.txt", &["wxyz", "sixsix", "fourteen chars"]);

        let result = engine.search(&SearchQuery::new("abcd")).await.unwrap();

        assert_eq!(result.total_matches, 3);
        assert_eq!(result.matches[0].chunk.content, "wxyz");
        assert_eq!(result.matches[0].similarity, 1.0);
        assert!(result.has_results());
        assert_eq!(result.best_match().unwrap().chunk.content, "wxyz");
        assert!(result.search_time_ms >= 0.0);
    }

    #[tokio::test]
    async fn test_search_applies_similarity_floor() {
        let (engine, db) = engine();
        seed_document(&db, "a.txt", &["wxyz", "sixsix", "fourteen chars"]);

        // Distances 0, 2, 10 give similarities 1.0, 0.33, 0.09
        let query = SearchQuery::new("abcd").with_min_similarity(0.3);
        let result = engine.search(&query).await.unwrap();

        assert_eq!(result.total_matches, 2);
        assert!(result.matches.iter().all(|m| m.similarity >= 0.3));
    }

    #[tokio::test]
    async fn test_search_respects_document_filter() {
        let (engine, db) = engine();
        let doc_a = seed_document(&db, "a.txt", &["wxyz"]);
        seed_document(&db, "b.txt", &["abcd"]);

        let query = SearchQuery::new("abcd").in_documents(vec![doc_a.id.clone()]);
        let result = engine.search(&query).await.unwrap();
        assert!(result.matches.iter().all(|m| m.chunk.document_id == doc_a.id));

        // A filter matching nothing yields the empty result, not an error
        let query = SearchQuery::new("abcd").in_documents(vec!["missing".to_string()]);
        let result = engine.search(&query).await.unwrap();
        assert!(!result.has_results());
    }

    #[tokio::test]
    async fn test_context_expansion_around_match() {
        let (engine, db) = engine();
        // Ten chunks; only index 5 has length 4 to match the query exactly
        let texts: Vec<String> = (0..10)
            .map(|i| {
                if i == 5 {
                    "wxyz".to_string()
                } else {
                    format!("chunk body number {i} with filler")
                }
            })
            .collect();
        let refs: Vec<&str> = texts.iter().map(|s| s.as_str()).collect();
        seed_document(&db, "a.txt", &refs);

        let query = SearchQuery::new("abcd").with_max_results(1);
        let results = engine.search_with_context(&query, 2).await.unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].matched.chunk.chunk_index, 5);
        let indices: Vec<i32> = results[0].surrounding.iter().map(|c| c.chunk_index).collect();
        assert_eq!(indices, vec![3, 4, 6, 7]);
    }

    #[tokio::test]
    async fn test_context_expansion_clips_at_boundaries() {
        let (engine, db) = engine();
        let texts = ["wxyz", "chunk body number 1 filler", "chunk body number 2 filler"];
        seed_document(&db, "a.txt", &texts);

        let query = SearchQuery::new("abcd").with_max_results(1);
        let results = engine.search_with_context(&query, 2).await.unwrap();

        assert_eq!(results[0].matched.chunk.chunk_index, 0);
        let indices: Vec<i32> = results[0].surrounding.iter().map(|c| c.chunk_index).collect();
        assert_eq!(indices, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_find_related_excludes_self() {
        let (engine, db) = engine();
        let doc = seed_document(&db, "a.txt", &["wxyz", "qrst", "a longer chunk here"]);
        let chunks = db.get_chunks_by_document(&doc.id).unwrap();
        let target = &chunks[0];

        let related = engine.find_related(&target.id, 5).await.unwrap();

        assert!(!related.is_empty());
        assert!(related.iter().all(|m| m.chunk.id != target.id));
        // The identical-length sibling is the closest
        assert_eq!(related[0].chunk.content, "qrst");
    }
}
