//! Core domain types for Quarry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for documents.
pub type DocumentId = String;

/// Unique identifier for chunks.
pub type ChunkId = String;

/// Generate a new unique ID.
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Content classification for an ingested file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Text,
    Markdown,
    Code,
    Markup,
    Structured,
    Csv,
    Pdf,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Text => "text",
            ContentType::Markdown => "markdown",
            ContentType::Code => "code",
            ContentType::Markup => "markup",
            ContentType::Structured => "structured",
            ContentType::Csv => "csv",
            ContentType::Pdf => "pdf",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "text" => Some(ContentType::Text),
            "markdown" => Some(ContentType::Markdown),
            "code" => Some(ContentType::Code),
            "markup" => Some(ContentType::Markup),
            "structured" => Some(ContentType::Structured),
            "csv" => Some(ContentType::Csv),
            "pdf" => Some(ContentType::Pdf),
            _ => None,
        }
    }

    /// Classify a file by extension against the supported-type registry.
    /// Returns `None` for formats Quarry cannot extract.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "md" | "markdown" => Some(ContentType::Markdown),
            "rs" | "py" | "js" | "ts" | "go" | "c" | "cpp" | "h" | "hpp" | "java" | "rb"
            | "sh" | "bash" | "zsh" | "sql" => Some(ContentType::Code),
            "html" | "htm" | "xml" => Some(ContentType::Markup),
            "json" | "yaml" | "yml" | "toml" | "ini" | "cfg" | "conf" => {
                Some(ContentType::Structured)
            }
            "csv" => Some(ContentType::Csv),
            "pdf" => Some(ContentType::Pdf),
            "txt" | "text" | "rst" | "log" | "org" => Some(ContentType::Text),
            _ => None,
        }
    }

    /// Whether this type is plain text on disk (safe to split by lines/bytes).
    pub fn is_text_like(&self) -> bool {
        !matches!(self, ContentType::Pdf)
    }
}

impl std::fmt::Display for ContentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Processing status of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    #[default]
    Pending,
    Processed,
    Failed,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentStatus::Pending => "pending",
            DocumentStatus::Processed => "processed",
            DocumentStatus::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(DocumentStatus::Pending),
            "processed" => Some(DocumentStatus::Processed),
            "failed" => Some(DocumentStatus::Failed),
            _ => None,
        }
    }
}

impl std::fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Strategy used to split extracted text into chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ChunkStrategy {
    #[default]
    Sentence,
    Paragraph,
    Code,
    Markdown,
    Fixed,
}

impl ChunkStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChunkStrategy::Sentence => "sentence",
            ChunkStrategy::Paragraph => "paragraph",
            ChunkStrategy::Code => "code",
            ChunkStrategy::Markdown => "markdown",
            ChunkStrategy::Fixed => "fixed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "sentence" => Some(ChunkStrategy::Sentence),
            "paragraph" => Some(ChunkStrategy::Paragraph),
            "code" => Some(ChunkStrategy::Code),
            "markdown" => Some(ChunkStrategy::Markdown),
            "fixed" => Some(ChunkStrategy::Fixed),
            _ => None,
        }
    }

    /// Infer the strategy for a content type; falls back to `default` for
    /// prose-like content.
    pub fn for_content_type(content_type: ContentType, default: ChunkStrategy) -> Self {
        match content_type {
            ContentType::Code => ChunkStrategy::Code,
            ContentType::Markdown => ChunkStrategy::Markdown,
            _ => default,
        }
    }
}

impl std::fmt::Display for ChunkStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An ingested document in the corpus.
///
/// Identity is the SHA-256 hash of the raw bytes; re-ingesting identical
/// content never creates a second row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub filename: String,
    pub source_path: String,
    pub content_hash: String,
    pub content_type: ContentType,
    pub file_size: i64,
    pub status: DocumentStatus,
    pub chunk_count: i64,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

impl Document {
    pub fn new(
        filename: impl Into<String>,
        source_path: impl Into<String>,
        content_hash: impl Into<String>,
        content_type: ContentType,
        file_size: i64,
    ) -> Self {
        Self {
            id: new_id(),
            filename: filename.into(),
            source_path: source_path.into(),
            content_hash: content_hash.into(),
            content_type,
            file_size,
            status: DocumentStatus::Pending,
            chunk_count: 0,
            metadata: serde_json::json!({}),
            created_at: Utc::now(),
            processed_at: None,
        }
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn mark_processed(&mut self, chunk_count: i64) {
        self.status = DocumentStatus::Processed;
        self.chunk_count = chunk_count;
        self.processed_at = Some(Utc::now());
    }
}

/// A bounded span of a document's text, independently embedded and searchable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub id: ChunkId,
    pub document_id: DocumentId,
    pub chunk_index: i32,
    pub content: String,
    pub char_count: i64,
    pub token_count: i64,
    pub strategy: ChunkStrategy,
    pub heading: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Chunk {
    pub fn new(
        document_id: DocumentId,
        chunk_index: i32,
        content: impl Into<String>,
        strategy: ChunkStrategy,
    ) -> Self {
        let content = content.into();
        let char_count = content.chars().count() as i64;
        Self {
            id: new_id(),
            document_id,
            chunk_index,
            char_count,
            // Rough estimate: ~4 characters per token for English text
            token_count: char_count / 4,
            content,
            strategy,
            heading: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_heading(mut self, heading: impl Into<String>) -> Self {
        self.heading = Some(heading.into());
        self
    }
}

/// Parameters for a similarity search. Ephemeral; built per query.
#[derive(Debug, Clone, Default)]
pub struct SearchQuery {
    pub query_text: String,
    pub max_results: usize,
    pub document_ids: Option<Vec<DocumentId>>,
    pub content_types: Option<Vec<ContentType>>,
    pub date_range: Option<(DateTime<Utc>, DateTime<Utc>)>,
    pub min_similarity: Option<f32>,
}

impl SearchQuery {
    pub fn new(query_text: impl Into<String>) -> Self {
        Self {
            query_text: query_text.into(),
            max_results: 10,
            ..Default::default()
        }
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }

    pub fn in_documents(mut self, document_ids: Vec<DocumentId>) -> Self {
        self.document_ids = Some(document_ids);
        self
    }

    pub fn with_content_types(mut self, content_types: Vec<ContentType>) -> Self {
        self.content_types = Some(content_types);
        self
    }

    pub fn with_date_range(mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        self.date_range = Some((start, end));
        self
    }

    pub fn with_min_similarity(mut self, min_similarity: f32) -> Self {
        self.min_similarity = Some(min_similarity);
        self
    }
}

/// A matched chunk with its similarity score and provenance.
/// Produced fresh per query; never persisted.
#[derive(Debug, Clone)]
pub struct DocumentMatch {
    pub chunk: Chunk,
    pub similarity: f32,
    pub filename: String,
    pub filepath: String,
    pub content_type: ContentType,
}

/// The complete result of a similarity search.
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub query: String,
    pub matches: Vec<DocumentMatch>,
    pub total_matches: usize,
    pub search_time_ms: f64,
    pub embedding_time_ms: f64,
}

impl SearchResult {
    pub fn has_results(&self) -> bool {
        !self.matches.is_empty()
    }

    pub fn best_match(&self) -> Option<&DocumentMatch> {
        self.matches.first()
    }
}

/// Aggregate outcome of a batch ingestion run.
#[derive(Debug, Clone, Default)]
pub struct IngestReport {
    pub total_files: usize,
    pub processed_files: usize,
    pub skipped_files: usize,
    pub failed_files: usize,
    pub total_chunks: usize,
    pub errors: Vec<String>,
}

impl IngestReport {
    pub fn record_processed(&mut self, chunk_count: usize) {
        self.processed_files += 1;
        self.total_chunks += chunk_count;
    }

    pub fn record_skipped(&mut self) {
        self.skipped_files += 1;
    }

    pub fn record_failed(&mut self, error: impl Into<String>) {
        self.failed_files += 1;
        self.errors.push(error.into());
    }
}

/// Snapshot of corpus-wide counts, shown by the stats command.
#[derive(Debug, Clone, Default)]
pub struct DatabaseStats {
    pub total_documents: i64,
    pub documents_by_status: std::collections::HashMap<String, i64>,
    pub documents_by_type: std::collections::HashMap<String, i64>,
    pub total_chunks: i64,
    pub total_embeddings: i64,
    pub database_size_bytes: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_type_from_extension() {
        assert_eq!(ContentType::from_extension("md"), Some(ContentType::Markdown));
        assert_eq!(ContentType::from_extension("RS"), Some(ContentType::Code));
        assert_eq!(ContentType::from_extension("pdf"), Some(ContentType::Pdf));
        assert_eq!(ContentType::from_extension("txt"), Some(ContentType::Text));
        assert_eq!(ContentType::from_extension("exe"), None);
    }

    #[test]
    fn test_strategy_inference() {
        assert_eq!(
            ChunkStrategy::for_content_type(ContentType::Code, ChunkStrategy::Sentence),
            ChunkStrategy::Code
        );
        assert_eq!(
            ChunkStrategy::for_content_type(ContentType::Markdown, ChunkStrategy::Sentence),
            ChunkStrategy::Markdown
        );
        assert_eq!(
            ChunkStrategy::for_content_type(ContentType::Text, ChunkStrategy::Paragraph),
            ChunkStrategy::Paragraph
        );
    }

    #[test]
    fn test_document_lifecycle() {
        let mut doc = Document::new("notes.md", "/tmp/notes.md", "abc123", ContentType::Markdown, 42);
        assert_eq!(doc.status, DocumentStatus::Pending);
        assert!(doc.processed_at.is_none());

        doc.mark_processed(7);
        assert_eq!(doc.status, DocumentStatus::Processed);
        assert_eq!(doc.chunk_count, 7);
        assert!(doc.processed_at.is_some());
    }

    #[test]
    fn test_chunk_counts() {
        let chunk = Chunk::new("doc1".to_string(), 0, "hello world!", ChunkStrategy::Sentence);
        assert_eq!(chunk.char_count, 12);
        assert_eq!(chunk.token_count, 3);
        assert!(chunk.heading.is_none());
    }

    #[test]
    fn test_search_query_builder() {
        let query = SearchQuery::new("rust borrow checker")
            .with_max_results(5)
            .in_documents(vec!["d1".to_string()])
            .with_min_similarity(0.4);

        assert_eq!(query.max_results, 5);
        assert_eq!(query.document_ids.as_ref().map(|d| d.len()), Some(1));
        assert_eq!(query.min_similarity, Some(0.4));
        assert!(query.content_types.is_none());
    }

    #[test]
    fn test_ingest_report_aggregation() {
        let mut report = IngestReport::default();
        report.total_files = 3;
        report.record_processed(12);
        report.record_skipped();
        report.record_failed("bad.pdf: extraction failed");

        assert_eq!(report.processed_files, 1);
        assert_eq!(report.skipped_files, 1);
        assert_eq!(report.failed_files, 1);
        assert_eq!(report.total_chunks, 12);
        assert_eq!(report.errors.len(), 1);
    }
}
