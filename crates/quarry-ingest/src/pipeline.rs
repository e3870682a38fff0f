//! The ingestion pipeline: hash, dedup, extract, chunk, embed, persist.
//!
//! Files are processed sequentially within a batch. A single file's failure
//! is recorded in the report and never aborts its siblings. Everything
//! belonging to one document (row, chunks, embeddings) commits in a single
//! transaction, so partial documents are never observable.

use crate::chunk::TextChunker;
use crate::error::{IngestError, IngestResult};
use crate::extract::ContentExtractor;
use crate::split::LargeFileSplitter;
use quarry_config::Config;
use quarry_core::{Chunk, ChunkStrategy, Document, IngestReport};
use quarry_db::Database;
use quarry_ollama::EmbeddingProvider;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Dedup behavior for files whose content or path is already in the corpus.
#[derive(Debug, Clone, Copy)]
pub struct IngestOptions {
    /// Skip files whose content hash already exists.
    pub skip_existing: bool,
    /// Replace the chunks of a document re-ingested from the same path with
    /// changed content.
    pub update_existing: bool,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            skip_existing: true,
            update_existing: false,
        }
    }
}

/// Outcome of ingesting one file.
#[derive(Debug)]
pub enum IngestOutcome {
    /// Document persisted (created or updated), with its final chunk count.
    Processed(Document),
    /// Content already in the corpus; nothing written.
    Skipped,
}

/// Runs files through extraction, chunking, embedding, and persistence.
pub struct IngestionPipeline {
    db: Database,
    embedder: Arc<dyn EmbeddingProvider>,
    extractor: ContentExtractor,
    splitter: LargeFileSplitter,
    chunker: TextChunker,
    default_strategy: ChunkStrategy,
    options: IngestOptions,
}

impl IngestionPipeline {
    pub fn new(db: Database, embedder: Arc<dyn EmbeddingProvider>, config: &Config) -> Self {
        Self {
            db,
            embedder,
            extractor: ContentExtractor::new(),
            splitter: LargeFileSplitter::from_config(&config.large_files),
            chunker: TextChunker::from_config(&config.chunking),
            default_strategy: ChunkStrategy::from_str(&config.chunking.strategy)
                .unwrap_or_default(),
            options: IngestOptions {
                skip_existing: config.ingest.skip_existing,
                update_existing: config.ingest.update_existing,
            },
        }
    }

    pub fn with_options(mut self, options: IngestOptions) -> Self {
        self.options = options;
        self
    }

    /// Ingest a single file.
    pub async fn ingest_file(&self, path: &Path) -> IngestResult<IngestOutcome> {
        let meta = self.extractor.file_metadata(path)?;
        let source_path = path.to_string_lossy().to_string();

        // Dedup by content hash first: identical bytes never ingest twice.
        if self.db.find_document_by_hash(&meta.content_hash)?.is_some() {
            debug!("Skipping {} (content already ingested)", path.display());
            return Ok(IngestOutcome::Skipped);
        }

        // Same path, different content: replace when updates are enabled.
        let existing = self.db.find_document_by_path(&source_path)?;
        if existing.is_some() {
            if !self.options.update_existing {
                debug!(
                    "Skipping {} (path already ingested, updates disabled)",
                    path.display()
                );
                return Ok(IngestOutcome::Skipped);
            }
            debug!("Updating {} (content changed)", path.display());
        }

        let text = self.extract_text(path, &meta)?;

        let strategy = ChunkStrategy::for_content_type(meta.content_type, self.default_strategy);
        let candidates = self.chunker.chunk(&text.text, strategy);

        let mut metadata = serde_json::json!({});
        if let Some(title) = &text.title {
            metadata["title"] = serde_json::Value::String(title.clone());
        }

        let updating = existing.is_some();
        let mut document = match existing {
            Some(mut doc) => {
                doc.content_hash = meta.content_hash.clone();
                doc.file_size = meta.file_size;
                doc.metadata = metadata;
                doc
            }
            None => Document::new(
                meta.filename.clone(),
                source_path,
                meta.content_hash.clone(),
                meta.content_type,
                meta.file_size,
            )
            .with_metadata(metadata),
        };
        document.mark_processed(candidates.len() as i64);

        let chunks: Vec<Chunk> = candidates
            .into_iter()
            .map(|c| {
                let chunk = Chunk::new(document.id.clone(), c.index, c.content, c.strategy);
                match c.heading {
                    Some(heading) => chunk.with_heading(heading),
                    None => chunk,
                }
            })
            .collect();

        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let embeddings = self.embedder.embed_batch(&texts).await?;
        let model = self.embedder.model_name();

        let result = if updating {
            self.db
                .replace_document_tree(&document, &chunks, &embeddings, model)
        } else {
            self.db
                .insert_document_tree(&document, &chunks, &embeddings, model)
        };

        match result {
            Ok(()) => {
                info!(
                    "Ingested {} ({} chunks)",
                    path.display(),
                    document.chunk_count
                );
                Ok(IngestOutcome::Processed(document))
            }
            // A concurrent ingest won the hash race: already exists, not an error
            Err(e) if e.is_unique_violation() => {
                debug!("Skipping {} (lost dedup race)", path.display());
                Ok(IngestOutcome::Skipped)
            }
            Err(e) => Err(IngestError::Database(e)),
        }
    }

    /// Ingest every supported file under a directory. Per-file failures go
    /// into the report; siblings keep processing.
    pub async fn ingest_directory(&self, path: &Path, recursive: bool) -> IngestResult<IngestReport> {
        let files = self.collect_files(path, recursive)?;

        let mut report = IngestReport {
            total_files: files.len(),
            ..Default::default()
        };

        for file in files {
            match self.ingest_file(&file).await {
                Ok(IngestOutcome::Processed(doc)) => {
                    report.record_processed(doc.chunk_count as usize);
                }
                Ok(IngestOutcome::Skipped) => report.record_skipped(),
                Err(e) => {
                    warn!("Failed to ingest {}: {}", file.display(), e);
                    report.record_failed(format!("{}: {}", file.display(), e));
                }
            }
        }

        info!(
            "Ingestion finished: {} processed, {} skipped, {} failed, {} chunks",
            report.processed_files, report.skipped_files, report.failed_files, report.total_chunks
        );
        Ok(report)
    }

    /// Supported files under a directory, sorted for a deterministic order.
    pub fn collect_files(&self, path: &Path, recursive: bool) -> IngestResult<Vec<std::path::PathBuf>> {
        if !path.is_dir() {
            return Err(IngestError::FileNotFound(path.to_path_buf()));
        }

        let walker = if recursive {
            walkdir::WalkDir::new(path)
        } else {
            walkdir::WalkDir::new(path).max_depth(1)
        };

        let mut files: Vec<std::path::PathBuf> = walker
            .into_iter()
            .filter_entry(|entry| !is_hidden(entry))
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.into_path())
            .filter(|p| self.extractor.supports(p))
            .collect();
        files.sort();
        Ok(files)
    }

    /// Extract text, going through the splitter for oversized files so each
    /// part is decoded independently.
    fn extract_text(
        &self,
        path: &Path,
        meta: &crate::extract::FileMetadata,
    ) -> IngestResult<crate::extract::ExtractedContent> {
        if !self.splitter.should_split(path, meta.content_type)? {
            return self.extractor.extract(path, meta.content_type);
        }

        let parts = self.splitter.split(path, meta.content_type)?;
        let mut combined = String::new();
        let mut title = None;
        for part in parts.iter() {
            let extracted = self.extractor.extract(&part.path, meta.content_type)?;
            if title.is_none() {
                title = extracted.title;
            }
            combined.push_str(&extracted.text);
        }
        // Parts drop here and the scratch directory goes with them
        Ok(crate::extract::ExtractedContent {
            text: combined,
            title,
        })
    }
}

/// Dotfiles and dot-directories are never ingested. The walk root itself is
/// exempt so a hidden working directory can still be scanned explicitly.
fn is_hidden(entry: &walkdir::DirEntry) -> bool {
    entry.depth() > 0
        && entry
            .file_name()
            .to_str()
            .map(|name| name.starts_with('.'))
            .unwrap_or(false)
}
