//! Quarry Ingest - turns files into chunked, embedded, searchable documents.

mod chunk;
mod error;
mod extract;
mod pipeline;
mod split;

pub use chunk::{ChunkCandidate, ChunkerConfig, TextChunker};
pub use error::{IngestError, IngestResult};
pub use extract::{ContentExtractor, ExtractedContent, FileMetadata};
pub use pipeline::{IngestOptions, IngestOutcome, IngestionPipeline};
pub use split::{FilePart, LargeFileSplitter, SplitConfig, SplitParts, SplitStrategy};
