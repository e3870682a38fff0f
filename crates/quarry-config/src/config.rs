//! Configuration structures and loading.

use crate::error::{ConfigError, ConfigResult};
use crate::paths::AppPaths;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,

    #[serde(default)]
    pub ollama: OllamaConfig,

    #[serde(default)]
    pub chunking: ChunkingConfig,

    #[serde(default)]
    pub large_files: LargeFileConfig,

    #[serde(default)]
    pub ingest: IngestConfig,

    #[serde(default)]
    pub rag: RagConfig,
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> ConfigResult<Self> {
        let paths = AppPaths::new().ok_or(ConfigError::NoConfigDir)?;
        Self::load_from(&paths.config_file)
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &PathBuf) -> ConfigResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Save configuration to a specific path.
    pub fn save_to(&self, path: &PathBuf) -> ConfigResult<()> {
        let contents = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Create a default config file with comments.
    pub fn create_default_file(path: &PathBuf) -> ConfigResult<()> {
        let default_config = Self::default_config_string();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, default_config)?;
        Ok(())
    }

    /// Generate a default config file with helpful comments.
    pub fn default_config_string() -> String {
        r#"# Quarry Configuration
# Semantic retrieval over your document corpus

[general]
# Data directory for the database
# data_dir = "~/.local/share/quarry"

[ollama]
# Ollama server address
host = "http://localhost:11434"

# Default model for generation
model = "gpt-oss:20b"

# Model for generating embeddings
embedding_model = "nomic-embed-text"

# Expected embedding dimensionality (must be constant across the corpus)
embedding_dimensions = 768

# Request timeout in seconds
timeout_seconds = 120

[chunking]
# Maximum chunk size in characters
max_chunk_size = 1000

# Minimum chunk size; smaller candidates merge into a neighbor
min_chunk_size = 100

# Characters carried from the end of one chunk into the next
overlap_size = 100

# Default strategy for prose: sentence, paragraph, fixed
strategy = "sentence"

# Snap fixed-size cuts to whitespace boundaries
respect_boundaries = true

# Tag markdown chunks with their header path
preserve_headers = true

[large_files]
# Pre-split files larger than this before extraction (bytes)
enabled = true
threshold_bytes = 104857600    # 100 MiB
target_bytes = 52428800        # 50 MiB per split part
overlap_lines = 50

# Split strategy: size, line, markdown
strategy = "size"

[ingest]
# Skip files whose content hash is already in the corpus
skip_existing = true

# Replace chunks when a previously ingested path changes
update_existing = false

[rag]
# Toggle retrieval entirely
enable_retrieval = true

# Cap on retrieved context chunks
max_retrieval_results = 5

# Similarity floor for retrieved context (0.0 to 1.0)
min_similarity_score = 0.3

# Neighboring-chunk expansion radius
context_size = 1

# Rewrite the query using recent conversation turns
retrieval_query_enhancement = true

# Attach source paths to the augmented prompt
include_source_metadata = true
"#
        .to_string()
    }
}

/// General application settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeneralConfig {
    pub data_dir: Option<String>,
}

/// Ollama LLM settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OllamaConfig {
    pub host: String,
    pub model: String,
    pub embedding_model: String,
    pub embedding_dimensions: usize,
    pub timeout_seconds: u64,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            host: "http://localhost:11434".to_string(),
            model: "gpt-oss:20b".to_string(),
            embedding_model: "nomic-embed-text".to_string(),
            embedding_dimensions: 768,
            timeout_seconds: 120,
        }
    }
}

/// Text chunking settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    pub max_chunk_size: usize,
    pub min_chunk_size: usize,
    pub overlap_size: usize,
    pub strategy: String,
    pub respect_boundaries: bool,
    pub preserve_headers: bool,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chunk_size: 1000,
            min_chunk_size: 100,
            overlap_size: 100,
            strategy: "sentence".to_string(),
            respect_boundaries: true,
            preserve_headers: true,
        }
    }
}

/// Large-file pre-splitting settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LargeFileConfig {
    pub enabled: bool,
    pub threshold_bytes: u64,
    pub target_bytes: u64,
    pub overlap_lines: usize,
    pub strategy: String,
}

impl Default for LargeFileConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold_bytes: 100 * 1024 * 1024,
            target_bytes: 50 * 1024 * 1024,
            overlap_lines: 50,
            strategy: "size".to_string(),
        }
    }
}

/// Ingestion behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    pub skip_existing: bool,
    pub update_existing: bool,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            skip_existing: true,
            update_existing: false,
        }
    }
}

/// Retrieval-augmented generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RagConfig {
    pub enable_retrieval: bool,
    pub max_retrieval_results: usize,
    pub min_similarity_score: f32,
    pub context_size: usize,
    pub retrieval_query_enhancement: bool,
    pub include_source_metadata: bool,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            enable_retrieval: true,
            max_retrieval_results: 5,
            min_similarity_score: 0.3,
            context_size: 1,
            retrieval_query_enhancement: true,
            include_source_metadata: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.ollama.host, "http://localhost:11434");
        assert_eq!(config.chunking.max_chunk_size, 1000);
        assert_eq!(config.large_files.threshold_bytes, 100 * 1024 * 1024);
        assert!(config.rag.enable_retrieval);
        assert!(config.ingest.skip_existing);
    }

    #[test]
    fn test_config_roundtrip() {
        let config = Config::default();
        let serialized = toml::to_string_pretty(&config).unwrap();
        let deserialized: Config = toml::from_str(&serialized).unwrap();

        assert_eq!(config.ollama.embedding_model, deserialized.ollama.embedding_model);
        assert_eq!(config.chunking.overlap_size, deserialized.chunking.overlap_size);
        assert_eq!(config.rag.max_retrieval_results, deserialized.rag.max_retrieval_results);
    }

    #[test]
    fn test_load_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            r#"
            [chunking]
            max_chunk_size = 512

            [rag]
            min_similarity_score = 0.5
            "#
        )
        .unwrap();

        let path = temp_file.path().to_path_buf();
        let config = Config::load_from(&path).unwrap();

        assert_eq!(config.chunking.max_chunk_size, 512);
        assert_eq!(config.rag.min_similarity_score, 0.5);
        // Untouched sections keep their defaults
        assert_eq!(config.chunking.min_chunk_size, 100);
    }

    #[test]
    fn test_load_missing_file_yields_defaults() {
        let path = PathBuf::from("/nonexistent/quarry/config.toml");
        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.ollama.timeout_seconds, 120);
    }

    #[test]
    fn test_default_config_string_parses() {
        let config: Config = toml::from_str(&Config::default_config_string()).unwrap();
        assert_eq!(config.large_files.target_bytes, 50 * 1024 * 1024);
        assert_eq!(config.rag.context_size, 1);
    }
}
