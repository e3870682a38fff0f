//! Content extraction from source files.
//!
//! Turns a path on disk into plain text plus identity metadata (SHA-256
//! content hash, size, detected content type). Text formats go through an
//! encoding fallback chain; PDF goes through `pdf_extract`.

use crate::error::{IngestError, IngestResult};
use pulldown_cmark::{Event, HeadingLevel, Parser, Tag};
use quarry_core::ContentType;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::debug;

/// Identity metadata for a file, computed before any extraction work.
#[derive(Debug, Clone)]
pub struct FileMetadata {
    pub filename: String,
    pub content_hash: String,
    pub file_size: i64,
    pub content_type: ContentType,
}

/// Text pulled out of a source file.
#[derive(Debug, Clone)]
pub struct ExtractedContent {
    pub text: String,
    /// Display title, when the format carries one (first H1 for markdown).
    pub title: Option<String>,
}

/// Extracts plain text from supported file formats.
pub struct ContentExtractor;

impl ContentExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Whether a path's extension maps to a supported content type.
    pub fn supports(&self, path: &Path) -> bool {
        self.detect_content_type(path).is_some()
    }

    /// Detect the content type from the file extension.
    pub fn detect_content_type(&self, path: &Path) -> Option<ContentType> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(ContentType::from_extension)
    }

    /// Compute identity metadata without reading the whole file into memory.
    /// The hash streams through a fixed-size buffer, so this is safe to call
    /// on files larger than RAM.
    pub fn file_metadata(&self, path: &Path) -> IngestResult<FileMetadata> {
        if !path.is_file() {
            return Err(IngestError::FileNotFound(path.to_path_buf()));
        }

        let content_type = self
            .detect_content_type(path)
            .ok_or_else(|| IngestError::UnsupportedFormat(describe_extension(path)))?;

        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        let file = File::open(path)?;
        let file_size = file.metadata()?.len() as i64;

        let mut reader = BufReader::new(file);
        let mut hasher = Sha256::new();
        let mut buffer = [0u8; 64 * 1024];
        loop {
            let read = reader.read(&mut buffer)?;
            if read == 0 {
                break;
            }
            hasher.update(&buffer[..read]);
        }
        let content_hash = format!("{:x}", hasher.finalize());

        Ok(FileMetadata {
            filename,
            content_hash,
            file_size,
            content_type,
        })
    }

    /// Extract text from a file of a known content type.
    pub fn extract(&self, path: &Path, content_type: ContentType) -> IngestResult<ExtractedContent> {
        debug!("Extracting {} as {}", path.display(), content_type);

        match content_type {
            ContentType::Pdf => self.extract_pdf(path),
            // Markdown keeps its raw markup so the chunker can see headers;
            // only the title is pulled out of the parsed event stream.
            ContentType::Markdown => {
                let text = self.read_text(path)?;
                let title = markdown_title(&text);
                Ok(ExtractedContent { text, title })
            }
            _ => {
                let text = self.read_text(path)?;
                Ok(ExtractedContent { text, title: None })
            }
        }
    }

    fn read_text(&self, path: &Path) -> IngestResult<String> {
        let bytes = std::fs::read(path)?;
        decode_text(&bytes).ok_or_else(|| IngestError::DecodingError {
            path: path.to_path_buf(),
        })
    }

    fn extract_pdf(&self, path: &Path) -> IngestResult<ExtractedContent> {
        let text = pdf_extract::extract_text(path).map_err(|e| IngestError::ExtractionError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        if text.trim().is_empty() {
            return Err(IngestError::ExtractionError {
                path: path.to_path_buf(),
                message: "no extractable text (scanned or image-only PDF)".to_string(),
            });
        }

        Ok(ExtractedContent { text, title: None })
    }
}

impl Default for ContentExtractor {
    fn default() -> Self {
        Self::new()
    }
}

/// Decode raw bytes, trying UTF-8, then UTF-16 (BOM-aware, defaulting to
/// little-endian), then Latin-1. Returns None for binary content that would
/// decode to NUL-riddled garbage.
pub fn decode_text(bytes: &[u8]) -> Option<String> {
    if let Ok(text) = std::str::from_utf8(bytes) {
        // NUL bytes are valid UTF-8 but never text; UTF-16LE ASCII is full
        // of them, so fall through to the UTF-16 probe instead.
        if !text.contains('\0') {
            // Strip a UTF-8 BOM if present
            return Some(text.trim_start_matches('\u{feff}').to_string());
        }
    }

    if let Some(text) = decode_utf16(bytes) {
        return Some(text);
    }

    // Latin-1 maps every byte, but NUL bytes mean this was never text
    if bytes.contains(&0) {
        return None;
    }
    Some(bytes.iter().map(|&b| b as char).collect())
}

fn decode_utf16(bytes: &[u8]) -> Option<String> {
    if bytes.len() < 2 || bytes.len() % 2 != 0 {
        return None;
    }

    let (payload, big_endian) = match (bytes[0], bytes[1]) {
        (0xFF, 0xFE) => (&bytes[2..], false),
        (0xFE, 0xFF) => (&bytes[2..], true),
        // Without a BOM, only accept byte patterns that actually look like
        // UTF-16: Latin-script text encoded as UTF-16LE has zero high bytes.
        // Anything else is left for the Latin-1 fallback.
        _ => {
            if !looks_like_utf16_le(bytes) {
                return None;
            }
            (bytes, false)
        }
    };

    let units: Vec<u16> = payload
        .chunks_exact(2)
        .map(|pair| {
            if big_endian {
                u16::from_be_bytes([pair[0], pair[1]])
            } else {
                u16::from_le_bytes([pair[0], pair[1]])
            }
        })
        .collect();

    String::from_utf16(&units).ok().filter(|s| !s.contains('\0'))
}

/// At least half of the 16-bit units must have a zero high byte for a
/// BOM-less buffer to be treated as UTF-16LE.
fn looks_like_utf16_le(bytes: &[u8]) -> bool {
    let units = bytes.len() / 2;
    let zero_high = bytes.chunks_exact(2).filter(|pair| pair[1] == 0).count();
    units > 0 && zero_high * 2 >= units
}

/// First H1 heading of a markdown document, if any.
pub fn markdown_title(markdown: &str) -> Option<String> {
    let parser = Parser::new(markdown);
    let mut in_h1 = false;
    let mut title = String::new();

    for event in parser {
        match event {
            Event::Start(Tag::Heading(HeadingLevel::H1, _, _)) => {
                in_h1 = true;
            }
            Event::End(Tag::Heading(HeadingLevel::H1, _, _)) => {
                let trimmed = title.trim();
                if !trimmed.is_empty() {
                    return Some(trimmed.to_string());
                }
                in_h1 = false;
                title.clear();
            }
            Event::Text(t) | Event::Code(t) if in_h1 => {
                title.push_str(&t);
            }
            _ => {}
        }
    }

    None
}

fn describe_extension(path: &Path) -> String {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{ext}"))
        .unwrap_or_else(|| "(no extension)".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_detect_content_type() {
        let extractor = ContentExtractor::new();
        assert_eq!(
            extractor.detect_content_type(Path::new("notes.md")),
            Some(ContentType::Markdown)
        );
        assert_eq!(
            extractor.detect_content_type(Path::new("main.rs")),
            Some(ContentType::Code)
        );
        assert_eq!(extractor.detect_content_type(Path::new("app.exe")), None);
        assert!(!extractor.supports(Path::new("binary.bin")));
    }

    #[test]
    fn test_file_metadata_hash_is_content_addressed() {
        let dir = tempfile::tempdir().unwrap();
        let path_a = dir.path().join("a.txt");
        let path_b = dir.path().join("b.txt");
        std::fs::write(&path_a, "identical content").unwrap();
        std::fs::write(&path_b, "identical content").unwrap();

        let extractor = ContentExtractor::new();
        let meta_a = extractor.file_metadata(&path_a).unwrap();
        let meta_b = extractor.file_metadata(&path_b).unwrap();

        // Same bytes, same hash, regardless of filename
        assert_eq!(meta_a.content_hash, meta_b.content_hash);
        assert_eq!(meta_a.content_hash.len(), 64);
        assert_eq!(meta_a.file_size, 17);
        assert_eq!(meta_a.filename, "a.txt");
    }

    #[test]
    fn test_unsupported_extension_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("image.png");
        std::fs::write(&path, [0x89, 0x50, 0x4E, 0x47]).unwrap();

        let err = ContentExtractor::new().file_metadata(&path).unwrap_err();
        assert!(matches!(err, IngestError::UnsupportedFormat(_)));
    }

    #[test]
    fn test_decode_utf8() {
        assert_eq!(decode_text("héllo wörld".as_bytes()).unwrap(), "héllo wörld");
        // UTF-8 BOM is stripped
        let mut bytes = vec![0xEF, 0xBB, 0xBF];
        bytes.extend_from_slice(b"plain");
        assert_eq!(decode_text(&bytes).unwrap(), "plain");
    }

    #[test]
    fn test_decode_utf16_le_with_bom() {
        let mut bytes = vec![0xFF, 0xFE];
        for unit in "héllo".encode_utf16() {
            bytes.extend_from_slice(&unit.to_le_bytes());
        }
        assert_eq!(decode_text(&bytes).unwrap(), "héllo");
    }

    #[test]
    fn test_decode_utf16_le_without_bom() {
        let mut bytes = Vec::new();
        for unit in "hello utf-16".encode_utf16() {
            bytes.extend_from_slice(&unit.to_le_bytes());
        }
        assert_eq!(decode_text(&bytes).unwrap(), "hello utf-16");
    }

    #[test]
    fn test_decode_latin1_fallback() {
        // 0xE9 is é in Latin-1 but invalid as a lone UTF-8 byte
        let bytes = vec![b'c', b'a', b'f', 0xE9];
        assert_eq!(decode_text(&bytes).unwrap(), "café");

        // Even-length Latin-1 must not be mistaken for BOM-less UTF-16
        let bytes: Vec<u8> = "naïve résumé".chars().map(|c| c as u8).collect();
        assert_eq!(bytes.len() % 2, 0);
        assert_eq!(decode_text(&bytes).unwrap(), "naïve résumé");
    }

    #[test]
    fn test_decode_rejects_binary() {
        let bytes = vec![0xFF, 0x00, 0x01, 0x02, 0x00];
        assert!(decode_text(&bytes).is_none());
    }

    #[test]
    fn test_markdown_title() {
        assert_eq!(
            markdown_title("# Getting Started\n\nSome text"),
            Some("Getting Started".to_string())
        );
        assert_eq!(markdown_title("## Only H2 here\n\ntext"), None);
        assert_eq!(markdown_title("no headings at all"), None);
    }

    #[test]
    fn test_extract_markdown_keeps_markup() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.md");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "# Title\n\n## Section\n\nBody text.").unwrap();

        let content = ContentExtractor::new()
            .extract(&path, ContentType::Markdown)
            .unwrap();

        assert_eq!(content.title, Some("Title".to_string()));
        // Header markers survive for the markdown chunker
        assert!(content.text.contains("## Section"));
    }
}
