//! Oversized-file splitting.
//!
//! Files past a size threshold are cut into part files before extraction so
//! the rest of the pipeline never holds the whole file in memory. Parts live
//! in a scratch directory owned by the returned [`SplitParts`] handle and are
//! removed when it drops, on every exit path.

use crate::error::{IngestError, IngestResult};
use quarry_config::LargeFileConfig;
use quarry_core::ContentType;
use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info, warn};

/// How to choose cut points in an oversized file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SplitStrategy {
    /// Cut at the last line break at or before the byte target.
    #[default]
    Size,
    /// Cut every N lines, carrying an overlapping tail of lines forward.
    Line,
    /// Cut at markdown header boundaries; oversized sections fall back to
    /// the line rule.
    Markdown,
}

impl SplitStrategy {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "size" => Some(SplitStrategy::Size),
            "line" => Some(SplitStrategy::Line),
            "markdown" => Some(SplitStrategy::Markdown),
            _ => None,
        }
    }
}

/// Configuration for large-file splitting.
#[derive(Debug, Clone)]
pub struct SplitConfig {
    pub enabled: bool,
    pub threshold_bytes: u64,
    pub target_bytes: u64,
    pub overlap_lines: usize,
    pub strategy: SplitStrategy,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold_bytes: 100 * 1024 * 1024,
            target_bytes: 50 * 1024 * 1024,
            overlap_lines: 50,
            strategy: SplitStrategy::Size,
        }
    }
}

impl SplitConfig {
    pub fn from_config(config: &LargeFileConfig) -> Self {
        Self {
            enabled: config.enabled,
            threshold_bytes: config.threshold_bytes,
            target_bytes: config.target_bytes,
            overlap_lines: config.overlap_lines,
            strategy: SplitStrategy::from_str(&config.strategy).unwrap_or_default(),
        }
    }
}

/// One part file produced by a split.
#[derive(Debug, Clone)]
pub struct FilePart {
    pub path: PathBuf,
    pub index: usize,
}

/// Owns the scratch directory holding split parts. Dropping the handle
/// removes the directory; a removal failure is logged, never raised.
pub struct SplitParts {
    parts: Vec<FilePart>,
    dir: Option<TempDir>,
}

impl SplitParts {
    pub fn iter(&self) -> impl Iterator<Item = &FilePart> {
        self.parts.iter()
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }
}

impl Drop for SplitParts {
    fn drop(&mut self) {
        if let Some(dir) = self.dir.take() {
            let path = dir.path().to_path_buf();
            if let Err(e) = dir.close() {
                warn!("Failed to remove split scratch dir {}: {}", path.display(), e);
            }
        }
    }
}

/// Splits oversized files into bounded part files.
pub struct LargeFileSplitter {
    config: SplitConfig,
}

impl LargeFileSplitter {
    pub fn new(config: SplitConfig) -> Self {
        Self { config }
    }

    pub fn from_config(config: &LargeFileConfig) -> Self {
        Self::new(SplitConfig::from_config(config))
    }

    /// Whether a file needs splitting: enabled, text-like, over threshold.
    pub fn should_split(&self, path: &Path, content_type: ContentType) -> IngestResult<bool> {
        if !self.config.enabled || !content_type.is_text_like() {
            return Ok(false);
        }
        let size = std::fs::metadata(path)?.len();
        Ok(size > self.config.threshold_bytes)
    }

    /// Split a file into part files inside a fresh scratch directory.
    pub fn split(&self, path: &Path, content_type: ContentType) -> IngestResult<SplitParts> {
        let size = std::fs::metadata(path)?.len();
        info!(
            "Splitting large file {} ({:.1} MB)",
            path.display(),
            size as f64 / 1024.0 / 1024.0
        );

        let dir = TempDir::new()?;

        // Markdown always splits at section boundaries regardless of the
        // configured strategy, so headers stay at part starts.
        let strategy = if content_type == ContentType::Markdown {
            SplitStrategy::Markdown
        } else {
            self.config.strategy
        };

        let parts = match strategy {
            SplitStrategy::Size => self.split_by_size(path, dir.path())?,
            SplitStrategy::Line => self.split_by_lines(path, dir.path())?,
            SplitStrategy::Markdown => self.split_by_sections(path, dir.path())?,
        };

        debug!("Created {} parts for {}", parts.len(), path.display());

        Ok(SplitParts {
            parts,
            dir: Some(dir),
        })
    }

    fn split_by_size(&self, path: &Path, dir: &Path) -> IngestResult<Vec<FilePart>> {
        let mut reader = BufReader::new(File::open(path)?);
        let mut writer = PartWriter::new(path, dir);

        let mut line = Vec::new();
        loop {
            line.clear();
            if reader.read_until(b'\n', &mut line)? == 0 {
                break;
            }
            if writer.current_bytes() > 0
                && writer.current_bytes() + line.len() as u64 > self.config.target_bytes
            {
                writer.finish_part()?;
            }
            writer.write_line(&line)?;
        }

        writer.into_parts()
    }

    fn split_by_lines(&self, path: &Path, dir: &Path) -> IngestResult<Vec<FilePart>> {
        let avg_line_length = estimate_average_line_length(path)?;
        let lines_per_part = ((self.config.target_bytes / avg_line_length) as usize).max(1);

        let mut reader = BufReader::new(File::open(path)?);
        let mut writer = PartWriter::new(path, dir);
        let mut tail: VecDeque<Vec<u8>> = VecDeque::new();

        let mut line = Vec::new();
        loop {
            line.clear();
            if reader.read_until(b'\n', &mut line)? == 0 {
                break;
            }

            if writer.current_lines() >= lines_per_part {
                writer.finish_part()?;
                for overlap_line in &tail {
                    writer.write_line(overlap_line)?;
                }
            }

            writer.write_line(&line)?;
            push_tail(&mut tail, &line, self.config.overlap_lines);
        }

        writer.into_parts()
    }

    fn split_by_sections(&self, path: &Path, dir: &Path) -> IngestResult<Vec<FilePart>> {
        let mut reader = BufReader::new(File::open(path)?);
        let mut writer = PartWriter::new(path, dir);
        let mut tail: VecDeque<Vec<u8>> = VecDeque::new();

        let mut line = Vec::new();
        loop {
            line.clear();
            if reader.read_until(b'\n', &mut line)? == 0 {
                break;
            }

            if is_markdown_header(&line) && writer.current_bytes() > 0 {
                writer.finish_part()?;
                tail.clear();
            } else if writer.current_bytes() > 0
                && writer.current_bytes() + line.len() as u64 > self.config.target_bytes
            {
                // Section larger than the target: sub-split by the line rule
                writer.finish_part()?;
                for overlap_line in &tail {
                    writer.write_line(overlap_line)?;
                }
            }

            writer.write_line(&line)?;
            push_tail(&mut tail, &line, self.config.overlap_lines);
        }

        writer.into_parts()
    }
}

fn push_tail(tail: &mut VecDeque<Vec<u8>>, line: &[u8], overlap_lines: usize) {
    if overlap_lines == 0 {
        return;
    }
    if tail.len() == overlap_lines {
        tail.pop_front();
    }
    tail.push_back(line.to_vec());
}

fn is_markdown_header(line: &[u8]) -> bool {
    let hashes = line.iter().take_while(|&&b| b == b'#').count();
    (1..=6).contains(&hashes) && line.get(hashes) == Some(&b' ')
}

/// Average line length over the first 1000 lines, floored at 50 bytes so
/// pathological files do not produce absurd line budgets.
fn estimate_average_line_length(path: &Path) -> IngestResult<u64> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut total: u64 = 0;
    let mut count: u64 = 0;
    let mut line = Vec::new();

    while count < 1000 {
        line.clear();
        let read = reader.read_until(b'\n', &mut line)?;
        if read == 0 {
            break;
        }
        total += read as u64;
        count += 1;
    }

    Ok((total / count.max(1)).max(50))
}

/// Writes successive part files named `<stem>_part_<index>.<ext>`.
struct PartWriter {
    dir: PathBuf,
    stem: String,
    extension: Option<String>,
    parts: Vec<FilePart>,
    current: Option<BufWriter<File>>,
    current_bytes: u64,
    current_lines: usize,
}

impl PartWriter {
    fn new(source: &Path, dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
            stem: source
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_else(|| "part".to_string()),
            extension: source
                .extension()
                .map(|e| e.to_string_lossy().to_string()),
            parts: Vec::new(),
            current: None,
            current_bytes: 0,
            current_lines: 0,
        }
    }

    fn current_bytes(&self) -> u64 {
        self.current_bytes
    }

    fn current_lines(&self) -> usize {
        self.current_lines
    }

    fn write_line(&mut self, line: &[u8]) -> IngestResult<()> {
        if self.current.is_none() {
            let index = self.parts.len();
            let filename = match &self.extension {
                Some(ext) => format!("{}_part_{}.{}", self.stem, index, ext),
                None => format!("{}_part_{}", self.stem, index),
            };
            let path = self.dir.join(filename);
            self.current = Some(BufWriter::new(File::create(&path)?));
            self.parts.push(FilePart { path, index });
        }

        let writer = self.current.as_mut().ok_or_else(|| {
            IngestError::Io(std::io::Error::other("part writer missing"))
        })?;
        writer.write_all(line)?;
        self.current_bytes += line.len() as u64;
        self.current_lines += 1;
        Ok(())
    }

    fn finish_part(&mut self) -> IngestResult<()> {
        if let Some(mut writer) = self.current.take() {
            writer.flush()?;
        }
        self.current_bytes = 0;
        self.current_lines = 0;
        Ok(())
    }

    fn into_parts(mut self) -> IngestResult<Vec<FilePart>> {
        self.finish_part()?;
        Ok(self.parts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config(strategy: SplitStrategy) -> SplitConfig {
        SplitConfig {
            enabled: true,
            threshold_bytes: 100,
            target_bytes: 200,
            overlap_lines: 1,
            strategy,
        }
    }

    fn write_lines(dir: &Path, name: &str, count: usize) -> PathBuf {
        let path = dir.join(name);
        let content: String = (0..count).map(|i| format!("line number {i:04}\n")).collect();
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_should_split_gates_on_size_and_type() {
        let dir = tempfile::tempdir().unwrap();
        let small = write_lines(dir.path(), "small.txt", 2);
        let large = write_lines(dir.path(), "large.txt", 50);

        let splitter = LargeFileSplitter::new(small_config(SplitStrategy::Size));
        assert!(!splitter.should_split(&small, ContentType::Text).unwrap());
        assert!(splitter.should_split(&large, ContentType::Text).unwrap());
        // Binary formats never split
        assert!(!splitter.should_split(&large, ContentType::Pdf).unwrap());

        let disabled = SplitConfig {
            enabled: false,
            ..small_config(SplitStrategy::Size)
        };
        let splitter = LargeFileSplitter::new(disabled);
        assert!(!splitter.should_split(&large, ContentType::Text).unwrap());
    }

    #[test]
    fn test_size_split_preserves_content_and_line_boundaries() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_lines(dir.path(), "big.txt", 50);
        let original = std::fs::read_to_string(&path).unwrap();

        let splitter = LargeFileSplitter::new(small_config(SplitStrategy::Size));
        let parts = splitter.split(&path, ContentType::Text).unwrap();
        assert!(parts.len() > 1);

        let mut reassembled = String::new();
        for part in parts.iter() {
            let text = std::fs::read_to_string(&part.path).unwrap();
            // Every part ends on a line boundary
            assert!(text.ends_with('\n'));
            assert!(text.len() <= 200 + "line number 0000\n".len());
            reassembled.push_str(&text);
        }
        assert_eq!(reassembled, original);
    }

    #[test]
    fn test_line_split_carries_overlap_tail() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_lines(dir.path(), "big.txt", 12);

        // avg line floor is 50 so 200-byte target gives 4 lines per part
        let splitter = LargeFileSplitter::new(small_config(SplitStrategy::Line));
        let parts = splitter.split(&path, ContentType::Text).unwrap();
        assert!(parts.len() > 1);

        let texts: Vec<String> = parts
            .iter()
            .map(|p| std::fs::read_to_string(&p.path).unwrap())
            .collect();
        for window in texts.windows(2) {
            let prev_last_line = window[0].lines().last().unwrap();
            let next_first_line = window[1].lines().next().unwrap();
            assert_eq!(prev_last_line, next_first_line);
        }
    }

    #[test]
    fn test_markdown_split_cuts_at_headers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.md");
        let mut content = String::from("# Intro\n");
        for i in 0..10 {
            content.push_str(&format!("intro paragraph line {i}\n"));
        }
        content.push_str("## Details\n");
        for i in 0..10 {
            content.push_str(&format!("detail paragraph line {i}\n"));
        }
        std::fs::write(&path, &content).unwrap();

        let config = SplitConfig {
            target_bytes: 100_000,
            ..small_config(SplitStrategy::Markdown)
        };
        let parts = LargeFileSplitter::new(config)
            .split(&path, ContentType::Markdown)
            .unwrap();

        assert_eq!(parts.len(), 2);
        let second = std::fs::read_to_string(&parts.iter().nth(1).unwrap().path).unwrap();
        assert!(second.starts_with("## Details"));
    }

    #[test]
    fn test_parts_removed_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_lines(dir.path(), "big.txt", 50);

        let splitter = LargeFileSplitter::new(small_config(SplitStrategy::Size));
        let parts = splitter.split(&path, ContentType::Text).unwrap();
        let first_part = parts.iter().next().unwrap().path.clone();
        assert!(first_part.exists());

        drop(parts);
        assert!(!first_part.exists());
    }
}
