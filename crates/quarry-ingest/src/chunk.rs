//! Text chunking for embedding and retrieval.
//!
//! Converts extracted text into an ordered sequence of chunk candidates
//! honoring the size and overlap budgets. Overlap contract: every chunk after
//! the first begins with the trailing `overlap_size` characters of the chunk
//! before it (fewer only when the predecessor is shorter), so meaning that
//! straddles a cut survives in both chunks.

use quarry_config::ChunkingConfig;
use quarry_core::ChunkStrategy;
use tracing::debug;

/// Size and overlap budgets for chunking.
#[derive(Debug, Clone)]
pub struct ChunkerConfig {
    /// Upper bound on chunk length in characters.
    pub max_chunk_size: usize,
    /// Candidates below this merge into a neighbor instead of standing alone.
    pub min_chunk_size: usize,
    /// Characters carried from the end of one chunk into the start of the next.
    pub overlap_size: usize,
    /// Snap fixed-size cuts to whitespace.
    pub respect_boundaries: bool,
    /// Keep header lines at the start of markdown sections.
    pub preserve_headers: bool,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            max_chunk_size: 1000,
            min_chunk_size: 100,
            overlap_size: 100,
            respect_boundaries: true,
            preserve_headers: true,
        }
    }
}

impl ChunkerConfig {
    pub fn from_config(config: &ChunkingConfig) -> Self {
        Self {
            max_chunk_size: config.max_chunk_size,
            min_chunk_size: config.min_chunk_size,
            overlap_size: config.overlap_size,
            respect_boundaries: config.respect_boundaries,
            preserve_headers: config.preserve_headers,
        }
    }
}

/// One chunk candidate, before persistence.
#[derive(Debug, Clone)]
pub struct ChunkCandidate {
    pub index: i32,
    pub content: String,
    pub strategy: ChunkStrategy,
    /// Header hierarchy path for markdown chunks, e.g. "Guide > Setup".
    pub heading: Option<String>,
}

/// Splits text into chunk candidates using a selectable strategy.
pub struct TextChunker {
    config: ChunkerConfig,
}

impl TextChunker {
    pub fn new(config: ChunkerConfig) -> Self {
        Self { config }
    }

    pub fn from_config(config: &ChunkingConfig) -> Self {
        Self::new(ChunkerConfig::from_config(config))
    }

    /// Chunk text with the given strategy. Indices are contiguous from 0.
    pub fn chunk(&self, text: &str, strategy: ChunkStrategy) -> Vec<ChunkCandidate> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Vec::new();
        }

        // Fits in one chunk: always emitted, even below the minimum
        if trimmed.chars().count() <= self.config.max_chunk_size {
            return vec![ChunkCandidate {
                index: 0,
                content: trimmed.to_string(),
                strategy,
                heading: None,
            }];
        }

        let pieces: Vec<(String, Option<String>)> = match strategy {
            ChunkStrategy::Sentence => tag_none(self.chunk_sentences(trimmed)),
            ChunkStrategy::Paragraph => tag_none(self.chunk_paragraphs(trimmed)),
            ChunkStrategy::Code => tag_none(self.chunk_code(trimmed)),
            ChunkStrategy::Markdown => self.chunk_markdown(trimmed),
            ChunkStrategy::Fixed => tag_none(self.chunk_fixed(trimmed)),
        };

        let candidates: Vec<ChunkCandidate> = pieces
            .into_iter()
            .filter(|(content, _)| !content.trim().is_empty())
            .enumerate()
            .map(|(i, (content, heading))| ChunkCandidate {
                index: i as i32,
                content,
                strategy,
                heading,
            })
            .collect();

        debug!("Created {} chunks with {} strategy", candidates.len(), strategy);
        candidates
    }

    /// Sentence accumulation with abbreviation-aware splitting.
    fn chunk_sentences(&self, text: &str) -> Vec<String> {
        self.accumulate(split_sentences(text), " ")
    }

    /// Paragraph accumulation; a single paragraph over the budget is
    /// recursively split into sentences first.
    fn chunk_paragraphs(&self, text: &str) -> Vec<String> {
        let mut pieces = Vec::new();
        for paragraph in split_paragraphs(text) {
            if paragraph.chars().count() > self.config.max_chunk_size {
                pieces.extend(split_sentences(&paragraph));
            } else {
                pieces.push(paragraph);
            }
        }
        self.accumulate(pieces, "\n\n")
    }

    /// Code chunking at definition / top-level-indentation boundaries, with
    /// a fixed-size fallback for stretches that never offer a boundary.
    fn chunk_code(&self, text: &str) -> Vec<String> {
        let mut chunks: Vec<String> = Vec::new();
        let mut current: Vec<&str> = Vec::new();
        let mut current_size = 0usize;

        for line in text.split('\n') {
            let line_size = line.chars().count() + 1;
            let trimmed = line.trim_start();
            let is_boundary = is_code_definition(trimmed)
                || (!trimmed.is_empty() && trimmed.len() == line.len());

            if current_size + line_size > self.config.max_chunk_size
                && !current.is_empty()
                && is_boundary
            {
                chunks.push(current.join("\n"));

                // Seed the next chunk with trailing lines within the overlap budget
                let mut seed: Vec<&str> = Vec::new();
                let mut seed_size = 0usize;
                for kept in current.iter().rev() {
                    let kept_size = kept.chars().count() + 1;
                    if seed_size + kept_size > self.config.overlap_size {
                        break;
                    }
                    seed.insert(0, kept);
                    seed_size += kept_size;
                }
                current = seed;
                current_size = seed_size;
            }

            current.push(line);
            current_size += line_size;
        }

        if !current.is_empty() {
            let trailing = current.join("\n");
            if trailing.chars().count() < self.config.min_chunk_size {
                match chunks.last_mut() {
                    Some(last) => {
                        last.push('\n');
                        last.push_str(&trailing);
                    }
                    None => chunks.push(trailing),
                }
            } else {
                chunks.push(trailing);
            }
        }

        // No boundary within budget: fall back to fixed cuts for the oversized stretch
        chunks
            .into_iter()
            .flat_map(|chunk| {
                if chunk.chars().count() > self.config.max_chunk_size * 2 {
                    self.chunk_fixed(&chunk)
                } else {
                    vec![chunk]
                }
            })
            .collect()
    }

    /// Markdown chunking at header boundaries, tagging each chunk with its
    /// header hierarchy path. Oversized sections use the paragraph rules.
    fn chunk_markdown(&self, text: &str) -> Vec<(String, Option<String>)> {
        let mut sections: Vec<(String, Option<String>)> = Vec::new();
        // (level, text) stack forming the current hierarchy path
        let mut header_stack: Vec<(usize, String)> = Vec::new();
        let mut current = String::new();

        let flush =
            |sections: &mut Vec<(String, Option<String>)>, current: &mut String, stack: &[(usize, String)]| {
                let body = current.trim_end().to_string();
                if !body.trim().is_empty() {
                    sections.push((body, heading_path(stack)));
                }
                current.clear();
            };

        for line in text.split('\n') {
            if let Some((level, header_text)) = parse_markdown_header(line) {
                flush(&mut sections, &mut current, &header_stack);
                while header_stack.last().is_some_and(|(l, _)| *l >= level) {
                    header_stack.pop();
                }
                header_stack.push((level, header_text));
                if self.config.preserve_headers {
                    current.push_str(line);
                    current.push('\n');
                }
            } else {
                current.push_str(line);
                current.push('\n');
            }
        }
        flush(&mut sections, &mut current, &header_stack);

        // Sub-chunk oversized sections, every piece keeping the section's tag
        let mut result: Vec<(String, Option<String>)> = Vec::new();
        for (body, heading) in sections {
            if body.chars().count() > self.config.max_chunk_size {
                for piece in self.chunk_paragraphs(&body) {
                    result.push((piece, heading.clone()));
                }
            } else {
                result.push((body, heading));
            }
        }

        // Merge a runt section into its predecessor rather than emitting it alone
        let mut merged: Vec<(String, Option<String>)> = Vec::new();
        for (body, heading) in result {
            if body.chars().count() < self.config.min_chunk_size {
                if let Some((last, _)) = merged.last_mut() {
                    last.push_str("\n\n");
                    last.push_str(&body);
                    continue;
                }
            }
            merged.push((body, heading));
        }
        merged
    }

    /// Fixed-size cuts at exact character counts, optionally snapped back to
    /// the nearest whitespace.
    fn chunk_fixed(&self, text: &str) -> Vec<String> {
        let chars: Vec<char> = text.chars().collect();
        let mut chunks: Vec<String> = Vec::new();
        let mut starts: Vec<usize> = Vec::new();
        let mut start = 0usize;

        while start < chars.len() {
            let mut end = (start + self.config.max_chunk_size).min(chars.len());

            if end < chars.len() && self.config.respect_boundaries {
                if let Some(offset) = chars[start..end].iter().rposition(|c| c.is_whitespace()) {
                    if offset > 0 {
                        end = start + offset;
                    }
                }
            }

            chunks.push(chars[start..end].iter().collect());
            starts.push(start);

            if end >= chars.len() {
                break;
            }
            let next = end.saturating_sub(self.config.overlap_size);
            start = if next > start { next } else { end };
        }

        // A trailing runt extends the previous chunk to the end of the text
        // instead of standing alone.
        if chunks.len() > 1 {
            let last_len = chunks.last().map(|c| c.chars().count()).unwrap_or(0);
            if last_len < self.config.min_chunk_size {
                chunks.pop();
                starts.pop();
                if let (Some(last), Some(&last_start)) = (chunks.last_mut(), starts.last()) {
                    *last = chars[last_start..].iter().collect();
                }
            }
        }

        chunks
    }

    /// Accumulate pieces into chunks up to the size budget, seeding each new
    /// chunk with the overlap suffix of the previously emitted one.
    fn accumulate(&self, pieces: Vec<String>, separator: &str) -> Vec<String> {
        let mut chunks: Vec<String> = Vec::new();
        let mut current = String::new();

        for piece in pieces {
            let piece = piece.trim();
            if piece.is_empty() {
                continue;
            }

            let current_len = current.chars().count();
            let addition = if current.is_empty() {
                piece.chars().count()
            } else {
                current_len + separator.chars().count() + piece.chars().count()
            };

            if current.is_empty() || addition <= self.config.max_chunk_size {
                if !current.is_empty() {
                    current.push_str(separator);
                }
                current.push_str(piece);
                continue;
            }

            self.flush(&mut chunks, std::mem::take(&mut current), separator);

            // Seed from the chunk that actually went out, so the overlap
            // contract holds even after a runt merge.
            if self.config.overlap_size > 0 {
                if let Some(prev) = chunks.last() {
                    current = char_suffix(prev, self.config.overlap_size);
                }
            }
            if !current.is_empty() {
                current.push_str(separator);
            }
            current.push_str(piece);
        }

        if !current.is_empty() {
            self.flush(&mut chunks, current, separator);
        }

        chunks
    }

    fn flush(&self, chunks: &mut Vec<String>, candidate: String, separator: &str) {
        if candidate.chars().count() < self.config.min_chunk_size {
            if let Some(last) = chunks.last_mut() {
                last.push_str(separator);
                last.push_str(&candidate);
                return;
            }
        }
        chunks.push(candidate);
    }
}

fn tag_none(pieces: Vec<String>) -> Vec<(String, Option<String>)> {
    pieces.into_iter().map(|p| (p, None)).collect()
}

/// Last `n` characters of a string, on char boundaries.
fn char_suffix(s: &str, n: usize) -> String {
    let count = s.chars().count();
    s.chars().skip(count.saturating_sub(n)).collect()
}

const ABBREVIATIONS: &[&str] = &[
    "mr", "mrs", "ms", "dr", "prof", "sr", "jr", "st", "vs", "etc", "e.g", "i.e", "cf", "al",
    "inc", "ltd", "co", "corp", "fig", "no", "vol", "approx",
];

/// Split text into sentences on terminal punctuation followed by whitespace,
/// skipping boundaries after known abbreviations and single-letter initials.
pub fn split_sentences(text: &str) -> Vec<String> {
    let chars: Vec<char> = text.trim().chars().collect();
    let mut sentences = Vec::new();
    let mut start = 0usize;

    let mut i = 0usize;
    while i < chars.len() {
        let c = chars[i];
        if matches!(c, '.' | '!' | '?')
            && chars.get(i + 1).is_some_and(|n| n.is_whitespace())
            && !(c == '.' && is_abbreviation(&chars[start..i]))
        {
            let sentence: String = chars[start..=i].iter().collect();
            let sentence = sentence.trim().to_string();
            if !sentence.is_empty() {
                sentences.push(sentence);
            }
            // Skip the whitespace run after the terminator
            i += 1;
            while i < chars.len() && chars[i].is_whitespace() {
                i += 1;
            }
            start = i;
            continue;
        }
        i += 1;
    }

    if start < chars.len() {
        let tail: String = chars[start..].iter().collect();
        let tail = tail.trim().to_string();
        if !tail.is_empty() {
            sentences.push(tail);
        }
    }

    sentences
}

/// Whether the word ending at a period is an abbreviation or an initial.
fn is_abbreviation(before: &[char]) -> bool {
    let word: String = before
        .iter()
        .rev()
        .take_while(|c| c.is_alphanumeric() || **c == '.')
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    let word = word.trim_end_matches('.').to_lowercase();

    if word.is_empty() {
        return false;
    }
    // Single-letter initials like "J. R. Tolkien"
    if word.chars().count() == 1 && word.chars().all(|c| c.is_alphabetic()) {
        return true;
    }
    ABBREVIATIONS.contains(&word.as_str())
}

fn split_paragraphs(text: &str) -> Vec<String> {
    text.split("\n\n")
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect()
}

const CODE_DEFINITION_KEYWORDS: &[&str] = &[
    "def ", "class ", "function ", "fn ", "pub ", "impl ", "struct ", "enum ", "interface ",
    "public ", "private ", "protected ", "static ", "func ",
];

fn is_code_definition(trimmed_line: &str) -> bool {
    CODE_DEFINITION_KEYWORDS
        .iter()
        .any(|kw| trimmed_line.starts_with(kw))
}

fn parse_markdown_header(line: &str) -> Option<(usize, String)> {
    let hashes = line.chars().take_while(|&c| c == '#').count();
    if (1..=6).contains(&hashes) && line[hashes..].starts_with(' ') {
        let text = line[hashes + 1..].trim().to_string();
        if !text.is_empty() {
            return Some((hashes, text));
        }
    }
    None
}

fn heading_path(stack: &[(usize, String)]) -> Option<String> {
    if stack.is_empty() {
        return None;
    }
    Some(
        stack
            .iter()
            .map(|(_, text)| text.as_str())
            .collect::<Vec<_>>()
            .join(" > "),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(max: usize, min: usize, overlap: usize) -> ChunkerConfig {
        ChunkerConfig {
            max_chunk_size: max,
            min_chunk_size: min,
            overlap_size: overlap,
            respect_boundaries: true,
            preserve_headers: true,
        }
    }

    fn prose(sentences: usize) -> String {
        (0..sentences)
            .map(|i| format!("This is test sentence number {i} with a bit of padding text."))
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn assert_overlap_contract(chunks: &[ChunkCandidate], overlap: usize) {
        for window in chunks.windows(2) {
            let prev: Vec<char> = window[0].content.chars().collect();
            let expected: String = prev[prev.len().saturating_sub(overlap)..].iter().collect();
            assert!(
                window[1].content.starts_with(&expected),
                "chunk {} does not start with predecessor suffix {:?}",
                window[1].index,
                expected
            );
        }
    }

    #[test]
    fn test_sentence_overlap_contract() {
        let chunker = TextChunker::new(config(200, 30, 40));
        let chunks = chunker.chunk(&prose(30), ChunkStrategy::Sentence);
        assert!(chunks.len() > 2);
        assert_overlap_contract(&chunks, 40);
    }

    #[test]
    fn test_paragraph_overlap_contract() {
        let text = (0..12)
            .map(|i| format!("Paragraph {i} body text that goes on for a little while here."))
            .collect::<Vec<_>>()
            .join("\n\n");
        let chunker = TextChunker::new(config(200, 30, 40));
        let chunks = chunker.chunk(&text, ChunkStrategy::Paragraph);
        assert!(chunks.len() > 2);
        assert_overlap_contract(&chunks, 40);
    }

    #[test]
    fn test_fixed_overlap_contract() {
        let text = prose(30);
        let chunker = TextChunker::new(config(150, 30, 25));
        let chunks = chunker.chunk(&text, ChunkStrategy::Fixed);
        assert!(chunks.len() > 2);
        assert_overlap_contract(&chunks, 25);
    }

    #[test]
    fn test_indices_contiguous_from_zero() {
        let chunker = TextChunker::new(config(200, 30, 40));
        for strategy in [
            ChunkStrategy::Sentence,
            ChunkStrategy::Paragraph,
            ChunkStrategy::Fixed,
        ] {
            let chunks = chunker.chunk(&prose(30), strategy);
            for (i, chunk) in chunks.iter().enumerate() {
                assert_eq!(chunk.index, i as i32);
                assert_eq!(chunk.strategy, strategy);
            }
        }
    }

    #[test]
    fn test_sole_small_chunk_emitted() {
        let chunker = TextChunker::new(config(1000, 100, 100));
        let chunks = chunker.chunk("tiny.", ChunkStrategy::Sentence);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content, "tiny.");
    }

    #[test]
    fn test_empty_input_yields_no_chunks() {
        let chunker = TextChunker::new(config(1000, 100, 100));
        assert!(chunker.chunk("", ChunkStrategy::Sentence).is_empty());
        assert!(chunker.chunk("   \n\n  ", ChunkStrategy::Paragraph).is_empty());
    }

    #[test]
    fn test_trailing_runt_merges_into_previous() {
        // Seven ~58-char sentences pack in pairs; the seventh would stand
        // alone below the minimum and must merge into the last chunk.
        let chunker = TextChunker::new(config(150, 80, 0));
        let chunks = chunker.chunk(&prose(7), ChunkStrategy::Sentence);

        assert_eq!(chunks.len(), 3);
        for chunk in &chunks {
            assert!(chunk.content.chars().count() >= 80);
        }
        assert!(chunks
            .last()
            .unwrap()
            .content
            .ends_with("number 6 with a bit of padding text."));
    }

    #[test]
    fn test_abbreviations_do_not_split() {
        let sentences = split_sentences("Dr. Smith visited Mr. Jones. They spoke at length.");
        assert_eq!(sentences.len(), 2);
        assert_eq!(sentences[0], "Dr. Smith visited Mr. Jones.");

        let sentences = split_sentences("J. R. Tolkien wrote it. It was long.");
        assert_eq!(sentences.len(), 2);
        assert_eq!(sentences[0], "J. R. Tolkien wrote it.");
    }

    #[test]
    fn test_sentence_terminators() {
        let sentences = split_sentences("Really? Yes! It works. Good");
        assert_eq!(
            sentences,
            vec!["Really?", "Yes!", "It works.", "Good"]
        );
    }

    #[test]
    fn test_markdown_heading_paths() {
        let text = format!(
            "# Guide\n\n{}\n\n## Setup\n\n{}\n\n## Usage\n\n{}\n",
            "Intro text that is long enough to stand on its own as a chunk candidate here.",
            "Setup body text that is long enough to stand on its own as a chunk candidate.",
            "Usage body text that is long enough to stand on its own as a chunk candidate."
        );
        let chunker = TextChunker::new(config(200, 40, 0));
        let chunks = chunker.chunk(&text, ChunkStrategy::Markdown);

        let headings: Vec<Option<&str>> =
            chunks.iter().map(|c| c.heading.as_deref()).collect();
        assert!(headings.contains(&Some("Guide")));
        assert!(headings.contains(&Some("Guide > Setup")));
        assert!(headings.contains(&Some("Guide > Usage")));

        // Header lines are preserved at section starts
        assert!(chunks[0].content.starts_with("# Guide"));
    }

    #[test]
    fn test_markdown_oversized_section_keeps_heading() {
        let body = prose(20);
        let text = format!("# Big Section\n\n{body}\n");
        let chunker = TextChunker::new(config(200, 40, 30));
        let chunks = chunker.chunk(&text, ChunkStrategy::Markdown);

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert_eq!(chunk.heading.as_deref(), Some("Big Section"));
        }
    }

    #[test]
    fn test_code_splits_at_definitions() {
        let mut code = String::new();
        for i in 0..8 {
            code.push_str(&format!("fn function_{i}() {{\n"));
            for j in 0..5 {
                code.push_str(&format!("    let value_{j} = compute({j}) + offset;\n"));
            }
            code.push_str("}\n\n");
        }
        let chunker = TextChunker::new(config(300, 50, 0));
        let chunks = chunker.chunk(&code, ChunkStrategy::Code);

        assert!(chunks.len() > 1);
        // Cuts land at definition or top-level boundaries
        for chunk in chunks.iter().skip(1) {
            let first_line = chunk.content.lines().next().unwrap();
            assert!(first_line.starts_with("fn ") || !first_line.starts_with(' '));
        }
    }

    #[test]
    fn test_fixed_snaps_to_whitespace() {
        let text = prose(10);
        let chunker = TextChunker::new(config(120, 20, 0));
        let chunks = chunker.chunk(&text, ChunkStrategy::Fixed);

        assert!(chunks.len() > 1);
        // With zero overlap the cuts partition the text exactly
        let reassembled: String = chunks.iter().map(|c| c.content.as_str()).collect();
        assert_eq!(reassembled, text);
        for chunk in &chunks {
            assert!(chunk.content.chars().count() <= 120);
        }
        // Snapped cuts leave the boundary whitespace at the next chunk's start
        for chunk in chunks.iter().skip(1) {
            assert!(chunk.content.starts_with(char::is_whitespace));
        }
    }

    #[test]
    fn test_oversized_paragraph_falls_back_to_sentences() {
        // One paragraph far over budget must still be split
        let text = format!("{}\n\nShort trailing paragraph for the test.", prose(20));
        let chunker = TextChunker::new(config(200, 30, 0));
        let chunks = chunker.chunk(&text, ChunkStrategy::Paragraph);

        assert!(chunks.len() > 2);
        for chunk in &chunks {
            assert!(chunk.content.chars().count() <= 200 + 60);
        }
    }
}
