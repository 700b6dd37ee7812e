//! Deterministic character-window chunking.
//!
//! One pure splitting routine serves both call sites in the pipeline: the summarizer splits long
//! documents into model-sized pieces, and the orchestrator splits retrieval chunks for
//! embedding. Each caller owns its own [`ChunkingConfig`], so the two never share state.
//!
//! - Normalization: every whitespace run collapses to a single space and the text is trimmed.
//! - Boundaries: inside each window the splitter prefers the last paragraph break, then the last
//!   sentence terminator (`. `, `? `, `! `), and only then cuts hard at `chunk_size` characters.
//!   Terminating punctuation stays with the chunk it ends.
//! - Overlap: each chunk after the first starts `overlap` characters before the end of the
//!   previous chunk's span.
//!
//! Sizes and offsets count `char`s, never bytes, so multi-byte text cannot be split mid-code
//! point.

use serde::Serialize;

use super::types::ChunkingError;

/// Separators tried in priority order: paragraph breaks, then sentence terminators.
pub const DEFAULT_SEPARATORS: &[&str] = &["\n\n", ". ", "? ", "! "];

/// Validated sizing for one chunking call site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkingConfig {
    chunk_size: usize,
    overlap: usize,
    separators: Vec<String>,
}

impl ChunkingConfig {
    /// Build a configuration using [`DEFAULT_SEPARATORS`].
    ///
    /// Fails unless `0 <= overlap < chunk_size`.
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self, ChunkingError> {
        if chunk_size == 0 {
            return Err(ChunkingError::InvalidChunkSize);
        }
        if overlap >= chunk_size {
            return Err(ChunkingError::InvalidOverlap {
                overlap,
                chunk_size,
            });
        }
        Ok(Self {
            chunk_size,
            overlap,
            separators: DEFAULT_SEPARATORS.iter().map(|s| s.to_string()).collect(),
        })
    }

    /// Replace the separator priority list. Empty separators are ignored.
    pub fn with_separators<I, S>(mut self, separators: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.separators = separators
            .into_iter()
            .map(Into::into)
            .filter(|separator: &String| !separator.is_empty())
            .collect();
        self
    }

    /// Maximum characters per chunk.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Characters shared between consecutive chunks.
    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Separator priority list.
    pub fn separators(&self) -> &[String] {
        &self.separators
    }
}

/// A contiguous span of the normalized document text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Chunk {
    /// Position of the chunk in production order, starting at zero.
    pub order_index: usize,
    /// Chunk text; equal to `normalized[start..end]` and never empty.
    pub text: String,
    /// Character offset where the chunk starts in the normalized text.
    pub start: usize,
    /// Character offset one past the chunk's last character.
    pub end: usize,
}

/// Collapse whitespace runs (newlines included) to single spaces and trim the ends.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Split `text` into overlapping chunks according to `config`.
///
/// The input is normalized first; empty or whitespace-only input yields no chunks. Identical
/// inputs always produce identical output.
pub fn split(text: &str, config: &ChunkingConfig) -> Vec<Chunk> {
    let normalized = normalize_whitespace(text);
    if normalized.is_empty() {
        return Vec::new();
    }

    let chars: Vec<char> = normalized.chars().collect();
    let separators: Vec<Separator> = config
        .separators
        .iter()
        .map(|pattern| Separator::new(pattern))
        .collect();

    chunk_spans(&chars, config.chunk_size, config.overlap, &separators)
        .into_iter()
        .enumerate()
        .map(|(order_index, (start, end))| Chunk {
            order_index,
            text: chars[start..end].iter().collect(),
            start,
            end,
        })
        .collect()
}

/// Validate `chunk_size`/`overlap` and split with the default separators in one call.
pub fn split_text(
    text: &str,
    chunk_size: usize,
    overlap: usize,
) -> Result<Vec<Chunk>, ChunkingError> {
    let config = ChunkingConfig::new(chunk_size, overlap)?;
    Ok(split(text, &config))
}

struct Separator {
    pattern: Vec<char>,
    /// Leading characters that stay with the preceding chunk (the punctuation, not the space).
    keep: usize,
}

impl Separator {
    fn new(pattern: &str) -> Self {
        let pattern: Vec<char> = pattern.chars().collect();
        let keep = pattern.iter().take_while(|c| !c.is_whitespace()).count();
        Self { pattern, keep }
    }
}

/// Compute trimmed `(start, end)` spans covering `chars`.
fn chunk_spans(
    chars: &[char],
    chunk_size: usize,
    overlap: usize,
    separators: &[Separator],
) -> Vec<(usize, usize)> {
    let len = chars.len();
    let mut spans = Vec::new();
    let mut start = 0;
    let mut previous_end = 0;

    loop {
        let window_end = start + chunk_size;
        let min_cut = (start + overlap + 1).max(previous_end + 1);
        let cut = if window_end >= len {
            len
        } else {
            find_boundary(chars, start, window_end, min_cut, separators).unwrap_or(window_end)
        };

        let (span_start, span_end) = trim_span(chars, start, cut);
        // A span that stops at or before its predecessor's end adds no text.
        let advances = spans.last().is_none_or(|&(_, end)| span_end > end);
        if span_start < span_end && advances {
            spans.push((span_start, span_end));
        }
        if cut >= len {
            break;
        }

        let tail_end = if span_start < span_end { span_end } else { cut };
        previous_end = previous_end.max(tail_end);
        start = next_start(chars, start, tail_end, chunk_size, overlap);
    }

    spans
}

/// Find the best structural cut inside `[start, window_end]`.
///
/// Separators are tried in priority order and the last occurrence wins. Cuts before `min_cut`
/// are ignored so every chunk extends past both its overlap and the previous chunk.
fn find_boundary(
    chars: &[char],
    start: usize,
    window_end: usize,
    min_cut: usize,
    separators: &[Separator],
) -> Option<usize> {
    separators.iter().find_map(|separator| {
        if separator.pattern.len() > chars.len() {
            return None;
        }
        let last_match = window_end
            .saturating_sub(separator.keep)
            .min(chars.len() - separator.pattern.len());
        (start..=last_match)
            .rev()
            .filter(|&position| chars[position..].starts_with(&separator.pattern))
            .map(|position| position + separator.keep)
            .find(|&cut| cut >= min_cut)
    })
}

/// Where the chunk following a span ending at `tail_end` begins.
fn next_start(
    chars: &[char],
    previous_start: usize,
    tail_end: usize,
    chunk_size: usize,
    overlap: usize,
) -> usize {
    let mut next = tail_end.saturating_sub(overlap).max(previous_start + 1);
    // Landing on a space would lose one overlap character to trimming; step back onto the
    // preceding character while the window still reaches past the previous chunk.
    if overlap > 0
        && chars[next].is_whitespace()
        && next - 1 > previous_start
        && next - 1 + chunk_size > tail_end
    {
        next -= 1;
    }
    next
}

fn trim_span(chars: &[char], mut start: usize, mut end: usize) -> (usize, usize) {
    while start < end && chars[start].is_whitespace() {
        start += 1;
    }
    while end > start && chars[end - 1].is_whitespace() {
        end -= 1;
    }
    (start, end)
}
