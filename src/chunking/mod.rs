//! Content chunking for breaking documents and transcripts into retrievable segments.
//!
//! Two chunkers share one output contract ([`TextChunk`]) and one accumulation
//! strategy: atomic segments are joined with blank lines until the next one
//! would push the buffer past the character budget, at which point the buffer
//! is flushed and the next chunk is seeded with a short tail of the previous one.
//!
//! - [`chunk_pages`] works on page-tagged paragraphs (PDFs).
//! - [`chunk_transcript`] first groups time-coded segments into paragraphs at
//!   speech pauses, then chunks those.

mod text;
mod transcript;

pub use text::{chunk_pages, extract_section_title, PageText};
pub use transcript::{chunk_transcript, group_into_paragraphs, Paragraph};

use crate::error::{AcervoError, Result};
use serde::{Deserialize, Serialize};

/// Approximate characters per token.
pub const CHARS_PER_TOKEN: usize = 4;

/// Separator placed between segments inside a chunk.
const SEGMENT_SEPARATOR: &str = "\n\n";

/// A chunk of text ready to be embedded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextChunk {
    /// Text content (trimmed).
    pub content: String,
    /// 0-based position within the document.
    pub chunk_index: usize,
    /// Source page (PDF chunks only).
    pub page_number: Option<u32>,
    /// Heading or `[start - end]` timestamp label.
    pub section_title: Option<String>,
    /// Estimated token count.
    pub token_count: usize,
}

/// Chunk size configuration, in approximate tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkingConfig {
    /// Preferred chunk size.
    pub target_chunk_size: usize,
    /// Hard ceiling on chunk size (except for a single oversized segment).
    pub max_chunk_size: usize,
    /// Size of the tail carried over from the previous chunk.
    pub overlap_size: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            target_chunk_size: 600,
            max_chunk_size: 800,
            overlap_size: 100,
        }
    }
}

impl ChunkingConfig {
    /// Maximum characters per chunk.
    pub fn max_chars(&self) -> usize {
        self.max_chunk_size * CHARS_PER_TOKEN
    }

    /// Maximum characters carried over between consecutive chunks.
    pub fn overlap_chars(&self) -> usize {
        self.overlap_size * CHARS_PER_TOKEN
    }

    /// Check that `0 <= overlap < target <= max`.
    pub fn validate(&self) -> Result<()> {
        if self.max_chunk_size == 0 || self.target_chunk_size == 0 {
            return Err(AcervoError::Config(
                "chunk sizes must be greater than zero".to_string(),
            ));
        }
        if self.target_chunk_size > self.max_chunk_size {
            return Err(AcervoError::Config(format!(
                "target chunk size ({}) exceeds max chunk size ({})",
                self.target_chunk_size, self.max_chunk_size
            )));
        }
        if self.overlap_size >= self.target_chunk_size {
            return Err(AcervoError::Config(format!(
                "overlap ({}) must be smaller than target chunk size ({})",
                self.overlap_size, self.target_chunk_size
            )));
        }
        Ok(())
    }
}

/// Estimate tokens as `ceil(chars / 4)`.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(CHARS_PER_TOKEN)
}

/// Format seconds as MM:SS or HH:MM:SS.
pub fn format_timestamp(seconds: f64) -> String {
    let total_seconds = seconds.max(0.0) as u32;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let secs = total_seconds % 60;

    if hours > 0 {
        format!("{:02}:{:02}:{:02}", hours, minutes, secs)
    } else {
        format!("{:02}:{:02}", minutes, secs)
    }
}

/// Last `n` characters of `text`, on a char boundary.
fn tail_chars(text: &str, n: usize) -> &str {
    if n == 0 {
        return "";
    }
    match text.char_indices().rev().nth(n - 1) {
        Some((idx, _)) => &text[idx..],
        None => text,
    }
}

/// Shared buffer/flush/overlap logic.
///
/// `S` is the per-chunk span a chunker tracks alongside the text (a page
/// number, a time range). `push` takes the span of the incoming segment and a
/// closure that widens the current span when the segment is appended.
struct Accumulator<S> {
    max_chars: usize,
    overlap_chars: usize,
    buffer: String,
    buffer_chars: usize,
    span: Option<S>,
    flushed: Vec<(String, S)>,
}

impl<S> Accumulator<S> {
    fn new(config: &ChunkingConfig) -> Self {
        Self {
            max_chars: config.max_chars(),
            overlap_chars: config.overlap_chars(),
            buffer: String::new(),
            buffer_chars: 0,
            span: None,
            flushed: Vec::new(),
        }
    }

    fn push(&mut self, segment: &str, span: S, extend: impl FnOnce(&mut S, S)) {
        let segment_chars = segment.chars().count();

        if self.buffer.is_empty() || self.span.is_none() {
            self.buffer = segment.to_string();
            self.buffer_chars = segment_chars;
            self.span = Some(span);
            return;
        }

        let candidate_chars = self.buffer_chars + SEGMENT_SEPARATOR.len() + segment_chars;
        if candidate_chars <= self.max_chars {
            self.buffer.push_str(SEGMENT_SEPARATOR);
            self.buffer.push_str(segment);
            self.buffer_chars = candidate_chars;
            if let Some(current) = self.span.as_mut() {
                extend(current, span);
            }
            return;
        }

        // Overlap never pushes the seeded chunk past the budget on its own.
        let budget = self
            .overlap_chars
            .min(self.max_chars.saturating_sub(segment_chars + SEGMENT_SEPARATOR.len()));
        let overlap = tail_chars(&self.buffer, budget).trim_start().to_string();

        let previous = std::mem::take(&mut self.buffer);
        if let Some(previous_span) = self.span.take() {
            self.flushed.push((previous, previous_span));
        }

        if overlap.is_empty() {
            self.buffer = segment.to_string();
        } else {
            self.buffer = format!("{}{}{}", overlap, SEGMENT_SEPARATOR, segment);
        }
        self.buffer_chars = self.buffer.chars().count();
        self.span = Some(span);
    }

    fn finish(mut self) -> Vec<(String, S)> {
        if let Some(span) = self.span.take() {
            if !self.buffer.trim().is_empty() {
                self.flushed.push((std::mem::take(&mut self.buffer), span));
            }
        }
        self.flushed
            .into_iter()
            .filter(|(text, _)| !text.trim().is_empty())
            .map(|(text, span)| (text.trim().to_string(), span))
            .collect()
    }
}
