//! Time-coded transcript chunking.
//!
//! Raw caption segments are sub-sentence fragments, so they are first grouped
//! into paragraphs at speech pauses before the usual size-based chunking.

use super::{estimate_tokens, format_timestamp, Accumulator, ChunkingConfig, TextChunk};
use crate::youtube::TranscriptSegment;

/// A pause longer than this (seconds) ends a paragraph.
const PARAGRAPH_GAP_SECONDS: f64 = 3.0;

/// A paragraph longer than this (chars) is closed at the next segment boundary.
const PARAGRAPH_MAX_CHARS: usize = 600;

/// A group of consecutive transcript segments.
#[derive(Debug, Clone, PartialEq)]
pub struct Paragraph {
    pub text: String,
    /// Offset of the first segment, in seconds.
    pub start_offset: f64,
    /// End of the last segment, in seconds.
    pub end_offset: f64,
}

/// Group segments into paragraphs at pauses, length limits, and the end of input.
pub fn group_into_paragraphs(segments: &[TranscriptSegment]) -> Vec<Paragraph> {
    let mut paragraphs = Vec::new();
    let Some(first) = segments.first() else {
        return paragraphs;
    };

    let mut texts: Vec<&str> = Vec::new();
    let mut start_offset = first.offset;

    for (i, segment) in segments.iter().enumerate() {
        let next = segments.get(i + 1);
        texts.push(segment.text.as_str());
        let end_offset = segment.end();

        let pause = next.map(|n| n.offset - end_offset > PARAGRAPH_GAP_SECONDS);
        let joined = texts.join(" ");

        if pause.unwrap_or(true) || joined.chars().count() > PARAGRAPH_MAX_CHARS {
            let text = joined.trim();
            if !text.is_empty() {
                paragraphs.push(Paragraph {
                    text: text.to_string(),
                    start_offset,
                    end_offset,
                });
            }
            texts.clear();
            if let Some(next) = next {
                start_offset = next.offset;
            }
        }
    }

    paragraphs
}

/// Chunk a transcript into overlapping chunks labelled with their time range.
pub fn chunk_transcript(segments: &[TranscriptSegment], config: &ChunkingConfig) -> Vec<TextChunk> {
    let paragraphs = group_into_paragraphs(segments);
    let mut accumulator: Accumulator<(f64, f64)> = Accumulator::new(config);

    for paragraph in &paragraphs {
        accumulator.push(
            &paragraph.text,
            (paragraph.start_offset, paragraph.end_offset),
            |span, (_, end)| span.1 = end,
        );
    }

    accumulator
        .finish()
        .into_iter()
        .enumerate()
        .map(|(chunk_index, (content, (start, end)))| TextChunk {
            section_title: Some(format!(
                "[{} - {}]",
                format_timestamp(start),
                format_timestamp(end)
            )),
            token_count: estimate_tokens(&content),
            page_number: None,
            chunk_index,
            content,
        })
        .collect()
}
