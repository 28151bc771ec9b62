//! Page-based chunking for extracted document text.

use super::{estimate_tokens, Accumulator, ChunkingConfig, TextChunk};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// Blank-line paragraph boundary.
static PARAGRAPH_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n[ \t]*\n").expect("valid paragraph regex"));

/// Headings are short single lines.
const MAX_TITLE_CHARS: usize = 80;

/// Text of one page of a source document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageText {
    /// 1-based page number.
    pub page_number: u32,
    pub text: String,
}

impl PageText {
    pub fn new(page_number: u32, text: impl Into<String>) -> Self {
        Self {
            page_number,
            text: text.into(),
        }
    }
}

/// Best-effort heading: the first line when it is short and not a sentence.
pub fn extract_section_title(text: &str) -> Option<String> {
    let first_line = text.lines().next()?.trim();
    if first_line.is_empty()
        || first_line.chars().count() >= MAX_TITLE_CHARS
        || first_line.ends_with('.')
        || first_line.ends_with(',')
    {
        return None;
    }
    Some(first_line.to_string())
}

/// Split pages into paragraph segments and assemble overlapping chunks.
///
/// Paragraphs are never split, so a single paragraph longer than the budget
/// becomes one oversized chunk. Each chunk is tagged with the page its first
/// paragraph came from.
pub fn chunk_pages(pages: &[PageText], config: &ChunkingConfig) -> Vec<TextChunk> {
    let mut accumulator: Accumulator<u32> = Accumulator::new(config);

    for page in pages {
        for paragraph in PARAGRAPH_BREAK.split(&page.text) {
            let paragraph = paragraph.trim();
            if paragraph.is_empty() {
                continue;
            }
            accumulator.push(paragraph, page.page_number, |_, _| {});
        }
    }

    accumulator
        .finish()
        .into_iter()
        .enumerate()
        .map(|(chunk_index, (content, page_number))| TextChunk {
            section_title: extract_section_title(&content),
            token_count: estimate_tokens(&content),
            page_number: Some(page_number),
            chunk_index,
            content,
        })
        .collect()
}
