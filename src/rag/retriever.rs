//! Query-time retrieval and prompt context formatting.

use crate::config::RetrievalSettings;
use crate::embedding::Embedder;
use crate::store::{KnowledgeStore, RetrievedChunk};
use std::sync::Arc;
use tracing::{debug, error, instrument};

const CONTEXT_HEADER: &str = "\n\n## KNOWLEDGE BASE CONTEXT\n\n\
Use the content below as reference when answering. Cite the sources when you use specific \
information. If the context is not relevant to the question, ignore it and answer normally.\n\n";

const BLOCK_SEPARATOR: &str = "\n\n---\n\n";

/// Similarity search parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetrieveOptions {
    pub match_threshold: f32,
    pub match_count: usize,
}

impl Default for RetrieveOptions {
    fn default() -> Self {
        Self {
            match_threshold: 0.3,
            match_count: 8,
        }
    }
}

impl From<&RetrievalSettings> for RetrieveOptions {
    fn from(settings: &RetrievalSettings) -> Self {
        Self {
            match_threshold: settings.match_threshold,
            match_count: settings.match_count,
        }
    }
}

/// Embeds queries and runs similarity search against the store.
pub struct Retriever {
    store: Arc<dyn KnowledgeStore>,
    embedder: Arc<dyn Embedder>,
}

impl Retriever {
    pub fn new(store: Arc<dyn KnowledgeStore>, embedder: Arc<dyn Embedder>) -> Self {
        Self { store, embedder }
    }

    /// Chunks relevant to `query`, best first.
    ///
    /// Never fails: embedding or store errors are logged and yield an empty
    /// list, so a chat turn degrades to answering without context.
    #[instrument(skip(self))]
    pub async fn retrieve(&self, query: &str, options: RetrieveOptions) -> Vec<RetrievedChunk> {
        let query_embedding = match self.embedder.embed(query).await {
            Ok(embedding) => embedding,
            Err(e) => {
                error!("Failed to embed query: {}", e);
                return Vec::new();
            }
        };

        match self
            .store
            .match_chunks(&query_embedding, options.match_threshold, options.match_count)
            .await
        {
            Ok(chunks) => {
                debug!("Retrieved {} chunks", chunks.len());
                chunks
            }
            Err(e) => {
                error!("Error retrieving chunks: {}", e);
                Vec::new()
            }
        }
    }
}

/// Format retrieved chunks as a context section for a model prompt.
///
/// Each chunk becomes a block labelled with its source, location (page or
/// timestamp range), and relevance percentage. Empty input gives `""`.
pub fn format_chunks_as_context(chunks: &[RetrievedChunk]) -> String {
    if chunks.is_empty() {
        return String::new();
    }

    let blocks: Vec<String> = chunks
        .iter()
        .enumerate()
        .map(|(i, chunk)| {
            format!(
                "[Source {}: {} | Relevance: {}%]\n{}",
                i + 1,
                source_label(chunk),
                (chunk.similarity * 100.0).round() as i64,
                chunk.content
            )
        })
        .collect();

    format!("{}{}", CONTEXT_HEADER, blocks.join(BLOCK_SEPARATOR))
}

/// `Title > Section (p.N)` for pages, `Title [MM:SS - MM:SS]` for transcripts.
fn source_label(chunk: &RetrievedChunk) -> String {
    let timestamp = chunk
        .section_title
        .as_deref()
        .filter(|title| title.starts_with('['));

    let mut label = chunk.document_title.clone();
    match (chunk.page_number.filter(|&p| p > 0), timestamp) {
        (Some(page), _) => {
            if let Some(section) = &chunk.section_title {
                label.push_str(&format!(" > {}", section));
            }
            label.push_str(&format!(" (p.{})", page));
        }
        (None, Some(timestamp)) => label.push_str(&format!(" {}", timestamp)),
        (None, None) => {
            if let Some(section) = &chunk.section_title {
                label.push_str(&format!(" > {}", section));
            }
        }
    }
    label
}
