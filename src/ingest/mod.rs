//! Ingestion: extract, chunk, embed, and persist a source as a document.
//!
//! Every ingest records its document as `processing` before any work starts.
//! The document ends `completed` with its chunks, or `error` with no chunks.

pub mod pdf;

use crate::chunking::{chunk_pages, chunk_transcript, ChunkingConfig, TextChunk};
use crate::embedding::Embedder;
use crate::error::{AcervoError, Result};
use crate::store::{KnowledgeStore, Metadata, NewChunk, NewDocument, SourceKind};
use crate::youtube::{FetchedTranscript, VideoMetadata};
use serde::Serialize;
use serde_json::json;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

/// Chunks written per store call.
pub const INSERT_BATCH_SIZE: usize = 50;

/// Outcome of a successful ingest.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestResult {
    pub document_id: Uuid,
    pub title: String,
    pub chunk_count: usize,
}

/// Counters for a multi-file PDF run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PdfBatchStats {
    pub processed: usize,
    pub skipped: usize,
    pub errors: usize,
    pub chunks: usize,
}

/// Ingestion orchestrator.
pub struct Ingestor {
    store: Arc<dyn KnowledgeStore>,
    embedder: Arc<dyn Embedder>,
    chunking: ChunkingConfig,
}

impl Ingestor {
    pub fn new(store: Arc<dyn KnowledgeStore>, embedder: Arc<dyn Embedder>, chunking: ChunkingConfig) -> Self {
        Self {
            store,
            embedder,
            chunking,
        }
    }

    pub fn store(&self) -> &Arc<dyn KnowledgeStore> {
        &self.store
    }

    /// Ingest a PDF. The document title is the file name without `.pdf`.
    #[instrument(skip(self, bytes), fields(size = bytes.len()))]
    pub async fn ingest_pdf(&self, bytes: Vec<u8>, file_name: &str) -> Result<IngestResult> {
        let doc = NewDocument::new(pdf::title_from_file_name(file_name), SourceKind::Pdf)
            .with_file(file_name, bytes.len() as u64);
        let document = self.store.create_document(doc).await?;

        let outcome = self.process_pdf(document.id, bytes, file_name).await;
        self.finish(document.id, &document.title, outcome).await
    }

    async fn process_pdf(&self, document_id: Uuid, bytes: Vec<u8>, file_name: &str) -> Result<(usize, Metadata)> {
        let name = file_name.to_string();
        let parsed = tokio::task::spawn_blocking(move || pdf::parse_pdf(&bytes, &name))
            .await
            .map_err(|e| AcervoError::PdfExtract(format!("{}: extractor crashed: {}", file_name, e)))??;

        let chunks = chunk_pages(&parsed.pages, &self.chunking);
        let mut metadata = Metadata::new();
        metadata.insert("total_pages".to_string(), json!(parsed.total_pages));

        self.store_chunks(document_id, chunks, metadata).await
    }

    /// Ingest a video transcript. Title is `"<video title> - <channel title>"`.
    #[instrument(skip(self, video, transcript), fields(video_id = %video.video_id))]
    pub async fn ingest_video(&self, video: &VideoMetadata, transcript: &FetchedTranscript) -> Result<IngestResult> {
        let metadata = video_metadata(video, &transcript.language);
        let doc = NewDocument::new(format!("{} - {}", video.title, video.channel_title), SourceKind::Youtube)
            .with_metadata(metadata.clone());
        let document = self.store.create_document(doc).await?;

        let chunks = chunk_transcript(&transcript.segments, &self.chunking);
        let outcome = self.store_chunks(document.id, chunks, metadata).await;
        self.finish(document.id, &document.title, outcome).await
    }

    /// Ingest pre-chunked content as a new document.
    pub async fn ingest_chunks(&self, doc: NewDocument, chunks: Vec<TextChunk>) -> Result<IngestResult> {
        let metadata = doc.metadata.clone();
        let document = self.store.create_document(doc).await?;
        let outcome = self.store_chunks(document.id, chunks, metadata).await;
        self.finish(document.id, &document.title, outcome).await
    }

    /// Ingest PDF files one by one. With `resume`, files whose title matches a
    /// completed PDF document are skipped. Failures are counted, not raised.
    pub async fn ingest_pdf_files(&self, files: &[impl AsRef<Path>], resume: bool) -> Result<PdfBatchStats> {
        let done: HashSet<String> = if resume {
            self.store.completed_titles(SourceKind::Pdf).await?
        } else {
            HashSet::new()
        };
        let mut stats = PdfBatchStats::default();

        for path in files {
            let path = path.as_ref();
            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| path.display().to_string());

            if done.contains(&pdf::title_from_file_name(&file_name)) {
                info!("Skipping {} (already ingested)", file_name);
                stats.skipped += 1;
                continue;
            }

            let result = match tokio::fs::read(path).await {
                Ok(bytes) => self.ingest_pdf(bytes, &file_name).await,
                Err(e) => Err(e.into()),
            };

            match result {
                Ok(result) => {
                    info!("Ingested {} ({} chunks)", file_name, result.chunk_count);
                    stats.processed += 1;
                    stats.chunks += result.chunk_count;
                }
                Err(e) => {
                    warn!("Failed to ingest {}: {}", file_name, e);
                    stats.errors += 1;
                }
            }
        }

        Ok(stats)
    }

    /// Embed and persist chunks; returns the chunk count and the final metadata.
    async fn store_chunks(
        &self,
        document_id: Uuid,
        chunks: Vec<TextChunk>,
        mut metadata: Metadata,
    ) -> Result<(usize, Metadata)> {
        if chunks.is_empty() {
            return Err(AcervoError::EmptyContent(
                "no text content could be chunked".to_string(),
            ));
        }

        let contents: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let embeddings = self.embedder.embed_batch(&contents).await?;
        if embeddings.len() != chunks.len() {
            return Err(AcervoError::Embedding(format!(
                "expected {} embeddings, got {}",
                chunks.len(),
                embeddings.len()
            )));
        }

        let total_tokens: usize = chunks.iter().map(|c| c.token_count).sum();
        let rows: Vec<NewChunk> = chunks
            .into_iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| NewChunk {
                document_id,
                chunk_index: chunk.chunk_index,
                content: chunk.content,
                token_count: chunk.token_count,
                page_number: chunk.page_number,
                section_title: chunk.section_title,
                embedding,
            })
            .collect();

        for batch in rows.chunks(INSERT_BATCH_SIZE) {
            self.store.insert_chunks(batch).await?;
        }

        metadata.insert("total_tokens".to_string(), json!(total_tokens));
        Ok((rows.len(), metadata))
    }

    /// Persist the terminal state. Failed ingests, including a failed
    /// completion update, lose any partial chunks.
    async fn finish(
        &self,
        document_id: Uuid,
        title: &str,
        outcome: Result<(usize, Metadata)>,
    ) -> Result<IngestResult> {
        let outcome = match outcome {
            Ok((chunk_count, metadata)) => self
                .store
                .mark_completed(document_id, chunk_count, metadata)
                .await
                .map(|()| chunk_count),
            Err(e) => Err(e),
        };

        match outcome {
            Ok(chunk_count) => {
                info!("Ingested \"{}\" as {} ({} chunks)", title, document_id, chunk_count);
                Ok(IngestResult {
                    document_id,
                    title: title.to_string(),
                    chunk_count,
                })
            }
            Err(e) => {
                error!("Ingestion of \"{}\" failed: {}", title, e);
                if let Err(cleanup) = self.store.delete_chunks(document_id).await {
                    warn!("Could not remove partial chunks of {}: {}", document_id, cleanup);
                }
                if let Err(mark) = self.store.mark_error(document_id, &e.to_string()).await {
                    warn!("Could not mark {} as failed: {}", document_id, mark);
                }
                Err(e)
            }
        }
    }
}

/// Document metadata recorded for a YouTube video.
fn video_metadata(video: &VideoMetadata, transcript_language: &str) -> Metadata {
    let mut metadata = Metadata::new();
    metadata.insert("video_id".to_string(), json!(video.video_id));
    metadata.insert("channel_id".to_string(), json!(video.channel_id));
    metadata.insert("channel_name".to_string(), json!(video.channel_title));
    metadata.insert("video_url".to_string(), json!(video.video_url));
    metadata.insert("views".to_string(), json!(video.view_count));
    metadata.insert("likes".to_string(), json!(video.like_count));
    metadata.insert("published_at".to_string(), json!(video.published_at.to_rfc3339()));
    metadata.insert("duration_seconds".to_string(), json!(video.duration_seconds));
    metadata.insert("transcript_language".to_string(), json!(transcript_language));
    metadata.insert("thumbnail_url".to_string(), json!(video.thumbnail_url));
    metadata
}
