//! Knowledge store: documents, their chunks, and similarity search.
//!
//! The store is an explicitly constructed handle passed around as
//! `Arc<dyn KnowledgeStore>`. Two backends are provided: [`SqliteStore`] for
//! persistence and [`MemoryStore`] for tests and throwaway runs.

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use crate::error::{AcervoError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// JSON metadata attached to a document.
pub type Metadata = Map<String, Value>;

/// Kind of source a document was ingested from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Pdf,
    Youtube,
    Article,
    Note,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Pdf => "pdf",
            SourceKind::Youtube => "youtube",
            SourceKind::Article => "article",
            SourceKind::Note => "note",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceKind {
    type Err = AcervoError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "pdf" => Ok(SourceKind::Pdf),
            "youtube" => Ok(SourceKind::Youtube),
            "article" => Ok(SourceKind::Article),
            "note" => Ok(SourceKind::Note),
            other => Err(AcervoError::InvalidInput(format!("unknown source kind: {}", other))),
        }
    }
}

/// Lifecycle state of a document.
///
/// Documents are created `processing` and move once, to `completed` or `error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    Pending,
    Processing,
    Completed,
    Error,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentStatus::Pending => "pending",
            DocumentStatus::Processing => "processing",
            DocumentStatus::Completed => "completed",
            DocumentStatus::Error => "error",
        }
    }
}

impl fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentStatus {
    type Err = AcervoError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(DocumentStatus::Pending),
            "processing" => Ok(DocumentStatus::Processing),
            "completed" => Ok(DocumentStatus::Completed),
            "error" => Ok(DocumentStatus::Error),
            other => Err(AcervoError::InvalidInput(format!("unknown document status: {}", other))),
        }
    }
}

/// A stored document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,
    pub title: String,
    pub source_kind: SourceKind,
    pub file_name: Option<String>,
    pub file_size: Option<u64>,
    pub status: DocumentStatus,
    pub total_chunks: usize,
    pub metadata: Metadata,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields supplied when a document is first recorded.
#[derive(Debug, Clone, Default)]
pub struct NewDocument {
    pub title: String,
    pub source_kind: Option<SourceKind>,
    pub file_name: Option<String>,
    pub file_size: Option<u64>,
    pub metadata: Metadata,
}

impl NewDocument {
    pub fn new(title: impl Into<String>, source_kind: SourceKind) -> Self {
        Self {
            title: title.into(),
            source_kind: Some(source_kind),
            ..Default::default()
        }
    }

    pub fn with_file(mut self, file_name: impl Into<String>, file_size: u64) -> Self {
        self.file_name = Some(file_name.into());
        self.file_size = Some(file_size);
        self
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Build the `processing` document row.
    fn into_document(self) -> Document {
        let now = Utc::now();
        Document {
            id: Uuid::new_v4(),
            title: self.title,
            source_kind: self.source_kind.unwrap_or(SourceKind::Note),
            file_name: self.file_name,
            file_size: self.file_size,
            status: DocumentStatus::Processing,
            total_chunks: 0,
            metadata: self.metadata,
            error_message: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A chunk to be written, with its embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct NewChunk {
    pub document_id: Uuid,
    pub chunk_index: usize,
    pub content: String,
    pub token_count: usize,
    pub page_number: Option<u32>,
    pub section_title: Option<String>,
    pub embedding: Vec<f32>,
}

/// A chunk returned by similarity search, joined with its document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedChunk {
    pub chunk_id: Uuid,
    pub document_id: Uuid,
    pub content: String,
    pub similarity: f32,
    pub document_title: String,
    pub source_kind: SourceKind,
    pub page_number: Option<u32>,
    pub section_title: Option<String>,
}

/// Optional filters for listing documents.
#[derive(Debug, Clone, Default)]
pub struct DocumentFilter {
    pub source_kind: Option<SourceKind>,
    pub status: Option<DocumentStatus>,
}

impl DocumentFilter {
    pub fn matches(&self, doc: &Document) -> bool {
        self.source_kind.is_none_or(|k| doc.source_kind == k)
            && self.status.is_none_or(|s| doc.status == s)
    }
}

/// Document/chunk persistence and vector similarity search.
#[async_trait]
pub trait KnowledgeStore: Send + Sync {
    /// Record a new document in `processing` state.
    async fn create_document(&self, doc: NewDocument) -> Result<Document>;

    async fn get_document(&self, id: Uuid) -> Result<Option<Document>>;

    /// Move a `processing` document to `completed`, replacing its metadata.
    async fn mark_completed(&self, id: Uuid, total_chunks: usize, metadata: Metadata) -> Result<()>;

    /// Move a `processing` document to `error`.
    async fn mark_error(&self, id: Uuid, message: &str) -> Result<()>;

    /// Insert chunks with their embeddings. All-or-nothing per call.
    async fn insert_chunks(&self, chunks: &[NewChunk]) -> Result<usize>;

    /// Remove every chunk of a document.
    async fn delete_chunks(&self, document_id: Uuid) -> Result<usize>;

    /// Number of chunks stored for a document.
    async fn chunk_count(&self, document_id: Uuid) -> Result<usize>;

    /// Delete a document and, by cascade, its chunks.
    async fn delete_document(&self, id: Uuid) -> Result<bool>;

    /// Documents matching `filter`, newest first.
    async fn list_documents(&self, filter: &DocumentFilter) -> Result<Vec<Document>>;

    /// Documents of `kind` whose metadata has `key == value` (string comparison).
    async fn find_by_metadata(&self, kind: SourceKind, key: &str, value: &str) -> Result<Vec<Document>>;

    /// Chunks with similarity >= `threshold`, best first, at most `count`.
    async fn match_chunks(
        &self,
        query_embedding: &[f32],
        threshold: f32,
        count: usize,
    ) -> Result<Vec<RetrievedChunk>>;

    /// Whether a `completed` youtube document references this video id.
    async fn is_video_ingested(&self, video_id: &str) -> Result<bool> {
        let docs = self.find_by_metadata(SourceKind::Youtube, "video_id", video_id).await?;
        Ok(docs.iter().any(|d| d.status == DocumentStatus::Completed))
    }

    /// Titles of `completed` documents of a kind.
    async fn completed_titles(&self, kind: SourceKind) -> Result<HashSet<String>> {
        let filter = DocumentFilter {
            source_kind: Some(kind),
            status: Some(DocumentStatus::Completed),
        };
        Ok(self
            .list_documents(&filter)
            .await?
            .into_iter()
            .map(|d| d.title)
            .collect())
    }
}

/// Compute cosine similarity between two vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

/// Sort by descending similarity and cap the result count.
fn rank_matches(mut results: Vec<RetrievedChunk>, count: usize) -> Vec<RetrievedChunk> {
    results.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
    results.truncate(count);
    results
}

/// String form of a metadata value for equality lookups.
fn metadata_value_as_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_similarity() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 0.001);

        let c = vec![0.0, 1.0, 0.0];
        assert!((cosine_similarity(&a, &c)).abs() < 0.001);

        let d = vec![-1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &d) + 1.0).abs() < 0.001);

        assert_eq!(cosine_similarity(&a, &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn test_enum_round_trip_through_strings() {
        for kind in [SourceKind::Pdf, SourceKind::Youtube, SourceKind::Article, SourceKind::Note] {
            assert_eq!(kind.as_str().parse::<SourceKind>().unwrap(), kind);
        }
        assert_eq!("Completed".parse::<DocumentStatus>().unwrap(), DocumentStatus::Completed);
        assert!("video".parse::<SourceKind>().is_err());
    }

    #[test]
    fn test_filter_matches() {
        let mut doc = NewDocument::new("t", SourceKind::Pdf).into_document();
        assert_eq!(doc.status, DocumentStatus::Processing);

        let any = DocumentFilter::default();
        let pdf_completed = DocumentFilter {
            source_kind: Some(SourceKind::Pdf),
            status: Some(DocumentStatus::Completed),
        };
        assert!(any.matches(&doc));
        assert!(!pdf_completed.matches(&doc));

        doc.status = DocumentStatus::Completed;
        assert!(pdf_completed.matches(&doc));
    }
}
