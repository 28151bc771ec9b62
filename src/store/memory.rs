//! In-memory knowledge store.
//!
//! Useful for testing and one-off runs. Follows the same status and
//! all-or-nothing chunk insert rules as the SQLite store.

use super::{
    cosine_similarity, metadata_value_as_string, rank_matches, Document, DocumentFilter,
    DocumentStatus, KnowledgeStore, Metadata, NewChunk, NewDocument, RetrievedChunk, SourceKind,
};
use crate::error::{AcervoError, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashSet;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use uuid::Uuid;

#[derive(Default)]
struct State {
    /// Insertion order, oldest first.
    documents: Vec<Document>,
    chunks: Vec<(Uuid, NewChunk)>,
}

/// In-memory knowledge store.
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, State>> {
        self.state
            .read()
            .map_err(|e| AcervoError::Store(format!("Failed to acquire lock: {}", e)))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, State>> {
        self.state
            .write()
            .map_err(|e| AcervoError::Store(format!("Failed to acquire lock: {}", e)))
    }

    fn transition(&self, id: Uuid, apply: impl FnOnce(&mut Document)) -> Result<()> {
        let mut state = self.write()?;
        let doc = state
            .documents
            .iter_mut()
            .find(|d| d.id == id && d.status == DocumentStatus::Processing)
            .ok_or_else(|| {
                AcervoError::Store(format!("document {} is missing or no longer processing", id))
            })?;
        apply(doc);
        doc.updated_at = Utc::now();
        Ok(())
    }
}

#[async_trait]
impl KnowledgeStore for MemoryStore {
    async fn create_document(&self, doc: NewDocument) -> Result<Document> {
        let document = doc.into_document();
        self.write()?.documents.push(document.clone());
        Ok(document)
    }

    async fn get_document(&self, id: Uuid) -> Result<Option<Document>> {
        Ok(self.read()?.documents.iter().find(|d| d.id == id).cloned())
    }

    async fn mark_completed(&self, id: Uuid, total_chunks: usize, metadata: Metadata) -> Result<()> {
        self.transition(id, |doc| {
            doc.status = DocumentStatus::Completed;
            doc.total_chunks = total_chunks;
            doc.metadata = metadata;
        })
    }

    async fn mark_error(&self, id: Uuid, message: &str) -> Result<()> {
        self.transition(id, |doc| {
            doc.status = DocumentStatus::Error;
            doc.error_message = Some(message.to_string());
        })
    }

    async fn insert_chunks(&self, chunks: &[NewChunk]) -> Result<usize> {
        let mut state = self.write()?;

        let known: HashSet<Uuid> = state.documents.iter().map(|d| d.id).collect();
        let mut taken: HashSet<(Uuid, usize)> =
            state.chunks.iter().map(|(_, c)| (c.document_id, c.chunk_index)).collect();

        for chunk in chunks {
            if !known.contains(&chunk.document_id) {
                return Err(AcervoError::StoreWrite(format!(
                    "unknown document {}",
                    chunk.document_id
                )));
            }
            if !taken.insert((chunk.document_id, chunk.chunk_index)) {
                return Err(AcervoError::StoreWrite(format!(
                    "duplicate chunk {} for document {}",
                    chunk.chunk_index, chunk.document_id
                )));
            }
        }

        state
            .chunks
            .extend(chunks.iter().map(|c| (Uuid::new_v4(), c.clone())));
        Ok(chunks.len())
    }

    async fn delete_chunks(&self, document_id: Uuid) -> Result<usize> {
        let mut state = self.write()?;
        let before = state.chunks.len();
        state.chunks.retain(|(_, c)| c.document_id != document_id);
        Ok(before - state.chunks.len())
    }

    async fn chunk_count(&self, document_id: Uuid) -> Result<usize> {
        Ok(self
            .read()?
            .chunks
            .iter()
            .filter(|(_, c)| c.document_id == document_id)
            .count())
    }

    async fn delete_document(&self, id: Uuid) -> Result<bool> {
        let mut state = self.write()?;
        let before = state.documents.len();
        state.documents.retain(|d| d.id != id);
        state.chunks.retain(|(_, c)| c.document_id != id);
        Ok(state.documents.len() < before)
    }

    async fn list_documents(&self, filter: &DocumentFilter) -> Result<Vec<Document>> {
        Ok(self
            .read()?
            .documents
            .iter()
            .rev()
            .filter(|d| filter.matches(d))
            .cloned()
            .collect())
    }

    async fn find_by_metadata(&self, kind: SourceKind, key: &str, value: &str) -> Result<Vec<Document>> {
        Ok(self
            .read()?
            .documents
            .iter()
            .rev()
            .filter(|d| d.source_kind == kind)
            .filter(|d| d.metadata.get(key).and_then(metadata_value_as_string).as_deref() == Some(value))
            .cloned()
            .collect())
    }

    async fn match_chunks(
        &self,
        query_embedding: &[f32],
        threshold: f32,
        count: usize,
    ) -> Result<Vec<RetrievedChunk>> {
        let state = self.read()?;

        let results = state
            .chunks
            .iter()
            .filter_map(|(chunk_id, chunk)| {
                let doc = state.documents.iter().find(|d| d.id == chunk.document_id)?;
                let similarity = cosine_similarity(query_embedding, &chunk.embedding);
                (similarity >= threshold).then(|| RetrievedChunk {
                    chunk_id: *chunk_id,
                    document_id: doc.id,
                    content: chunk.content.clone(),
                    similarity,
                    document_title: doc.title.clone(),
                    source_kind: doc.source_kind,
                    page_number: chunk.page_number,
                    section_title: chunk.section_title.clone(),
                })
            })
            .collect();

        Ok(rank_matches(results, count))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn chunk(document_id: Uuid, index: usize, embedding: Vec<f32>) -> NewChunk {
        NewChunk {
            document_id,
            chunk_index: index,
            content: format!("chunk {}", index),
            token_count: 2,
            page_number: None,
            section_title: Some("[00:00 - 00:30]".to_string()),
            embedding,
        }
    }

    #[tokio::test]
    async fn test_memory_store_round_trip() {
        let store = MemoryStore::new();
        let doc = store
            .create_document(NewDocument::new("Talk - Channel", SourceKind::Youtube))
            .await
            .unwrap();

        store
            .insert_chunks(&[chunk(doc.id, 0, vec![1.0, 0.0]), chunk(doc.id, 1, vec![0.0, 1.0])])
            .await
            .unwrap();

        let results = store.match_chunks(&[0.0, 1.0], 0.5, 5).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].content, "chunk 1");
        assert_eq!(results[0].section_title.as_deref(), Some("[00:00 - 00:30]"));

        assert!(store.delete_document(doc.id).await.unwrap());
        assert_eq!(store.chunk_count(doc.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_rejected_batch_writes_nothing() {
        let store = MemoryStore::new();
        let doc = store.create_document(NewDocument::new("Doc", SourceKind::Pdf)).await.unwrap();

        let result = store
            .insert_chunks(&[chunk(doc.id, 0, vec![1.0]), chunk(Uuid::new_v4(), 0, vec![1.0])])
            .await;
        assert!(matches!(result, Err(AcervoError::StoreWrite(_))));
        assert_eq!(store.chunk_count(doc.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_is_video_ingested() {
        let store = MemoryStore::new();
        let mut metadata = Metadata::new();
        metadata.insert("video_id".to_string(), json!("vid"));

        let doc = store
            .create_document(NewDocument::new("V", SourceKind::Youtube).with_metadata(metadata.clone()))
            .await
            .unwrap();
        assert!(!store.is_video_ingested("vid").await.unwrap());

        store.mark_completed(doc.id, 3, metadata).await.unwrap();
        assert!(store.is_video_ingested("vid").await.unwrap());
        assert!(store.mark_completed(doc.id, 3, Metadata::new()).await.is_err());
    }
}
