//! SQLite-backed knowledge store.
//!
//! Embeddings are stored as little-endian `f32` blobs and cosine similarity is
//! computed in Rust, which is plenty for a personal knowledge base.

use super::{
    cosine_similarity, metadata_value_as_string, rank_matches, Document, DocumentFilter,
    DocumentStatus, KnowledgeStore, Metadata, NewChunk, NewDocument, RetrievedChunk, SourceKind,
};
use crate::error::{AcervoError, Result};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS documents (
        id TEXT PRIMARY KEY,
        title TEXT NOT NULL,
        source_kind TEXT NOT NULL,
        file_name TEXT,
        file_size INTEGER,
        status TEXT NOT NULL,
        total_chunks INTEGER NOT NULL DEFAULT 0,
        metadata TEXT NOT NULL DEFAULT '{}',
        error_message TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_documents_kind_status ON documents(source_kind, status);
    CREATE INDEX IF NOT EXISTS idx_documents_created_at ON documents(created_at);

    CREATE TABLE IF NOT EXISTS chunks (
        id TEXT PRIMARY KEY,
        document_id TEXT NOT NULL REFERENCES documents(id) ON DELETE CASCADE,
        chunk_index INTEGER NOT NULL,
        content TEXT NOT NULL,
        token_count INTEGER NOT NULL,
        page_number INTEGER,
        section_title TEXT,
        embedding BLOB NOT NULL,
        UNIQUE (document_id, chunk_index)
    );

    CREATE INDEX IF NOT EXISTS idx_chunks_document_id ON chunks(document_id);
"#;

const DOCUMENT_COLUMNS: &str = "id, title, source_kind, file_name, file_size, status, total_chunks, \
     metadata, error_message, created_at, updated_at";

/// SQLite-based knowledge store.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) a store at `path`.
    #[instrument(skip_all)]
    pub fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        let store = Self::init(conn)?;

        info!("Opened knowledge store at {:?}", path);
        Ok(store)
    }

    /// Create an in-memory store (useful for testing).
    pub fn in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| AcervoError::Store(format!("Failed to acquire lock: {}", e)))
    }

    fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
        embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    fn bytes_to_embedding(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|chunk| {
                let arr: [u8; 4] = chunk.try_into().unwrap_or_default();
                f32::from_le_bytes(arr)
            })
            .collect()
    }

    fn transition(
        &self,
        id: Uuid,
        to: DocumentStatus,
        total_chunks: Option<usize>,
        metadata: Option<&Metadata>,
        error_message: Option<&str>,
    ) -> Result<()> {
        let conn = self.conn()?;
        let metadata_json = metadata.map(serde_json::to_string).transpose()?;

        let updated = conn.execute(
            r#"
            UPDATE documents
            SET status = ?2,
                total_chunks = COALESCE(?3, total_chunks),
                metadata = COALESCE(?4, metadata),
                error_message = ?5,
                updated_at = ?6
            WHERE id = ?1 AND status = 'processing'
            "#,
            params![
                id.to_string(),
                to.as_str(),
                total_chunks.map(|n| n as i64),
                metadata_json,
                error_message,
                timestamp(Utc::now()),
            ],
        )?;

        if updated == 0 {
            return Err(AcervoError::Store(format!(
                "document {} is missing or no longer processing",
                id
            )));
        }
        debug!("Document {} -> {}", id, to);
        Ok(())
    }
}

fn timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn conversion_error(index: usize, e: impl std::error::Error + Send + Sync + 'static) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(index, Type::Text, Box::new(e))
}

fn parse_uuid(row: &Row, index: usize) -> rusqlite::Result<Uuid> {
    let raw: String = row.get(index)?;
    Uuid::parse_str(&raw).map_err(|e| conversion_error(index, e))
}

fn parse_time(row: &Row, index: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(index)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(index, e))
}

fn parse_enum<T: std::str::FromStr<Err = AcervoError>>(row: &Row, index: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(index)?;
    raw.parse().map_err(|e| conversion_error(index, e))
}

fn row_to_document(row: &Row) -> rusqlite::Result<Document> {
    let metadata_json: String = row.get(7)?;
    let metadata: Metadata = serde_json::from_str(&metadata_json).map_err(|e| conversion_error(7, e))?;
    let file_size: Option<i64> = row.get(4)?;
    let total_chunks: i64 = row.get(6)?;

    Ok(Document {
        id: parse_uuid(row, 0)?,
        title: row.get(1)?,
        source_kind: parse_enum(row, 2)?,
        file_name: row.get(3)?,
        file_size: file_size.map(|n| n as u64),
        status: parse_enum(row, 5)?,
        total_chunks: total_chunks as usize,
        metadata,
        error_message: row.get(8)?,
        created_at: parse_time(row, 9)?,
        updated_at: parse_time(row, 10)?,
    })
}

#[async_trait]
impl KnowledgeStore for SqliteStore {
    #[instrument(skip(self, doc), fields(title = %doc.title))]
    async fn create_document(&self, doc: NewDocument) -> Result<Document> {
        let document = doc.into_document();
        let conn = self.conn()?;

        conn.execute(
            &format!(
                "INSERT INTO documents ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                DOCUMENT_COLUMNS
            ),
            params![
                document.id.to_string(),
                document.title,
                document.source_kind.as_str(),
                document.file_name,
                document.file_size.map(|n| n as i64),
                document.status.as_str(),
                document.total_chunks as i64,
                serde_json::to_string(&document.metadata)?,
                document.error_message,
                timestamp(document.created_at),
                timestamp(document.updated_at),
            ],
        )
        .map_err(|e| AcervoError::StoreWrite(format!("Failed to create document: {}", e)))?;

        debug!("Created document {}", document.id);
        Ok(document)
    }

    async fn get_document(&self, id: Uuid) -> Result<Option<Document>> {
        let conn = self.conn()?;
        let document = conn
            .query_row(
                &format!("SELECT {} FROM documents WHERE id = ?1", DOCUMENT_COLUMNS),
                params![id.to_string()],
                row_to_document,
            )
            .optional()?;
        Ok(document)
    }

    async fn mark_completed(&self, id: Uuid, total_chunks: usize, metadata: Metadata) -> Result<()> {
        self.transition(id, DocumentStatus::Completed, Some(total_chunks), Some(&metadata), None)
    }

    async fn mark_error(&self, id: Uuid, message: &str) -> Result<()> {
        self.transition(id, DocumentStatus::Error, None, None, Some(message))
    }

    #[instrument(skip(self, chunks), fields(count = chunks.len()))]
    async fn insert_chunks(&self, chunks: &[NewChunk]) -> Result<usize> {
        let conn = self.conn()?;
        let write_err = |e: rusqlite::Error| AcervoError::StoreWrite(e.to_string());

        let tx = conn.unchecked_transaction().map_err(write_err)?;
        for chunk in chunks {
            tx.execute(
                r#"
                INSERT INTO chunks
                (id, document_id, chunk_index, content, token_count, page_number, section_title, embedding)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                "#,
                params![
                    Uuid::new_v4().to_string(),
                    chunk.document_id.to_string(),
                    chunk.chunk_index as i64,
                    chunk.content,
                    chunk.token_count as i64,
                    chunk.page_number,
                    chunk.section_title,
                    Self::embedding_to_bytes(&chunk.embedding),
                ],
            )
            .map_err(write_err)?;
        }
        tx.commit().map_err(write_err)?;

        debug!("Inserted {} chunks", chunks.len());
        Ok(chunks.len())
    }

    async fn delete_chunks(&self, document_id: Uuid) -> Result<usize> {
        let conn = self.conn()?;
        let deleted = conn.execute(
            "DELETE FROM chunks WHERE document_id = ?1",
            params![document_id.to_string()],
        )?;
        if deleted > 0 {
            warn!("Removed {} chunks of document {}", deleted, document_id);
        }
        Ok(deleted)
    }

    async fn chunk_count(&self, document_id: Uuid) -> Result<usize> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM chunks WHERE document_id = ?1",
            params![document_id.to_string()],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    #[instrument(skip(self))]
    async fn delete_document(&self, id: Uuid) -> Result<bool> {
        let conn = self.conn()?;
        let deleted = conn.execute("DELETE FROM documents WHERE id = ?1", params![id.to_string()])?;
        if deleted > 0 {
            info!("Deleted document {}", id);
        }
        Ok(deleted > 0)
    }

    async fn list_documents(&self, filter: &DocumentFilter) -> Result<Vec<Document>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            r#"
            SELECT {} FROM documents
            WHERE (?1 IS NULL OR source_kind = ?1)
              AND (?2 IS NULL OR status = ?2)
            ORDER BY created_at DESC, rowid DESC
            "#,
            DOCUMENT_COLUMNS
        ))?;

        let rows = stmt.query_map(
            params![
                filter.source_kind.map(|k| k.as_str()),
                filter.status.map(|s| s.as_str()),
            ],
            row_to_document,
        )?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    async fn find_by_metadata(&self, kind: SourceKind, key: &str, value: &str) -> Result<Vec<Document>> {
        let path = format!("$.\"{}\"", key.replace('"', ""));
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            r#"
            SELECT {} FROM documents
            WHERE source_kind = ?1
              AND CAST(json_extract(metadata, ?2) AS TEXT) = ?3
            ORDER BY created_at DESC
            "#,
            DOCUMENT_COLUMNS
        ))?;

        let rows = stmt.query_map(params![kind.as_str(), path, value], row_to_document)?;
        let documents = rows.collect::<rusqlite::Result<Vec<_>>>()?;

        // json_extract renders booleans as 0/1; re-check against the JSON value.
        Ok(documents
            .into_iter()
            .filter(|d| d.metadata.get(key).and_then(metadata_value_as_string).as_deref() == Some(value))
            .collect())
    }

    #[instrument(skip(self, query_embedding))]
    async fn match_chunks(
        &self,
        query_embedding: &[f32],
        threshold: f32,
        count: usize,
    ) -> Result<Vec<RetrievedChunk>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT c.id, c.document_id, c.content, c.page_number, c.section_title, c.embedding,
                   d.title, d.source_kind
            FROM chunks c
            JOIN documents d ON d.id = c.document_id
            "#,
        )?;

        let rows = stmt.query_map([], |row| {
            let embedding_bytes: Vec<u8> = row.get(5)?;
            let similarity = cosine_similarity(query_embedding, &Self::bytes_to_embedding(&embedding_bytes));
            Ok(RetrievedChunk {
                chunk_id: parse_uuid(row, 0)?,
                document_id: parse_uuid(row, 1)?,
                content: row.get(2)?,
                page_number: row.get(3)?,
                section_title: row.get(4)?,
                similarity,
                document_title: row.get(6)?,
                source_kind: parse_enum(row, 7)?,
            })
        })?;

        let mut results = Vec::new();
        for row in rows {
            let chunk = row?;
            if chunk.similarity >= threshold {
                results.push(chunk);
            }
        }

        let results = rank_matches(results, count);
        debug!("Found {} matching chunks", results.len());
        Ok(results)
    }
}
