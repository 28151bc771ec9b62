//! HTTP API server for integration with other systems.
//!
//! Provides REST endpoints for listing documents, search, and PDF upload.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::error::AcervoError;
use crate::ingest::Ingestor;
use crate::orchestrator::Orchestrator;
use crate::rag::{format_chunks_as_context, RetrieveOptions, Retriever};
use crate::store::{Document, DocumentFilter, DocumentStatus, KnowledgeStore, RetrievedChunk, SourceKind};
use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use uuid::Uuid;

/// Largest accepted PDF upload.
const MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;

/// Shared application state.
struct AppState {
    store: Arc<dyn KnowledgeStore>,
    retriever: Retriever,
    ingestor: Ingestor,
    defaults: RetrieveOptions,
}

/// Run the HTTP API server.
pub async fn run_serve(host: &str, port: u16, settings: Settings) -> anyhow::Result<()> {
    if let Err(e) = preflight::check(Operation::Search, &settings) {
        Output::error(&e.to_string());
        return Err(e.into());
    }

    let defaults = RetrieveOptions::from(&settings.retrieval);
    let orchestrator = Orchestrator::new(settings)?;
    let state = Arc::new(AppState {
        store: orchestrator.store(),
        retriever: orchestrator.retriever()?,
        ingestor: orchestrator.ingestor()?,
        defaults,
    });

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    Output::header("Acervo API Server");
    println!();
    Output::success(&format!("Listening on http://{}", addr));
    println!();
    println!("Endpoints:");
    Output::kv("Health", "GET    /health");
    Output::kv("List documents", "GET    /documents?kind=&status=");
    Output::kv("Delete document", "DELETE /documents/{id}");
    Output::kv("Search", "POST   /search");
    Output::kv("Upload PDF", "POST   /ingest/pdf?file_name=");
    println!();
    Output::info("Press Ctrl+C to stop the server.");

    axum::serve(listener, router(state)).await?;

    Ok(())
}

fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/documents", get(list_documents))
        .route("/documents/{id}", delete(delete_document))
        .route("/search", post(search))
        .route("/ingest/pdf", post(ingest_pdf))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(cors)
        .with_state(state)
}

// === Request/Response Types ===

#[derive(Deserialize)]
struct ListQuery {
    kind: Option<String>,
    status: Option<String>,
}

#[derive(Serialize)]
struct DocumentListResponse {
    documents: Vec<Document>,
    total: usize,
}

#[derive(Deserialize)]
struct SearchRequest {
    query: String,
    #[serde(default)]
    limit: Option<usize>,
    #[serde(default)]
    threshold: Option<f32>,
}

#[derive(Serialize)]
struct SearchResponse {
    results: Vec<RetrievedChunk>,
    context: String,
}

#[derive(Deserialize)]
struct IngestQuery {
    file_name: String,
}

#[derive(Serialize)]
struct IngestResponse {
    document_id: Uuid,
    title: String,
    chunk_count: usize,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(ErrorResponse { error: message.into() })).into_response()
}

fn status_for(error: &AcervoError) -> StatusCode {
    match error {
        AcervoError::InvalidInput(_) | AcervoError::EmptyContent(_) | AcervoError::PdfExtract(_) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        AcervoError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
        AcervoError::ProviderUnavailable(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for AcervoError {
    fn into_response(self) -> Response {
        error_response(status_for(&self), self.to_string())
    }
}

// === Handlers ===

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn list_documents(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<DocumentListResponse>, AcervoError> {
    let filter = DocumentFilter {
        source_kind: query.kind.as_deref().map(str::parse::<SourceKind>).transpose()?,
        status: query.status.as_deref().map(str::parse::<DocumentStatus>).transpose()?,
    };

    let documents = state.store.list_documents(&filter).await?;
    Ok(Json(DocumentListResponse {
        total: documents.len(),
        documents,
    }))
}

async fn delete_document(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Response, AcervoError> {
    if state.store.delete_document(id).await? {
        Ok(StatusCode::NO_CONTENT.into_response())
    } else {
        Ok(error_response(StatusCode::NOT_FOUND, format!("Document not found: {}", id)))
    }
}

async fn search(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SearchRequest>,
) -> Response {
    if req.query.trim().is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "query must not be empty");
    }

    let options = RetrieveOptions {
        match_threshold: req.threshold.unwrap_or(state.defaults.match_threshold),
        match_count: req.limit.unwrap_or(state.defaults.match_count),
    };
    let results = state.retriever.retrieve(&req.query, options).await;
    let context = format_chunks_as_context(&results);

    Json(SearchResponse { results, context }).into_response()
}

async fn ingest_pdf(
    State(state): State<Arc<AppState>>,
    Query(query): Query<IngestQuery>,
    body: Bytes,
) -> Result<Json<IngestResponse>, AcervoError> {
    if body.is_empty() {
        return Err(AcervoError::InvalidInput("request body is empty".to_string()));
    }

    let result = state.ingestor.ingest_pdf(body.to_vec(), &query.file_name).await?;
    Ok(Json(IngestResponse {
        document_id: result.document_id,
        title: result.title,
        chunk_count: result.chunk_count,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunking::TextChunk;
    use crate::store::{MemoryStore, NewDocument};
    use crate::testing::WordEmbedder;

    async fn spawn_server() -> (String, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let embedder = Arc::new(WordEmbedder::default());
        let state = Arc::new(AppState {
            store: store.clone(),
            retriever: Retriever::new(store.clone(), embedder.clone()),
            ingestor: Ingestor::new(store.clone(), embedder, Default::default()),
            defaults: RetrieveOptions::default(),
        });

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router(state)).await.unwrap();
        });
        (format!("http://{}", addr), store)
    }

    async fn seed(store: &Arc<MemoryStore>) -> Uuid {
        let ingestor = Ingestor::new(store.clone(), Arc::new(WordEmbedder::default()), Default::default());
        let chunk = TextChunk {
            content: "pricing strategy for premium offers".to_string(),
            chunk_index: 0,
            page_number: Some(2),
            section_title: Some("Pricing".to_string()),
            token_count: 6,
        };
        ingestor
            .ingest_chunks(NewDocument::new("Offer Guide", SourceKind::Pdf), vec![chunk])
            .await
            .unwrap()
            .document_id
    }

    #[tokio::test]
    async fn test_search_returns_results_and_context() {
        let (base, store) = spawn_server().await;
        seed(&store).await;

        let response = reqwest::Client::new()
            .post(format!("{}/search", base))
            .json(&serde_json::json!({ "query": "pricing offers", "limit": 3 }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200);

        let body: serde_json::Value = response.json().await.unwrap();
        assert_eq!(body["results"].as_array().unwrap().len(), 1);
        assert_eq!(body["results"][0]["document_title"], "Offer Guide");
        assert!(body["context"]
            .as_str()
            .unwrap()
            .contains("[Source 1: Offer Guide > Pricing (p.2)"));
    }

    #[tokio::test]
    async fn test_list_filters_and_delete() {
        let (base, store) = spawn_server().await;
        let id = seed(&store).await;
        let client = reqwest::Client::new();

        let body: serde_json::Value = client
            .get(format!("{}/documents?kind=pdf&status=completed", base))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["total"], 1);

        let response = client
            .get(format!("{}/documents?kind=podcast", base))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 422);

        let response = client
            .delete(format!("{}/documents/{}", base, id))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 204);

        let response = client
            .delete(format!("{}/documents/{}", base, id))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 404);
    }

    #[tokio::test]
    async fn test_ingest_rejects_unreadable_pdf() {
        let (base, store) = spawn_server().await;

        let response = reqwest::Client::new()
            .post(format!("{}/ingest/pdf?file_name=broken.pdf", base))
            .body("definitely not a pdf")
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 422);

        let docs = store.list_documents(&DocumentFilter::default()).await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].title, "broken");
        assert_eq!(docs[0].status, DocumentStatus::Error);
    }
}
