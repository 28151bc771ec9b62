//! List and delete commands.

use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use crate::store::{DocumentFilter, DocumentStatus, SourceKind};
use anyhow::{Context, Result};
use uuid::Uuid;

/// Run the list command.
pub async fn run_list(
    kind: Option<SourceKind>,
    status: Option<DocumentStatus>,
    settings: Settings,
) -> Result<()> {
    let orchestrator = Orchestrator::new(settings)?;
    let filter = DocumentFilter {
        source_kind: kind,
        status,
    };

    let documents = orchestrator.store().list_documents(&filter).await?;
    if documents.is_empty() {
        Output::info("No documents yet. Use 'acervo ingest-pdf' or 'acervo ingest-youtube' to add content.");
        return Ok(());
    }

    Output::header(&format!("Documents ({})", documents.len()));
    println!();
    for doc in &documents {
        Output::document_info(doc);
    }

    let total_chunks: usize = documents.iter().map(|d| d.total_chunks).sum();
    println!();
    Output::kv("Total documents", &documents.len().to_string());
    Output::kv("Total chunks", &total_chunks.to_string());

    Ok(())
}

/// Run the delete command.
pub async fn run_delete(document_id: &str, settings: Settings) -> Result<()> {
    let id = Uuid::parse_str(document_id.trim())
        .with_context(|| format!("Invalid document id: {}", document_id))?;

    let orchestrator = Orchestrator::new(settings)?;
    if orchestrator.store().delete_document(id).await? {
        Output::success(&format!("Deleted document {}", id));
    } else {
        Output::warning(&format!("No document with id {}", id));
    }

    Ok(())
}
