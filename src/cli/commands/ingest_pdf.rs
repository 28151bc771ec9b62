//! PDF ingestion command.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::ingest::pdf::collect_pdf_files;
use crate::orchestrator::Orchestrator;
use anyhow::Result;
use std::path::Path;

/// Ingest one PDF, or every PDF in a directory.
pub async fn run_ingest_pdf(path: &Path, recursive: bool, no_resume: bool, settings: Settings) -> Result<()> {
    if let Err(e) = preflight::check(Operation::IngestPdf, &settings) {
        Output::error(&e.to_string());
        return Err(e.into());
    }

    if !path.exists() {
        anyhow::bail!("Path not found: {}", path.display());
    }

    let files = if path.is_dir() {
        collect_pdf_files(path, recursive)
    } else {
        vec![path.to_path_buf()]
    };

    if files.is_empty() {
        Output::warning(&format!("No PDF files found in {}", path.display()));
        return Ok(());
    }

    let orchestrator = Orchestrator::new(settings)?;
    let ingestor = orchestrator.ingestor()?;

    Output::info(&format!("Found {} PDF file(s)", files.len()));
    let spinner = Output::spinner("Extracting, chunking and embedding...");
    let stats = ingestor.ingest_pdf_files(&files, !no_resume).await;
    spinner.finish_and_clear();
    let stats = stats?;

    Output::header("PDF ingestion");
    Output::kv("Processed", &stats.processed.to_string());
    Output::kv("Skipped (already ingested)", &stats.skipped.to_string());
    Output::kv("Errors", &stats.errors.to_string());
    Output::kv("Chunks", &stats.chunks.to_string());

    if stats.errors > 0 {
        Output::warning("Some files failed. Run 'acervo list --status error' for details.");
    } else {
        Output::success("Done.");
    }

    Ok(())
}
