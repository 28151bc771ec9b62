//! Search command implementation.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use crate::rag::{format_chunks_as_context, RetrieveOptions};
use anyhow::Result;

/// Run the search command.
pub async fn run_search(
    query: &str,
    limit: Option<usize>,
    threshold: Option<f32>,
    context: bool,
    settings: Settings,
) -> Result<()> {
    if let Err(e) = preflight::check(Operation::Search, &settings) {
        Output::error(&e.to_string());
        return Err(e.into());
    }

    let mut options = RetrieveOptions::from(&settings.retrieval);
    if let Some(limit) = limit {
        options.match_count = limit;
    }
    if let Some(threshold) = threshold {
        options.match_threshold = threshold;
    }

    let orchestrator = Orchestrator::new(settings)?;
    let retriever = orchestrator.retriever()?;

    let spinner = Output::spinner("Searching...");
    let chunks = retriever.retrieve(query, options).await;
    spinner.finish_and_clear();

    if chunks.is_empty() {
        Output::warning("No results found matching your query.");
        return Ok(());
    }

    if context {
        println!("{}", format_chunks_as_context(&chunks));
        return Ok(());
    }

    Output::success(&format!("Found {} results", chunks.len()));
    for (i, chunk) in chunks.iter().enumerate() {
        Output::search_result(i + 1, chunk);
    }

    Ok(())
}
