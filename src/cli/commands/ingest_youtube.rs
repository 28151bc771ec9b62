//! Wave ingestion command.

use super::discover::print_event;
use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::discovery::{DiscoveryFile, RunStats, WaveOptions};
use crate::orchestrator::Orchestrator;
use anyhow::Result;
use std::path::PathBuf;

/// Options collected from the command line.
pub struct IngestYoutubeArgs {
    pub wave: Option<u8>,
    pub top: Option<usize>,
    pub channel: Option<String>,
    pub batch_size: Option<usize>,
    pub from_discovery: Option<PathBuf>,
}

/// Discover and ingest a wave, or replay a discovery file.
pub async fn run_ingest_youtube(args: IngestYoutubeArgs, settings: Settings) -> Result<()> {
    if let Err(e) = preflight::check(Operation::IngestYoutube, &settings) {
        Output::error(&e.to_string());
        return Err(e.into());
    }

    let orchestrator = Orchestrator::new(settings)?;
    let workflow = orchestrator.discovery_workflow()?.with_observer(print_event);

    let stats = match (&args.from_discovery, args.wave) {
        (Some(path), _) => {
            let file = DiscoveryFile::load(path)?;
            Output::info(&format!(
                "Replaying wave {} discovery from {} ({} videos)",
                file.wave,
                path.display(),
                file.total_selected()
            ));
            workflow.run_from_discovery(&file, args.channel.as_deref()).await
        }
        (None, Some(wave)) => {
            let options = WaveOptions {
                wave,
                top_n: args.top,
                channel_filter: args.channel,
                batch_size: args.batch_size,
            };
            workflow.run_wave(&options).await
        }
        (None, None) => anyhow::bail!("Either --wave or --from-discovery is required"),
    };

    print_stats(&stats);
    Ok(())
}

fn print_stats(stats: &RunStats) {
    Output::header("YouTube ingestion");
    Output::kv("Processed", &stats.processed.to_string());
    Output::kv("Skipped (already ingested)", &stats.skipped_ingested.to_string());
    Output::kv("Skipped (no transcript)", &stats.skipped_no_transcript.to_string());
    Output::kv("Errors", &stats.errors.to_string());
    Output::kv("  transcript failures", &stats.transcript_errors.to_string());
    Output::kv("Channel errors", &stats.channel_errors.to_string());
    Output::kv("Chunks", &stats.chunks.to_string());

    if stats.errors + stats.channel_errors > 0 {
        Output::warning("Some videos failed; rerun the same command to retry them.");
    } else {
        Output::success("Done.");
    }
}
