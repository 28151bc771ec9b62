//! Discovery command: score a wave's videos and save the selection.

use crate::cli::preflight::{self, Operation};
use crate::cli::{format_duration, Output};
use crate::config::Settings;
use crate::discovery::{DiscoveryEvent, WaveOptions};
use crate::orchestrator::Orchestrator;
use anyhow::Result;
use std::path::PathBuf;

/// Progress printer shared by the discovery and ingestion commands.
pub(crate) fn print_event(event: &DiscoveryEvent<'_>) {
    match event {
        DiscoveryEvent::ChannelStarted { name } => Output::header(name),
        DiscoveryEvent::ChannelSelected { fetched, selected, .. } => {
            Output::info(&format!("{} videos fetched, {} selected", fetched, selected))
        }
        DiscoveryEvent::ChannelFailed { error, .. } => Output::error(&error.to_string()),
        DiscoveryEvent::VideoStarted { title } => Output::list_item(title),
        DiscoveryEvent::VideoFinished { .. } => {}
        DiscoveryEvent::VideoFailed { title, error } => {
            Output::error(&format!("{}: {}", title, error))
        }
        DiscoveryEvent::RateLimited { cooldown, .. } => Output::warning(&format!(
            "Rate limited, waiting {}s before retrying",
            cooldown.as_secs()
        )),
        DiscoveryEvent::BatchLimitReached { limit, .. } => {
            Output::info(&format!("Batch limit of {} reached, moving on", limit))
        }
    }
}

/// Run the discover command.
pub async fn run_discover(
    wave: u8,
    top: Option<usize>,
    channel: Option<String>,
    dry_run: bool,
    output: Option<PathBuf>,
    settings: Settings,
) -> Result<()> {
    if let Err(e) = preflight::check(Operation::Discover, &settings) {
        Output::error(&e.to_string());
        return Err(e.into());
    }

    let output = output.unwrap_or_else(|| settings.data_dir().join(format!("discovered-wave{}.json", wave)));

    let orchestrator = Orchestrator::new(settings)?;
    let discovery = orchestrator.channel_discovery()?.with_observer(print_event);

    let options = WaveOptions {
        wave,
        top_n: top,
        channel_filter: channel,
        batch_size: None,
    };
    let discovery = discovery.discover_wave(&options).await;

    if !discovery.unresolved.is_empty() {
        Output::warning(&format!(
            "{} channel(s) have no channel_id yet:",
            discovery.unresolved.len()
        ));
        for channel in &discovery.unresolved {
            Output::list_item(&format!(
                "{} (run 'acervo resolve-channel {}')",
                channel.name, channel.handle
            ));
        }
    }

    let file = &discovery.file;
    for channel in file.channels.iter().filter(|c| !c.selected_videos.is_empty()) {
        Output::header(&format!("Top picks: {}", channel.channel_name));
        for (i, scored) in channel.selected_videos.iter().enumerate() {
            println!(
                "  {:>2}. [{:.3}] {} ({} views, {})",
                i + 1,
                scored.score,
                scored.video.title,
                scored.video.view_count,
                format_duration(scored.video.duration_seconds)
            );
        }
    }

    Output::header("Discovery summary");
    Output::kv("Channels", &file.channels.len().to_string());
    Output::kv("Videos fetched", &file.total_fetched().to_string());
    Output::kv("Videos selected", &file.total_selected().to_string());

    if dry_run {
        Output::info("Dry run: discovery file not written.");
        return Ok(());
    }

    file.save(&output)?;
    Output::success(&format!("Saved discovery to {}", output.display()));
    Output::info(&format!(
        "Ingest it with: acervo ingest-youtube --from-discovery {}",
        output.display()
    ));

    Ok(())
}
