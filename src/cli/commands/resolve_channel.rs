//! Channel handle resolution command.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::youtube::{extract_handle, RateLimiter, VideoProvider, YoutubeApi};
use anyhow::Result;
use std::sync::Arc;

/// Print the channel ID for a handle, ready to paste into the config.
pub async fn run_resolve_channel(handle: &str, settings: Settings) -> Result<()> {
    if let Err(e) = preflight::check(Operation::Discover, &settings) {
        Output::error(&e.to_string());
        return Err(e.into());
    }

    let limiter = Arc::new(RateLimiter::new(settings.youtube.api_delay()));
    let api = YoutubeApi::from_settings(&settings.youtube, limiter)?;
    let handle = extract_handle(handle);

    match api.resolve_channel(&handle).await? {
        Some(info) => {
            Output::success(&format!("Resolved {}", handle));
            Output::kv("Title", &info.title);
            Output::kv("Channel ID", &info.channel_id);
            Output::kv("Subscribers", &info.subscriber_count.to_string());
            Output::kv("Videos", &info.video_count.to_string());
            println!();
            println!("channel_id = \"{}\"", info.channel_id);
        }
        None => {
            Output::warning(&format!("No channel found for {}", handle));
        }
    }

    Ok(())
}
