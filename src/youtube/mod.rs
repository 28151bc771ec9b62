//! YouTube collaborators: Data API client, transcript fetching, scoring, rate limiting.
//!
//! The discovery workflow only talks to the [`VideoProvider`] and
//! [`TranscriptProvider`] traits, so both can be faked in tests.

mod api;
mod rate_limiter;
mod scorer;
mod transcript;

pub use api::{extract_handle, parse_duration, ChannelInfo, YoutubeApi, API_PAGE_SIZE};
pub use rate_limiter::RateLimiter;
pub use scorer::{months_between, score_and_select, score_and_select_at, ScoredVideo};
pub use transcript::{
    clean_transcript_text, FetchedTranscript, TranscriptFetcher, TranscriptProvider,
    TranscriptSegment, YtDlpTranscripts, MIN_TRANSCRIPT_CHARS,
};

use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

static VIDEO_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?x)
        (?:
            (?:https?://)?
            (?:www\.|m\.)?
            (?:youtube\.com/watch\?(?:.*&)?v=|youtu\.be/|youtube\.com/embed/|youtube\.com/shorts/|youtube\.com/v/)
            ([a-zA-Z0-9_-]{11})
        )
        |
        ^([a-zA-Z0-9_-]{11})$
    ",
    )
    .expect("valid video id regex")
});

/// Metadata for one video, as returned by the Data API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoMetadata {
    pub video_id: String,
    pub title: String,
    pub description: String,
    pub channel_id: String,
    pub channel_title: String,
    pub published_at: DateTime<Utc>,
    pub view_count: u64,
    pub like_count: u64,
    /// Raw ISO-8601 duration.
    pub duration: String,
    pub duration_seconds: u64,
    pub thumbnail_url: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub video_url: String,
}

/// Video metadata provider.
#[async_trait]
pub trait VideoProvider: Send + Sync {
    /// Resolve a handle (`@name`) or channel URL to channel info.
    async fn resolve_channel(&self, handle_or_url: &str) -> Result<Option<ChannelInfo>>;

    /// List a channel's video ids, newest first, up to `max_results`.
    async fn fetch_channel_videos(&self, channel_id: &str, max_results: usize) -> Result<Vec<String>>;

    /// Fetch metadata for a list of video ids. Unknown ids are omitted.
    async fn fetch_video_details(&self, video_ids: &[String]) -> Result<Vec<VideoMetadata>>;
}

/// Extract the 11-character video id from a bare id or a watch/short/embed URL.
pub fn extract_video_id(input: &str) -> Option<String> {
    let caps = VIDEO_ID.captures(input.trim())?;
    caps.get(1)
        .or_else(|| caps.get(2))
        .map(|m| m.as_str().to_string())
}

/// Canonical watch URL for a video id.
pub fn video_url(video_id: &str) -> String {
    format!("https://www.youtube.com/watch?v={}", video_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_video_id() {
        let id = "dQw4w9WgXcQ";
        assert_eq!(extract_video_id(id).as_deref(), Some(id));
        assert_eq!(
            extract_video_id("https://www.youtube.com/watch?v=dQw4w9WgXcQ").as_deref(),
            Some(id)
        );
        assert_eq!(
            extract_video_id("https://www.youtube.com/watch?list=PL1&v=dQw4w9WgXcQ").as_deref(),
            Some(id)
        );
        assert_eq!(extract_video_id("https://youtu.be/dQw4w9WgXcQ").as_deref(), Some(id));
        assert_eq!(
            extract_video_id("https://youtube.com/shorts/dQw4w9WgXcQ").as_deref(),
            Some(id)
        );
        assert_eq!(
            extract_video_id("https://www.youtube.com/embed/dQw4w9WgXcQ").as_deref(),
            Some(id)
        );
        assert_eq!(extract_video_id("not a video"), None);
        assert_eq!(extract_video_id("short"), None);
    }

    #[test]
    fn test_video_url() {
        assert_eq!(video_url("abc"), "https://www.youtube.com/watch?v=abc");
    }
}
