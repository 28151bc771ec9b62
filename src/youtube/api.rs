//! YouTube Data API v3 client.

use super::{RateLimiter, VideoMetadata, VideoProvider};
use crate::config::YoutubeSettings;
use crate::error::{AcervoError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use regex::Regex;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, LazyLock};
use std::time::Duration;
use tracing::{debug, info, instrument};

/// The Data API returns at most 50 items per page / per id batch.
pub const API_PAGE_SIZE: usize = 50;

const REQUEST_TIMEOUT_SECS: u64 = 30;

static ISO_DURATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^P(?:(\d+)D)?(?:T(?:(\d+)H)?(?:(\d+)M)?(?:(\d+)S)?)?$").expect("valid duration regex")
});

static HANDLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@[\w.-]+").expect("valid handle regex"));

/// Canonical channel information.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelInfo {
    pub channel_id: String,
    pub title: String,
    pub subscriber_count: u64,
    pub video_count: u64,
}

/// YouTube Data API client.
pub struct YoutubeApi {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    limiter: Arc<RateLimiter>,
}

impl YoutubeApi {
    /// Create a client. Fails when no API key is configured.
    pub fn new(api_key: Option<String>, base_url: &str, limiter: Arc<RateLimiter>) -> Result<Self> {
        let api_key = api_key.filter(|k| !k.trim().is_empty()).ok_or_else(|| {
            AcervoError::Config(
                "YouTube API key not found. Set youtube.api_key or YOUTUBE_API_KEY.".to_string(),
            )
        })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            limiter,
        })
    }

    /// Create a client from settings, sharing the given API limiter.
    pub fn from_settings(settings: &YoutubeSettings, limiter: Arc<RateLimiter>) -> Result<Self> {
        Self::new(settings.resolve_api_key(), &settings.api_base_url, limiter)
    }

    /// The limiter pacing this client's requests.
    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// Rate-limited GET against an API resource.
    async fn get<T: DeserializeOwned>(&self, resource: &str, query: &[(&str, String)]) -> Result<T> {
        self.limiter.wait().await;

        let url = format!("{}/{}", self.base_url, resource);
        let response = self
            .client
            .get(&url)
            .query(query)
            .query(&[("key", self.api_key.as_str())])
            .send()
            .await
            .map_err(|e| AcervoError::ProviderUnavailable(format!("YouTube API request failed: {}", e)))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(AcervoError::RateLimited(format!("YouTube API {}", resource)));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AcervoError::ProviderUnavailable(format!(
                "YouTube API {} returned {}: {}",
                resource,
                status,
                body.chars().take(300).collect::<String>()
            )));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| AcervoError::ProviderUnavailable(format!("Invalid YouTube API response: {}", e)))
    }
}

#[async_trait]
impl VideoProvider for YoutubeApi {
    #[instrument(skip(self))]
    async fn resolve_channel(&self, handle_or_url: &str) -> Result<Option<ChannelInfo>> {
        let handle = extract_handle(handle_or_url);

        let response: ListResponse<ChannelItem> = self
            .get(
                "channels",
                &[
                    ("part", "snippet,statistics".to_string()),
                    ("forHandle", handle.trim_start_matches('@').to_string()),
                    ("maxResults", "1".to_string()),
                ],
            )
            .await?;

        Ok(response.items.into_iter().next().map(|channel| ChannelInfo {
            channel_id: channel.id,
            title: channel.snippet.title,
            subscriber_count: parse_count(channel.statistics.subscriber_count.as_deref()),
            video_count: parse_count(channel.statistics.video_count.as_deref()),
        }))
    }

    #[instrument(skip(self))]
    async fn fetch_channel_videos(&self, channel_id: &str, max_results: usize) -> Result<Vec<String>> {
        let mut video_ids = Vec::new();
        let mut page_token: Option<String> = None;

        while video_ids.len() < max_results {
            let page_size = API_PAGE_SIZE.min(max_results - video_ids.len());
            let mut query = vec![
                ("part", "id".to_string()),
                ("channelId", channel_id.to_string()),
                ("type", "video".to_string()),
                ("order", "date".to_string()),
                ("maxResults", page_size.to_string()),
            ];
            if let Some(token) = &page_token {
                query.push(("pageToken", token.clone()));
            }

            let response: ListResponse<SearchItem> = self.get("search", &query).await?;
            let item_count = response.items.len();

            video_ids.extend(response.items.into_iter().filter_map(|item| item.id.video_id));
            debug!("Listed {} video ids so far for {}", video_ids.len(), channel_id);

            page_token = response.next_page_token.filter(|t| !t.is_empty());
            if page_token.is_none() || item_count == 0 {
                break;
            }
        }

        video_ids.truncate(max_results);
        info!("Found {} videos for channel {}", video_ids.len(), channel_id);
        Ok(video_ids)
    }

    #[instrument(skip(self, video_ids), fields(count = video_ids.len()))]
    async fn fetch_video_details(&self, video_ids: &[String]) -> Result<Vec<VideoMetadata>> {
        let mut results = Vec::with_capacity(video_ids.len());

        for batch in video_ids.chunks(API_PAGE_SIZE) {
            let response: ListResponse<VideoItem> = self
                .get(
                    "videos",
                    &[
                        ("part", "snippet,statistics,contentDetails".to_string()),
                        ("id", batch.join(",")),
                    ],
                )
                .await?;

            results.extend(response.items.into_iter().map(VideoItem::into_metadata));
        }

        Ok(results)
    }
}

/// Parse an ISO-8601 duration (`PT1H2M3S`) into seconds. Unparseable input yields 0.
pub fn parse_duration(iso: &str) -> u64 {
    let Some(caps) = ISO_DURATION.captures(iso.trim()) else {
        return 0;
    };
    let part = |i: usize| -> u64 {
        caps.get(i)
            .and_then(|m| m.as_str().parse().ok())
            .unwrap_or(0)
    };
    part(1) * 86_400 + part(2) * 3600 + part(3) * 60 + part(4)
}

/// Pull an `@handle` out of a channel URL; other input is returned as-is.
pub fn extract_handle(handle_or_url: &str) -> String {
    let input = handle_or_url.trim();
    if let Ok(url) = url::Url::parse(input) {
        if let Some(segment) = url
            .path_segments()
            .and_then(|mut segments| segments.find(|s| s.starts_with('@')))
        {
            return segment.to_string();
        }
    }
    HANDLE
        .find(input)
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| input.to_string())
}

fn parse_count(value: Option<&str>) -> u64 {
    value.and_then(|v| v.parse().ok()).unwrap_or(0)
}

// Wire types

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListResponse<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    #[serde(default)]
    id: SearchItemId,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchItemId {
    #[serde(default)]
    video_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChannelItem {
    id: String,
    #[serde(default)]
    snippet: ChannelSnippet,
    #[serde(default)]
    statistics: ChannelStatistics,
}

#[derive(Debug, Default, Deserialize)]
struct ChannelSnippet {
    #[serde(default)]
    title: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChannelStatistics {
    subscriber_count: Option<String>,
    video_count: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoItem {
    id: String,
    #[serde(default)]
    snippet: VideoSnippet,
    #[serde(default)]
    statistics: VideoStatistics,
    #[serde(default)]
    content_details: ContentDetails,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct VideoSnippet {
    title: String,
    description: String,
    channel_id: String,
    channel_title: String,
    published_at: String,
    tags: Vec<String>,
    thumbnails: Thumbnails,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Thumbnails {
    high: Option<Thumbnail>,
    default: Option<Thumbnail>,
}

#[derive(Debug, Deserialize)]
struct Thumbnail {
    url: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoStatistics {
    view_count: Option<String>,
    like_count: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ContentDetails {
    duration: String,
}

impl VideoItem {
    fn into_metadata(self) -> VideoMetadata {
        let snippet = self.snippet;
        let published_at = DateTime::parse_from_rfc3339(&snippet.published_at)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
        let thumbnail_url = snippet
            .thumbnails
            .high
            .or(snippet.thumbnails.default)
            .map(|t| t.url)
            .unwrap_or_default();

        VideoMetadata {
            video_url: super::video_url(&self.id),
            video_id: self.id,
            title: snippet.title,
            description: snippet.description,
            channel_id: snippet.channel_id,
            channel_title: snippet.channel_title,
            published_at,
            view_count: parse_count(self.statistics.view_count.as_deref()),
            like_count: parse_count(self.statistics.like_count.as_deref()),
            duration_seconds: parse_duration(&self.content_details.duration),
            duration: self.content_details.duration,
            thumbnail_url,
            tags: snippet.tags,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param, query_param_is_missing};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn api(server: &MockServer) -> YoutubeApi {
        let limiter = Arc::new(RateLimiter::new(Duration::ZERO));
        YoutubeApi::new(Some("test-key".to_string()), &server.uri(), limiter).unwrap()
    }

    #[test]
    fn test_missing_api_key_is_config_error() {
        let limiter = Arc::new(RateLimiter::new(Duration::ZERO));
        let result = YoutubeApi::new(None, "http://localhost", limiter.clone());
        assert!(matches!(result, Err(AcervoError::Config(_))));

        let result = YoutubeApi::new(Some("  ".to_string()), "http://localhost", limiter);
        assert!(matches!(result, Err(AcervoError::Config(_))));
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("PT1H2M3S"), 3723);
        assert_eq!(parse_duration("PT15M"), 900);
        assert_eq!(parse_duration("PT45S"), 45);
        assert_eq!(parse_duration("P1DT1S"), 86_401);
        assert_eq!(parse_duration("P0D"), 0);
        assert_eq!(parse_duration(""), 0);
        assert_eq!(parse_duration("garbage"), 0);
    }

    #[test]
    fn test_extract_handle() {
        assert_eq!(extract_handle("https://www.youtube.com/@AlexHormozi"), "@AlexHormozi");
        assert_eq!(extract_handle("https://youtube.com/@some.channel/videos"), "@some.channel");
        assert_eq!(extract_handle("@LennysPodcast"), "@LennysPodcast");
        assert_eq!(extract_handle("plainname"), "plainname");
    }

    #[tokio::test]
    async fn test_fetch_channel_videos_paginates() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/search"))
            .and(query_param("channelId", "UC1"))
            .and(query_param_is_missing("pageToken"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [
                    {"id": {"videoId": "aaaaaaaaaaa"}},
                    {"id": {"videoId": "bbbbbbbbbbb"}},
                    {"id": {"kind": "youtube#playlist"}}
                ],
                "nextPageToken": "page2"
            })))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/search"))
            .and(query_param("pageToken", "page2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [{"id": {"videoId": "ccccccccccc"}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let ids = api(&server).fetch_channel_videos("UC1", 10).await.unwrap();
        assert_eq!(ids, vec!["aaaaaaaaaaa", "bbbbbbbbbbb", "ccccccccccc"]);
    }

    #[tokio::test]
    async fn test_fetch_channel_videos_stops_at_cap() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/search"))
            .and(query_param("maxResults", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [
                    {"id": {"videoId": "aaaaaaaaaaa"}},
                    {"id": {"videoId": "bbbbbbbbbbb"}}
                ],
                "nextPageToken": "more"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let ids = api(&server).fetch_channel_videos("UC1", 2).await.unwrap();
        assert_eq!(ids.len(), 2);
    }

    #[tokio::test]
    async fn test_fetch_video_details_maps_metadata() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/videos"))
            .and(query_param("id", "vid00000001"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [{
                    "id": "vid00000001",
                    "snippet": {
                        "title": "How to price an offer",
                        "description": "Pricing deep dive",
                        "channelId": "UC1",
                        "channelTitle": "Channel One",
                        "publishedAt": "2024-03-01T12:00:00Z",
                        "tags": ["pricing", "offer"],
                        "thumbnails": {"default": {"url": "https://img/default.jpg"}}
                    },
                    "statistics": {"viewCount": "12345", "likeCount": "67"},
                    "contentDetails": {"duration": "PT12M30S"}
                }]
            })))
            .mount(&server)
            .await;

        let videos = api(&server)
            .fetch_video_details(&["vid00000001".to_string()])
            .await
            .unwrap();

        assert_eq!(videos.len(), 1);
        let video = &videos[0];
        assert_eq!(video.title, "How to price an offer");
        assert_eq!(video.view_count, 12345);
        assert_eq!(video.like_count, 67);
        assert_eq!(video.duration_seconds, 750);
        assert_eq!(video.thumbnail_url, "https://img/default.jpg");
        assert_eq!(video.video_url, "https://www.youtube.com/watch?v=vid00000001");
        assert_eq!(video.published_at.to_rfc3339(), "2024-03-01T12:00:00+00:00");
    }

    #[tokio::test]
    async fn test_fetch_video_details_batches_ids() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/videos"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": []})))
            .expect(2)
            .mount(&server)
            .await;

        let ids: Vec<String> = (0..75).map(|i| format!("id{:09}", i)).collect();
        let videos = api(&server).fetch_video_details(&ids).await.unwrap();
        assert!(videos.is_empty());
    }

    #[tokio::test]
    async fn test_resolve_channel() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/channels"))
            .and(query_param("forHandle", "AlexHormozi"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [{
                    "id": "UCUyDOdBWhC1MCxEjC46d-zw",
                    "snippet": {"title": "Alex Hormozi"},
                    "statistics": {"subscriberCount": "1000", "videoCount": "42"}
                }]
            })))
            .mount(&server)
            .await;

        let info = api(&server)
            .resolve_channel("https://www.youtube.com/@AlexHormozi")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(info.channel_id, "UCUyDOdBWhC1MCxEjC46d-zw");
        assert_eq!(info.video_count, 42);
    }

    #[tokio::test]
    async fn test_error_statuses() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/videos"))
            .respond_with(ResponseTemplate::new(403).set_body_string("quotaExceeded"))
            .mount(&server)
            .await;

        let api = api(&server);
        let err = api.fetch_channel_videos("UC1", 5).await.unwrap_err();
        assert!(err.is_rate_limited());

        let err = api.fetch_video_details(&["x".to_string()]).await.unwrap_err();
        assert!(matches!(err, AcervoError::ProviderUnavailable(_)));
    }

    #[tokio::test]
    async fn test_error_body_truncated_on_char_boundary() {
        let server = MockServer::start().await;
        let body = format!("{}ção excedida", "a".repeat(299));

        Mock::given(method("GET"))
            .and(path("/videos"))
            .respond_with(ResponseTemplate::new(403).set_body_string(body))
            .mount(&server)
            .await;

        let err = api(&server).fetch_video_details(&["x".to_string()]).await.unwrap_err();
        let message = match err {
            AcervoError::ProviderUnavailable(message) => message,
            other => panic!("expected ProviderUnavailable, got {:?}", other),
        };
        assert!(message.ends_with(&format!("{}ç", "a".repeat(299))));
    }
}
