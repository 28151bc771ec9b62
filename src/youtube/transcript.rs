//! Transcript fetching with language fallback.

use super::RateLimiter;
use crate::error::{AcervoError, Result};
use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Arc, LazyLock};
use tracing::{debug, warn};

/// Transcripts shorter than this after cleanup are treated as unusable.
pub const MIN_TRANSCRIPT_CHARS: usize = 200;

/// Label stored for transcripts fetched without a language preference.
const AUTO_LANGUAGE: &str = "auto";

static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));

/// One time-coded caption fragment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    pub text: String,
    /// Start, in seconds.
    pub offset: f64,
    /// Length, in seconds.
    pub duration: f64,
}

impl TranscriptSegment {
    pub fn new(text: &str, offset: f64, duration: f64) -> Self {
        Self {
            text: text.to_string(),
            offset,
            duration,
        }
    }

    /// End of the segment, in seconds.
    pub fn end(&self) -> f64 {
        self.offset + self.duration
    }
}

/// A cleaned, usable transcript.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchedTranscript {
    pub video_id: String,
    /// Requested language code, or `auto` for the fallback.
    pub language: String,
    pub segments: Vec<TranscriptSegment>,
    pub full_text: String,
    pub total_duration_seconds: f64,
}

/// Source of raw caption segments.
///
/// `Ok(None)` means no transcript exists for that language. Throttling must be
/// reported as [`AcervoError::RateLimited`] so the workflow can cool down.
#[async_trait]
pub trait TranscriptProvider: Send + Sync {
    async fn fetch_segments(
        &self,
        video_id: &str,
        language: Option<&str>,
    ) -> Result<Option<Vec<TranscriptSegment>>>;
}

/// Decode the common HTML entities, collapse whitespace and trim.
pub fn clean_transcript_text(text: &str) -> String {
    let decoded = text
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&");
    WHITESPACE.replace_all(&decoded, " ").trim().to_string()
}

/// Rate-limited transcript fetcher that tries the preferred language first and
/// then whatever the provider returns by default.
pub struct TranscriptFetcher {
    provider: Arc<dyn TranscriptProvider>,
    limiter: Arc<RateLimiter>,
}

impl TranscriptFetcher {
    pub fn new(provider: Arc<dyn TranscriptProvider>, limiter: Arc<RateLimiter>) -> Self {
        Self { provider, limiter }
    }

    /// Fetch a usable transcript, or `Ok(None)` when no attempt produced one.
    ///
    /// With a preferred language, that language is tried before the provider
    /// default. A rate-limit error aborts immediately. Other errors fall
    /// through to the next attempt; if every attempt failed, the last error is
    /// returned.
    pub async fn fetch(
        &self,
        video_id: &str,
        preferred_language: Option<&str>,
    ) -> Result<Option<FetchedTranscript>> {
        let attempts: Vec<Option<&str>> = match preferred_language {
            Some(lang) => vec![Some(lang), None],
            None => vec![None],
        };
        let mut last_error = None;
        let mut failures = 0;

        for &language in &attempts {
            self.limiter.wait().await;

            match self.provider.fetch_segments(video_id, language).await {
                Ok(Some(raw)) => {
                    if let Some(transcript) = build_transcript(video_id, language, raw) {
                        return Ok(Some(transcript));
                    }
                    debug!(
                        "Transcript for {} ({}) too short, trying next",
                        video_id,
                        language.unwrap_or(AUTO_LANGUAGE)
                    );
                }
                Ok(None) => {
                    debug!(
                        "No transcript for {} ({})",
                        video_id,
                        language.unwrap_or(AUTO_LANGUAGE)
                    );
                }
                Err(e) if e.is_rate_limited() => return Err(e),
                Err(e) => {
                    warn!("Transcript fetch failed for {}: {}", video_id, e);
                    failures += 1;
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) if failures == attempts.len() => Err(e),
            _ => Ok(None),
        }
    }
}

fn build_transcript(
    video_id: &str,
    language: Option<&str>,
    raw: Vec<TranscriptSegment>,
) -> Option<FetchedTranscript> {
    let segments: Vec<TranscriptSegment> = raw
        .into_iter()
        .filter_map(|segment| {
            let text = clean_transcript_text(&segment.text);
            (!text.is_empty()).then(|| TranscriptSegment { text, ..segment })
        })
        .collect();

    let full_text = segments
        .iter()
        .map(|s| s.text.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    if full_text.chars().count() < MIN_TRANSCRIPT_CHARS {
        return None;
    }

    let total_duration_seconds = segments.last().map(TranscriptSegment::end).unwrap_or(0.0);

    Some(FetchedTranscript {
        video_id: video_id.to_string(),
        language: language.unwrap_or(AUTO_LANGUAGE).to_string(),
        segments,
        full_text,
        total_duration_seconds,
    })
}

/// Transcript provider backed by `yt-dlp` subtitle downloads (json3 format).
pub struct YtDlpTranscripts {
    binary: String,
}

impl YtDlpTranscripts {
    pub fn new() -> Self {
        Self {
            binary: "yt-dlp".to_string(),
        }
    }
}

impl Default for YtDlpTranscripts {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TranscriptProvider for YtDlpTranscripts {
    async fn fetch_segments(
        &self,
        video_id: &str,
        language: Option<&str>,
    ) -> Result<Option<Vec<TranscriptSegment>>> {
        let temp_dir = tempfile::tempdir()?;
        let output_template = temp_dir.path().join("%(id)s");
        let sub_langs = match language {
            Some(lang) => format!("{}.*", lang),
            None => "en.*,.*-orig".to_string(),
        };

        let output = tokio::process::Command::new(&self.binary)
            .args([
                "--skip-download",
                "--write-subs",
                "--write-auto-subs",
                "--sub-format",
                "json3",
                "--sub-langs",
                &sub_langs,
                "--no-warnings",
                "-o",
            ])
            .arg(&output_template)
            .arg(super::video_url(video_id))
            .output()
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    AcervoError::ToolNotFound(self.binary.clone())
                } else {
                    AcervoError::ProviderUnavailable(format!("Failed to run yt-dlp: {}", e))
                }
            })?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        if stderr.contains("429") || stderr.contains("Too Many Requests") {
            return Err(AcervoError::RateLimited(format!("transcript for {}", video_id)));
        }
        if !output.status.success() {
            return Err(AcervoError::ProviderUnavailable(format!(
                "yt-dlp failed for {}: {}",
                video_id,
                stderr.trim()
            )));
        }

        let Some(path) = find_subtitle_file(temp_dir.path())? else {
            return Ok(None);
        };
        let content = tokio::fs::read_to_string(&path).await?;
        let segments = parse_json3(&content)?;
        Ok((!segments.is_empty()).then_some(segments))
    }
}

fn find_subtitle_file(dir: &Path) -> Result<Option<std::path::PathBuf>> {
    let mut files: Vec<_> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.extension().is_some_and(|ext| ext == "json3"))
        .collect();
    files.sort();
    Ok(files.into_iter().next())
}

#[derive(Deserialize)]
struct Json3 {
    #[serde(default)]
    events: Vec<Json3Event>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Json3Event {
    #[serde(default)]
    t_start_ms: u64,
    #[serde(default)]
    d_duration_ms: u64,
    #[serde(default)]
    segs: Vec<Json3Seg>,
}

#[derive(Deserialize)]
struct Json3Seg {
    #[serde(default)]
    utf8: String,
}

/// Parse a YouTube json3 caption file into segments, dropping empty events.
fn parse_json3(content: &str) -> Result<Vec<TranscriptSegment>> {
    let parsed: Json3 = serde_json::from_str(content)?;
    Ok(parsed
        .events
        .into_iter()
        .filter_map(|event| {
            let text: String = event.segs.iter().map(|s| s.utf8.as_str()).collect();
            let text = text.trim();
            (!text.is_empty()).then(|| TranscriptSegment {
                text: text.to_string(),
                offset: event.t_start_ms as f64 / 1000.0,
                duration: event.d_duration_ms as f64 / 1000.0,
            })
        })
        .collect())
}
