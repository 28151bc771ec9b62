//! YouTube discovery and ingestion workflow.
//!
//! Per channel: list recent videos, fetch metadata, score and select, then
//! for each selected video check whether it is already ingested, fetch its
//! transcript, and ingest it. Everything runs sequentially; the shared rate
//! limiters space out external calls. Completed documents make reruns resume
//! where the previous run stopped.

use crate::config::{ChannelConfig, YoutubeSettings};
use crate::error::{AcervoError, Result};
use crate::ingest::{IngestResult, Ingestor};
use crate::youtube::{score_and_select, ScoredVideo, TranscriptFetcher, VideoMetadata, VideoProvider};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, instrument, warn};

/// Run counters reported at the end of a workflow run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    pub processed: usize,
    pub skipped_ingested: usize,
    pub skipped_no_transcript: usize,
    pub errors: usize,
    /// Errors where the transcript provider failed rather than being empty.
    /// Included in `errors`.
    pub transcript_errors: usize,
    pub chunks: usize,
    /// Channels whose listing or metadata fetch failed.
    pub channel_errors: usize,
}

/// What happened to one selected video.
#[derive(Debug, Clone, PartialEq)]
pub enum VideoOutcome {
    Ingested(IngestResult),
    AlreadyIngested,
    NoTranscript,
}

/// Discovery result for one channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveredChannel {
    pub channel_name: String,
    pub channel_id: String,
    #[serde(default)]
    pub language: Option<String>,
    pub total_fetched: usize,
    pub selected_videos: Vec<ScoredVideo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// A saved discovery pass, replayable with [`DiscoveryWorkflow::run_from_discovery`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryFile {
    pub discovered_at: DateTime<Utc>,
    pub wave: u8,
    pub top_n_per_channel: usize,
    pub channels: Vec<DiscoveredChannel>,
}

impl DiscoveryFile {
    pub fn total_selected(&self) -> usize {
        self.channels.iter().map(|c| c.selected_videos.len()).sum()
    }

    pub fn total_fetched(&self) -> usize {
        self.channels.iter().map(|c| c.total_fetched).sum()
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(AcervoError::InvalidInput(format!(
                "Discovery file not found: {}",
                path.display()
            )));
        }
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

/// Result of discovering a wave: the saved channels plus those skipped for
/// lack of a resolved channel id.
#[derive(Debug, Clone)]
pub struct WaveDiscovery {
    pub file: DiscoveryFile,
    pub unresolved: Vec<ChannelConfig>,
}

/// Which channels a run covers and how much it selects.
#[derive(Debug, Clone, Default)]
pub struct WaveOptions {
    pub wave: u8,
    /// Videos selected per channel (defaults to `defaults.top_n_per_channel`).
    pub top_n: Option<usize>,
    /// Case-insensitive channel name fragment.
    pub channel_filter: Option<String>,
    /// Videos ingested per channel before moving on (defaults to `defaults.batch_size`).
    pub batch_size: Option<usize>,
}

/// Progress notifications for interactive front ends.
#[derive(Debug)]
pub enum DiscoveryEvent<'a> {
    ChannelStarted { name: &'a str },
    ChannelSelected { name: &'a str, fetched: usize, selected: usize },
    ChannelFailed { name: &'a str, error: &'a AcervoError },
    VideoStarted { title: &'a str },
    VideoFinished { title: &'a str, outcome: &'a VideoOutcome },
    VideoFailed { title: &'a str, error: &'a AcervoError },
    RateLimited { title: &'a str, cooldown: Duration },
    BatchLimitReached { name: &'a str, limit: usize },
}

type Observer = Arc<dyn Fn(&DiscoveryEvent<'_>) + Send + Sync>;

fn notify(observer: &Option<Observer>, event: DiscoveryEvent<'_>) {
    if let Some(observer) = observer {
        observer(&event);
    }
}

/// Channel listing and video selection. Needs only the YouTube client.
pub struct ChannelDiscovery {
    settings: YoutubeSettings,
    videos: Arc<dyn VideoProvider>,
    observer: Option<Observer>,
}

impl ChannelDiscovery {
    pub fn new(settings: YoutubeSettings, videos: Arc<dyn VideoProvider>) -> Self {
        Self {
            settings,
            videos,
            observer: None,
        }
    }

    /// Receive progress events.
    pub fn with_observer(mut self, observer: impl Fn(&DiscoveryEvent<'_>) + Send + Sync + 'static) -> Self {
        let observer: Observer = Arc::new(observer);
        self.observer = Some(observer);
        self
    }

    pub fn settings(&self) -> &YoutubeSettings {
        &self.settings
    }

    /// List, fetch, and score one channel's videos.
    #[instrument(skip(self, channel), fields(channel = %channel.name))]
    pub async fn discover_channel(&self, channel: &ChannelConfig, top_n: Option<usize>) -> Result<DiscoveredChannel> {
        let video_ids = self
            .videos
            .fetch_channel_videos(&channel.channel_id, channel.max_videos)
            .await?;

        let videos = if video_ids.is_empty() {
            Vec::new()
        } else {
            self.videos.fetch_video_details(&video_ids).await?
        };

        let selected = score_and_select(&videos, &self.settings, &channel.language, top_n);
        info!(
            "{}: {} videos fetched, {} selected",
            channel.name,
            videos.len(),
            selected.len()
        );

        Ok(DiscoveredChannel {
            channel_name: channel.name.clone(),
            channel_id: channel.channel_id.clone(),
            language: Some(channel.language.clone()),
            total_fetched: videos.len(),
            selected_videos: selected,
            error: None,
        })
    }

    /// Discover every resolved channel of a wave. Channel failures are
    /// recorded in the result instead of aborting the pass.
    pub async fn discover_wave(&self, options: &WaveOptions) -> WaveDiscovery {
        let (ready, unresolved) = self.partition_channels(options);
        let mut channels = Vec::with_capacity(ready.len());

        for channel in ready {
            notify(&self.observer, DiscoveryEvent::ChannelStarted { name: &channel.name });
            match self.discover_channel(&channel, options.top_n).await {
                Ok(discovered) => {
                    notify(
                        &self.observer,
                        DiscoveryEvent::ChannelSelected {
                            name: &channel.name,
                            fetched: discovered.total_fetched,
                            selected: discovered.selected_videos.len(),
                        },
                    );
                    channels.push(discovered);
                }
                Err(e) => {
                    warn!("Discovery failed for {}: {}", channel.name, e);
                    notify(&self.observer, DiscoveryEvent::ChannelFailed { name: &channel.name, error: &e });
                    channels.push(DiscoveredChannel {
                        channel_name: channel.name.clone(),
                        channel_id: channel.channel_id.clone(),
                        language: Some(channel.language.clone()),
                        total_fetched: 0,
                        selected_videos: Vec::new(),
                        error: Some(e.to_string()),
                    });
                }
            }
        }

        WaveDiscovery {
            file: DiscoveryFile {
                discovered_at: Utc::now(),
                wave: options.wave,
                top_n_per_channel: options
                    .top_n
                    .unwrap_or(self.settings.defaults.top_n_per_channel),
                channels,
            },
            unresolved,
        }
    }

    /// Resolved and unresolved channels of the selected wave.
    pub fn partition_channels(&self, options: &WaveOptions) -> (Vec<ChannelConfig>, Vec<ChannelConfig>) {
        self.settings
            .channels_in_wave(options.wave, options.channel_filter.as_deref())
            .into_iter()
            .cloned()
            .partition(ChannelConfig::is_resolved)
    }
}

/// Discovery plus per-video transcript ingestion.
pub struct DiscoveryWorkflow {
    discovery: ChannelDiscovery,
    transcripts: TranscriptFetcher,
    ingestor: Arc<Ingestor>,
    cooldown: Duration,
    video_pause: Duration,
    observer: Option<Observer>,
}

impl DiscoveryWorkflow {
    pub fn new(discovery: ChannelDiscovery, transcripts: TranscriptFetcher, ingestor: Arc<Ingestor>) -> Self {
        let settings = discovery.settings();
        Self {
            cooldown: settings.rate_limit_cooldown(),
            video_pause: settings.video_pause(),
            observer: discovery.observer.clone(),
            discovery,
            transcripts,
            ingestor,
        }
    }

    /// Receive progress events.
    pub fn with_observer(mut self, observer: impl Fn(&DiscoveryEvent<'_>) + Send + Sync + 'static) -> Self {
        let observer: Observer = Arc::new(observer);
        self.discovery.observer = Some(observer.clone());
        self.observer = Some(observer);
        self
    }

    fn emit(&self, event: DiscoveryEvent<'_>) {
        notify(&self.observer, event);
    }

    pub async fn discover_wave(&self, options: &WaveOptions) -> WaveDiscovery {
        self.discovery.discover_wave(options).await
    }

    /// Full pipeline for a wave: discover, then ingest each channel's selection.
    #[instrument(skip(self))]
    pub async fn run_wave(&self, options: &WaveOptions) -> RunStats {
        let (ready, _) = self.discovery.partition_channels(options);
        let batch_size = options
            .batch_size
            .unwrap_or(self.discovery.settings().defaults.batch_size);
        let mut stats = RunStats::default();

        for channel in ready {
            self.emit(DiscoveryEvent::ChannelStarted { name: &channel.name });
            let discovered = match self.discovery.discover_channel(&channel, options.top_n).await {
                Ok(discovered) => discovered,
                Err(e) => {
                    warn!("Channel {} failed: {}", channel.name, e);
                    self.emit(DiscoveryEvent::ChannelFailed { name: &channel.name, error: &e });
                    stats.channel_errors += 1;
                    continue;
                }
            };
            self.emit(DiscoveryEvent::ChannelSelected {
                name: &channel.name,
                fetched: discovered.total_fetched,
                selected: discovered.selected_videos.len(),
            });

            self.ingest_selection(
                &channel.name,
                discovered.selected_videos.iter().map(|s| &s.video),
                Some(&channel.language),
                Some(batch_size),
                &mut stats,
            )
            .await;
        }

        info!("Run finished: {:?}", stats);
        stats
    }

    /// Replay a saved discovery file through the per-video pipeline.
    pub async fn run_from_discovery(&self, file: &DiscoveryFile, channel_filter: Option<&str>) -> RunStats {
        let filter = channel_filter.map(str::to_lowercase);
        let mut stats = RunStats::default();

        for channel in &file.channels {
            if let Some(filter) = &filter {
                if !channel.channel_name.to_lowercase().contains(filter) {
                    continue;
                }
            }
            self.emit(DiscoveryEvent::ChannelStarted { name: &channel.channel_name });

            self.ingest_selection(
                &channel.channel_name,
                channel.selected_videos.iter().map(|s| &s.video),
                channel.language.as_deref(),
                None,
                &mut stats,
            )
            .await;
        }

        stats
    }

    async fn ingest_selection<'v>(
        &self,
        channel_name: &str,
        videos: impl Iterator<Item = &'v VideoMetadata>,
        language: Option<&str>,
        batch_size: Option<usize>,
        stats: &mut RunStats,
    ) {
        let mut ingested_here = 0;

        for video in videos {
            if let Some(limit) = batch_size {
                if ingested_here >= limit {
                    info!("Batch limit ({}) reached for {}", limit, channel_name);
                    self.emit(DiscoveryEvent::BatchLimitReached { name: channel_name, limit });
                    break;
                }
            }

            match self.process_video(video, language).await {
                Ok(VideoOutcome::Ingested(result)) => {
                    stats.processed += 1;
                    stats.chunks += result.chunk_count;
                    ingested_here += 1;
                }
                Ok(VideoOutcome::AlreadyIngested) => stats.skipped_ingested += 1,
                Ok(VideoOutcome::NoTranscript) => stats.skipped_no_transcript += 1,
                Err(failure) => {
                    stats.errors += 1;
                    if failure.transcript {
                        stats.transcript_errors += 1;
                    }
                }
            }
        }
    }

    /// Ingest one video unless it is already in the store.
    ///
    /// A throttled transcript fetch waits out the cooldown and retries once.
    pub async fn ingest_video(&self, video: &VideoMetadata, language: Option<&str>) -> Result<VideoOutcome> {
        self.process_video(video, language).await.map_err(|f| f.error)
    }

    async fn process_video(
        &self,
        video: &VideoMetadata,
        language: Option<&str>,
    ) -> std::result::Result<VideoOutcome, VideoFailure> {
        let title = video.title.as_str();

        let outcome = match self.ingestor.store().is_video_ingested(&video.video_id).await {
            Ok(true) => Ok(VideoOutcome::AlreadyIngested),
            Ok(false) => {
                self.emit(DiscoveryEvent::VideoStarted { title });
                match self.fetch_and_ingest(video, language).await {
                    Err(f) if f.error.is_rate_limited() => {
                        warn!("Rate limited on {}; waiting {:?}", video.video_id, self.cooldown);
                        self.emit(DiscoveryEvent::RateLimited { title, cooldown: self.cooldown });
                        sleep(self.cooldown).await;
                        self.fetch_and_ingest(video, language).await
                    }
                    other => other,
                }
            }
            Err(e) => Err(e.into()),
        };

        match &outcome {
            Ok(result) => self.emit(DiscoveryEvent::VideoFinished { title, outcome: result }),
            Err(f) => {
                warn!("Failed to ingest {}: {}", video.video_id, f.error);
                self.emit(DiscoveryEvent::VideoFailed { title, error: &f.error });
            }
        }
        outcome
    }

    async fn fetch_and_ingest(
        &self,
        video: &VideoMetadata,
        language: Option<&str>,
    ) -> std::result::Result<VideoOutcome, VideoFailure> {
        let transcript = self
            .transcripts
            .fetch(&video.video_id, language)
            .await
            .map_err(VideoFailure::transcript)?;
        let Some(transcript) = transcript else {
            return Ok(VideoOutcome::NoTranscript);
        };

        let result = self.ingestor.ingest_video(video, &transcript).await?;
        sleep(self.video_pause).await;
        Ok(VideoOutcome::Ingested(result))
    }
}

/// A failed video, remembering whether the transcript fetch was at fault.
struct VideoFailure {
    error: AcervoError,
    transcript: bool,
}

impl VideoFailure {
    fn transcript(error: AcervoError) -> Self {
        Self {
            error,
            transcript: true,
        }
    }
}

impl From<AcervoError> for VideoFailure {
    fn from(error: AcervoError) -> Self {
        Self {
            error,
            transcript: false,
        }
    }
}
