//! Single YouTube video ingestion command.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::discovery::VideoOutcome;
use crate::error::AcervoError;
use crate::orchestrator::Orchestrator;
use crate::store::KnowledgeStore;
use crate::youtube::{extract_video_id, VideoMetadata, VideoProvider};
use anyhow::Result;

/// Ingest one video by id or URL.
pub async fn run_ingest_video(video: &str, language: Option<String>, settings: Settings) -> Result<()> {
    if let Err(e) = preflight::check(Operation::IngestYoutube, &settings) {
        Output::error(&e.to_string());
        return Err(e.into());
    }

    let video_id = extract_video_id(video)
        .ok_or_else(|| AcervoError::InvalidInput(format!("Not a YouTube video id or URL: {}", video)))?;

    let orchestrator = Orchestrator::new(settings)?;
    let api = orchestrator.youtube_api()?;
    let workflow = orchestrator.discovery_workflow()?;

    let spinner = Output::spinner("Fetching video metadata...");
    let pending = pending_video(orchestrator.store().as_ref(), &api, &video_id).await;
    spinner.finish_and_clear();

    let Some(metadata) = pending? else {
        Output::warning(&format!("{} is already in the knowledge base.", video_id));
        return Ok(());
    };

    // Fall back to the configured channel language.
    let language = language.or_else(|| {
        orchestrator
            .settings()
            .youtube
            .channels
            .iter()
            .find(|c| c.channel_id == metadata.channel_id)
            .map(|c| c.language.clone())
    });

    Output::info(&format!("{} ({})", metadata.title, metadata.channel_title));
    let spinner = Output::spinner("Fetching transcript and ingesting...");
    let outcome = workflow.ingest_video(&metadata, language.as_deref()).await;
    spinner.finish_and_clear();

    match outcome? {
        VideoOutcome::Ingested(result) => Output::success(&format!(
            "Ingested '{}' ({} chunks, document {})",
            result.title, result.chunk_count, result.document_id
        )),
        VideoOutcome::AlreadyIngested => {
            Output::warning(&format!("{} is already in the knowledge base.", video_id))
        }
        VideoOutcome::NoTranscript => {
            Output::warning(&format!("No usable transcript available for {}.", video_id))
        }
    }

    Ok(())
}

/// Metadata for a video that is not in the store yet, or `None` when it is
/// already ingested. The store is consulted before any API call.
async fn pending_video(
    store: &dyn KnowledgeStore,
    videos: &dyn VideoProvider,
    video_id: &str,
) -> crate::error::Result<Option<VideoMetadata>> {
    if store.is_video_ingested(video_id).await? {
        return Ok(None);
    }

    videos
        .fetch_video_details(&[video_id.to_string()])
        .await?
        .into_iter()
        .next()
        .map(Some)
        .ok_or_else(|| AcervoError::VideoNotFound(video_id.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, NewDocument, SourceKind};
    use crate::youtube::ChannelInfo;
    use async_trait::async_trait;
    use chrono::Utc;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingVideos {
        detail_calls: AtomicUsize,
    }

    #[async_trait]
    impl VideoProvider for CountingVideos {
        async fn resolve_channel(&self, _handle: &str) -> crate::error::Result<Option<ChannelInfo>> {
            Ok(None)
        }

        async fn fetch_channel_videos(&self, _channel_id: &str, _max: usize) -> crate::error::Result<Vec<String>> {
            Ok(Vec::new())
        }

        async fn fetch_video_details(&self, video_ids: &[String]) -> crate::error::Result<Vec<VideoMetadata>> {
            self.detail_calls.fetch_add(1, Ordering::SeqCst);
            Ok(video_ids
                .iter()
                .filter(|id| id.as_str() != "missingvid0")
                .map(|id| VideoMetadata {
                    video_id: id.clone(),
                    title: "Pricing your offer".to_string(),
                    description: String::new(),
                    channel_id: "UC1".to_string(),
                    channel_title: "Growth Channel".to_string(),
                    published_at: Utc::now(),
                    view_count: 100,
                    like_count: 1,
                    duration: "PT10M".to_string(),
                    duration_seconds: 600,
                    thumbnail_url: String::new(),
                    tags: Vec::new(),
                    video_url: crate::youtube::video_url(id),
                })
                .collect())
        }
    }

    async fn completed_video(store: &MemoryStore, video_id: &str) {
        let mut metadata = crate::store::Metadata::new();
        metadata.insert("video_id".to_string(), json!(video_id));
        let doc = store
            .create_document(NewDocument::new("Already here", SourceKind::Youtube).with_metadata(metadata.clone()))
            .await
            .unwrap();
        store.mark_completed(doc.id, 0, metadata).await.unwrap();
    }

    #[tokio::test]
    async fn test_ingested_video_skips_metadata_fetch() {
        let store = MemoryStore::new();
        completed_video(&store, "abcdefghijk").await;
        let videos = CountingVideos::default();

        let pending = pending_video(&store, &videos, "abcdefghijk").await.unwrap();
        assert!(pending.is_none());
        assert_eq!(videos.detail_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_new_video_fetches_metadata() {
        let store = MemoryStore::new();
        let videos = CountingVideos::default();

        let pending = pending_video(&store, &videos, "abcdefghijk").await.unwrap().unwrap();
        assert_eq!(pending.channel_title, "Growth Channel");
        assert_eq!(videos.detail_calls.load(Ordering::SeqCst), 1);

        let err = pending_video(&store, &videos, "missingvid0").await.unwrap_err();
        assert!(matches!(err, AcervoError::VideoNotFound(_)));
    }
}
