//! Component wiring for Acervo.
//!
//! Builds the store, embedder, ingestor, retriever and YouTube workflow from
//! settings. Components needing credentials are created on demand, so
//! commands like `list` work without any API key configured. The YouTube API
//! and transcript limiters are created once and shared by every client.

use crate::config::Settings;
use crate::discovery::{ChannelDiscovery, DiscoveryWorkflow};
use crate::embedding::{Embedder, OpenAIEmbedder};
use crate::error::Result;
use crate::ingest::Ingestor;
use crate::rag::Retriever;
use crate::store::{KnowledgeStore, SqliteStore};
use crate::youtube::{RateLimiter, TranscriptFetcher, YoutubeApi, YtDlpTranscripts};
use std::sync::Arc;
use tracing::info;

/// Owns the settings, the knowledge store and the rate limiters; hands out
/// pipeline components.
pub struct Orchestrator {
    settings: Settings,
    store: Arc<dyn KnowledgeStore>,
    api_limiter: Arc<RateLimiter>,
    transcript_limiter: Arc<RateLimiter>,
}

impl Orchestrator {
    /// Open the SQLite store configured in `settings`.
    pub fn new(settings: Settings) -> Result<Self> {
        let path = settings.sqlite_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        info!("Opening knowledge store at {}", path.display());
        let store = Arc::new(SqliteStore::new(&path)?);
        Ok(Self::with_store(settings, store))
    }

    /// Use an already-constructed store.
    pub fn with_store(settings: Settings, store: Arc<dyn KnowledgeStore>) -> Self {
        let api_limiter = Arc::new(RateLimiter::new(settings.youtube.api_delay()));
        let transcript_limiter = Arc::new(RateLimiter::new(settings.youtube.transcript_delay()));
        Self {
            settings,
            store,
            api_limiter,
            transcript_limiter,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn store(&self) -> Arc<dyn KnowledgeStore> {
        self.store.clone()
    }

    /// OpenAI embedder; fails when no API key is available.
    pub fn embedder(&self) -> Result<Arc<dyn Embedder>> {
        Ok(Arc::new(OpenAIEmbedder::from_env(&self.settings.embedding)?))
    }

    pub fn ingestor(&self) -> Result<Ingestor> {
        Ok(Ingestor::new(
            self.store.clone(),
            self.embedder()?,
            self.settings.chunking.to_config(),
        ))
    }

    pub fn retriever(&self) -> Result<Retriever> {
        Ok(Retriever::new(self.store.clone(), self.embedder()?))
    }

    pub fn api_limiter(&self) -> Arc<RateLimiter> {
        self.api_limiter.clone()
    }

    pub fn transcript_limiter(&self) -> Arc<RateLimiter> {
        self.transcript_limiter.clone()
    }

    /// YouTube Data API client paced by the shared API limiter.
    pub fn youtube_api(&self) -> Result<YoutubeApi> {
        YoutubeApi::from_settings(&self.settings.youtube, self.api_limiter())
    }

    /// Channel discovery; needs only the YouTube key.
    pub fn channel_discovery(&self) -> Result<ChannelDiscovery> {
        Ok(ChannelDiscovery::new(
            self.settings.youtube.clone(),
            Arc::new(self.youtube_api()?),
        ))
    }

    /// Discovery plus ingestion; needs both the OpenAI and YouTube keys.
    pub fn discovery_workflow(&self) -> Result<DiscoveryWorkflow> {
        let transcripts = TranscriptFetcher::new(
            Arc::new(YtDlpTranscripts::new()),
            self.transcript_limiter(),
        );

        Ok(DiscoveryWorkflow::new(
            self.channel_discovery()?,
            transcripts,
            Arc::new(self.ingestor()?),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{DocumentFilter, NewDocument, SourceKind};

    #[tokio::test]
    async fn test_new_creates_store_directory() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = Settings::default();
        settings.store.sqlite_path = dir
            .path()
            .join("nested")
            .join("acervo.db")
            .to_string_lossy()
            .to_string();

        let orchestrator = Orchestrator::new(settings).unwrap();
        assert!(dir.path().join("nested").join("acervo.db").exists());

        let store = orchestrator.store();
        store
            .create_document(NewDocument::new("Notes", SourceKind::Note))
            .await
            .unwrap();
        assert_eq!(store.list_documents(&DocumentFilter::default()).await.unwrap().len(), 1);
    }

    #[test]
    fn test_channel_discovery_uses_configured_key() {
        let mut settings = Settings::default();
        settings.youtube.api_key = Some("yt-key".to_string());
        let orchestrator =
            Orchestrator::with_store(settings, Arc::new(crate::store::MemoryStore::new()));
        assert!(orchestrator.channel_discovery().is_ok());
    }

    #[test]
    fn test_youtube_clients_share_one_api_limiter() {
        let mut settings = Settings::default();
        settings.youtube.api_key = Some("yt-key".to_string());
        let orchestrator =
            Orchestrator::with_store(settings, Arc::new(crate::store::MemoryStore::new()));

        let first = orchestrator.youtube_api().unwrap();
        let second = orchestrator.youtube_api().unwrap();
        assert!(Arc::ptr_eq(first.limiter(), second.limiter()));
        assert!(Arc::ptr_eq(first.limiter(), &orchestrator.api_limiter()));
        assert!(Arc::ptr_eq(&orchestrator.transcript_limiter(), &orchestrator.transcript_limiter()));
        assert_eq!(
            orchestrator.transcript_limiter().delay(),
            orchestrator.settings().youtube.transcript_delay()
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_api_calls_are_spaced_across_clients() {
        let mut settings = Settings::default();
        settings.youtube.api_key = Some("yt-key".to_string());
        let delay = settings.youtube.api_delay();
        let orchestrator =
            Orchestrator::with_store(settings, Arc::new(crate::store::MemoryStore::new()));

        let first = orchestrator.youtube_api().unwrap();
        let second = orchestrator.youtube_api().unwrap();
        let start = tokio::time::Instant::now();
        first.limiter().wait().await;
        second.limiter().wait().await;
        assert!(start.elapsed() >= delay);
    }
}
