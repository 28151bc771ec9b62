//! Configuration settings for Acervo.

use crate::chunking::ChunkingConfig;
use crate::error::{AcervoError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

/// Allowed deviation of the scoring weight sum from 1.0.
const WEIGHT_SUM_TOLERANCE: f64 = 0.01;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub embedding: EmbeddingSettings,
    pub chunking: ChunkingSettings,
    pub store: StoreSettings,
    pub retrieval: RetrievalSettings,
    pub youtube: YoutubeSettings,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Directory for storing application data.
    pub data_dir: String,
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            data_dir: "~/.acervo".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// Embedding generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    /// Embedding model to use.
    pub model: String,
    /// Embedding dimensions.
    pub dimensions: u32,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            model: "text-embedding-3-small".to_string(),
            dimensions: 1536,
        }
    }
}

/// Chunk sizes, in approximate tokens (1 token ~ 4 characters).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingSettings {
    pub target_chunk_tokens: usize,
    pub max_chunk_tokens: usize,
    pub overlap_tokens: usize,
}

impl Default for ChunkingSettings {
    fn default() -> Self {
        let config = ChunkingConfig::default();
        Self {
            target_chunk_tokens: config.target_chunk_size,
            max_chunk_tokens: config.max_chunk_size,
            overlap_tokens: config.overlap_size,
        }
    }
}

impl ChunkingSettings {
    /// Build the chunker configuration.
    pub fn to_config(&self) -> ChunkingConfig {
        ChunkingConfig {
            target_chunk_size: self.target_chunk_tokens,
            max_chunk_size: self.max_chunk_tokens,
            overlap_size: self.overlap_tokens,
        }
    }
}

/// Knowledge store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    /// Path to the SQLite database.
    pub sqlite_path: String,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            sqlite_path: "~/.acervo/knowledge.db".to_string(),
        }
    }
}

/// Similarity search settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    /// Minimum cosine similarity for a chunk to be returned.
    pub match_threshold: f32,
    /// Maximum number of chunks returned per query.
    pub match_count: usize,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            match_threshold: 0.3,
            match_count: 8,
        }
    }
}

/// A YouTube channel to monitor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Canonical channel ID. Empty until resolved from the handle.
    #[serde(default)]
    pub channel_id: String,
    pub name: String,
    pub handle: String,
    /// Discovery wave (priority tier).
    pub wave: u8,
    /// Transcript and keyword language.
    pub language: String,
    /// Maximum number of recent videos to list for this channel.
    pub max_videos: usize,
}

impl ChannelConfig {
    /// Whether the channel ID has been filled in.
    pub fn is_resolved(&self) -> bool {
        !self.channel_id.trim().is_empty()
    }
}

/// Weights of the composite video score.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringWeights {
    pub view_weight: f64,
    pub recency_weight: f64,
    pub relevance_weight: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            view_weight: 0.4,
            recency_weight: 0.3,
            relevance_weight: 0.3,
        }
    }
}

impl ScoringWeights {
    pub fn sum(&self) -> f64 {
        self.view_weight + self.recency_weight + self.relevance_weight
    }
}

/// Eligibility thresholds and discovery defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryDefaults {
    pub max_videos_per_channel: usize,
    pub min_views: u64,
    pub max_age_months: u32,
    pub top_n_per_channel: usize,
    pub min_duration_seconds: u64,
    /// Maximum videos ingested per channel in one run.
    pub batch_size: usize,
}

impl Default for DiscoveryDefaults {
    fn default() -> Self {
        Self {
            max_videos_per_channel: 30,
            min_views: 1000,
            max_age_months: 36,
            top_n_per_channel: 10,
            min_duration_seconds: 120,
            batch_size: 50,
        }
    }
}

/// YouTube discovery and ingestion settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct YoutubeSettings {
    /// YouTube Data API key. Falls back to `YOUTUBE_API_KEY`.
    pub api_key: Option<String>,
    /// Base URL of the YouTube Data API v3.
    pub api_base_url: String,
    /// Minimum delay between Data API calls.
    pub api_delay_ms: u64,
    /// Minimum delay between transcript fetches.
    pub transcript_delay_ms: u64,
    /// Cooldown before retrying a throttled transcript fetch.
    pub rate_limit_cooldown_secs: u64,
    /// Pause after each ingested video.
    pub video_pause_ms: u64,
    pub scoring: ScoringWeights,
    pub defaults: DiscoveryDefaults,
    /// Relevance keywords per language code.
    pub keywords: HashMap<String, Vec<String>>,
    pub channels: Vec<ChannelConfig>,
}

impl Default for YoutubeSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base_url: "https://www.googleapis.com/youtube/v3".to_string(),
            api_delay_ms: 200,
            transcript_delay_ms: 2000,
            rate_limit_cooldown_secs: 30,
            video_pause_ms: 1500,
            scoring: ScoringWeights::default(),
            defaults: DiscoveryDefaults::default(),
            keywords: default_keywords(),
            channels: Vec::new(),
        }
    }
}

impl YoutubeSettings {
    /// API key from config, or from the environment.
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| std::env::var("YOUTUBE_API_KEY").ok())
            .filter(|k| !k.trim().is_empty())
    }

    /// Keywords configured for a language (empty if none).
    pub fn keywords_for(&self, language: &str) -> &[String] {
        self.keywords
            .get(language)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn api_delay(&self) -> Duration {
        Duration::from_millis(self.api_delay_ms)
    }

    pub fn transcript_delay(&self) -> Duration {
        Duration::from_millis(self.transcript_delay_ms)
    }

    pub fn rate_limit_cooldown(&self) -> Duration {
        Duration::from_secs(self.rate_limit_cooldown_secs)
    }

    pub fn video_pause(&self) -> Duration {
        Duration::from_millis(self.video_pause_ms)
    }

    /// Channels in a wave, optionally filtered by a case-insensitive name fragment.
    pub fn channels_in_wave(&self, wave: u8, name_filter: Option<&str>) -> Vec<&ChannelConfig> {
        let filter = name_filter.map(str::to_lowercase);
        self.channels
            .iter()
            .filter(|c| c.wave == wave)
            .filter(|c| match &filter {
                Some(f) => c.name.to_lowercase().contains(f),
                None => true,
            })
            .collect()
    }
}

fn default_keywords() -> HashMap<String, Vec<String>> {
    let en = [
        "marketing", "funnel", "copywriting", "sales", "leads", "conversion",
        "landing page", "email marketing", "offer", "pricing", "ads", "facebook ads",
        "google ads", "seo", "content marketing", "branding", "customer acquisition",
        "retention", "upsell", "launch", "webinar", "vsl", "headline", "hook", "cta",
        "persuasion", "scaling", "direct response", "value ladder", "lead magnet",
        "cold outreach", "closing", "objection", "guarantee", "testimonial", "case study",
    ];
    let pt = [
        "marketing", "funil", "copy", "vendas", "leads", "conversao", "pagina de vendas",
        "email marketing", "oferta", "trafego", "anuncios", "lancamento", "perpetuo",
        "webinario", "vsl", "headline", "gancho", "escala", "infoproduto", "digital",
        "remarketing", "publico alvo", "persona", "roi", "cpl", "cpa", "roas",
        "ticket medio", "upsell", "downsell", "order bump",
    ];

    HashMap::from([
        ("en".to_string(), en.iter().map(|s| s.to_string()).collect()),
        ("pt".to_string(), pt.iter().map(|s| s.to_string()).collect()),
    ])
}

impl Settings {
    /// Load settings from the default configuration file.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load settings from a specific path, or default location if None.
    pub fn load_from(path: Option<&PathBuf>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p.clone(),
            None => Self::default_config_path(),
        };

        let settings = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str(&content)?
        } else {
            Settings::default()
        };

        settings.validate()?;
        Ok(settings)
    }

    /// Reject configurations that would make scoring or chunking meaningless.
    pub fn validate(&self) -> Result<()> {
        let weights = &self.youtube.scoring;
        if weights.view_weight < 0.0 || weights.recency_weight < 0.0 || weights.relevance_weight < 0.0 {
            return Err(AcervoError::Config(
                "youtube.scoring weights must not be negative".to_string(),
            ));
        }
        if (weights.sum() - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(AcervoError::Config(format!(
                "youtube.scoring weights must sum to 1.0 (got {:.3})",
                weights.sum()
            )));
        }
        if self.youtube.defaults.max_age_months == 0 {
            return Err(AcervoError::Config(
                "youtube.defaults.max_age_months must be at least 1".to_string(),
            ));
        }

        self.chunking.to_config().validate()?;

        if !(0.0..=1.0).contains(&self.retrieval.match_threshold) {
            return Err(AcervoError::Config(
                "retrieval.match_threshold must be within 0.0..=1.0".to_string(),
            ));
        }

        Ok(())
    }

    /// Save settings to a specific path.
    pub fn save_to(&self, path: &PathBuf) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| AcervoError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("acervo")
            .join("config.toml")
    }

    /// Expand shell variables in paths (e.g., ~).
    pub fn expand_path(path: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(path).to_string())
    }

    /// Get the expanded data directory path.
    pub fn data_dir(&self) -> PathBuf {
        Self::expand_path(&self.general.data_dir)
    }

    /// Get the expanded SQLite database path.
    pub fn sqlite_path(&self) -> PathBuf {
        Self::expand_path(&self.store.sqlite_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let settings = Settings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.youtube.api_delay(), Duration::from_millis(200));
        assert_eq!(settings.youtube.transcript_delay(), Duration::from_millis(2000));
        assert_eq!(settings.youtube.keywords_for("pt").len(), 31);
        assert!(settings.youtube.keywords_for("fr").is_empty());
    }

    #[test]
    fn test_rejects_weights_not_summing_to_one() {
        let mut settings = Settings::default();
        settings.youtube.scoring.view_weight = 0.9;
        let err = settings.validate().unwrap_err();
        assert!(matches!(err, AcervoError::Config(_)));
    }

    #[test]
    fn test_rejects_negative_weight() {
        let mut settings = Settings::default();
        settings.youtube.scoring = ScoringWeights {
            view_weight: 1.2,
            recency_weight: -0.2,
            relevance_weight: 0.0,
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_load_partial_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
            [retrieval]
            match_count = 4

            [[youtube.channels]]
            channel_id = "UC123"
            name = "Some Channel"
            handle = "@some"
            wave = 1
            language = "en"
            max_videos = 20

            [[youtube.channels]]
            name = "Unresolved"
            handle = "@unresolved"
            wave = 1
            language = "pt"
            max_videos = 10
            "#,
        )
        .unwrap();

        let settings = Settings::load_from(Some(&path)).unwrap();
        assert_eq!(settings.retrieval.match_count, 4);
        assert!((settings.retrieval.match_threshold - 0.3).abs() < f32::EPSILON);
        assert_eq!(settings.youtube.channels.len(), 2);
        assert!(settings.youtube.channels[0].is_resolved());
        assert!(!settings.youtube.channels[1].is_resolved());

        let wave = settings.youtube.channels_in_wave(1, Some("SOME"));
        assert_eq!(wave.len(), 1);
        assert_eq!(wave[0].handle, "@some");
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut settings = Settings::default();
        settings.retrieval.match_count = 12;
        settings.save_to(&path).unwrap();

        let reloaded = Settings::load_from(Some(&path)).unwrap();
        assert_eq!(reloaded.retrieval.match_count, 12);
    }
}
