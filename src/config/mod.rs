//! Configuration management for Acervo.

mod settings;

pub use settings::{
    ChannelConfig, ChunkingSettings, DiscoveryDefaults, EmbeddingSettings, GeneralSettings,
    RetrievalSettings, ScoringWeights, Settings, StoreSettings, YoutubeSettings,
};
