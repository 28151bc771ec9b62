//! Error types for Acervo.

use thiserror::Error;

/// Library-level error type for Acervo operations.
#[derive(Error, Debug)]
pub enum AcervoError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("No content extracted: {0}")]
    EmptyContent(String),

    #[error("Store write failed: {0}")]
    StoreWrite(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Embedding generation failed: {0}")]
    Embedding(String),

    #[error("PDF extraction failed: {0}")]
    PdfExtract(String),

    #[error("Video not found: {0}")]
    VideoNotFound(String),

    #[error("External tool not found: {0}. Please install it and ensure it's in your PATH.")]
    ToolNotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
}

impl AcervoError {
    /// Whether this error signals provider throttling.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, AcervoError::RateLimited(_))
    }
}

/// Result type alias for Acervo operations.
pub type Result<T> = std::result::Result<T, AcervoError>;
