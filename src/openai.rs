//! OpenAI client construction.

use crate::error::{AcervoError, Result};
use async_openai::{config::OpenAIConfig, Client};
use std::time::Duration;

/// Default timeout for OpenAI API requests.
const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Environment variable holding the OpenAI API key.
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Read the OpenAI API key from the environment.
pub fn api_key_from_env() -> Option<String> {
    std::env::var(API_KEY_ENV)
        .ok()
        .filter(|key| !key.trim().is_empty())
}

/// Create an OpenAI client for `api_key`, optionally against a different base URL.
pub fn create_client(api_key: &str, api_base: Option<&str>) -> Result<Client<OpenAIConfig>> {
    let http_client = reqwest::Client::builder()
        .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
        .build()?;

    let mut config = OpenAIConfig::new().with_api_key(api_key);
    if let Some(base) = api_base {
        config = config.with_api_base(base);
    }

    Ok(Client::with_config(config).with_http_client(http_client))
}

/// Fail with a configuration error when no key is available.
pub fn require_api_key(api_key: Option<String>) -> Result<String> {
    api_key.filter(|k| !k.trim().is_empty()).ok_or_else(|| {
        AcervoError::Config(format!("OpenAI API key not found. Set {}.", API_KEY_ENV))
    })
}
