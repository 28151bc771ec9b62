//! Pre-flight checks before expensive operations.
//!
//! Validates that required tools and credentials are available
//! before starting operations that would otherwise fail midway.

use crate::config::Settings;
use crate::error::{AcervoError, Result};
use crate::openai::{api_key_from_env, API_KEY_ENV};
use std::process::Command;

/// Requirements for different operations.
#[derive(Debug, Clone, Copy)]
pub enum Operation {
    /// PDF ingestion embeds chunks.
    IngestPdf,
    /// Discovery only calls the YouTube Data API.
    Discover,
    /// Video ingestion needs both API keys and yt-dlp.
    IngestYoutube,
    /// Search embeds the query.
    Search,
    /// Listing and deleting only touch the local store.
    Local,
}

/// Run pre-flight checks for the given operation.
///
/// Returns Ok(()) if all checks pass, or an error describing what's missing.
pub fn check(operation: Operation, settings: &Settings) -> Result<()> {
    match operation {
        Operation::IngestPdf | Operation::Search => {
            check_openai_key()?;
        }
        Operation::Discover => {
            check_youtube_key(settings)?;
        }
        Operation::IngestYoutube => {
            check_openai_key()?;
            check_youtube_key(settings)?;
            check_tool("yt-dlp")?;
        }
        Operation::Local => {}
    }
    Ok(())
}

fn check_openai_key() -> Result<()> {
    match api_key_from_env() {
        Some(_) => Ok(()),
        None => Err(AcervoError::Config(format!(
            "{} not set. Set it with: export {}='sk-...'",
            API_KEY_ENV, API_KEY_ENV
        ))),
    }
}

fn check_youtube_key(settings: &Settings) -> Result<()> {
    match settings.youtube.resolve_api_key() {
        Some(_) => Ok(()),
        None => Err(AcervoError::Config(
            "YouTube API key not found. Set youtube.api_key or YOUTUBE_API_KEY".to_string(),
        )),
    }
}

/// Check if an external tool is available.
fn check_tool(name: &str) -> Result<()> {
    match Command::new(name).arg("--version").output() {
        Ok(output) if output.status.success() => Ok(()),
        Ok(_) => Err(AcervoError::ToolNotFound(format!(
            "{} is installed but not working correctly",
            name
        ))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(AcervoError::ToolNotFound(name.to_string()))
        }
        Err(e) => Err(AcervoError::ToolNotFound(format!("{}: {}", name, e))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_operations_have_no_requirements() {
        assert!(check(Operation::Local, &Settings::default()).is_ok());
    }

    #[test]
    fn test_discover_accepts_configured_key() {
        let mut settings = Settings::default();
        settings.youtube.api_key = Some("yt-key".to_string());
        assert!(check(Operation::Discover, &settings).is_ok());
    }

    #[test]
    fn test_missing_tool_is_reported() {
        let err = check_tool("acervo-no-such-tool").unwrap_err();
        assert!(matches!(err, AcervoError::ToolNotFound(_)));
    }
}
