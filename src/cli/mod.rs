//! CLI module for Acervo.

pub mod commands;
mod output;
pub mod preflight;

pub use output::{format_duration, Output};

use crate::store::{DocumentStatus, SourceKind};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Acervo - knowledge base ingestion and retrieval
///
/// Ingests PDFs and YouTube transcripts into a local vector store and
/// retrieves the passages most relevant to a query.
#[derive(Parser, Debug)]
#[command(name = "acervo")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Ingest a PDF file, or every PDF in a directory
    IngestPdf {
        /// PDF file or directory
        path: PathBuf,

        /// Descend into subdirectories
        #[arg(short, long)]
        recursive: bool,

        /// Re-ingest files that already have a completed document
        #[arg(long)]
        no_resume: bool,
    },

    /// Ingest a single YouTube video by ID or URL
    IngestVideo {
        /// Video ID or URL
        video: String,

        /// Preferred transcript language
        #[arg(short, long)]
        language: Option<String>,
    },

    /// Discover and score videos of a wave without ingesting
    Discover {
        /// Channel wave to process
        #[arg(short, long)]
        wave: u8,

        /// Videos to select per channel
        #[arg(short, long)]
        top: Option<usize>,

        /// Only channels whose name contains this text
        #[arg(long)]
        channel: Option<String>,

        /// Print the selection without writing a discovery file
        #[arg(long)]
        dry_run: bool,

        /// Discovery file to write (default: <data_dir>/discovered-wave<N>.json)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Look up the channel ID for a handle such as @channel
    ResolveChannel {
        /// Channel handle or URL
        handle: String,
    },

    /// Discover and ingest a wave, or replay a saved discovery file
    IngestYoutube {
        /// Channel wave to process
        #[arg(short, long, required_unless_present = "from_discovery")]
        wave: Option<u8>,

        /// Videos to select per channel
        #[arg(short, long)]
        top: Option<usize>,

        /// Only channels whose name contains this text
        #[arg(long)]
        channel: Option<String>,

        /// Maximum videos ingested per channel in this run
        #[arg(short, long)]
        batch_size: Option<usize>,

        /// Ingest the videos listed in a discovery file
        #[arg(long, conflicts_with = "wave")]
        from_discovery: Option<PathBuf>,
    },

    /// Search the knowledge base
    Search {
        /// Search query
        query: String,

        /// Maximum number of results
        #[arg(short, long)]
        limit: Option<usize>,

        /// Minimum similarity score (0.0-1.0)
        #[arg(short, long)]
        threshold: Option<f32>,

        /// Print the results as a model prompt context block
        #[arg(long)]
        context: bool,
    },

    /// List documents in the knowledge base
    List {
        /// Only documents of this kind (pdf, youtube, article, note)
        #[arg(short, long)]
        kind: Option<SourceKind>,

        /// Only documents in this status (pending, processing, completed, error)
        #[arg(short, long)]
        status: Option<DocumentStatus>,
    },

    /// Delete a document and its chunks
    Delete {
        /// Document ID
        document_id: String,
    },

    /// Start HTTP API server
    Serve {
        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port to bind to
        #[arg(short, long, default_value = "3000")]
        port: u16,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Write the default configuration file if none exists
    Init,

    /// Show configuration file path
    Path,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ingest_youtube_wave() {
        let cli = Cli::parse_from(["acervo", "ingest-youtube", "--wave", "2", "--batch-size", "5"]);
        match cli.command {
            Commands::IngestYoutube { wave, batch_size, from_discovery, .. } => {
                assert_eq!(wave, Some(2));
                assert_eq!(batch_size, Some(5));
                assert!(from_discovery.is_none());
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_ingest_youtube_needs_wave_or_file() {
        assert!(Cli::try_parse_from(["acervo", "ingest-youtube"]).is_err());
        assert!(Cli::try_parse_from(["acervo", "ingest-youtube", "--from-discovery", "d.json"]).is_ok());
        assert!(Cli::try_parse_from([
            "acervo", "ingest-youtube", "--wave", "1", "--from-discovery", "d.json"
        ])
        .is_err());
    }

    #[test]
    fn test_parse_list_filters() {
        let cli = Cli::parse_from(["acervo", "-vv", "list", "--kind", "pdf", "--status", "error"]);
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::List { kind, status } => {
                assert_eq!(kind, Some(SourceKind::Pdf));
                assert_eq!(status, Some(DocumentStatus::Error));
            }
            other => panic!("unexpected command: {:?}", other),
        }
        assert!(Cli::try_parse_from(["acervo", "list", "--kind", "podcast"]).is_err());
    }
}
