//! Acervo - knowledge base ingestion and retrieval
//!
//! Turns PDFs and YouTube video transcripts into a searchable knowledge base.
//!
//! # Overview
//!
//! Acervo allows you to:
//! - Ingest PDF files (single files or whole directories, resumable)
//! - Discover, score, and ingest videos from configured YouTube channels
//! - Search the knowledge base semantically
//! - Format retrieved passages as context for a model prompt
//!
//! # Architecture
//!
//! - `config` - Configuration management
//! - `chunking` - Page text and transcript chunking
//! - `embedding` - Embedding generation
//! - `store` - Document/chunk storage and similarity search
//! - `ingest` - Extract, chunk, embed, and persist documents
//! - `rag` - Query-time retrieval and context formatting
//! - `youtube` - YouTube Data API, transcripts, scoring
//! - `discovery` - Per-channel discovery and ingestion workflow
//! - `orchestrator` - Component wiring from settings
//!
//! # Example
//!
//! ```rust,no_run
//! use acervo::config::Settings;
//! use acervo::orchestrator::Orchestrator;
//! use acervo::rag::RetrieveOptions;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let orchestrator = Orchestrator::new(settings)?;
//!
//!     let ingestor = orchestrator.ingestor()?;
//!     let bytes = std::fs::read("playbook.pdf")?;
//!     let result = ingestor.ingest_pdf(bytes, "playbook.pdf").await?;
//!     println!("Ingested {} chunks", result.chunk_count);
//!
//!     let chunks = orchestrator
//!         .retriever()?
//!         .retrieve("how should I price my offer?", RetrieveOptions::default())
//!         .await;
//!     println!("{}", acervo::rag::format_chunks_as_context(&chunks));
//!
//!     Ok(())
//! }
//! ```

pub mod chunking;
pub mod cli;
pub mod config;
pub mod discovery;
pub mod embedding;
pub mod error;
pub mod ingest;
pub mod openai;
pub mod orchestrator;
pub mod rag;
pub mod store;
pub mod youtube;

#[cfg(test)]
mod testing;

pub use error::{AcervoError, Result};
