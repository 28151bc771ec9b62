//! CLI command implementations.

mod config;
mod discover;
mod ingest_pdf;
mod ingest_video;
mod ingest_youtube;
mod list;
mod resolve_channel;
mod search;
mod serve;

pub use config::run_config;
pub use discover::run_discover;
pub use ingest_pdf::run_ingest_pdf;
pub use ingest_video::run_ingest_video;
pub use ingest_youtube::{run_ingest_youtube, IngestYoutubeArgs};
pub use list::{run_delete, run_list};
pub use resolve_channel::run_resolve_channel;
pub use search::run_search;
pub use serve::run_serve;
