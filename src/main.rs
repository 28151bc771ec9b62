//! Acervo CLI entry point.

use acervo::cli::{commands, Cli, Commands};
use acervo::config::Settings;
use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| format!("acervo={}", log_level)),
        ))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    // Load configuration
    let settings = Settings::load_from(cli.config.as_ref())?;

    std::fs::create_dir_all(settings.data_dir())?;

    // Execute command
    match cli.command {
        Commands::IngestPdf {
            path,
            recursive,
            no_resume,
        } => {
            commands::run_ingest_pdf(&path, recursive, no_resume, settings).await?;
        }

        Commands::IngestVideo { video, language } => {
            commands::run_ingest_video(&video, language, settings).await?;
        }

        Commands::Discover {
            wave,
            top,
            channel,
            dry_run,
            output,
        } => {
            commands::run_discover(wave, top, channel, dry_run, output, settings).await?;
        }

        Commands::ResolveChannel { handle } => {
            commands::run_resolve_channel(&handle, settings).await?;
        }

        Commands::IngestYoutube {
            wave,
            top,
            channel,
            batch_size,
            from_discovery,
        } => {
            let args = commands::IngestYoutubeArgs {
                wave,
                top,
                channel,
                batch_size,
                from_discovery,
            };
            commands::run_ingest_youtube(args, settings).await?;
        }

        Commands::Search {
            query,
            limit,
            threshold,
            context,
        } => {
            commands::run_search(&query, limit, threshold, context, settings).await?;
        }

        Commands::List { kind, status } => {
            commands::run_list(kind, status, settings).await?;
        }

        Commands::Delete { document_id } => {
            commands::run_delete(&document_id, settings).await?;
        }

        Commands::Serve { host, port } => {
            commands::run_serve(&host, port, settings).await?;
        }

        Commands::Config { action } => {
            commands::run_config(&action, cli.config, settings)?;
        }
    }

    Ok(())
}
