//! Retube - Channel Mirroring Daemon
//!
//! This is the main entry point for the retube application: a daemon that
//! watches a source channel for new videos and re-uploads them to a
//! destination channel using yt-dlp and the YouTube Data API.

use anyhow::Result;
use chrono::{NaiveDate, NaiveDateTime};
use clap::Parser;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, Level};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use tracing_appender::{non_blocking, rolling};

use retube::auth::SessionProvider;
use retube::cli::{Args, Commands};
use retube::config::Config;
use retube::downloader::{Downloader, DownloaderFactory};
use retube::pipeline::UploadPipeline;
use retube::rewrite::RewriterFactory;
use retube::state::ChannelStateStore;
use retube::upload::UploadServiceFactory;
use retube::watcher::Watcher;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Setup logging to both console and file
    setup_logging(args.verbose)?;

    // Load configuration once; components receive it at construction
    let config = match &args.config {
        Some(config_path) => Config::from_file(config_path)?,
        None => {
            if std::path::Path::new("retube.toml").exists() {
                info!("Found retube.toml in current directory, loading...");
                Config::from_file("retube.toml")?
            } else {
                Config::default()
            }
        }
    };

    match args.command {
        Commands::Watch { channel } => {
            info!("Starting reconciliation loop for destination channel '{}'", channel);

            let pipeline = build_pipeline(&config, channel)?;
            let downloader: Arc<dyn Downloader> =
                Arc::from(DownloaderFactory::create_default(config.downloader.clone()));
            let store = ChannelStateStore::new(&config.watcher.state_file);
            let watcher = Watcher::new(store, downloader, Arc::new(pipeline), config.watcher.clone());

            // Ctrl-C requests a graceful stop between passes
            let cancel = CancellationToken::new();
            let signal_cancel = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    signal_cancel.cancel();
                }
            });

            watcher.run(cancel).await?;
        }
        Commands::Track { source, cutoff, upload_channel } => {
            let cutoff = NaiveDate::parse_from_str(&cutoff, "%Y-%m-%d")
                .map_err(|e| anyhow::anyhow!("Invalid cutoff date '{}': {}", cutoff, e))?;

            let store = ChannelStateStore::new(&config.watcher.state_file);
            store.set_target(&source, cutoff, upload_channel.as_deref())?;
            println!("Tracking {} for videos uploaded on or after {}", source, cutoff);
        }
        Commands::Status => {
            let store = ChannelStateStore::new(&config.watcher.state_file);
            let record = store.load()?;

            println!("Source channel: {}", record.source_channel.as_deref().unwrap_or("not set"));
            println!("Upload channel: {}", record.upload_channel.as_deref().unwrap_or("not set"));
            match record.cutoff_date {
                Some(cutoff) => println!("Cutoff date:    {}", cutoff),
                None => println!("Cutoff date:    not set"),
            }
            match record.last_checked_at {
                Some(checked) => println!("Last checked:   {}", checked),
                None => println!("Last checked:   never"),
            }
            println!("Uploaded:       {} videos", record.uploaded_video_ids.len());
        }
        Commands::Uploaded => {
            let store = ChannelStateStore::new(&config.watcher.state_file);
            let record = store.load()?;

            if record.uploaded_video_ids.is_empty() {
                println!("No videos imported yet.");
            } else {
                for video_id in &record.uploaded_video_ids {
                    println!("{}", video_id);
                }
            }
        }
        Commands::Upload { url, channel, schedule } => {
            let schedule = schedule
                .map(|s| {
                    NaiveDateTime::parse_from_str(&s, "%Y-%m-%d %H:%M")
                        .map_err(|e| anyhow::anyhow!("Invalid schedule time '{}': {}", s, e))
                })
                .transpose()?;

            let pipeline = build_pipeline(&config, channel)?;
            let result = pipeline.process(&url, schedule).await?;

            println!("Uploaded: https://www.youtube.com/watch?v={}", result.remote_video_id);
            if let Some(publish_at) = result.scheduled_publish_at {
                println!("Scheduled for {} UTC", publish_at);
            }
            if result.thumbnail_attached {
                println!("Thumbnail attached");
            }
        }
        Commands::Channels => {
            let sessions = SessionProvider::new(config.upload.clone());
            let channels = sessions.list_channels()?;

            if channels.is_empty() {
                println!("No destination channels configured.");
            } else {
                for channel in channels {
                    println!("{}", channel);
                }
            }
        }
    }

    Ok(())
}

/// Wire the adapters into an upload pipeline for the given destination channel
fn build_pipeline(config: &Config, channel: String) -> Result<UploadPipeline> {
    let downloader: Arc<dyn Downloader> =
        Arc::from(DownloaderFactory::create_default(config.downloader.clone()));
    let uploader = UploadServiceFactory::create_default(config.upload.clone());
    let rewriter = RewriterFactory::create_optional(config.rewrite.clone());
    let sessions = Arc::new(SessionProvider::new(config.upload.clone()));

    Ok(UploadPipeline::new(
        downloader,
        uploader,
        rewriter,
        sessions,
        channel,
        &config.schedule,
    )?)
}

/// Setup logging to both console and file
fn setup_logging(verbose: bool) -> Result<()> {
    // Create log directory
    let retube_dir = std::env::current_dir()?.join(".retube");
    let log_dir = retube_dir.join("log");
    std::fs::create_dir_all(&log_dir)?;

    // Set up file appender with daily rotation
    let file_appender = rolling::daily(&log_dir, "retube.log");
    let (non_blocking_file, _guard) = non_blocking(file_appender);
    // Keep the guard alive for the duration of the program
    std::mem::forget(_guard);

    // Determine log level
    let log_level = if verbose { Level::DEBUG } else { Level::INFO };

    // Create console layer
    let console_layer = fmt::layer()
        .with_target(false)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_file(true)
        .with_line_number(true);

    // Create file layer
    let file_layer = fmt::layer()
        .with_writer(non_blocking_file)
        .with_target(false)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false); // No ANSI colors in file

    // Setup layered subscriber
    let subscriber = tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(console_layer)
        .with(file_layer);

    // Initialize the subscriber
    subscriber.try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    info!("Logging initialized - console: {}, file: {}",
          log_level, log_dir.join("retube.log").display());

    Ok(())
}
