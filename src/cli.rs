use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the reconciliation loop until interrupted
    Watch {
        /// Destination channel session to upload with
        #[arg(short, long)]
        channel: String,
    },

    /// Set or reset the tracking target (clears the uploaded-id set)
    Track {
        /// Source channel URL to watch
        #[arg(short, long)]
        source: String,

        /// Earliest upload date eligible for import (YYYY-MM-DD)
        #[arg(long)]
        cutoff: String,

        /// Advisory label of the destination channel
        #[arg(short, long)]
        upload_channel: Option<String>,
    },

    /// Show the tracking record and last-checked time
    Status,

    /// List already imported video ids
    Uploaded,

    /// Import a single video immediately, outside the loop
    Upload {
        /// Video URL to import
        #[arg(short, long)]
        url: String,

        /// Destination channel session to upload with
        #[arg(short, long)]
        channel: String,

        /// Scheduled publication time in the configured timezone (YYYY-MM-DD HH:MM)
        #[arg(short, long)]
        schedule: Option<String>,
    },

    /// List destination channels with stored credentials
    Channels,
}
