// Downloader adapter seam
//
// The reconciliation loop and the upload pipeline only see the `Downloader`
// trait; the yt-dlp implementation lives in `ytdlp.rs`. To add another
// backend, implement the trait and extend the factory.

pub mod commands;
pub mod ytdlp;

use async_trait::async_trait;
use chrono::NaiveDate;
use std::path::PathBuf;

use crate::config::DownloaderConfig;
use crate::error::Result;
use crate::metadata::{ListedVideo, VideoMetadata};

/// Files and metadata produced for one candidate video
#[derive(Debug, Clone)]
pub struct VideoAsset {
    pub source_url: String,
    pub video_id: String,
    pub media_file: PathBuf,
    pub thumbnail_file: Option<PathBuf>,
    pub metadata: VideoMetadata,
}

/// Main trait for source-channel access
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Downloader: Send + Sync {
    /// List videos on a channel uploaded on or after the cutoff date.
    /// Flat listing only, no media is fetched. An empty result is not an error.
    async fn list(&self, channel_url: &str, cutoff: NaiveDate) -> Result<Vec<ListedVideo>>;

    /// Download one video with its thumbnail and sidecar metadata
    async fn fetch(&self, video_url: &str) -> Result<VideoAsset>;
}

/// Factory for creating downloader instances
pub struct DownloaderFactory;

impl DownloaderFactory {
    pub fn create_default(config: DownloaderConfig) -> Box<dyn Downloader> {
        Box::new(ytdlp::YtDlpDownloader::new(config))
    }
}

pub use self::commands::YtDlpCommand;
