use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::config::DownloaderConfig;
use crate::error::{Result, RetubeError};
use crate::metadata::{parse_upload_date, video_id_from_url, ListedVideo, VideoMetadata};
use super::{commands::YtDlpCommand, Downloader, VideoAsset};

const MEDIA_EXTENSIONS: &[&str] = &["mp4", "mkv", "webm"];
const THUMBNAIL_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp"];

/// yt-dlp flat-listing entry format (one JSON object per line)
#[derive(Debug, Deserialize)]
struct FlatEntry {
    id: Option<String>,
    url: Option<String>,
    upload_date: Option<String>,
}

/// Downloader implementation backed by the yt-dlp tool
pub struct YtDlpDownloader {
    config: DownloaderConfig,
}

impl YtDlpDownloader {
    pub fn new(config: DownloaderConfig) -> Self {
        Self { config }
    }

    fn staging_dir(&self) -> &Path {
        Path::new(&self.config.staging_dir)
    }
}

#[async_trait]
impl Downloader for YtDlpDownloader {
    async fn list(&self, channel_url: &str, cutoff: NaiveDate) -> Result<Vec<ListedVideo>> {
        let stdout = YtDlpCommand::new(&self.config.binary_path, "Channel listing")
            .quiet()
            .flat_playlist()
            .dump_json()
            .url(channel_url)
            .execute()
            .await?;

        let listed = parse_flat_listing(&stdout, cutoff);
        info!("Listed {} videos on or after {} for {}", listed.len(), cutoff, channel_url);
        Ok(listed)
    }

    async fn fetch(&self, video_url: &str) -> Result<VideoAsset> {
        let video_id = video_id_from_url(video_url);
        info!("Fetching video {} from {}", video_id, video_url);

        std::fs::create_dir_all(self.staging_dir())?;

        YtDlpCommand::new(&self.config.binary_path, "Video fetch")
            .write_info_json()
            .write_thumbnail()
            .merge_output_format("mp4")
            .no_playlist()
            .output_template(self.staging_dir().join("%(id)s.%(ext)s"))
            .url(video_url)
            .execute()
            .await?;

        let sidecar_path = self.staging_dir().join(format!("{}.info.json", video_id));
        if !sidecar_path.exists() {
            return Err(RetubeError::MetadataMissing(format!(
                "Sidecar file not found: {}",
                sidecar_path.display()
            )));
        }

        let sidecar_content = std::fs::read_to_string(&sidecar_path)?;
        let metadata = VideoMetadata::from_json(&sidecar_content)?;

        let (media_file, thumbnail_file) = locate_outputs(self.staging_dir(), &video_id)?;
        if thumbnail_file.is_none() {
            warn!("No thumbnail produced for video {}", video_id);
        }

        Ok(VideoAsset {
            source_url: video_url.to_string(),
            video_id,
            media_file,
            thumbnail_file,
            metadata,
        })
    }
}

/// Parse one flat listing entry per line, keeping videos dated on or after the
/// cutoff. Entries without an upload date never become candidates.
fn parse_flat_listing(stdout: &str, cutoff: NaiveDate) -> Vec<ListedVideo> {
    let mut listed = Vec::new();

    for line in stdout.lines().filter(|l| !l.trim().is_empty()) {
        let entry: FlatEntry = match serde_json::from_str(line) {
            Ok(entry) => entry,
            Err(e) => {
                debug!("Skipping unparseable listing line: {}", e);
                continue;
            }
        };

        let Some(url) = entry.url else {
            continue;
        };

        let upload_date = entry.upload_date.as_deref().and_then(|d| parse_upload_date(d).ok());
        match upload_date {
            Some(date) if date >= cutoff => {
                let video_id = entry.id.unwrap_or_else(|| video_id_from_url(&url));
                listed.push(ListedVideo {
                    url,
                    video_id,
                    upload_date,
                });
            }
            _ => {}
        }
    }

    listed
}

/// Find the downloaded media file and optional thumbnail for a video id
fn locate_outputs(staging_dir: &Path, video_id: &str) -> Result<(PathBuf, Option<PathBuf>)> {
    let mut media_file = None;
    let mut thumbnail_file = None;

    for entry in WalkDir::new(staging_dir).max_depth(1).into_iter().filter_map(|e| e.ok()) {
        let path = entry.path();
        let stem_matches = path
            .file_stem()
            .map(|s| s.to_string_lossy() == video_id)
            .unwrap_or(false);
        if !stem_matches {
            continue;
        }

        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            let ext = ext.to_lowercase();
            if MEDIA_EXTENSIONS.contains(&ext.as_str()) {
                media_file = Some(path.to_path_buf());
            } else if THUMBNAIL_EXTENSIONS.contains(&ext.as_str()) {
                thumbnail_file = Some(path.to_path_buf());
            }
        }
    }

    let media_file = media_file.ok_or_else(|| {
        RetubeError::Download(format!(
            "No media file produced for video {} in {}",
            video_id,
            staging_dir.display()
        ))
    })?;

    Ok((media_file, thumbnail_file))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flat_listing_applies_cutoff() {
        let stdout = concat!(
            r#"{"id":"aaa","url":"https://www.youtube.com/watch?v=aaa","upload_date":"20250101"}"#, "\n",
            r#"{"id":"bbb","url":"https://www.youtube.com/watch?v=bbb","upload_date":"20250201"}"#, "\n",
        );
        let cutoff = NaiveDate::from_ymd_opt(2025, 1, 15).unwrap();

        let listed = parse_flat_listing(stdout, cutoff);
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].video_id, "bbb");
    }

    #[test]
    fn test_parse_flat_listing_skips_undated_and_malformed() {
        let stdout = concat!(
            r#"{"id":"aaa","url":"https://www.youtube.com/watch?v=aaa"}"#, "\n",
            "not json at all\n",
            r#"{"id":"ccc","url":"https://www.youtube.com/watch?v=ccc","upload_date":"20250301"}"#, "\n",
        );
        let cutoff = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();

        let listed = parse_flat_listing(stdout, cutoff);
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].video_id, "ccc");
    }

    #[test]
    fn test_locate_outputs() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("abc.mp4"), b"media").unwrap();
        std::fs::write(dir.path().join("abc.webp"), b"thumb").unwrap();
        std::fs::write(dir.path().join("abc.info.json"), b"{}").unwrap();
        std::fs::write(dir.path().join("other.mp4"), b"media").unwrap();

        let (media, thumbnail) = locate_outputs(dir.path(), "abc").unwrap();
        assert_eq!(media.file_name().unwrap(), "abc.mp4");
        assert_eq!(thumbnail.unwrap().file_name().unwrap(), "abc.webp");
    }

    #[test]
    fn test_locate_outputs_missing_media() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("abc.info.json"), b"{}").unwrap();

        assert!(locate_outputs(dir.path(), "abc").is_err());
    }
}
