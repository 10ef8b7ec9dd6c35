use async_trait::async_trait;
use chrono::{DateTime, LocalResult, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use std::sync::Arc;
use tracing::{info, warn};

use crate::auth::SessionProvider;
use crate::config::ScheduleConfig;
use crate::downloader::Downloader;
use crate::error::{Result, RetubeError};
use crate::rewrite::DescriptionRewriter;
use crate::upload::{UploadBody, UploadService};

/// Fixed suffix appended to every final description, after any rewriting
pub const DISCLAIMER: &str =
    "\n\n⚠ This video is reuploaded for educational or informational purposes under fair use.";

/// Produced exactly once per successful upload
#[derive(Debug, Clone, PartialEq)]
pub struct UploadResult {
    pub remote_video_id: String,
    pub scheduled_publish_at: Option<DateTime<Utc>>,
    pub thumbnail_attached: bool,
}

/// Seam between the reconciliation loop and the per-video pipeline
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VideoImporter: Send + Sync {
    /// Run one video through the full pipeline with no schedule
    async fn import(&self, video_url: &str) -> Result<UploadResult>;
}

/// Per-video pipeline: fetch, extract metadata, optionally rewrite the
/// description, upload with resumable transfer, attach the thumbnail.
///
/// Failure contract: download and upload errors abort the video (the caller
/// skips it for the pass and retries next pass), rewrite and thumbnail
/// failures are non-fatal.
pub struct UploadPipeline {
    downloader: Arc<dyn Downloader>,
    uploader: Box<dyn UploadService>,
    rewriter: Option<Box<dyn DescriptionRewriter>>,
    sessions: Arc<SessionProvider>,
    channel: String,
    timezone: Tz,
}

impl UploadPipeline {
    pub fn new(
        downloader: Arc<dyn Downloader>,
        uploader: Box<dyn UploadService>,
        rewriter: Option<Box<dyn DescriptionRewriter>>,
        sessions: Arc<SessionProvider>,
        channel: String,
        schedule: &ScheduleConfig,
    ) -> Result<Self> {
        let timezone = parse_timezone(&schedule.timezone)?;

        Ok(Self {
            downloader,
            uploader,
            rewriter,
            sessions,
            channel,
            timezone,
        })
    }

    /// Process one video. `schedule` is a wall-clock time in the configured
    /// display timezone; when set, the video is uploaded private with the
    /// equivalent UTC publish timestamp.
    pub async fn process(
        &self,
        video_url: &str,
        schedule: Option<NaiveDateTime>,
    ) -> Result<UploadResult> {
        info!("Fetching {}", video_url);
        let asset = self.downloader.fetch(video_url).await?;

        let description = self.filter_description(&asset.metadata.description).await;

        let publish_at = schedule
            .map(|local| local_to_utc(local, self.timezone))
            .transpose()?;

        let body = UploadBody {
            title: asset.metadata.title.clone(),
            description: format!("{}{}", description, DISCLAIMER),
            tags: asset.metadata.tags.clone(),
            category_id: asset.metadata.category_id.clone(),
            publish_at,
        };

        info!("Uploading {} as '{}' ({})", asset.video_id, body.title, body.privacy_status());
        let session = self.sessions.authenticate(&self.channel).await?;
        let remote_video_id = self.uploader.upload(&session, &asset.media_file, &body).await?;

        let thumbnail_attached = match &asset.thumbnail_file {
            Some(thumbnail) => {
                match self
                    .uploader
                    .attach_thumbnail(&session, &remote_video_id, thumbnail)
                    .await
                {
                    Ok(()) => true,
                    Err(e) => {
                        // Non-fatal: the video itself is uploaded
                        warn!("Thumbnail attach failed for {}: {}", remote_video_id, e);
                        false
                    }
                }
            }
            None => false,
        };

        Ok(UploadResult {
            remote_video_id,
            scheduled_publish_at: publish_at,
            thumbnail_attached,
        })
    }

    /// Rewrite the description when the capability is configured, falling
    /// back to the original text on any rewriter error.
    async fn filter_description(&self, original: &str) -> String {
        let Some(rewriter) = &self.rewriter else {
            return original.to_string();
        };

        match rewriter.rewrite(original).await {
            Ok(rewritten) => rewritten,
            Err(e) => {
                warn!("Description rewrite failed, keeping original text: {}", e);
                original.to_string()
            }
        }
    }
}

#[async_trait]
impl VideoImporter for UploadPipeline {
    async fn import(&self, video_url: &str) -> Result<UploadResult> {
        self.process(video_url, None).await
    }
}

pub fn parse_timezone(name: &str) -> Result<Tz> {
    name.parse::<Tz>()
        .map_err(|_| RetubeError::Config(format!("Unknown timezone: {}", name)))
}

/// Convert a wall-clock time in the given timezone to an absolute UTC
/// instant. Ambiguous local times (DST fold) resolve to the earlier instant.
pub fn local_to_utc(local: NaiveDateTime, timezone: Tz) -> Result<DateTime<Utc>> {
    match timezone.from_local_datetime(&local) {
        LocalResult::Single(dt) => Ok(dt.with_timezone(&Utc)),
        LocalResult::Ambiguous(earlier, _) => Ok(earlier.with_timezone(&Utc)),
        LocalResult::None => Err(RetubeError::Schedule(format!(
            "Local time {} does not exist in timezone {}",
            local, timezone
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};
    use mockall::predicate::*;
    use std::path::PathBuf;

    use crate::auth::StoredCredentials;
    use crate::downloader::{MockDownloader, VideoAsset};
    use crate::metadata::VideoMetadata;
    use crate::rewrite::MockDescriptionRewriter;
    use crate::upload::MockUploadService;

    fn test_sessions(dir: &tempfile::TempDir) -> Arc<SessionProvider> {
        let credentials = StoredCredentials {
            access_token: "token".to_string(),
            refresh_token: None,
            expires_at: Some(Utc::now() + Duration::hours(1)),
        };
        std::fs::write(
            dir.path().join("mirror.json"),
            serde_json::to_string(&credentials).unwrap(),
        )
        .unwrap();

        Arc::new(SessionProvider::new(crate::config::UploadConfig {
            upload_endpoint: "https://upload.example.com".to_string(),
            token_endpoint: "https://oauth.example.com/token".to_string(),
            client_secret_file: "client_secret.json".to_string(),
            tokens_dir: dir.path().to_string_lossy().to_string(),
            chunk_size: 1024,
            max_retries: 3,
        }))
    }

    fn test_asset(description: &str, thumbnail: bool) -> VideoAsset {
        VideoAsset {
            source_url: "https://www.youtube.com/watch?v=abc".to_string(),
            video_id: "abc".to_string(),
            media_file: PathBuf::from("/tmp/abc.mp4"),
            thumbnail_file: thumbnail.then(|| PathBuf::from("/tmp/abc.webp")),
            metadata: VideoMetadata {
                title: "Untitled Video".to_string(),
                description: description.to_string(),
                tags: vec![],
                category_id: "22".to_string(),
                upload_date: NaiveDate::from_ymd_opt(2025, 2, 1),
            },
        }
    }

    fn pipeline(
        downloader: MockDownloader,
        uploader: MockUploadService,
        rewriter: Option<MockDescriptionRewriter>,
        sessions: Arc<SessionProvider>,
    ) -> UploadPipeline {
        UploadPipeline::new(
            Arc::new(downloader),
            Box::new(uploader),
            rewriter.map(|r| Box::new(r) as Box<dyn DescriptionRewriter>),
            sessions,
            "mirror".to_string(),
            &ScheduleConfig {
                timezone: "America/New_York".to_string(),
            },
        )
        .unwrap()
    }

    #[test]
    fn test_local_schedule_converts_to_utc() {
        let local = NaiveDate::from_ymd_opt(2025, 6, 1)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();
        let timezone = parse_timezone("America/New_York").unwrap();

        let utc = local_to_utc(local, timezone).unwrap();
        assert_eq!(utc.to_rfc3339(), "2025-06-01T13:00:00+00:00");
    }

    #[test]
    fn test_unknown_timezone_rejected() {
        assert!(parse_timezone("Not/AZone").is_err());
    }

    #[tokio::test]
    async fn test_rewrite_failure_falls_back_to_original_text() {
        let dir = tempfile::tempdir().unwrap();

        let mut downloader = MockDownloader::new();
        downloader
            .expect_fetch()
            .returning(|_| Ok(test_asset("original description", false)));

        let mut rewriter = MockDescriptionRewriter::new();
        rewriter
            .expect_rewrite()
            .returning(|_| Err(RetubeError::Rewrite("service down".to_string())));

        let mut uploader = MockUploadService::new();
        uploader
            .expect_upload()
            .withf(|_, _, body| {
                body.description == format!("original description{}", DISCLAIMER)
                    && body.title == "Untitled Video"
                    && body.category_id == "22"
                    && body.privacy_status() == "public"
            })
            .returning(|_, _, _| Ok("remote-1".to_string()));

        let pipeline = pipeline(downloader, uploader, Some(rewriter), test_sessions(&dir));
        let result = pipeline
            .process("https://www.youtube.com/watch?v=abc", None)
            .await
            .unwrap();

        assert_eq!(result.remote_video_id, "remote-1");
        assert!(!result.thumbnail_attached);
        assert!(result.scheduled_publish_at.is_none());
    }

    #[tokio::test]
    async fn test_thumbnail_failure_is_non_fatal() {
        let dir = tempfile::tempdir().unwrap();

        let mut downloader = MockDownloader::new();
        downloader
            .expect_fetch()
            .returning(|_| Ok(test_asset("", true)));

        let mut uploader = MockUploadService::new();
        uploader
            .expect_upload()
            .returning(|_, _, _| Ok("remote-2".to_string()));
        uploader
            .expect_attach_thumbnail()
            .with(always(), eq("remote-2"), always())
            .returning(|_, _, _| Err(RetubeError::Upload("thumbnail rejected".to_string())));

        let pipeline = pipeline(downloader, uploader, None, test_sessions(&dir));
        let result = pipeline
            .process("https://www.youtube.com/watch?v=abc", None)
            .await
            .unwrap();

        assert_eq!(result.remote_video_id, "remote-2");
        assert!(!result.thumbnail_attached);
    }

    #[tokio::test]
    async fn test_scheduled_upload_is_private_with_utc_publish_at() {
        let dir = tempfile::tempdir().unwrap();

        let mut downloader = MockDownloader::new();
        downloader
            .expect_fetch()
            .returning(|_| Ok(test_asset("", false)));

        let mut uploader = MockUploadService::new();
        uploader
            .expect_upload()
            .withf(|_, _, body| {
                body.privacy_status() == "private"
                    && body.publish_at.map(|t| t.to_rfc3339())
                        == Some("2025-06-01T13:00:00+00:00".to_string())
            })
            .returning(|_, _, _| Ok("remote-3".to_string()));

        let pipeline = pipeline(downloader, uploader, None, test_sessions(&dir));
        let schedule = NaiveDate::from_ymd_opt(2025, 6, 1)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();
        let result = pipeline
            .process("https://www.youtube.com/watch?v=abc", Some(schedule))
            .await
            .unwrap();

        assert_eq!(
            result.scheduled_publish_at.map(|t| t.to_rfc3339()),
            Some("2025-06-01T13:00:00+00:00".to_string())
        );
    }

    #[tokio::test]
    async fn test_download_failure_aborts_before_upload() {
        let dir = tempfile::tempdir().unwrap();

        let mut downloader = MockDownloader::new();
        downloader
            .expect_fetch()
            .returning(|_| Err(RetubeError::Download("tool exited 1".to_string())));

        let mut uploader = MockUploadService::new();
        uploader.expect_upload().times(0);

        let pipeline = pipeline(downloader, uploader, None, test_sessions(&dir));
        let result = pipeline
            .process("https://www.youtube.com/watch?v=abc", None)
            .await;

        assert!(matches!(result, Err(RetubeError::Download(_))));
    }
}
