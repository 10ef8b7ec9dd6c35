// Upload adapter seam
//
// The pipeline sees the `UploadService` trait; the YouTube Data API
// implementation with its resumable transfer protocol lives in
// `youtube.rs`.

pub mod youtube;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use std::path::Path;

use crate::auth::SessionHandle;
use crate::config::UploadConfig;
use crate::error::Result;

/// Destination metadata for one upload. Privacy follows the schedule: a
/// scheduled video is uploaded private with a publish timestamp, an
/// unscheduled one goes out public immediately.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadBody {
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    pub category_id: String,
    pub publish_at: Option<DateTime<Utc>>,
}

impl UploadBody {
    pub fn privacy_status(&self) -> &'static str {
        if self.publish_at.is_some() {
            "private"
        } else {
            "public"
        }
    }

    /// Compose the snippet/status request body. `publishAt` is always an
    /// ISO-8601 UTC timestamp.
    pub fn to_json(&self) -> serde_json::Value {
        let mut status = serde_json::json!({
            "privacyStatus": self.privacy_status(),
        });
        if let Some(publish_at) = self.publish_at {
            status["publishAt"] =
                serde_json::Value::String(publish_at.to_rfc3339_opts(SecondsFormat::Secs, true));
        }

        serde_json::json!({
            "snippet": {
                "title": self.title,
                "description": self.description,
                "tags": self.tags,
                "categoryId": self.category_id,
            },
            "status": status,
        })
    }
}

/// Main trait for the hosting API
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UploadService: Send + Sync {
    /// Perform a resumable upload and return the remote video id
    async fn upload(
        &self,
        session: &SessionHandle,
        media_file: &Path,
        body: &UploadBody,
    ) -> Result<String>;

    /// Attach a thumbnail to an already uploaded video
    async fn attach_thumbnail(
        &self,
        session: &SessionHandle,
        remote_video_id: &str,
        thumbnail_file: &Path,
    ) -> Result<()>;
}

/// Factory for creating upload service instances
pub struct UploadServiceFactory;

impl UploadServiceFactory {
    pub fn create_default(config: UploadConfig) -> Box<dyn UploadService> {
        Box::new(youtube::YouTubeUploader::new(config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_body_without_schedule_is_public() {
        let body = UploadBody {
            title: "A title".to_string(),
            description: "desc".to_string(),
            tags: vec!["tag".to_string()],
            category_id: "22".to_string(),
            publish_at: None,
        };

        let json = body.to_json();
        assert_eq!(json["status"]["privacyStatus"], "public");
        assert!(json["status"].get("publishAt").is_none());
        assert_eq!(json["snippet"]["categoryId"], "22");
    }

    #[test]
    fn test_scheduled_body_is_private_with_utc_publish_at() {
        let publish_at = Utc.with_ymd_and_hms(2025, 6, 1, 13, 0, 0).unwrap();
        let body = UploadBody {
            title: "A title".to_string(),
            description: "desc".to_string(),
            tags: vec![],
            category_id: "22".to_string(),
            publish_at: Some(publish_at),
        };

        let json = body.to_json();
        assert_eq!(json["status"]["privacyStatus"], "private");
        assert_eq!(json["status"]["publishAt"], "2025-06-01T13:00:00Z");
    }
}
