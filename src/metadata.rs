use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{Result, RetubeError};

/// Category used when the sidecar document carries none (22 = "People & Blogs")
pub const DEFAULT_CATEGORY_ID: u32 = 22;

/// Title used when the sidecar document carries none
pub const DEFAULT_TITLE: &str = "Untitled Video";

/// One entry from the flat channel listing (no media fetched)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListedVideo {
    pub url: String,
    pub video_id: String,
    pub upload_date: Option<NaiveDate>,
}

/// yt-dlp sidecar metadata format (`<id>.info.json`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SidecarMetadata {
    pub id: Option<String>,
    pub title: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub category: Option<u32>,
    pub upload_date: Option<String>,
}

/// Crate-level metadata with all defaults resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoMetadata {
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    pub category_id: String,
    pub upload_date: Option<NaiveDate>,
}

impl From<SidecarMetadata> for VideoMetadata {
    fn from(raw: SidecarMetadata) -> Self {
        Self {
            title: raw.title.unwrap_or_else(|| DEFAULT_TITLE.to_string()),
            description: raw.description,
            tags: raw.tags,
            category_id: raw.category.unwrap_or(DEFAULT_CATEGORY_ID).to_string(),
            upload_date: raw.upload_date.as_deref().and_then(|d| parse_upload_date(d).ok()),
        }
    }
}

impl VideoMetadata {
    pub fn from_json(content: &str) -> Result<Self> {
        let raw: SidecarMetadata = serde_json::from_str(content)?;
        Ok(raw.into())
    }
}

/// Parse yt-dlp's compact `YYYYMMDD` upload date
pub fn parse_upload_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y%m%d")
        .map_err(|e| RetubeError::MetadataMissing(format!("Invalid upload date '{}': {}", value, e)))
}

/// Derive a video id from the common URL forms
pub fn video_id_from_url(url: &str) -> String {
    let without_fragment = url.split('#').next().unwrap_or(url);

    if let Some(rest) = without_fragment.split("v=").nth(1) {
        return rest.split('&').next().unwrap_or(rest).to_string();
    }

    let without_query = without_fragment.split('?').next().unwrap_or(without_fragment);
    without_query
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(without_query)
        .to_string()
}
