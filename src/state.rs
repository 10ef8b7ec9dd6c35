use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::{Result, RetubeError};

/// The single persisted state object: what is being watched and what has
/// already been imported.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackingRecord {
    pub source_channel: Option<String>,
    /// Advisory label of the destination channel; routing uses the session
    /// name given to the watch/upload commands.
    pub upload_channel: Option<String>,
    pub cutoff_date: Option<NaiveDate>,
    pub last_checked_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub uploaded_video_ids: BTreeSet<String>,
}

impl TrackingRecord {
    /// Whether the record carries enough configuration to run a pass
    pub fn is_ready(&self) -> bool {
        self.source_channel.is_some() && self.cutoff_date.is_some()
    }
}

/// Exclusive owner of the persisted tracking record. Reads and writes the
/// record as a whole; the write replaces the file atomically so a partial
/// record is never visible. Single writer per record.
pub struct ChannelStateStore {
    path: PathBuf,
}

impl ChannelStateStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Load the record; a missing file yields an empty record
    pub fn load(&self) -> Result<TrackingRecord> {
        if !self.path.exists() {
            return Ok(TrackingRecord::default());
        }

        let content = std::fs::read_to_string(&self.path)
            .map_err(|e| RetubeError::State(format!("Failed to read state file: {}", e)))?;
        serde_json::from_str(&content)
            .map_err(|e| RetubeError::State(format!("Failed to parse state file: {}", e)))
    }

    /// Persist the whole record, replacing the previous file atomically
    pub fn save(&self, record: &TrackingRecord) -> Result<()> {
        let content = serde_json::to_string_pretty(record)
            .map_err(|e| RetubeError::State(format!("Failed to serialize state: {}", e)))?;

        let dir = self.path.parent().filter(|p| !p.as_os_str().is_empty());
        let mut temp = match dir {
            Some(dir) => tempfile::NamedTempFile::new_in(dir),
            None => tempfile::NamedTempFile::new_in("."),
        }
        .map_err(|e| RetubeError::State(format!("Failed to create temp state file: {}", e)))?;

        temp.write_all(content.as_bytes())
            .map_err(|e| RetubeError::State(format!("Failed to write state: {}", e)))?;
        temp.persist(&self.path)
            .map_err(|e| RetubeError::State(format!("Failed to replace state file: {}", e)))?;

        Ok(())
    }

    /// Initialize or reset the tracking target. Starts a new logical tracking
    /// session: the uploaded-id set is cleared.
    pub fn set_target(
        &self,
        source_channel: &str,
        cutoff_date: NaiveDate,
        upload_channel: Option<&str>,
    ) -> Result<TrackingRecord> {
        let record = TrackingRecord {
            source_channel: Some(source_channel.to_string()),
            upload_channel: upload_channel.map(|c| c.to_string()),
            cutoff_date: Some(cutoff_date),
            last_checked_at: None,
            uploaded_video_ids: BTreeSet::new(),
        };

        self.save(&record)?;
        info!("Tracking target set: {} from {}", source_channel, cutoff_date);
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_missing_file_yields_empty_record() {
        let dir = tempfile::tempdir().unwrap();
        let store = ChannelStateStore::new(dir.path().join("state.json"));

        let record = store.load().unwrap();
        assert_eq!(record, TrackingRecord::default());
        assert!(!record.is_ready());
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = ChannelStateStore::new(dir.path().join("state.json"));

        let mut record = TrackingRecord {
            source_channel: Some("https://www.youtube.com/@example".to_string()),
            upload_channel: Some("mirror".to_string()),
            cutoff_date: NaiveDate::from_ymd_opt(2025, 1, 15),
            last_checked_at: None,
            uploaded_video_ids: BTreeSet::new(),
        };
        record.uploaded_video_ids.insert("abc".to_string());

        store.save(&record).unwrap();
        let loaded = store.load().unwrap();
        assert_eq!(loaded, record);
        assert!(loaded.is_ready());
    }

    #[test]
    fn test_set_target_clears_uploaded_ids() {
        let dir = tempfile::tempdir().unwrap();
        let store = ChannelStateStore::new(dir.path().join("state.json"));

        let mut record = TrackingRecord::default();
        record.uploaded_video_ids.insert("old-id".to_string());
        store.save(&record).unwrap();

        let reset = store
            .set_target("https://www.youtube.com/@other", NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(), None)
            .unwrap();
        assert!(reset.uploaded_video_ids.is_empty());
        assert!(store.load().unwrap().uploaded_video_ids.is_empty());
    }

    #[test]
    fn test_cutoff_date_serializes_as_plain_date() {
        let record = TrackingRecord {
            cutoff_date: NaiveDate::from_ymd_opt(2025, 1, 15),
            ..TrackingRecord::default()
        };

        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"2025-01-15\""));
    }
}
