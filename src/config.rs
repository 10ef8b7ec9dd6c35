use serde::{Deserialize, Serialize};
use std::path::Path;
use crate::error::{Result, RetubeError};

// Default values for watcher cadence and upload transfer tuning
fn default_pass_interval_secs() -> u64 {
    300
}

fn default_not_ready_backoff_secs() -> u64 {
    60
}

fn default_chunk_size() -> u64 {
    8 * 1024 * 1024
}

fn default_max_retries() -> u32 {
    3
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub downloader: DownloaderConfig,
    pub upload: UploadConfig,
    pub rewrite: RewriteConfig,
    pub schedule: ScheduleConfig,
    pub watcher: WatcherConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloaderConfig {
    /// Path to the downloader binary (e.g., yt-dlp)
    pub binary_path: String,
    /// Directory where media, thumbnail and metadata files are staged
    pub staging_dir: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Base URL of the upload endpoint
    pub upload_endpoint: String,
    /// Base URL of the OAuth token endpoint used for refresh
    pub token_endpoint: String,
    /// OAuth installed-app client secret file
    pub client_secret_file: String,
    /// Directory holding one serialized credential file per destination channel
    pub tokens_dir: String,
    /// Transfer chunk size in bytes for resumable uploads
    #[serde(default = "default_chunk_size")]
    pub chunk_size: u64,
    /// Maximum resume attempts for a single transfer
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewriteConfig {
    /// API key for the rewrite service; rewriting is disabled when unset
    pub api_key: Option<String>,
    /// Chat completions endpoint URL
    pub endpoint: String,
    /// Model to use for description rewriting
    pub model: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// IANA timezone name for interpreting scheduled publication input
    pub timezone: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatcherConfig {
    /// Path of the persisted tracking record
    pub state_file: String,
    /// Seconds between reconciliation passes
    #[serde(default = "default_pass_interval_secs")]
    pub pass_interval_secs: u64,
    /// Shorter wait used while the tracking target is not configured yet
    #[serde(default = "default_not_ready_backoff_secs")]
    pub not_ready_backoff_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            downloader: DownloaderConfig {
                binary_path: "yt-dlp".to_string(),
                staging_dir: "downloads".to_string(),
            },
            upload: UploadConfig {
                upload_endpoint: "https://www.googleapis.com/upload/youtube/v3".to_string(),
                token_endpoint: "https://oauth2.googleapis.com/token".to_string(),
                client_secret_file: "client_secret.json".to_string(),
                tokens_dir: "tokens".to_string(),
                chunk_size: default_chunk_size(),
                max_retries: default_max_retries(),
            },
            rewrite: RewriteConfig {
                api_key: None,
                endpoint: "https://api.openai.com/v1".to_string(),
                model: "gpt-4o-mini".to_string(),
            },
            schedule: ScheduleConfig {
                timezone: "UTC".to_string(),
            },
            watcher: WatcherConfig {
                state_file: "channel_data.json".to_string(),
                pass_interval_secs: default_pass_interval_secs(),
                not_ready_backoff_secs: default_not_ready_backoff_secs(),
            },
        }
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| RetubeError::Config(format!("Failed to read config file: {}", e)))?;

        toml::from_str(&content)
            .map_err(|e| RetubeError::Config(format!("Failed to parse config file: {}", e)))
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| RetubeError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| RetubeError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_watcher_cadence() {
        let config = Config::default();
        assert_eq!(config.watcher.pass_interval_secs, 300);
        assert_eq!(config.watcher.not_ready_backoff_secs, 60);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let toml_str = r#"
            [downloader]
            binary_path = "yt-dlp"
            staging_dir = "/tmp/staging"

            [upload]
            upload_endpoint = "https://upload.example.com"
            token_endpoint = "https://oauth.example.com/token"
            client_secret_file = "secret.json"
            tokens_dir = "/tmp/tokens"

            [rewrite]
            endpoint = "https://api.example.com/v1"
            model = "test-model"

            [schedule]
            timezone = "America/New_York"

            [watcher]
            state_file = "/tmp/state.json"
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.upload.chunk_size, 8 * 1024 * 1024);
        assert_eq!(config.upload.max_retries, 3);
        assert_eq!(config.watcher.pass_interval_secs, 300);
        assert!(config.rewrite.api_key.is_none());
    }
}
