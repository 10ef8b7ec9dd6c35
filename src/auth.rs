use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::info;

use crate::config::UploadConfig;
use crate::error::{Result, RetubeError};

/// Tokens are refreshed when they expire within this window
const REFRESH_MARGIN_MINUTES: i64 = 5;

/// Opaque authenticated session consumed by the upload adapter
#[derive(Debug, Clone)]
pub struct SessionHandle {
    pub channel: String,
    pub access_token: String,
}

/// Serialized per-channel credentials, one file per destination channel.
/// The storage format is an implementation detail of this module.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredCredentials {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// OAuth installed-app client secret file layout
#[derive(Debug, Deserialize)]
struct ClientSecretFile {
    installed: ClientSecret,
}

#[derive(Debug, Deserialize)]
struct ClientSecret {
    client_id: String,
    client_secret: String,
}

/// Token endpoint refresh response
#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access_token: String,
    expires_in: i64,
}

/// Exchanges and caches per-destination-channel credentials
pub struct SessionProvider {
    config: UploadConfig,
    client: reqwest::Client,
}

impl SessionProvider {
    pub fn new(config: UploadConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    fn token_path(&self, channel: &str) -> PathBuf {
        PathBuf::from(&self.config.tokens_dir).join(format!("{}.json", channel))
    }

    /// Return a valid session for the channel, refreshing the stored access
    /// token through the OAuth token endpoint when it is about to expire.
    pub async fn authenticate(&self, channel: &str) -> Result<SessionHandle> {
        let token_path = self.token_path(channel);
        if !token_path.exists() {
            return Err(RetubeError::Auth(format!(
                "No stored credentials for channel '{}'; complete the OAuth flow and place the token file at {}",
                channel,
                token_path.display()
            )));
        }

        let content = std::fs::read_to_string(&token_path)?;
        let mut credentials: StoredCredentials = serde_json::from_str(&content)?;

        if needs_refresh(credentials.expires_at, Utc::now()) {
            info!("Access token for channel '{}' expiring soon, refreshing", channel);
            credentials = self.refresh(&credentials).await?;

            let serialized = serde_json::to_string_pretty(&credentials)?;
            std::fs::write(&token_path, serialized)?;
        }

        Ok(SessionHandle {
            channel: channel.to_string(),
            access_token: credentials.access_token,
        })
    }

    /// List channels with stored credentials
    pub fn list_channels(&self) -> Result<Vec<String>> {
        let mut channels = Vec::new();

        let entries = match std::fs::read_dir(&self.config.tokens_dir) {
            Ok(entries) => entries,
            Err(_) => return Ok(channels),
        };

        for entry in entries.filter_map(|e| e.ok()) {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("json") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    channels.push(stem.to_string());
                }
            }
        }

        channels.sort();
        Ok(channels)
    }

    async fn refresh(&self, credentials: &StoredCredentials) -> Result<StoredCredentials> {
        let refresh_token = credentials.refresh_token.as_deref().ok_or_else(|| {
            RetubeError::Auth("Access token expired and no refresh token is stored".to_string())
        })?;

        let secret_content = std::fs::read_to_string(&self.config.client_secret_file)
            .map_err(|e| RetubeError::Auth(format!("Failed to read client secret file: {}", e)))?;
        let secret: ClientSecretFile = serde_json::from_str(&secret_content)
            .map_err(|e| RetubeError::Auth(format!("Failed to parse client secret file: {}", e)))?;

        let response = self
            .client
            .post(&self.config.token_endpoint)
            .form(&[
                ("client_id", secret.installed.client_id.as_str()),
                ("client_secret", secret.installed.client_secret.as_str()),
                ("refresh_token", refresh_token),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(RetubeError::Auth(format!(
                "Token refresh failed {}: {}",
                status, error_text
            )));
        }

        let refreshed: RefreshResponse = response.json().await?;

        Ok(StoredCredentials {
            access_token: refreshed.access_token,
            refresh_token: credentials.refresh_token.clone(),
            expires_at: Some(Utc::now() + Duration::seconds(refreshed.expires_in)),
        })
    }
}

/// A token with no recorded expiry is assumed valid until the API rejects it
fn needs_refresh(expires_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    match expires_at {
        Some(expiry) => expiry < now + Duration::minutes(REFRESH_MARGIN_MINUTES),
        None => false,
    }
}
