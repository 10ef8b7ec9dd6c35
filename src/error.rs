use thiserror::Error;

#[derive(Error, Debug)]
pub enum RetubeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Download failed: {0}")]
    Download(String),

    #[error("Metadata missing after download: {0}")]
    MetadataMissing(String),

    #[error("Upload failed: {0}")]
    Upload(String),

    #[error("Rewrite service failed: {0}")]
    Rewrite(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("State persistence error: {0}")]
    State(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Schedule error: {0}")]
    Schedule(String),
}

pub type Result<T> = std::result::Result<T, RetubeError>;
