use async_trait::async_trait;
use serde::Deserialize;
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt, SeekFrom};
use tracing::{debug, info, warn};

use crate::auth::SessionHandle;
use crate::config::UploadConfig;
use crate::error::{Result, RetubeError};
use super::{UploadBody, UploadService};

/// HTTP 308 as used by the resumable protocol to acknowledge a partial chunk
const RESUME_INCOMPLETE: u16 = 308;

/// Videos resource returned once the transfer completes
#[derive(Debug, Deserialize)]
struct UploadedVideo {
    id: String,
}

/// Server-side state of a resumable session, as reported by a
/// `Content-Range: bytes */total` probe
#[derive(Debug, Clone, PartialEq, Eq)]
enum SessionState {
    /// The transfer already finished; the video resource was in the probe
    /// response
    Completed(String),
    /// Bytes committed so far; resume sending from this offset
    Incomplete(u64),
}

/// Upload adapter for the YouTube Data API v3.
///
/// Uses the two-step resumable protocol: an initiation request carrying the
/// metadata body returns a session URI in the `Location` header, then the
/// media bytes are sent in chunks with `Content-Range` headers. After a
/// transient failure the session is probed for the committed offset so
/// already transferred bytes are never re-sent — and a probe may discover
/// the upload in fact completed (the final chunk's response was lost), in
/// which case the video id from the probe response is used.
pub struct YouTubeUploader {
    config: UploadConfig,
    client: reqwest::Client,
}

impl YouTubeUploader {
    pub fn new(config: UploadConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    async fn initiate(
        &self,
        session: &SessionHandle,
        body: &UploadBody,
        file_size: u64,
    ) -> Result<String> {
        let url = format!(
            "{}/videos?uploadType=resumable&part=snippet,status",
            self.config.upload_endpoint
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(&session.access_token)
            .header("X-Upload-Content-Type", "video/mp4")
            .header("X-Upload-Content-Length", file_size.to_string())
            .json(&body.to_json())
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(RetubeError::Upload(format!(
                "Upload initiation failed {}: {}",
                status, error_text
            )));
        }

        response
            .headers()
            .get(reqwest::header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string())
            .ok_or_else(|| {
                RetubeError::Upload(
                    "No Location header in upload initiation response".to_string(),
                )
            })
    }

    /// Ask the server for the state of this session. A success status here
    /// means the transfer already completed and the body carries the video
    /// resource.
    async fn probe_session(&self, session_uri: &str, file_size: u64) -> Result<SessionState> {
        let response = self
            .client
            .put(session_uri)
            .header(reqwest::header::CONTENT_RANGE, format!("bytes */{}", file_size))
            .header(reqwest::header::CONTENT_LENGTH, "0")
            .send()
            .await?;

        let status = response.status().as_u16();
        let range = response
            .headers()
            .get(reqwest::header::RANGE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string());
        let body = response.text().await.unwrap_or_default();

        interpret_probe(status, range.as_deref(), &body)
    }

    async fn read_chunk(&self, file: &mut File, offset: u64, len: usize) -> Result<Vec<u8>> {
        file.seek(SeekFrom::Start(offset)).await?;
        let mut buffer = vec![0u8; len];
        file.read_exact(&mut buffer).await?;
        Ok(buffer)
    }

    async fn transfer(
        &self,
        session_uri: &str,
        media_file: &Path,
        file_size: u64,
    ) -> Result<String> {
        let mut file = File::open(media_file).await?;
        let mut offset: u64 = 0;
        let mut attempts: u32 = 0;

        loop {
            // All bytes committed but no completion response seen yet; only
            // the probe can produce the video id from here
            if offset >= file_size {
                attempts += 1;
                if attempts > self.config.max_retries {
                    return Err(RetubeError::Upload(
                        "Session reports all bytes committed but no video resource".to_string(),
                    ));
                }
                match self.probe_session(session_uri, file_size).await? {
                    SessionState::Completed(id) => return Ok(id),
                    SessionState::Incomplete(committed) if committed < file_size => {
                        offset = committed;
                    }
                    SessionState::Incomplete(_) => continue,
                }
                continue;
            }

            let chunk_len = (file_size - offset).min(self.config.chunk_size) as usize;
            let chunk = self.read_chunk(&mut file, offset, chunk_len).await?;
            let range_end = offset + chunk_len as u64 - 1;

            debug!("Uploading bytes {}-{}/{}", offset, range_end, file_size);

            let send_result = self
                .client
                .put(session_uri)
                .header(
                    reqwest::header::CONTENT_RANGE,
                    format!("bytes {}-{}/{}", offset, range_end, file_size),
                )
                .body(chunk)
                .send()
                .await;

            match send_result {
                Ok(response) if response.status().as_u16() == RESUME_INCOMPLETE => {
                    let range = response
                        .headers()
                        .get(reqwest::header::RANGE)
                        .and_then(|v| v.to_str().ok());
                    offset = next_offset(range, offset, chunk_len as u64);
                    attempts = 0;
                }
                Ok(response) if response.status().is_success() => {
                    let uploaded: UploadedVideo = response.json().await.map_err(|e| {
                        RetubeError::Upload(format!("Could not parse upload response: {}", e))
                    })?;
                    return Ok(uploaded.id);
                }
                Ok(response) => {
                    let status = response.status();
                    let error_text = response.text().await.unwrap_or_default();
                    attempts += 1;
                    if attempts > self.config.max_retries {
                        return Err(RetubeError::Upload(format!(
                            "Transfer failed {}: {}",
                            status, error_text
                        )));
                    }
                    warn!("Chunk rejected ({}), probing session state", status);
                    match self.probe_session(session_uri, file_size).await? {
                        SessionState::Completed(id) => return Ok(id),
                        SessionState::Incomplete(committed) => offset = committed,
                    }
                }
                Err(e) => {
                    attempts += 1;
                    if attempts > self.config.max_retries {
                        return Err(RetubeError::Upload(format!("Transfer failed: {}", e)));
                    }
                    warn!("Chunk transfer error ({}), probing session state", e);
                    match self.probe_session(session_uri, file_size).await? {
                        SessionState::Completed(id) => return Ok(id),
                        SessionState::Incomplete(committed) => offset = committed,
                    }
                }
            }
        }
    }
}

#[async_trait]
impl UploadService for YouTubeUploader {
    async fn upload(
        &self,
        session: &SessionHandle,
        media_file: &Path,
        body: &UploadBody,
    ) -> Result<String> {
        let file_size = tokio::fs::metadata(media_file).await?.len();
        if file_size == 0 {
            return Err(RetubeError::Upload(format!(
                "Media file is empty: {}",
                media_file.display()
            )));
        }
        info!(
            "Uploading {} ({} bytes) as '{}' to channel '{}'",
            media_file.display(),
            file_size,
            body.title,
            session.channel
        );

        let session_uri = self.initiate(session, body, file_size).await?;
        let video_id = self.transfer(&session_uri, media_file, file_size).await?;

        info!("Upload complete: https://www.youtube.com/watch?v={}", video_id);
        Ok(video_id)
    }

    async fn attach_thumbnail(
        &self,
        session: &SessionHandle,
        remote_video_id: &str,
        thumbnail_file: &Path,
    ) -> Result<()> {
        let url = format!(
            "{}/thumbnails/set?videoId={}&uploadType=media",
            self.config.upload_endpoint, remote_video_id
        );

        let bytes = tokio::fs::read(thumbnail_file).await?;
        let response = self
            .client
            .post(&url)
            .bearer_auth(&session.access_token)
            .header(reqwest::header::CONTENT_TYPE, thumbnail_content_type(thumbnail_file))
            .body(bytes)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(RetubeError::Upload(format!(
                "Thumbnail set failed {}: {}",
                status, error_text
            )));
        }

        info!("Thumbnail attached to video {}", remote_video_id);
        Ok(())
    }
}

/// Interpret a session probe response: 308 means resume from the committed
/// offset, success means the transfer already finished and the body is the
/// video resource.
fn interpret_probe(status: u16, range: Option<&str>, body: &str) -> Result<SessionState> {
    if status == RESUME_INCOMPLETE {
        return Ok(SessionState::Incomplete(committed_offset(range).unwrap_or(0)));
    }

    if (200..300).contains(&status) {
        let uploaded: UploadedVideo = serde_json::from_str(body).map_err(|e| {
            RetubeError::Upload(format!(
                "Upload completed but the response could not be parsed: {}",
                e
            ))
        })?;
        return Ok(SessionState::Completed(uploaded.id));
    }

    Err(RetubeError::Upload(format!(
        "Session probe failed {}: {}",
        status, body
    )))
}

/// Next offset after a 308 chunk acknowledgement. The server-reported
/// committed range is authoritative; only when the header is absent is the
/// whole chunk assumed committed.
fn next_offset(range: Option<&str>, offset: u64, chunk_len: u64) -> u64 {
    committed_offset(range).unwrap_or(offset + chunk_len)
}

/// Parse a `Range: bytes=0-N` response header into the next byte offset
fn committed_offset(range: Option<&str>) -> Option<u64> {
    range
        .and_then(|r| r.rsplit('-').next())
        .and_then(|end| end.parse::<u64>().ok())
        .map(|end| end + 1)
}

fn thumbnail_content_type(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()).map(|e| e.to_lowercase()) {
        Some(ext) if ext == "png" => "image/png",
        Some(ext) if ext == "webp" => "image/webp",
        _ => "image/jpeg",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_committed_offset_parsing() {
        assert_eq!(committed_offset(Some("bytes=0-999")), Some(1000));
        assert_eq!(committed_offset(Some("bytes=0-0")), Some(1));
        assert_eq!(committed_offset(None), None);
        assert_eq!(committed_offset(Some("garbage")), None);
    }

    #[test]
    fn test_next_offset_prefers_server_range() {
        // Partial commit: the server only took the first 100 bytes of a
        // 512-byte chunk, so the resend starts at 100
        assert_eq!(next_offset(Some("bytes=0-99"), 0, 512), 100);
        assert_eq!(next_offset(None, 100, 512), 612);
    }

    #[test]
    fn test_probe_resume_reports_committed_offset() {
        let state = interpret_probe(308, Some("bytes=0-499"), "").unwrap();
        assert_eq!(state, SessionState::Incomplete(500));
    }

    #[test]
    fn test_probe_without_range_restarts_from_zero() {
        let state = interpret_probe(308, None, "").unwrap();
        assert_eq!(state, SessionState::Incomplete(0));
    }

    #[test]
    fn test_probe_success_carries_video_id() {
        // The final chunk's response was lost; the probe finds the finished
        // session and must yield the id, not an offset
        let state = interpret_probe(200, None, r#"{"id":"vid-123"}"#).unwrap();
        assert_eq!(state, SessionState::Completed("vid-123".to_string()));
    }

    #[test]
    fn test_probe_success_without_resource_is_an_error() {
        assert!(matches!(
            interpret_probe(201, None, "not json"),
            Err(RetubeError::Upload(_))
        ));
    }

    #[test]
    fn test_probe_failure_status_is_an_error() {
        assert!(matches!(
            interpret_probe(404, None, "session expired"),
            Err(RetubeError::Upload(_))
        ));
    }

    #[test]
    fn test_thumbnail_content_type() {
        assert_eq!(thumbnail_content_type(Path::new("a.png")), "image/png");
        assert_eq!(thumbnail_content_type(Path::new("a.webp")), "image/webp");
        assert_eq!(thumbnail_content_type(Path::new("a.jpg")), "image/jpeg");
        assert_eq!(thumbnail_content_type(Path::new("a")), "image/jpeg");
    }
}
