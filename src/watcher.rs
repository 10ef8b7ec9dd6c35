use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::WatcherConfig;
use crate::downloader::Downloader;
use crate::error::{Result, RetubeError};
use crate::pipeline::VideoImporter;
use crate::state::ChannelStateStore;

/// What one reconciliation pass did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassOutcome {
    /// Tracking target not configured; nothing was checked
    NotReady,
    Completed { candidates: usize, imported: usize },
}

/// The reconciliation loop: list the source channel, compute the set of
/// videos not yet uploaded, drive each one through the import pipeline and
/// persist the tracking record.
///
/// Uploads within a pass run sequentially; there is exactly one writer of
/// the tracking record.
pub struct Watcher {
    store: ChannelStateStore,
    downloader: Arc<dyn Downloader>,
    importer: Arc<dyn VideoImporter>,
    config: WatcherConfig,
}

impl Watcher {
    pub fn new(
        store: ChannelStateStore,
        downloader: Arc<dyn Downloader>,
        importer: Arc<dyn VideoImporter>,
        config: WatcherConfig,
    ) -> Self {
        Self {
            store,
            downloader,
            importer,
            config,
        }
    }

    /// Run passes until the cancellation token fires. Transient pass
    /// failures are logged and retried on the next interval; a state
    /// persistence failure stops the loop since continuing would risk
    /// duplicate uploads.
    pub async fn run(&self, cancel: CancellationToken) -> Result<()> {
        info!(
            "Reconciliation loop started (interval {}s, not-ready backoff {}s)",
            self.config.pass_interval_secs, self.config.not_ready_backoff_secs
        );

        loop {
            let wait = match self.run_pass().await {
                Ok(PassOutcome::NotReady) => {
                    debug!("Tracking target not configured, idling");
                    Duration::from_secs(self.config.not_ready_backoff_secs)
                }
                Ok(PassOutcome::Completed { candidates, imported }) => {
                    debug!("Pass complete: {} candidates, {} imported", candidates, imported);
                    Duration::from_secs(self.config.pass_interval_secs)
                }
                Err(e @ RetubeError::State(_)) => {
                    error!("State persistence failed, stopping reconciliation loop: {}", e);
                    return Err(e);
                }
                Err(e) => {
                    warn!("Reconciliation pass failed, retrying next interval: {}", e);
                    Duration::from_secs(self.config.pass_interval_secs)
                }
            };

            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Shutdown requested, stopping reconciliation loop");
                    return Ok(());
                }
                _ = tokio::time::sleep(wait) => {}
            }
        }
    }

    /// One list-compare-upload-persist pass
    pub async fn run_pass(&self) -> Result<PassOutcome> {
        let mut record = self.store.load()?;

        let (Some(source_channel), Some(cutoff)) =
            (record.source_channel.clone(), record.cutoff_date)
        else {
            return Ok(PassOutcome::NotReady);
        };

        // An empty listing means no candidates, not an error
        let listed = self.downloader.list(&source_channel, cutoff).await?;

        let mut missing: Vec<_> = listed
            .into_iter()
            .filter(|video| !record.uploaded_video_ids.contains(&video.video_id))
            .collect();
        // Stable iteration order across passes
        missing.sort_by(|a, b| a.video_id.cmp(&b.video_id));

        let candidates = missing.len();
        if candidates > 0 {
            info!("Found {} new videos on {}", candidates, source_channel);
        }

        let mut imported = 0;
        for video in &missing {
            match self.importer.import(&video.url).await {
                Ok(result) => {
                    record.uploaded_video_ids.insert(video.video_id.clone());
                    // Persist immediately so a crash mid-pass cannot cause a
                    // re-upload of this video on the next pass
                    self.store.save(&record)?;
                    imported += 1;
                    info!("Imported {} as {}", video.video_id, result.remote_video_id);
                }
                Err(e) => {
                    // Skipped for this pass only; the id stays out of the
                    // uploaded set so the video is retried next pass
                    warn!("Skipping video {} this pass: {}", video.video_id, e);
                }
            }
        }

        record.last_checked_at = Some(Utc::now());
        self.store.save(&record)?;

        Ok(PassOutcome::Completed { candidates, imported })
    }
}
