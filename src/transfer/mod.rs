//! Album transfer pipeline.
//!
//! For each album, strictly one after another:
//! 1. note an album description the destination cannot store
//! 2. create the destination album (skipped under dry run)
//! 3. run the photos through [`BatchProcessor`] chunk by chunk, recording
//!    job progress after each chunk
//! 4. deduplicate the returned ids and add them to the album in windows of
//!    [`MAX_ALBUM_BATCH`]
//!
//! Photo-level failures are logged and skipped. Album-level failures mark the
//! album's job failed and abort the run.

pub mod batch;
pub mod error;

pub use batch::BatchProcessor;
pub use error::TransferError;

use std::collections::HashSet;
use std::io::IsTerminal;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use tokio_util::sync::CancellationToken;

use crate::destination::{DestinationClient, DestinationPhotoId, MAX_ALBUM_BATCH};
use crate::jobs::{JobTracker, TransferJob};
use crate::source::{Album, SourceCatalog};

/// Destination album id used when nothing is actually created.
pub const DRY_RUN_ALBUM_ID: &str = "dry_run_album_id";

#[derive(Debug, Clone)]
pub struct TransferOptions {
    /// Transfer only this album; all albums when `None`.
    pub album_id: Option<String>,
    pub dry_run: bool,
    pub batch_size: NonZeroUsize,
    pub sleep_between_batches: Duration,
    pub data_dir: PathBuf,
}

impl Default for TransferOptions {
    fn default() -> Self {
        Self {
            album_id: None,
            dry_run: false,
            batch_size: NonZeroUsize::new(10).unwrap_or(NonZeroUsize::MIN),
            sleep_between_batches: Duration::ZERO,
            data_dir: PathBuf::from("./data"),
        }
    }
}

/// Outcome of one album transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlbumReport {
    pub album_id: String,
    pub title: String,
    pub destination_album_id: String,
    pub chunks: usize,
    /// Photos run through the batch processor, failed ones included.
    pub processed: usize,
    /// Destination ids returned, duplicates included.
    pub uploaded: usize,
    /// Distinct ids added to the destination album.
    pub unique: usize,
    pub failed: usize,
    /// Dry-run "would transfer" lines logged.
    pub would_transfer: usize,
}

/// Drop repeated ids, keeping the first occurrence of each.
pub fn dedup_preserving_order(ids: Vec<DestinationPhotoId>) -> Vec<DestinationPhotoId> {
    let mut seen = HashSet::with_capacity(ids.len());
    ids.into_iter().filter(|id| seen.insert(id.clone())).collect()
}

fn create_progress_bar(no_progress_bar: bool, total: u64) -> ProgressBar {
    if no_progress_bar || !std::io::stdout().is_terminal() {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(total);
    let style = ProgressStyle::with_template(
        "[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar())
    .progress_chars("=> ");
    pb.set_style(style);
    pb
}

pub struct TransferOrchestrator {
    source: Arc<dyn SourceCatalog>,
    destination: Arc<dyn DestinationClient>,
    jobs: Option<Arc<dyn JobTracker>>,
    batch: BatchProcessor,
    no_progress_bar: bool,
    shutdown: CancellationToken,
}

impl TransferOrchestrator {
    pub fn new(source: Arc<dyn SourceCatalog>, destination: Arc<dyn DestinationClient>) -> Self {
        Self {
            batch: BatchProcessor::new(source.clone(), destination.clone()),
            source,
            destination,
            jobs: None,
            no_progress_bar: false,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn with_job_tracker(mut self, jobs: Arc<dyn JobTracker>) -> Self {
        self.jobs = Some(jobs);
        self
    }

    pub fn with_progress_bar(mut self, enabled: bool) -> Self {
        self.no_progress_bar = !enabled;
        self
    }

    pub fn with_shutdown(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }

    /// Albums available in the source. Never touches the destination.
    pub async fn list_albums(&self) -> Result<Vec<Album>, TransferError> {
        Ok(self.source.list_albums().await?)
    }

    /// Transfer the selected album, or every album, in order.
    ///
    /// The first album-level error stops the run; albums already transferred
    /// stay transferred. A shutdown request returns
    /// [`TransferError::Interrupted`] carrying the reports of the albums that
    /// finished.
    pub async fn transfer_albums(
        &self,
        options: &TransferOptions,
    ) -> Result<Vec<AlbumReport>, TransferError> {
        let albums = match &options.album_id {
            Some(id) => vec![self.source.get_album_details(id).await?],
            None => self.source.list_albums().await?,
        };
        tracing::info!(
            "Transferring {} album(s){}",
            albums.len(),
            if options.dry_run { " [DRY RUN]" } else { "" }
        );

        let mut reports = Vec::with_capacity(albums.len());
        for album in &albums {
            if self.shutdown.is_cancelled() {
                return Err(TransferError::Interrupted { completed: reports });
            }
            match self.transfer_album(album, options).await {
                Ok(report) => reports.push(report),
                Err(TransferError::Interrupted { .. }) => {
                    return Err(TransferError::Interrupted { completed: reports })
                }
                Err(e) => return Err(e),
            }
        }
        Ok(reports)
    }

    async fn transfer_album(
        &self,
        album: &Album,
        options: &TransferOptions,
    ) -> Result<AlbumReport, TransferError> {
        let total = album.photos.len();
        tracing::info!(album_id = %album.id, "Transferring album \"{}\" ({} photos)", album.title, total);

        if let Some(description) = album.non_empty_description() {
            tracing::info!(
                album_id = %album.id,
                "Album descriptions cannot be set on the destination, not transferring: {}",
                description
            );
        }
        if album.photo_count != total {
            tracing::debug!(
                album_id = %album.id,
                declared = album.photo_count,
                enumerable = total,
                "Declared photo count differs from listed photos"
            );
        }

        let mut job = match &self.jobs {
            Some(tracker) => Some(tracker.create_job(&album.id, &album.title, total).await?),
            None => None,
        };

        let result = self.run_album(album, options, job.as_mut()).await;

        if let (Some(tracker), Some(job)) = (&self.jobs, job.as_mut()) {
            match &result {
                Ok(_) => tracker.complete_job(job).await?,
                // Stays in progress so the last completed chunk is visible.
                Err(TransferError::Interrupted { .. }) => {}
                Err(e) => {
                    if let Err(job_err) = tracker.fail_job(job, &e.to_string()).await {
                        tracing::warn!(job_id = %job.id, "Failed to record job failure: {}", job_err);
                    }
                }
            }
        }
        result
    }

    async fn run_album(
        &self,
        album: &Album,
        options: &TransferOptions,
        mut job: Option<&mut TransferJob>,
    ) -> Result<AlbumReport, TransferError> {
        let destination_album_id = if options.dry_run {
            tracing::info!("[DRY RUN] Would create album \"{}\"", album.title);
            DRY_RUN_ALBUM_ID.to_string()
        } else {
            let created = self.destination.create_album(&album.title).await?;
            tracing::info!(album_id = %album.id, "Created album \"{}\" ({})", created.title, created.id);
            created.id
        };

        let pb = create_progress_bar(self.no_progress_bar, album.photos.len() as u64);
        let mut ids = Vec::with_capacity(album.photos.len());
        let mut chunks = 0;
        let mut processed = 0;
        let mut would_transfer = 0;

        for (index, chunk) in batch::chunks(&album.photos, options.batch_size).enumerate() {
            if index > 0 && !options.sleep_between_batches.is_zero() {
                tokio::select! {
                    _ = tokio::time::sleep(options.sleep_between_batches) => {}
                    _ = self.shutdown.cancelled() => {}
                }
            }
            if self.shutdown.is_cancelled() {
                pb.finish_and_clear();
                tracing::info!(
                    album_id = %album.id,
                    "Shutdown requested, stopping after {} of {} photos",
                    processed,
                    album.photos.len()
                );
                return Err(TransferError::Interrupted {
                    completed: Vec::new(),
                });
            }

            let outcome = self.batch.process_chunk(chunk, options.dry_run, &pb).await;
            ids.extend(outcome.ids);
            would_transfer += outcome.would_transfer;
            processed += chunk.len();
            chunks += 1;

            if let (Some(tracker), Some(job)) = (&self.jobs, job.as_deref_mut()) {
                tracker.record_progress(job, processed).await?;
            }
        }
        pb.finish_and_clear();

        let uploaded = ids.len();
        let unique = dedup_preserving_order(ids);
        if uploaded != unique.len() {
            tracing::debug!(
                album_id = %album.id,
                "{} duplicate upload(s) collapsed by the destination",
                uploaded - unique.len()
            );
        }

        if !options.dry_run && !unique.is_empty() {
            for window in unique.chunks(MAX_ALBUM_BATCH) {
                self.destination
                    .add_photos_to_album(&destination_album_id, window)
                    .await?;
            }
            tracing::debug!(
                album_id = %album.id,
                "Added {} photo(s) to destination album {}",
                unique.len(),
                destination_album_id
            );
        }

        Ok(AlbumReport {
            album_id: album.id.clone(),
            title: album.title.clone(),
            destination_album_id,
            chunks,
            processed,
            uploaded,
            unique: unique.len(),
            failed: processed - uploaded,
            would_transfer,
        })
    }
}
