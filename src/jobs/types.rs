//! Types for the job tracking module.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::JobError;

/// Lifecycle state of a transfer job.
///
/// `pending → in_progress → {completed | failed}`. A pending job may also
/// finish directly (an album with no photos, or a failure before the first
/// chunk). Terminal states are final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Validate a move to `next`, returning the new status.
    ///
    /// `in_progress → in_progress` is allowed so that each chunk can record
    /// progress without changing state.
    pub fn transition(self, next: JobStatus) -> Result<JobStatus, JobError> {
        use JobStatus::*;
        match (self, next) {
            (Pending, InProgress)
            | (InProgress, InProgress)
            | (Pending | InProgress, Completed)
            | (Pending | InProgress, Failed) => Ok(next),
            _ => Err(JobError::IllegalTransition {
                from: self,
                to: next,
            }),
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Durable record of one album's transfer progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferJob {
    pub id: String,
    pub status: JobStatus,
    pub album_id: String,
    pub album_title: String,
    pub total_photos: usize,
    /// Photos run through the batch processor so far, failed ones included.
    pub processed_photos: usize,
    pub start_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TransferJob {
    /// Create a pending job with id `job_<unix millis>_<albumId>`.
    pub fn new(album_id: &str, album_title: &str, total_photos: usize, now: DateTime<Utc>) -> Self {
        Self {
            id: format!("job_{}_{}", now.timestamp_millis(), album_id),
            status: JobStatus::Pending,
            album_id: album_id.to_string(),
            album_title: album_title.to_string(),
            total_photos,
            processed_photos: 0,
            start_time: now,
            end_time: None,
            error: None,
        }
    }

    /// Record that photos up to (exclusive) `chunk_end` have been processed.
    pub fn record_progress(&mut self, chunk_end: usize) -> Result<(), JobError> {
        self.status = self.status.transition(JobStatus::InProgress)?;
        self.processed_photos = self
            .processed_photos
            .max(chunk_end.min(self.total_photos));
        Ok(())
    }

    pub fn complete(&mut self, now: DateTime<Utc>) -> Result<(), JobError> {
        self.status = self.status.transition(JobStatus::Completed)?;
        self.end_time = Some(now);
        Ok(())
    }

    pub fn fail(&mut self, error: &str, now: DateTime<Utc>) -> Result<(), JobError> {
        self.status = self.status.transition(JobStatus::Failed)?;
        self.end_time = Some(now);
        self.error = Some(error.to_string());
        Ok(())
    }
}
