use thiserror::Error;

use crate::destination::DestinationError;
use crate::jobs::JobError;
use crate::source::SourceError;

use super::AlbumReport;

/// Album-level failures. Any of these aborts the remaining albums; per-photo
/// failures are logged by the batch processor and never surface here.
#[derive(Error, Debug)]
pub enum TransferError {
    #[error("Source catalog error: {0}")]
    Source(#[from] SourceError),

    #[error("Destination error: {0}")]
    Destination(#[from] DestinationError),

    #[error("Job tracking error: {0}")]
    Job(#[from] JobError),

    /// Shutdown was requested; `completed` holds the albums that finished.
    #[error("Transfer interrupted by shutdown request after {} album(s)", .completed.len())]
    Interrupted { completed: Vec<AlbumReport> },
}
