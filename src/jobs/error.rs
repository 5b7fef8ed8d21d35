//! Error types for job tracking.

use std::path::PathBuf;

use thiserror::Error;

use super::types::JobStatus;

#[derive(Error, Debug)]
pub enum JobError {
    #[error("Job not found: {0}")]
    NotFound(String),

    /// A status change the job lifecycle does not allow.
    #[error("Illegal job status transition: {from} -> {to}")]
    IllegalTransition { from: JobStatus, to: JobStatus },

    #[error("Failed to access job file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid job file {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
}
