//! Job tracker trait and its JSON-file implementation.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;

use super::error::JobError;
use super::types::TransferJob;

/// Durable store for [`TransferJob`] records.
///
/// Object-safe so the orchestrator can hold an `Arc<dyn JobTracker>`.
/// The provided methods apply a lifecycle step and persist the result.
#[async_trait]
pub trait JobTracker: Send + Sync {
    /// Write the job, replacing any previous record with the same id.
    async fn save(&self, job: &TransferJob) -> Result<(), JobError>;

    /// Fetch one job by id.
    async fn get(&self, id: &str) -> Result<TransferJob, JobError>;

    /// All jobs, most recently started first.
    async fn list(&self) -> Result<Vec<TransferJob>, JobError>;

    /// Create and persist a pending job for an album transfer.
    async fn create_job(
        &self,
        album_id: &str,
        album_title: &str,
        total_photos: usize,
    ) -> Result<TransferJob, JobError> {
        let job = TransferJob::new(album_id, album_title, total_photos, Utc::now());
        self.save(&job).await?;
        Ok(job)
    }

    async fn record_progress(
        &self,
        job: &mut TransferJob,
        chunk_end: usize,
    ) -> Result<(), JobError> {
        job.record_progress(chunk_end)?;
        self.save(job).await
    }

    async fn complete_job(&self, job: &mut TransferJob) -> Result<(), JobError> {
        job.complete(Utc::now())?;
        self.save(job).await
    }

    async fn fail_job(&self, job: &mut TransferJob, error: &str) -> Result<(), JobError> {
        job.fail(error, Utc::now())?;
        self.save(job).await
    }
}

/// One pretty-printed JSON file per job under a directory.
#[derive(Debug, Clone)]
pub struct JsonJobTracker {
    dir: PathBuf,
}

impl JsonJobTracker {
    pub fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn job_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", file_stem(id)))
    }

    async fn read_job(path: &Path) -> Result<TransferJob, JobError> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| JobError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        serde_json::from_str(&contents).map_err(|source| JobError::Json {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Job ids embed the source album id; keep only filename-safe characters.
fn file_stem(id: &str) -> String {
    id.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[async_trait]
impl JobTracker for JsonJobTracker {
    async fn save(&self, job: &TransferJob) -> Result<(), JobError> {
        let io_err = |path: &Path| {
            let path = path.to_path_buf();
            move |source: std::io::Error| JobError::Io { path, source }
        };

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(io_err(&self.dir))?;

        let path = self.job_path(&job.id);
        let contents = serde_json::to_string_pretty(job).map_err(|source| JobError::Json {
            path: path.clone(),
            source,
        })?;

        // Write then rename so an interrupted run never leaves a torn record.
        let part = path.with_extension("json.part");
        tokio::fs::write(&part, contents)
            .await
            .map_err(io_err(&part))?;
        tokio::fs::rename(&part, &path)
            .await
            .map_err(io_err(&path))?;

        tracing::debug!(
            job_id = %job.id,
            status = %job.status,
            processed = job.processed_photos,
            total = job.total_photos,
            "Saved job"
        );
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<TransferJob, JobError> {
        let path = self.job_path(id);
        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Err(JobError::NotFound(id.to_string()));
        }
        Self::read_job(&path).await
    }

    async fn list(&self) -> Result<Vec<TransferJob>, JobError> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(JobError::Io {
                    path: self.dir.clone(),
                    source,
                })
            }
        };

        let mut jobs = Vec::new();
        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(source) => {
                    return Err(JobError::Io {
                        path: self.dir.clone(),
                        source,
                    })
                }
            };
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match Self::read_job(&path).await {
                Ok(job) => jobs.push(job),
                Err(e) => tracing::warn!("Skipping unreadable job file: {}", e),
            }
        }

        jobs.sort_by(|a, b| b.start_time.cmp(&a.start_time));
        Ok(jobs)
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::types::JobStatus;
    use chrono::DateTime;

    fn job_at(album: &str, secs: i64) -> TransferJob {
        TransferJob::new(album, "title", 4, DateTime::from_timestamp(secs, 0).unwrap())
    }

    #[tokio::test]
    async fn test_save_and_get() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = JsonJobTracker::new(&dir.path().join("jobs"));
        let job = job_at("721", 1_700_000_000);
        tracker.save(&job).await.unwrap();
        assert_eq!(tracker.get(&job.id).await.unwrap(), job);
    }

    #[tokio::test]
    async fn test_file_is_two_space_indented() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = JsonJobTracker::new(dir.path());
        let job = job_at("721", 1_700_000_000);
        tracker.save(&job).await.unwrap();

        let contents =
            std::fs::read_to_string(dir.path().join("job_1700000000000_721.json")).unwrap();
        assert!(contents.starts_with("{\n  \"id\": \"job_1700000000000_721\""));
        assert!(!dir.path().join("job_1700000000000_721.json.part").exists());
    }

    #[tokio::test]
    async fn test_get_missing_job() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = JsonJobTracker::new(dir.path());
        assert!(matches!(
            tracker.get("job_1_x").await.unwrap_err(),
            JobError::NotFound(id) if id == "job_1_x"
        ));
    }

    #[tokio::test]
    async fn test_list_sorted_newest_first_and_skips_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = JsonJobTracker::new(dir.path());
        tracker.save(&job_at("a", 100)).await.unwrap();
        tracker.save(&job_at("c", 300)).await.unwrap();
        tracker.save(&job_at("b", 200)).await.unwrap();
        std::fs::write(dir.path().join("broken.json"), "{").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "hello").unwrap();

        let albums: Vec<String> = tracker
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|j| j.album_id)
            .collect();
        assert_eq!(albums, vec!["c", "b", "a"]);
    }

    #[tokio::test]
    async fn test_list_missing_dir_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = JsonJobTracker::new(&dir.path().join("never-created"));
        assert!(tracker.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_lifecycle_helpers_persist() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = JsonJobTracker::new(dir.path());
        let mut job = tracker.create_job("721", "Holiday", 12).await.unwrap();
        assert_eq!(tracker.get(&job.id).await.unwrap().status, JobStatus::Pending);

        tracker.record_progress(&mut job, 10).await.unwrap();
        let stored = tracker.get(&job.id).await.unwrap();
        assert_eq!(stored.status, JobStatus::InProgress);
        assert_eq!(stored.processed_photos, 10);

        tracker.complete_job(&mut job).await.unwrap();
        let stored = tracker.get(&job.id).await.unwrap();
        assert_eq!(stored.status, JobStatus::Completed);
        assert!(stored.end_time.is_some());
    }

    #[test]
    fn test_file_stem_sanitizes() {
        assert_eq!(file_stem("job_1_72157"), "job_1_72157");
        assert_eq!(file_stem("job_1_../etc"), "job_1____etc");
    }
}
