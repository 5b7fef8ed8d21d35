//! Exclusive lock on the config directory for the duration of a transfer.
//!
//! Two transfers sharing a config directory would interleave job records and
//! create the same destination albums twice.

use std::fs::File;
use std::path::Path;

use anyhow::Context;
use fs4::fs_std::FileExt;

const LOCK_FILE: &str = "transfer.lock";

/// Held for as long as the transfer runs; the OS releases the lock when the
/// file handle is dropped.
#[derive(Debug)]
pub struct TransferLock {
    _file: File,
}

impl TransferLock {
    pub async fn acquire(config_dir: &Path) -> anyhow::Result<Self> {
        let dir = config_dir.to_path_buf();
        let lock_path = config_dir.join(LOCK_FILE);

        let file = tokio::task::spawn_blocking(move || {
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("Failed to create config directory: {}", dir.display()))?;
            let file = File::create(&lock_path)
                .with_context(|| format!("Failed to create lock file: {}", lock_path.display()))?;
            check_acquired(FileExt::try_lock_exclusive(&file), &lock_path)?;
            Ok::<File, anyhow::Error>(file)
        })
        .await??;

        tracing::debug!("Acquired transfer lock in {}", config_dir.display());
        Ok(Self { _file: file })
    }
}

/// `Ok(false)` means another process holds the lock; an I/O error is
/// reported as such.
fn check_acquired(result: std::io::Result<bool>, lock_path: &Path) -> anyhow::Result<()> {
    let acquired = result
        .with_context(|| format!("Failed to lock {}", lock_path.display()))?;
    if !acquired {
        anyhow::bail!(
            "Another transfer is already running with this config directory (lock: {})",
            lock_path.display()
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_second_acquire_fails_while_held() {
        let dir = tempfile::tempdir().unwrap();
        let first = TransferLock::acquire(dir.path()).await.unwrap();
        assert!(dir.path().join(LOCK_FILE).exists());

        let err = TransferLock::acquire(dir.path()).await.unwrap_err();
        assert!(err.to_string().contains("Another transfer"));

        drop(first);
        TransferLock::acquire(dir.path()).await.unwrap();
    }

    #[test]
    fn test_lock_io_error_is_not_reported_as_contention() {
        let path = Path::new("/cfg/transfer.lock");
        let err = check_acquired(
            Err(std::io::Error::new(std::io::ErrorKind::Unsupported, "no locking")),
            path,
        )
        .unwrap_err();
        let message = format!("{err:#}");
        assert!(message.contains("Failed to lock /cfg/transfer.lock"), "{message}");
        assert!(message.contains("no locking"), "{message}");
        assert!(!message.contains("Another transfer"), "{message}");

        assert!(check_acquired(Ok(false), path)
            .unwrap_err()
            .to_string()
            .contains("Another transfer"));
        assert!(check_acquired(Ok(true), path).is_ok());
    }

    #[tokio::test]
    async fn test_creates_missing_config_dir() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        TransferLock::acquire(&nested).await.unwrap();
        assert!(nested.join(LOCK_FILE).exists());
    }
}
