use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cli::TransferArgs;
use crate::retry::RetryConfig;
use crate::transfer::TransferOptions;

/// Expand a leading `~/` to the user's home directory.
pub fn expand_tilde(path: &str) -> PathBuf {
    if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

/// Paths derived from `--config-dir`.
#[derive(Debug, Clone)]
pub struct Config {
    pub config_dir: PathBuf,
    pub no_progress_bar: bool,
}

impl Config {
    pub fn new(config_dir: &str, no_progress_bar: bool) -> Self {
        Self {
            config_dir: expand_tilde(config_dir),
            no_progress_bar,
        }
    }

    pub fn jobs_dir(&self) -> PathBuf {
        self.config_dir.join("jobs")
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }
}

/// Resolved settings for the `transfer` command.
#[derive(Debug, Clone)]
pub struct TransferConfig {
    pub options: TransferOptions,
    pub retry: RetryConfig,
}

impl TransferConfig {
    pub fn from_args(args: TransferArgs) -> anyhow::Result<Self> {
        let batch_size = usize::try_from(args.batch_size)
            .ok()
            .and_then(NonZeroUsize::new)
            .ok_or_else(|| anyhow::anyhow!("--batch-size must be at least 1"))?;

        Ok(Self {
            options: TransferOptions {
                album_id: args.album,
                dry_run: args.dry_run,
                batch_size,
                sleep_between_batches: Duration::from_millis(args.sleep_time_between_batches),
                data_dir: expand_tilde(&args.data_dir),
            },
            retry: RetryConfig {
                max_retries: args.max_retries,
                base_delay_secs: args.retry_delay,
                ..RetryConfig::default()
            },
        })
    }
}
