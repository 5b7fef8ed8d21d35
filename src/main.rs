//! flickr-to-gphotos: migrate Flickr albums into Google Photos.
//!
//! Reads a Flickr account export (album and photo JSON plus the original
//! media files) and recreates each album in Google Photos: one album per
//! source album, photos uploaded in batches with their title and
//! description, album membership added once all uploads are done. Progress
//! is recorded per album as a job file so interrupted runs can be inspected.

#![warn(clippy::all)]

mod auth;
mod cli;
mod config;
mod destination;
mod jobs;
mod lock;
pub mod retry;
mod shutdown;
mod source;
mod transfer;
mod types;

use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::Parser;
use tracing_subscriber::EnvFilter;

use auth::{Authenticator, CredentialStore};
use cli::Command;
use config::{Config, TransferConfig};
use destination::GooglePhotosClient;
use jobs::{JobTracker, JsonJobTracker};
use source::ExportCatalog;
use transfer::{AlbumReport, TransferError, TransferOrchestrator};

fn format_duration(d: Duration) -> String {
    let total_secs = d.as_secs();
    let hours = total_secs / 3600;
    let mins = (total_secs % 3600) / 60;
    let secs = total_secs % 60;

    if hours > 0 {
        format!("{}h {:02}m {:02}s", hours, mins, secs)
    } else if mins > 0 {
        format!("{}m {:02}s", mins, secs)
    } else {
        format!("{}s", secs)
    }
}

async fn run_setup(config: &Config, args: cli::SetupArgs) -> anyhow::Result<()> {
    let store = CredentialStore::new(config.config_dir());
    auth::setup(&store, args.client_id, args.client_secret).await?;
    println!("Next, run `flickr-to-gphotos authenticate` to authorize access.");
    Ok(())
}

async fn run_authenticate(config: &Config, args: cli::AuthenticateArgs) -> anyhow::Result<()> {
    let store = CredentialStore::new(config.config_dir());
    auth::authenticate(&store, Duration::from_secs(args.timeout)).await
}

async fn run_list_albums(config: &Config, args: cli::ListAlbumsArgs) -> anyhow::Result<()> {
    let data_dir = config::expand_tilde(&args.data_dir);
    let catalog = Arc::new(ExportCatalog::open(&data_dir).await?);
    // Token loading is lazy; listing never touches the destination.
    let tokens = Arc::new(Authenticator::new(CredentialStore::new(config.config_dir())));
    let destination = Arc::new(GooglePhotosClient::new(tokens, retry::RetryConfig::none()));
    let orchestrator = TransferOrchestrator::new(catalog, destination);

    let albums = orchestrator.list_albums().await?;
    if albums.is_empty() {
        println!("No albums found in {}", data_dir.display());
        return Ok(());
    }

    println!("Albums:");
    for album in &albums {
        if album.photo_count == album.photos.len() {
            println!("  {}  {} ({} photos)", album.id, album.title, album.photo_count);
        } else {
            println!(
                "  {}  {} ({} photos, {} in export)",
                album.id,
                album.title,
                album.photo_count,
                album.photos.len()
            );
        }
    }
    println!();
    println!("{} album(s)", albums.len());
    Ok(())
}

fn log_summary(reports: &[AlbumReport], dry_run: bool, elapsed: Duration) {
    if dry_run {
        tracing::info!("── Dry Run Summary ──");
        for r in reports {
            tracing::info!(
                "  {}: {} photos would be transferred",
                r.title,
                r.would_transfer
            );
        }
    } else {
        tracing::info!("── Summary ──");
        for r in reports {
            tracing::info!(
                "  {} ({}): {} uploaded, {} added to album {}, {} failed, {} processed in {} batch(es)",
                r.title,
                r.album_id,
                r.uploaded,
                r.unique,
                r.destination_album_id,
                r.failed,
                r.processed,
                r.chunks
            );
        }
    }
    let processed: usize = reports.iter().map(|r| r.processed).sum();
    let failed: usize = reports.iter().map(|r| r.failed).sum();
    tracing::info!(
        "  {} album(s), {} photos, {} failed",
        reports.len(),
        processed,
        failed
    );
    tracing::info!("  elapsed: {}", format_duration(elapsed));
    if failed > 0 {
        tracing::warn!("{} photo(s) failed to transfer; see the errors above", failed);
    }
}

async fn run_transfer(config: &Config, args: cli::TransferArgs) -> anyhow::Result<()> {
    let TransferConfig { options, retry } = TransferConfig::from_args(args)?;
    let _lock = lock::TransferLock::acquire(config.config_dir()).await?;

    let authenticator = Arc::new(Authenticator::new(CredentialStore::new(
        config.config_dir(),
    )));
    if !options.dry_run {
        authenticator.ensure_ready().await.map_err(|e| {
            anyhow::anyhow!("{e}\nRun `flickr-to-gphotos setup` and `flickr-to-gphotos authenticate` first.")
        })?;
    }

    let catalog = Arc::new(ExportCatalog::open(&options.data_dir).await?);
    let destination = Arc::new(GooglePhotosClient::new(authenticator, retry));
    let tracker: Arc<dyn JobTracker> = Arc::new(JsonJobTracker::new(&config.jobs_dir()));
    let shutdown_token = shutdown::install_signal_handler();

    let orchestrator = TransferOrchestrator::new(catalog, destination)
        .with_job_tracker(tracker)
        .with_progress_bar(!config.no_progress_bar)
        .with_shutdown(shutdown_token);

    let started = Instant::now();
    match orchestrator.transfer_albums(&options).await {
        Ok(reports) => {
            log_summary(&reports, options.dry_run, started.elapsed());
            Ok(())
        }
        Err(TransferError::Interrupted { completed }) => {
            tracing::info!("Transfer interrupted; job records keep the last completed batch");
            if !completed.is_empty() {
                log_summary(&completed, options.dry_run, started.elapsed());
            }
            tracing::info!("Run `flickr-to-gphotos status` to see progress");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

async fn run_status(config: &Config, args: cli::StatusArgs) -> anyhow::Result<()> {
    let tracker = JsonJobTracker::new(&config.jobs_dir());

    if let Some(id) = args.job_id {
        let job = tracker.get(&id).await?;
        println!("Job:        {}", job.id);
        println!("Status:     {}", job.status);
        println!("Album:      {} ({})", job.album_title, job.album_id);
        println!("Progress:   {}/{}", job.processed_photos, job.total_photos);
        println!(
            "Started:    {}",
            job.start_time.format("%Y-%m-%d %H:%M:%S UTC")
        );
        if let Some(end) = job.end_time {
            println!("Finished:   {}", end.format("%Y-%m-%d %H:%M:%S UTC"));
        }
        if let Some(error) = &job.error {
            println!("Error:      {}", error);
        }
        if !job.status.is_terminal() {
            println!();
            println!(
                "Not finished; re-run `flickr-to-gphotos transfer --album {}` to transfer it again.",
                job.album_id
            );
        }
        return Ok(());
    }

    let jobs = tracker.list().await?;
    if jobs.is_empty() {
        println!("No transfer jobs found in {}", tracker.dir().display());
        return Ok(());
    }
    println!("Transfer jobs:");
    for job in &jobs {
        println!(
            "  {}  {:<11}  {}/{}  {}  {}",
            job.start_time.format("%Y-%m-%d %H:%M:%S"),
            job.status.as_str(),
            job.processed_photos,
            job.total_photos,
            job.album_title,
            job.id
        );
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(cli.log_level.as_filter())),
        )
        .init();

    let config = Config::new(&cli.config_dir, cli.no_progress_bar);
    tracing::debug!("Using config directory {}", config.config_dir().display());

    match cli.command {
        Command::Setup(args) => run_setup(&config, args).await,
        Command::Authenticate(args) => run_authenticate(&config, args).await,
        Command::ListAlbums(args) => run_list_albums(&config, args).await,
        Command::Transfer(args) => run_transfer(&config, args).await,
        Command::Status(args) => run_status(&config, args).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_secs(42)), "42s");
        assert_eq!(format_duration(Duration::from_secs(125)), "2m 05s");
        assert_eq!(format_duration(Duration::from_secs(3723)), "1h 02m 03s");
    }
}
