use clap::{Args, Parser, Subcommand};

use crate::types::LogLevel;

#[derive(Parser, Debug)]
#[command(
    name = "flickr-to-gphotos",
    version,
    about = "Migrate Flickr albums and photo metadata into Google Photos"
)]
pub struct Cli {
    /// Directory holding OAuth credentials, tokens and job records
    #[arg(long, global = true, env = "FLICKR_TO_GPHOTOS_CONFIG_DIR", default_value = "~/.flickr-to-gphotos")]
    pub config_dir: String,

    /// Log level (overridden by RUST_LOG)
    #[arg(long, global = true, value_enum, default_value = "info")]
    pub log_level: LogLevel,

    /// Disable the progress bar
    #[arg(long, global = true)]
    pub no_progress_bar: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Store the Google OAuth client credentials
    Setup(SetupArgs),

    /// Authorize access to Google Photos in the browser
    Authenticate(AuthenticateArgs),

    /// List albums in the Flickr export
    ListAlbums(ListAlbumsArgs),

    /// Transfer albums to Google Photos
    Transfer(TransferArgs),

    /// Show transfer job records
    Status(StatusArgs),
}

#[derive(Args, Debug)]
pub struct SetupArgs {
    /// OAuth client ID (prompted for if omitted)
    #[arg(long, env = "GOOGLE_CLIENT_ID")]
    pub client_id: Option<String>,

    /// OAuth client secret (prompted for if omitted).
    /// Prefer the GOOGLE_CLIENT_SECRET environment variable; arguments are
    /// visible in process listings.
    #[arg(long, env = "GOOGLE_CLIENT_SECRET", hide_env_values = true)]
    pub client_secret: Option<String>,
}

#[derive(Args, Debug)]
pub struct AuthenticateArgs {
    /// Seconds to wait for the browser redirect
    #[arg(long, default_value_t = 300)]
    pub timeout: u64,
}

#[derive(Args, Debug)]
pub struct ListAlbumsArgs {
    /// Flickr export directory
    #[arg(long, default_value = "./data")]
    pub data_dir: String,
}

#[derive(Args, Debug)]
pub struct TransferArgs {
    /// Transfer only this album ID
    #[arg(long)]
    pub album: Option<String>,

    /// Log what would be transferred without touching Google Photos
    #[arg(long)]
    pub dry_run: bool,

    /// Photos per batch
    #[arg(long, default_value_t = 10, value_parser = clap::value_parser!(u64).range(1..))]
    pub batch_size: u64,

    /// Flickr export directory
    #[arg(long, default_value = "./data")]
    pub data_dir: String,

    /// Milliseconds to wait between batches
    #[arg(long, default_value_t = 0)]
    pub sleep_time_between_batches: u64,

    /// Max retries per destination call on transient errors (0 = no retries)
    #[arg(long, default_value_t = 2)]
    pub max_retries: u32,

    /// Initial retry delay in seconds
    #[arg(long, default_value_t = 5)]
    pub retry_delay: u64,
}

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Show a single job in detail
    #[arg(long)]
    pub job_id: Option<String>,
}
