use std::path::PathBuf;

use thiserror::Error;

/// Errors from the OAuth flow and the on-disk credential store.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("OAuth client credentials not found at {0}; run `setup` first")]
    NotConfigured(PathBuf),

    #[error("Not authenticated; run `authenticate` first")]
    NotAuthenticated,

    #[error("Stored token has no refresh token; run `authenticate` again")]
    NoRefreshToken,

    #[error("Authorization was denied: {0}")]
    Denied(String),

    #[error("OAuth state mismatch in redirect; possible forged callback")]
    StateMismatch,

    #[error("Timed out after {0}s waiting for the authorization redirect")]
    Timeout(u64),

    #[error("Token endpoint error (HTTP {status}): {message}")]
    TokenEndpoint { status: u16, message: String },

    #[error("Invalid credentials file {path}: {source}")]
    InvalidFile {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
