use thiserror::Error;

use crate::auth::AuthError;

/// Typed destination errors enabling retry classification.
#[derive(Debug, Error)]
pub enum DestinationError {
    #[error("{operation} failed with HTTP {status}: {message}")]
    Api {
        operation: &'static str,
        status: u16,
        message: String,
    },

    #[error("Upload of {filename} was rejected: {message}")]
    ItemRejected { filename: String, message: String },

    #[error("{operation} response is missing {field}")]
    MissingField {
        operation: &'static str,
        field: &'static str,
    },

    #[error("At most {max} photos can be added to an album per call, got {got}")]
    BatchTooLarge { max: usize, got: usize },

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

impl DestinationError {
    /// Whether this error is transient and worth retrying.
    ///
    /// Rate limiting (429) and server errors are transient; so are transport
    /// failures that never reached the server. Rejections, auth problems and
    /// contract violations are permanent.
    pub fn is_retryable(&self) -> bool {
        match self {
            DestinationError::Api { status, .. } => *status == 429 || *status >= 500,
            DestinationError::Http(e) => e.is_timeout() || e.is_connect(),
            DestinationError::ItemRejected { .. }
            | DestinationError::MissingField { .. }
            | DestinationError::BatchTooLarge { .. }
            | DestinationError::Auth(_) => false,
        }
    }
}
