use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while reading albums and photo content from the source.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Album not found: {0}")]
    AlbumNotFound(String),

    #[error("No content found for photo {0}")]
    PhotoContentNotFound(String),

    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("HTTP error {status} fetching {url}")]
    HttpStatus { status: u16, url: String },

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error("Failed to spawn blocking task: {0}")]
    Spawn(#[from] tokio::task::JoinError),
}

impl SourceError {
    /// Whether the error means the requested item does not exist, as opposed
    /// to a read or transport failure.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            SourceError::AlbumNotFound(_) | SourceError::PhotoContentNotFound(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_classification() {
        assert!(SourceError::AlbumNotFound("1".into()).is_not_found());
        assert!(SourceError::PhotoContentNotFound("2".into()).is_not_found());
        let read = SourceError::Read {
            path: PathBuf::from("albums.json"),
            source: std::io::Error::other("denied"),
        };
        assert!(!read.is_not_found());
    }
}
