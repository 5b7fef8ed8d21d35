//! Source side of the migration: the album/photo model and the catalog
//! contract the transfer pipeline reads from.

pub mod error;
pub mod export;

pub use error::SourceError;
pub use export::ExportCatalog;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Read-only view of the photo service being migrated away from.
#[async_trait]
pub trait SourceCatalog: Send + Sync {
    /// All albums, each with its ordered photo list.
    async fn list_albums(&self) -> Result<Vec<Album>, SourceError>;

    /// A single album; fails with [`SourceError::AlbumNotFound`] if absent.
    async fn get_album_details(&self, id: &str) -> Result<Album, SourceError>;

    /// The original bytes of one photo; fails with
    /// [`SourceError::PhotoContentNotFound`] if the content is missing.
    async fn get_photo_bytes(&self, photo: &Photo) -> Result<Vec<u8>, SourceError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct Album {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    /// Count declared by the source. Not necessarily `photos.len()`.
    pub photo_count: usize,
    pub photos: Vec<Photo>,
    #[allow(dead_code)] // Source-only; carried for future use
    pub created: Option<DateTime<Utc>>,
    #[allow(dead_code)]
    pub updated: Option<DateTime<Utc>>,
}

impl Album {
    /// Description with surrounding whitespace removed, `None` when blank.
    pub fn non_empty_description(&self) -> Option<&str> {
        self.description
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

#[allow(dead_code)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// Where a photo's bytes live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhotoContent {
    LocalPath(PathBuf),
    Url(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Photo {
    pub id: String,
    pub name: Option<String>,
    pub description: Option<String>,
    pub geo: Option<GeoPoint>,
    pub content: Option<PhotoContent>,
    #[allow(dead_code)] // Source-only; the destination has no equivalent
    pub tags: Vec<String>,
    #[allow(dead_code)]
    pub dimensions: Option<Dimensions>,
}

impl Photo {
    /// A photo known only by id, e.g. listed in an album but without a
    /// metadata file in the export.
    pub fn bare(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            description: None,
            geo: None,
            content: None,
            tags: Vec::new(),
            dimensions: None,
        }
    }

    /// File name to present to the destination.
    ///
    /// Uses the photo's name, falling back to the content's file name and
    /// then the id. The content's extension is appended when the chosen
    /// name has none, so the destination can infer the media type.
    pub fn upload_filename(&self) -> String {
        let content_name = self.content_file_name();
        let extension = content_name
            .as_deref()
            .and_then(|n| Path::new(n).extension())
            .and_then(|e| e.to_str())
            .map(str::to_owned);

        let base = self
            .name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_owned)
            .or(content_name)
            .unwrap_or_else(|| self.id.clone());

        match extension {
            Some(ext) if Path::new(&base).extension().is_none() => format!("{base}.{ext}"),
            _ => base,
        }
    }

    fn content_file_name(&self) -> Option<String> {
        match self.content.as_ref()? {
            PhotoContent::LocalPath(path) => path
                .file_name()
                .and_then(|n| n.to_str())
                .map(str::to_owned),
            PhotoContent::Url(url) => url::Url::parse(url)
                .ok()?
                .path_segments()?
                .next_back()
                .filter(|s| !s.is_empty())
                .map(str::to_owned),
        }
    }
}
