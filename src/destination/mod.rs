//! Destination side of the migration: the client contract the transfer
//! pipeline writes through, and its Google Photos implementation.

pub mod error;
pub mod google;

pub use error::DestinationError;
pub use google::GooglePhotosClient;

use async_trait::async_trait;

/// Most media item ids a single album-membership call may carry.
pub const MAX_ALBUM_BATCH: usize = 50;

/// Opaque id the destination assigns to an uploaded photo.
///
/// Byte-identical uploads collapse to the same id, so ids are compared by
/// equality when deduplicating album membership.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DestinationPhotoId(pub String);

impl DestinationPhotoId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DestinationPhotoId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DestinationPhotoId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedAlbum {
    pub id: String,
    pub title: String,
}

/// Write access to the photo service being migrated into.
#[async_trait]
pub trait DestinationClient: Send + Sync {
    /// Create an album with the given title. Descriptions are not supported.
    async fn create_album(&self, title: &str) -> Result<CreatedAlbum, DestinationError>;

    /// Upload one photo and return the id the destination assigned to it.
    async fn upload_photo(
        &self,
        bytes: Vec<u8>,
        filename: &str,
        description: &str,
    ) -> Result<DestinationPhotoId, DestinationError>;

    /// Add up to [`MAX_ALBUM_BATCH`] photos to an album.
    async fn add_photos_to_album(
        &self,
        album_id: &str,
        ids: &[DestinationPhotoId],
    ) -> Result<(), DestinationError>;
}
