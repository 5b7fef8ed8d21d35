//! Per-chunk photo transfer.

use std::num::NonZeroUsize;
use std::sync::Arc;

use indicatif::ProgressBar;

use super::error::TransferError;
use crate::destination::{DestinationClient, DestinationPhotoId};
use crate::source::{Photo, SourceCatalog};

/// Split `photos` into ordered chunks of at most `batch_size`.
pub fn chunks(photos: &[Photo], batch_size: NonZeroUsize) -> std::slice::Chunks<'_, Photo> {
    photos.chunks(batch_size.get())
}

/// Join a photo's name and description into the single description field the
/// destination offers. Empty parts are treated as absent; the rest is kept
/// exactly as written.
pub fn create_description(name: Option<&str>, description: Option<&str>) -> String {
    let name = name.filter(|s| !s.is_empty());
    let description = description.filter(|s| !s.is_empty());
    match (name, description) {
        (Some(n), Some(d)) => format!("{n} - {d}"),
        (Some(n), None) => n.to_string(),
        (None, Some(d)) => d.to_string(),
        (None, None) => String::new(),
    }
}

/// What one chunk produced.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ChunkOutcome {
    /// Destination ids of the photos that made it, in order.
    pub ids: Vec<DestinationPhotoId>,
    /// Dry-run "would transfer" lines logged.
    pub would_transfer: usize,
}

/// Moves photos from the source catalog to the destination one at a time.
pub struct BatchProcessor {
    source: Arc<dyn SourceCatalog>,
    destination: Arc<dyn DestinationClient>,
}

impl BatchProcessor {
    pub fn new(source: Arc<dyn SourceCatalog>, destination: Arc<dyn DestinationClient>) -> Self {
        Self {
            source,
            destination,
        }
    }

    /// Transfer one chunk.
    ///
    /// A photo that fails is logged and skipped; the rest of the chunk still
    /// runs. Under `dry_run` nothing is read or written and every photo gets
    /// the placeholder id `dry_run_<photo id>`.
    pub async fn process_chunk(
        &self,
        photos: &[Photo],
        dry_run: bool,
        pb: &ProgressBar,
    ) -> ChunkOutcome {
        let mut outcome = ChunkOutcome {
            ids: Vec::with_capacity(photos.len()),
            would_transfer: 0,
        };

        for photo in photos {
            pb.set_message(photo.upload_filename());

            if dry_run {
                pb.suspend(|| {
                    tracing::info!(
                        "[DRY RUN] Would transfer photo {} ({})",
                        photo.id,
                        photo.upload_filename()
                    );
                });
                outcome.would_transfer += 1;
                outcome
                    .ids
                    .push(DestinationPhotoId(format!("dry_run_{}", photo.id)));
                pb.inc(1);
                continue;
            }

            match self.transfer_photo(photo).await {
                Ok(id) => outcome.ids.push(id),
                Err(TransferError::Source(e)) if e.is_not_found() => {
                    pb.suspend(|| {
                        tracing::warn!(photo_id = %photo.id, "Skipping photo {}: {}", photo.id, e);
                    });
                }
                Err(e) => {
                    pb.suspend(|| {
                        tracing::error!(photo_id = %photo.id, "Failed to transfer photo {}: {}", photo.id, e);
                    });
                }
            }
            pb.inc(1);
        }

        outcome
    }

    async fn transfer_photo(&self, photo: &Photo) -> Result<DestinationPhotoId, TransferError> {
        let bytes = self.source.get_photo_bytes(photo).await?;
        let description = create_description(photo.name.as_deref(), photo.description.as_deref());
        let filename = photo.upload_filename();

        if let Some(geo) = photo.geo {
            tracing::debug!(
                photo_id = %photo.id,
                latitude = geo.latitude,
                longitude = geo.longitude,
                "Destination API cannot set locations, skipping geo data"
            );
        }

        let id = self
            .destination
            .upload_photo(bytes, &filename, &description)
            .await?;
        tracing::debug!(photo_id = %photo.id, destination_id = %id, "Uploaded {}", filename);
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::destination::testing::{Call, RecordingDestination};
    use crate::source::testing::{album, photo, MemoryCatalog};
    use crate::source::GeoPoint;

    fn nz(n: usize) -> NonZeroUsize {
        NonZeroUsize::new(n).unwrap()
    }

    #[test]
    fn test_create_description_cases() {
        assert_eq!(
            create_description(Some("Photo 1"), Some("Description 1")),
            "Photo 1 - Description 1"
        );
        assert_eq!(create_description(Some("Photo 1"), None), "Photo 1");
        assert_eq!(create_description(None, Some("Description 1")), "Description 1");
        assert_eq!(create_description(None, None), "");
    }

    #[test]
    fn test_create_description_empty_parts_absent() {
        assert_eq!(create_description(Some(""), Some("Only")), "Only");
        assert_eq!(create_description(Some("Name"), Some("")), "Name");
        assert_eq!(create_description(Some(""), Some("")), "");
    }

    #[test]
    fn test_create_description_keeps_whitespace() {
        assert_eq!(
            create_description(Some(" Photo 1 "), Some("Line one\n")),
            " Photo 1  - Line one\n"
        );
        assert_eq!(create_description(Some("Name"), Some("   ")), "Name -    ");
    }

    #[test]
    fn test_chunk_count_is_ceiling() {
        for (n, b, expected) in [(0, 10, 0), (1, 10, 1), (10, 10, 1), (25, 10, 3), (7, 1, 7)] {
            let a = album("a", n);
            assert_eq!(chunks(&a.photos, nz(b)).count(), expected, "N={n} B={b}");
        }
        let a = album("a", 25);
        let sizes: Vec<usize> = chunks(&a.photos, nz(10)).map(<[Photo]>::len).collect();
        assert_eq!(sizes, vec![10, 10, 5]);
    }

    #[tokio::test]
    async fn test_failing_photo_is_skipped() {
        let a = album("a", 5);
        let source = Arc::new(MemoryCatalog::new(vec![a.clone()]).failing("a-2"));
        let destination = Arc::new(RecordingDestination::new());
        let processor = BatchProcessor::new(source.clone(), destination.clone());

        let outcome = processor
            .process_chunk(&a.photos, false, &ProgressBar::hidden())
            .await;

        assert_eq!(outcome.would_transfer, 0);
        let ids: Vec<&str> = outcome.ids.iter().map(DestinationPhotoId::as_str).collect();
        assert_eq!(ids, vec!["media-a-1", "media-a-3", "media-a-4", "media-a-5"]);
        assert_eq!(source.fetch_count(), 5);
        assert_eq!(destination.uploads(), 4);
    }

    #[tokio::test]
    async fn test_failing_upload_is_skipped() {
        let a = album("a", 4);
        let source = Arc::new(MemoryCatalog::new(vec![a.clone()]));
        let destination = Arc::new(RecordingDestination::new().failing_upload("Photo a-2.jpg"));
        let processor = BatchProcessor::new(source.clone(), destination.clone());

        let outcome = processor
            .process_chunk(&a.photos, false, &ProgressBar::hidden())
            .await;

        assert_eq!(outcome.would_transfer, 0);
        let ids: Vec<&str> = outcome.ids.iter().map(DestinationPhotoId::as_str).collect();
        assert_eq!(ids, vec!["media-a-1", "media-a-3", "media-a-4"]);
        assert_eq!(destination.uploads(), 4);
    }

    #[tokio::test]
    async fn test_dry_run_touches_nothing() {
        let a = album("a", 3);
        let source = Arc::new(MemoryCatalog::new(vec![a.clone()]));
        let destination = Arc::new(RecordingDestination::new());
        let processor = BatchProcessor::new(source.clone(), destination.clone());

        let outcome = processor
            .process_chunk(&a.photos, true, &ProgressBar::hidden())
            .await;

        assert_eq!(outcome.would_transfer, 3);
        assert_eq!(
            outcome.ids,
            vec![
                DestinationPhotoId::from("dry_run_a-1"),
                DestinationPhotoId::from("dry_run_a-2"),
                DestinationPhotoId::from("dry_run_a-3"),
            ]
        );
        assert_eq!(source.fetch_count(), 0);
        assert!(destination.calls().is_empty());
    }

    #[tokio::test]
    async fn test_upload_carries_filename_and_description() {
        let mut p = photo("9");
        p.description = Some("At the beach".into());
        p.geo = Some(GeoPoint {
            latitude: 51.5,
            longitude: -0.12,
        });
        let source = Arc::new(MemoryCatalog::new(Vec::new()));
        let destination = Arc::new(RecordingDestination::new());
        let processor = BatchProcessor::new(source, destination.clone());

        processor
            .process_chunk(std::slice::from_ref(&p), false, &ProgressBar::hidden())
            .await;

        assert_eq!(
            destination.calls(),
            vec![Call::Upload {
                filename: "Photo 9.jpg".into(),
                description: "Photo 9 - At the beach".into(),
            }]
        );
    }
}
