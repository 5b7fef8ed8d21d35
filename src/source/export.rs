//! Reader for a Flickr account export.
//!
//! An export is a directory (usually several unzipped archives merged into
//! one) holding `albums.json`, one `photo_<id>.json` per photo, and the media
//! files themselves named `<slug>_<id>_o.<ext>` or `<slug>_<id>.<ext>`.
//! Flickr writes most numbers as strings, so counts, timestamps and
//! coordinates are parsed leniently.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use walkdir::WalkDir;

use super::{Album, Dimensions, GeoPoint, Photo, PhotoContent, SourceCatalog, SourceError};

const ALBUMS_FILE: &str = "albums.json";

#[derive(Debug, Deserialize)]
struct AlbumsFile {
    #[serde(default)]
    albums: Vec<RawAlbum>,
}

#[derive(Debug, Deserialize)]
struct RawAlbum {
    id: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    photo_count: Value,
    #[serde(default)]
    photos: Vec<Value>,
    #[serde(default)]
    created: Value,
    #[serde(default)]
    last_updated: Value,
}

#[derive(Debug, Deserialize)]
struct RawPhoto {
    id: Value,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    geo: Value,
    #[serde(default)]
    tags: Vec<RawTag>,
    #[serde(default)]
    original: Option<String>,
    #[serde(default)]
    width: Value,
    #[serde(default)]
    height: Value,
}

#[derive(Debug, Deserialize)]
struct RawTag {
    #[serde(default)]
    tag: String,
}

/// Static catalog backed by an unpacked export directory.
pub struct ExportCatalog {
    root: PathBuf,
    media: HashMap<String, PathBuf>,
    client: reqwest::Client,
}

impl std::fmt::Debug for ExportCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExportCatalog")
            .field("root", &self.root)
            .field("media_files", &self.media.len())
            .finish_non_exhaustive()
    }
}

impl ExportCatalog {
    /// Open an export directory and index its media files by photo id.
    pub async fn open(root: &Path) -> Result<Self, SourceError> {
        let root = root.to_path_buf();
        if !tokio::fs::try_exists(&root).await.unwrap_or(false) {
            return Err(SourceError::Read {
                path: root,
                source: std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "export directory does not exist",
                ),
            });
        }

        let index_root = root.clone();
        let media = tokio::task::spawn_blocking(move || index_media_files(&index_root)).await?;
        tracing::debug!(
            root = %root.display(),
            media_files = media.len(),
            "Indexed export media"
        );

        Ok(Self {
            root,
            media,
            client: reqwest::Client::new(),
        })
    }

    async fn read_json<T: serde::de::DeserializeOwned>(&self, path: &Path) -> Result<T, SourceError> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| SourceError::Read {
                path: path.to_path_buf(),
                source,
            })?;
        serde_json::from_str(&contents).map_err(|source| SourceError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    async fn read_albums(&self) -> Result<Vec<RawAlbum>, SourceError> {
        let file: AlbumsFile = self.read_json(&self.root.join(ALBUMS_FILE)).await?;
        Ok(file.albums)
    }

    /// Resolve a photo id to its metadata. A missing metadata file is not an
    /// error: the photo is returned with whatever the media index knows.
    async fn load_photo(&self, id: &str) -> Result<Photo, SourceError> {
        let path = self.root.join(format!("photo_{id}.json"));
        let local = self.media.get(id).cloned().map(PhotoContent::LocalPath);

        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            tracing::debug!(photo_id = %id, "No metadata file for photo");
            return Ok(Photo {
                content: local,
                ..Photo::bare(id)
            });
        }

        let raw: RawPhoto = self.read_json(&path).await?;
        let content = local.or_else(|| {
            raw.original
                .filter(|u| !u.is_empty())
                .map(PhotoContent::Url)
        });
        let dimensions = parse_dimensions(&raw.width, &raw.height);

        Ok(Photo {
            id: as_string(&raw.id).unwrap_or_else(|| id.to_string()),
            name: raw.name.filter(|n| !n.is_empty()),
            description: raw.description.filter(|d| !d.is_empty()),
            geo: parse_geo(&raw.geo),
            content,
            tags: raw
                .tags
                .into_iter()
                .map(|t| t.tag)
                .filter(|t| !t.is_empty())
                .collect(),
            dimensions,
        })
    }

    async fn build_album(&self, raw: RawAlbum) -> Result<Album, SourceError> {
        let mut photos = Vec::with_capacity(raw.photos.len());
        for id in raw.photos.iter().filter_map(as_string) {
            photos.push(self.load_photo(&id).await?);
        }

        Ok(Album {
            photo_count: as_u64(&raw.photo_count).unwrap_or(photos.len() as u64) as usize,
            id: raw.id,
            title: raw.title,
            description: raw.description.filter(|d| !d.is_empty()),
            photos,
            created: as_timestamp(&raw.created),
            updated: as_timestamp(&raw.last_updated),
        })
    }
}

#[async_trait]
impl SourceCatalog for ExportCatalog {
    async fn list_albums(&self) -> Result<Vec<Album>, SourceError> {
        let mut albums = Vec::new();
        for raw in self.read_albums().await? {
            albums.push(self.build_album(raw).await?);
        }
        Ok(albums)
    }

    async fn get_album_details(&self, id: &str) -> Result<Album, SourceError> {
        let raw = self
            .read_albums()
            .await?
            .into_iter()
            .find(|a| a.id == id)
            .ok_or_else(|| SourceError::AlbumNotFound(id.to_string()))?;
        self.build_album(raw).await
    }

    async fn get_photo_bytes(&self, photo: &Photo) -> Result<Vec<u8>, SourceError> {
        match &photo.content {
            Some(PhotoContent::LocalPath(path)) => match tokio::fs::read(path).await {
                Ok(bytes) => Ok(bytes),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    Err(SourceError::PhotoContentNotFound(photo.id.clone()))
                }
                Err(source) => Err(SourceError::Read {
                    path: path.clone(),
                    source,
                }),
            },
            Some(PhotoContent::Url(url)) => {
                let response = self.client.get(url).send().await?;
                let status = response.status();
                if status == reqwest::StatusCode::NOT_FOUND {
                    return Err(SourceError::PhotoContentNotFound(photo.id.clone()));
                }
                if !status.is_success() {
                    return Err(SourceError::HttpStatus {
                        status: status.as_u16(),
                        url: url.clone(),
                    });
                }
                Ok(response.bytes().await?.to_vec())
            }
            None => Err(SourceError::PhotoContentNotFound(photo.id.clone())),
        }
    }
}

/// Walk the export tree and map photo ids to media file paths.
fn index_media_files(root: &Path) -> HashMap<String, PathBuf> {
    let mut media = HashMap::new();
    for entry in WalkDir::new(root).into_iter() {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                tracing::warn!("Skipping unreadable export entry: {}", e);
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if path
            .extension()
            .is_some_and(|e| e.eq_ignore_ascii_case("json"))
        {
            continue;
        }
        if let Some(id) = photo_id_from_filename(path) {
            media.entry(id).or_insert_with(|| path.to_path_buf());
        }
    }
    media
}

/// Extract the photo id from `<slug>_<id>_o.<ext>` or `<slug>_<id>.<ext>`.
fn photo_id_from_filename(path: &Path) -> Option<String> {
    let stem = path.file_stem()?.to_str()?;
    let stem = stem.strip_suffix("_o").unwrap_or(stem);
    let (_, id) = stem.rsplit_once('_').unwrap_or(("", stem));
    if !id.is_empty() && id.chars().all(|c| c.is_ascii_digit()) {
        Some(id.to_string())
    } else {
        None
    }
}

fn as_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Both sides must be present and fit in a `u32`.
fn parse_dimensions(width: &Value, height: &Value) -> Option<Dimensions> {
    let side = |v: &Value| as_u64(v).and_then(|n| u32::try_from(n).ok());
    Some(Dimensions {
        width: side(width)?,
        height: side(height)?,
    })
}

fn as_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Unix seconds (string or number) or an RFC 3339 / `YYYY-MM-DD HH:MM:SS` string.
fn as_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    if let Some(secs) = as_u64(value) {
        return DateTime::from_timestamp(secs as i64, 0);
    }
    let s = value.as_str()?;
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Flickr writes geo either as a single object or a one-element array, and
/// uses `0, 0` for "no location".
fn parse_geo(value: &Value) -> Option<GeoPoint> {
    let obj = match value {
        Value::Array(items) => items.first()?,
        Value::Object(_) => value,
        _ => return None,
    };
    let latitude = as_f64(&obj["latitude"])?;
    let longitude = as_f64(&obj["longitude"])?;
    if latitude == 0.0 && longitude == 0.0 {
        return None;
    }
    Some(GeoPoint {
        latitude,
        longitude,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn write(dir: &Path, name: &str, contents: &str) {
        std::fs::write(dir.join(name), contents).unwrap();
    }

    fn sample_export() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(
            root,
            ALBUMS_FILE,
            &json!({"albums": [
                {
                    "id": "721",
                    "title": "Holiday",
                    "description": "Summer trip",
                    "photo_count": "3",
                    "photos": ["1001", "1002"],
                    "created": "1450000000",
                    "last_updated": "1460000000"
                },
                {"id": "722", "title": "Empty", "photo_count": 0, "photos": []}
            ]})
            .to_string(),
        );
        write(
            root,
            "photo_1001.json",
            &json!({
                "id": "1001",
                "name": "Beach",
                "description": "Sunny",
                "geo": [{"latitude": "43.7", "longitude": "7.26", "accuracy": "16"}],
                "tags": [{"tag": "sea"}, {"tag": ""}],
                "original": "https://live.staticflickr.com/1/1001_x_o.jpg"
            })
            .to_string(),
        );
        std::fs::create_dir(root.join("part2")).unwrap();
        std::fs::write(root.join("part2").join("beach_1001_o.jpg"), b"jpeg").unwrap();
        dir
    }

    #[test]
    fn test_photo_id_from_filename() {
        assert_eq!(
            photo_id_from_filename(Path::new("beach_1001_o.jpg")),
            Some("1001".into())
        );
        assert_eq!(
            photo_id_from_filename(Path::new("img_2_1002.png")),
            Some("1002".into())
        );
        assert_eq!(
            photo_id_from_filename(Path::new("3003.jpg")),
            Some("3003".into())
        );
        assert_eq!(photo_id_from_filename(Path::new("notes_final.txt")), None);
    }

    #[test]
    fn test_parse_geo_variants() {
        let geo = parse_geo(&json!([{"latitude": "1.5", "longitude": "-2"}])).unwrap();
        assert_eq!(geo.latitude, 1.5);
        assert_eq!(geo.longitude, -2.0);
        assert!(parse_geo(&json!({"latitude": 4.0, "longitude": 5.0})).is_some());
        assert!(parse_geo(&json!({"latitude": 0, "longitude": 0})).is_none());
        assert!(parse_geo(&json!([])).is_none());
        assert!(parse_geo(&Value::Null).is_none());
    }

    #[test]
    fn test_parse_dimensions() {
        assert_eq!(
            parse_dimensions(&json!("4000"), &json!(3000)),
            Some(Dimensions {
                width: 4000,
                height: 3000
            })
        );
        assert_eq!(parse_dimensions(&json!(4_294_967_296u64), &json!(10)), None);
        assert_eq!(parse_dimensions(&json!(10), &Value::Null), None);
    }

    #[test]
    fn test_as_timestamp_formats() {
        assert_eq!(
            as_timestamp(&json!("1450000000")).unwrap().timestamp(),
            1_450_000_000
        );
        assert_eq!(
            as_timestamp(&json!("2015-12-13 09:46:40"))
                .unwrap()
                .timestamp(),
            1_450_000_000
        );
        assert!(as_timestamp(&json!("yesterday")).is_none());
    }

    #[tokio::test]
    async fn test_list_albums_resolves_photos() {
        let dir = sample_export();
        let catalog = ExportCatalog::open(dir.path()).await.unwrap();
        let albums = catalog.list_albums().await.unwrap();
        assert_eq!(albums.len(), 2);

        let holiday = &albums[0];
        assert_eq!(holiday.title, "Holiday");
        assert_eq!(holiday.description.as_deref(), Some("Summer trip"));
        // Declared count is kept even though only two photos are listed.
        assert_eq!(holiday.photo_count, 3);
        assert_eq!(holiday.photos.len(), 2);
        assert_eq!(holiday.created.unwrap().timestamp(), 1_450_000_000);

        let beach = &holiday.photos[0];
        assert_eq!(beach.name.as_deref(), Some("Beach"));
        assert_eq!(beach.tags, vec!["sea".to_string()]);
        assert!(beach.geo.is_some());
        assert!(matches!(beach.content, Some(PhotoContent::LocalPath(_))));

        // Listed in the album but no metadata or media in the export.
        let missing = &holiday.photos[1];
        assert_eq!(missing.id, "1002");
        assert!(missing.content.is_none());
    }

    #[tokio::test]
    async fn test_get_album_details_not_found() {
        let dir = sample_export();
        let catalog = ExportCatalog::open(dir.path()).await.unwrap();
        let err = catalog.get_album_details("999").await.unwrap_err();
        assert!(matches!(err, SourceError::AlbumNotFound(id) if id == "999"));
    }

    #[tokio::test]
    async fn test_get_photo_bytes() {
        let dir = sample_export();
        let catalog = ExportCatalog::open(dir.path()).await.unwrap();
        let album = catalog.get_album_details("721").await.unwrap();

        let bytes = catalog.get_photo_bytes(&album.photos[0]).await.unwrap();
        assert_eq!(bytes, b"jpeg");

        let err = catalog.get_photo_bytes(&album.photos[1]).await.unwrap_err();
        assert!(matches!(err, SourceError::PhotoContentNotFound(id) if id == "1002"));
    }

    #[tokio::test]
    async fn test_open_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let err = ExportCatalog::open(&dir.path().join("nope"))
            .await
            .unwrap_err();
        assert!(matches!(err, SourceError::Read { .. }));
    }

    #[tokio::test]
    async fn test_missing_albums_file_is_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = ExportCatalog::open(dir.path()).await.unwrap();
        assert!(matches!(
            catalog.list_albums().await.unwrap_err(),
            SourceError::Read { .. }
        ));
    }
}
