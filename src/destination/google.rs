//! Google Photos Library API client.
//!
//! Uploading is two-step: the raw bytes go to `/v1/uploads`, which answers
//! with an upload token, and `/v1/mediaItems:batchCreate` turns that token
//! into a media item. The API cannot set album descriptions or photo
//! locations, which is why neither is sent.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{CreatedAlbum, DestinationClient, DestinationError, DestinationPhotoId, MAX_ALBUM_BATCH};
use crate::auth::TokenProvider;
use crate::retry::{self, RetryAction, RetryConfig};

const DEFAULT_BASE_URL: &str = "https://photoslibrary.googleapis.com/v1";

#[derive(Debug, Deserialize)]
struct AlbumResponse {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    title: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BatchCreateResponse {
    #[serde(default)]
    new_media_item_results: Vec<NewMediaItemResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NewMediaItemResult {
    #[serde(default)]
    status: Option<ItemStatus>,
    #[serde(default)]
    media_item: Option<MediaItem>,
}

#[derive(Debug, Deserialize)]
struct ItemStatus {
    #[serde(default)]
    code: Option<i32>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MediaItem {
    id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BatchCreateRequest<'a> {
    new_media_items: [NewMediaItem<'a>; 1],
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct NewMediaItem<'a> {
    description: &'a str,
    simple_media_item: SimpleMediaItem<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SimpleMediaItem<'a> {
    upload_token: &'a str,
    file_name: &'a str,
}

pub struct GooglePhotosClient {
    http: Client,
    tokens: Arc<dyn TokenProvider>,
    base_url: String,
    retry: RetryConfig,
}

impl std::fmt::Debug for GooglePhotosClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GooglePhotosClient")
            .field("base_url", &self.base_url)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl GooglePhotosClient {
    pub fn new(tokens: Arc<dyn TokenProvider>, retry: RetryConfig) -> Self {
        Self::with_base_url(tokens, retry, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(
        tokens: Arc<dyn TokenProvider>,
        retry: RetryConfig,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            http: Client::new(),
            tokens,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            retry,
        }
    }

    async fn post_json<B, T>(
        &self,
        operation: &'static str,
        url: &str,
        body: &B,
    ) -> Result<T, DestinationError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let token = self.tokens.access_token().await?;
        let response = self
            .http
            .post(url)
            .bearer_auth(token)
            .json(body)
            .send()
            .await?;
        let response = check_status(operation, response).await?;
        Ok(response.json().await?)
    }

    async fn upload_bytes(&self, bytes: &[u8], filename: &str) -> Result<String, DestinationError> {
        let token = self.tokens.access_token().await?;
        let mime = mime_guess::from_path(filename).first_or_octet_stream();
        let response = self
            .http
            .post(format!("{}/uploads", self.base_url))
            .bearer_auth(token)
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .header("X-Goog-Upload-Content-Type", mime.essence_str())
            .header("X-Goog-Upload-File-Name", filename)
            .header("X-Goog-Upload-Protocol", "raw")
            .body(bytes.to_vec())
            .send()
            .await?;
        let response = check_status("upload", response).await?;
        let upload_token = response.text().await?;
        if upload_token.trim().is_empty() {
            return Err(DestinationError::MissingField {
                operation: "upload",
                field: "upload token",
            });
        }
        Ok(upload_token)
    }

    async fn create_media_item(
        &self,
        upload_token: &str,
        filename: &str,
        description: &str,
    ) -> Result<DestinationPhotoId, DestinationError> {
        let request = BatchCreateRequest {
            new_media_items: [NewMediaItem {
                description,
                simple_media_item: SimpleMediaItem {
                    upload_token,
                    file_name: filename,
                },
            }],
        };
        let response: BatchCreateResponse = self
            .post_json(
                "create media item",
                &format!("{}/mediaItems:batchCreate", self.base_url),
                &request,
            )
            .await?;
        media_item_id(response, filename)
    }
}

fn classify(e: &DestinationError) -> RetryAction {
    if e.is_retryable() {
        RetryAction::Retry
    } else {
        RetryAction::Abort
    }
}

async fn check_status(
    operation: &'static str,
    response: reqwest::Response,
) -> Result<reqwest::Response, DestinationError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(DestinationError::Api {
        operation,
        status: status.as_u16(),
        message: api_error_message(&body),
    })
}

/// Pull `error.message` out of a Google API error body, falling back to the
/// raw body.
fn api_error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_owned))
        .unwrap_or_else(|| body.trim().to_string())
}

fn media_item_id(
    response: BatchCreateResponse,
    filename: &str,
) -> Result<DestinationPhotoId, DestinationError> {
    let result = response
        .new_media_item_results
        .into_iter()
        .next()
        .ok_or(DestinationError::MissingField {
            operation: "create media item",
            field: "newMediaItemResults",
        })?;

    if let Some(status) = &result.status {
        if status.code.is_some_and(|c| c != 0) {
            return Err(DestinationError::ItemRejected {
                filename: filename.to_string(),
                message: status
                    .message
                    .clone()
                    .unwrap_or_else(|| "unknown error".to_string()),
            });
        }
    }

    result
        .media_item
        .map(|item| DestinationPhotoId(item.id))
        .ok_or(DestinationError::MissingField {
            operation: "create media item",
            field: "mediaItem",
        })
}

#[async_trait]
impl DestinationClient for GooglePhotosClient {
    async fn create_album(&self, title: &str) -> Result<CreatedAlbum, DestinationError> {
        // Not retried: a create that timed out may still have succeeded.
        let body = json!({ "album": { "title": title } });
        let response: AlbumResponse = self
            .post_json("create album", &format!("{}/albums", self.base_url), &body)
            .await?;
        let id = response.id.ok_or(DestinationError::MissingField {
            operation: "create album",
            field: "id",
        })?;
        tracing::debug!(album_id = %id, title, "Created destination album");
        Ok(CreatedAlbum {
            id,
            title: response.title.unwrap_or_else(|| title.to_string()),
        })
    }

    async fn upload_photo(
        &self,
        bytes: Vec<u8>,
        filename: &str,
        description: &str,
    ) -> Result<DestinationPhotoId, DestinationError> {
        let upload_token = retry::retry_with_backoff(&self.retry, "upload", classify, || {
            self.upload_bytes(&bytes, filename)
        })
        .await?;

        retry::retry_with_backoff(&self.retry, "create media item", classify, || {
            self.create_media_item(&upload_token, filename, description)
        })
        .await
    }

    async fn add_photos_to_album(
        &self,
        album_id: &str,
        ids: &[DestinationPhotoId],
    ) -> Result<(), DestinationError> {
        if ids.len() > MAX_ALBUM_BATCH {
            return Err(DestinationError::BatchTooLarge {
                max: MAX_ALBUM_BATCH,
                got: ids.len(),
            });
        }
        if ids.is_empty() {
            return Ok(());
        }
        let url = format!("{}/albums/{}:batchAddMediaItems", self.base_url, album_id);
        let body = json!({
            "mediaItemIds": ids.iter().map(DestinationPhotoId::as_str).collect::<Vec<_>>(),
        });
        retry::retry_with_backoff(&self.retry, "add to album", classify, || async {
            self.post_json::<_, Value>("add to album", &url, &body)
                .await
                .map(|_| ())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::StaticToken;

    fn client() -> GooglePhotosClient {
        GooglePhotosClient::with_base_url(
            Arc::new(StaticToken("t".into())),
            RetryConfig::none(),
            "http://127.0.0.1:1/v1/",
        )
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        assert_eq!(client().base_url, "http://127.0.0.1:1/v1");
    }

    #[test]
    fn test_batch_create_request_shape() {
        let request = BatchCreateRequest {
            new_media_items: [NewMediaItem {
                description: "Photo 1 - Description 1",
                simple_media_item: SimpleMediaItem {
                    upload_token: "tok",
                    file_name: "a.jpg",
                },
            }],
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({"newMediaItems": [{
                "description": "Photo 1 - Description 1",
                "simpleMediaItem": {"uploadToken": "tok", "fileName": "a.jpg"}
            }]})
        );
    }

    #[test]
    fn test_media_item_id_success() {
        let response: BatchCreateResponse = serde_json::from_value(json!({
            "newMediaItemResults": [{
                "uploadToken": "tok",
                "status": {"message": "Success"},
                "mediaItem": {"id": "AB12", "filename": "a.jpg"}
            }]
        }))
        .unwrap();
        assert_eq!(media_item_id(response, "a.jpg").unwrap().as_str(), "AB12");
    }

    #[test]
    fn test_media_item_id_rejected() {
        let response: BatchCreateResponse = serde_json::from_value(json!({
            "newMediaItemResults": [{
                "uploadToken": "tok",
                "status": {"code": 3, "message": "Failed: There was an error while trying to create this media item."}
            }]
        }))
        .unwrap();
        let err = media_item_id(response, "a.jpg").unwrap_err();
        assert!(matches!(err, DestinationError::ItemRejected { .. }));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_media_item_id_empty_results() {
        let response: BatchCreateResponse = serde_json::from_value(json!({})).unwrap();
        assert!(matches!(
            media_item_id(response, "a.jpg").unwrap_err(),
            DestinationError::MissingField { .. }
        ));
    }

    #[test]
    fn test_api_error_message() {
        let body = r#"{"error": {"code": 429, "message": "Quota exceeded", "status": "RESOURCE_EXHAUSTED"}}"#;
        assert_eq!(api_error_message(body), "Quota exceeded");
        assert_eq!(api_error_message(" plain text "), "plain text");
    }

    #[tokio::test]
    async fn test_add_rejects_oversized_batch_without_network() {
        let ids: Vec<DestinationPhotoId> = (0..51)
            .map(|i| DestinationPhotoId(format!("id{i}")))
            .collect();
        let err = client().add_photos_to_album("album", &ids).await.unwrap_err();
        assert!(matches!(
            err,
            DestinationError::BatchTooLarge { max: 50, got: 51 }
        ));
    }

    #[tokio::test]
    async fn test_add_empty_batch_is_noop() {
        client().add_photos_to_album("album", &[]).await.unwrap();
    }
}
