// SPDX-FileCopyrightText: 2026 Storebot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Re-hosting of platform CDN images and an HTTP blob store.
//!
//! Platform CDN URLs are signed and short-lived, so images a customer sends
//! are copied to durable storage before they reach the model.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use storebot_config::model::BlobConfig;
use storebot_core::traits::{BlobStoreAdapter, PluginAdapter};
use storebot_core::{AdapterType, HealthStatus, StorebotError};
use tracing::{debug, info};

use crate::graph::GraphClient;

/// File extension for a downloaded image's content type.
pub fn extension_for(content_type: &str) -> &'static str {
    if content_type.contains("png") {
        "png"
    } else if content_type.contains("webp") {
        "webp"
    } else {
        "jpg"
    }
}

/// Copies CDN-hosted images into a blob store.
pub struct MediaRehoster {
    graph: GraphClient,
    blob: Arc<dyn BlobStoreAdapter>,
    cdn_markers: Vec<String>,
    key_prefix: String,
}

impl MediaRehoster {
    pub fn new(
        graph: GraphClient,
        blob: Arc<dyn BlobStoreAdapter>,
        cdn_markers: Vec<String>,
        key_prefix: impl Into<String>,
    ) -> Self {
        Self {
            graph,
            blob,
            cdn_markers,
            key_prefix: key_prefix.into(),
        }
    }

    /// True when `url` points at the platform CDN.
    pub fn is_platform_cdn(&self, url: &str) -> bool {
        self.cdn_markers.iter().any(|marker| url.contains(marker.as_str()))
    }

    /// Downloads `url` with the page token and uploads it; returns the public URL.
    pub async fn rehost(&self, url: &str, access_token: &str) -> Result<String, StorebotError> {
        let (bytes, content_type) = self.graph.download(url, access_token).await?;
        let key = format!(
            "{}/{}-{}.{}",
            self.key_prefix,
            chrono::Utc::now().timestamp_millis(),
            uuid::Uuid::new_v4(),
            extension_for(&content_type)
        );
        let public_url = self.blob.upload(&key, bytes, &content_type).await?;
        debug!(key = %key, "image re-hosted");
        Ok(public_url)
    }
}

/// Blob store reached with authenticated `PUT {upload_base_url}/{key}`.
pub struct HttpBlobStore {
    client: reqwest::Client,
    upload_base_url: String,
    public_base_url: String,
    bearer_token: Option<String>,
}

impl HttpBlobStore {
    /// Builds the store from config; `None` when blob storage is not configured.
    pub fn from_config(config: &BlobConfig) -> Result<Option<Self>, StorebotError> {
        let (Some(upload), Some(public)) = (&config.upload_base_url, &config.public_base_url)
        else {
            return Ok(None);
        };
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| StorebotError::Internal(format!("failed to build HTTP client: {e}")))?;
        info!(upload_base_url = %upload, "blob store configured");
        Ok(Some(Self {
            client,
            upload_base_url: upload.trim_end_matches('/').to_string(),
            public_base_url: public.trim_end_matches('/').to_string(),
            bearer_token: config.bearer_token.clone(),
        }))
    }
}

#[async_trait]
impl PluginAdapter for HttpBlobStore {
    fn name(&self) -> &str {
        "http-blob"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::BlobStore
    }

    async fn health_check(&self) -> Result<HealthStatus, StorebotError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), StorebotError> {
        Ok(())
    }
}

#[async_trait]
impl BlobStoreAdapter for HttpBlobStore {
    async fn upload(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, StorebotError> {
        let mut request = self
            .client
            .put(format!("{}/{key}", self.upload_base_url))
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(bytes);
        if let Some(token) = &self.bearer_token {
            request = request.bearer_auth(token);
        }
        let response = request.send().await.map_err(|e| StorebotError::Internal(format!(
            "blob upload failed: {e}"
        )))?;
        let status = response.status();
        if !status.is_success() {
            return Err(StorebotError::Internal(format!(
                "blob upload returned {status}"
            )));
        }
        Ok(format!("{}/{key}", self.public_base_url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path, path_regex};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn blob_config(server: &MockServer) -> BlobConfig {
        BlobConfig {
            upload_base_url: Some(format!("{}/upload", server.uri())),
            public_base_url: Some("https://media.example.com".into()),
            bearer_token: Some("blob-token".into()),
            ..BlobConfig::default()
        }
    }

    #[test]
    fn extensions_follow_content_type() {
        assert_eq!(extension_for("image/png"), "png");
        assert_eq!(extension_for("image/webp"), "webp");
        assert_eq!(extension_for("image/jpeg"), "jpg");
        assert_eq!(extension_for("application/octet-stream"), "jpg");
    }

    #[test]
    fn unconfigured_blob_store_is_none() {
        assert!(HttpBlobStore::from_config(&BlobConfig::default()).unwrap().is_none());
    }

    #[tokio::test]
    async fn upload_puts_bytes_and_returns_public_url() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/upload/facebook-images/a.png"))
            .and(header("authorization", "Bearer blob-token"))
            .and(header("content-type", "image/png"))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        let store = HttpBlobStore::from_config(&blob_config(&server)).unwrap().unwrap();
        let url = store
            .upload("facebook-images/a.png", vec![1, 2], "image/png")
            .await
            .unwrap();
        assert_eq!(url, "https://media.example.com/facebook-images/a.png");
    }

    #[tokio::test]
    async fn rehost_downloads_then_uploads() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/cdn/photo"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "image/webp")
                    .set_body_bytes(vec![9u8; 4]),
            )
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path_regex(r"^/upload/facebook-images/\d+-[0-9a-f-]+\.webp$"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let graph = GraphClient::new(&server.uri(), Duration::from_secs(5)).unwrap();
        let blob = HttpBlobStore::from_config(&blob_config(&server)).unwrap().unwrap();
        let rehoster = MediaRehoster::new(
            graph,
            Arc::new(blob),
            vec!["fbcdn.net".into()],
            "facebook-images",
        );
        assert!(rehoster.is_platform_cdn("https://scontent.xx.fbcdn.net/v/a.jpg?x=1"));
        assert!(!rehoster.is_platform_cdn("https://media.example.com/a.jpg"));

        let url = rehoster
            .rehost(&format!("{}/cdn/photo?oh=1", server.uri()), "tok")
            .await
            .unwrap();
        assert!(url.starts_with("https://media.example.com/facebook-images/"));
        assert!(url.ends_with(".webp"));
    }
}
