// SPDX-FileCopyrightText: 2026 Storebot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock embedding service and blob store.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use storebot_core::types::{AdapterType, HealthStatus};
use storebot_core::{BlobStoreAdapter, EmbeddingAdapter, PluginAdapter, StorebotError};

macro_rules! healthy_adapter {
    ($ty:ty, $name:literal, $kind:expr) => {
        #[async_trait]
        impl PluginAdapter for $ty {
            fn name(&self) -> &str {
                $name
            }

            fn version(&self) -> semver::Version {
                semver::Version::new(0, 1, 0)
            }

            fn adapter_type(&self) -> AdapterType {
                $kind
            }

            async fn health_check(&self) -> Result<HealthStatus, StorebotError> {
                Ok(HealthStatus::Healthy)
            }

            async fn shutdown(&self) -> Result<(), StorebotError> {
                Ok(())
            }
        }
    };
}

/// Describes images from a URL → description table and embeds text from a
/// description → vector table. Unknown inputs are errors.
#[derive(Default)]
pub struct MockEmbedder {
    descriptions: HashMap<String, String>,
    vectors: HashMap<String, Vec<f32>>,
}

impl MockEmbedder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an image whose description embeds to `vector`.
    pub fn with_image(mut self, url: &str, description: &str, vector: Vec<f32>) -> Self {
        self.descriptions
            .insert(url.to_string(), description.to_string());
        self.vectors.insert(description.to_string(), vector);
        self
    }
}

healthy_adapter!(MockEmbedder, "mock-embedder", AdapterType::Embedding);

#[async_trait]
impl EmbeddingAdapter for MockEmbedder {
    async fn describe_image(&self, image_url: &str) -> Result<String, StorebotError> {
        self.descriptions
            .get(image_url)
            .cloned()
            .ok_or_else(|| StorebotError::provider(format!("cannot describe {image_url}")))
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, StorebotError> {
        self.vectors
            .get(text)
            .cloned()
            .ok_or_else(|| StorebotError::provider(format!("cannot embed {text}")))
    }
}

/// One captured upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upload {
    pub key: String,
    pub bytes: Vec<u8>,
    pub content_type: String,
}

/// Blob store that keeps uploads in memory and serves them from a fake CDN.
pub struct MockBlobStore {
    uploads: Arc<Mutex<Vec<Upload>>>,
    public_base: String,
}

impl MockBlobStore {
    pub fn new() -> Self {
        Self {
            uploads: Arc::new(Mutex::new(Vec::new())),
            public_base: "https://blob.test".to_string(),
        }
    }

    pub async fn uploads(&self) -> Vec<Upload> {
        self.uploads.lock().await.clone()
    }
}

impl Default for MockBlobStore {
    fn default() -> Self {
        Self::new()
    }
}

healthy_adapter!(MockBlobStore, "mock-blob", AdapterType::BlobStore);

#[async_trait]
impl BlobStoreAdapter for MockBlobStore {
    async fn upload(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, StorebotError> {
        self.uploads.lock().await.push(Upload {
            key: key.to_string(),
            bytes,
            content_type: content_type.to_string(),
        });
        Ok(format!("{}/{key}", self.public_base))
    }
}
