// SPDX-FileCopyrightText: 2026 Storebot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Embedding adapter trait used by catalog image-similarity search.

use async_trait::async_trait;

use crate::error::StorebotError;
use crate::traits::adapter::PluginAdapter;

/// Turns images into short search descriptions and text into vectors.
#[async_trait]
pub trait EmbeddingAdapter: PluginAdapter {
    /// Describes the product shown at `image_url` in a few keywords.
    async fn describe_image(&self, image_url: &str) -> Result<String, StorebotError>;

    /// Generates an embedding vector for the given text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, StorebotError>;
}
