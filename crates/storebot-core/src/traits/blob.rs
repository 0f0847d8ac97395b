// SPDX-FileCopyrightText: 2026 Storebot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Blob storage trait for durably re-hosting media.

use async_trait::async_trait;

use crate::error::StorebotError;
use crate::traits::adapter::PluginAdapter;

#[async_trait]
pub trait BlobStoreAdapter: PluginAdapter {
    /// Stores `bytes` under `key` and returns a publicly reachable URL.
    async fn upload(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, StorebotError>;
}
