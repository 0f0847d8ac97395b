// SPDX-FileCopyrightText: 2026 Storebot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter trait definitions for the Storebot backend.
//!
//! All adapters extend the [`PluginAdapter`] base trait and use
//! `#[async_trait]` for dynamic dispatch compatibility.

pub mod adapter;
pub mod blob;
pub mod channel;
pub mod embedding;
pub mod provider;

pub use adapter::PluginAdapter;
pub use blob::BlobStoreAdapter;
pub use channel::ChannelAdapter;
pub use embedding::EmbeddingAdapter;
pub use provider::ProviderAdapter;
