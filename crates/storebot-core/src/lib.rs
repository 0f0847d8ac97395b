// SPDX-FileCopyrightText: 2026 Storebot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Storebot assistant backend.
//!
//! This crate provides the trait definitions, error type, and common types
//! shared by the storage, provider, channel, tool and orchestration crates.

pub mod error;
pub mod traits;
pub mod types;

pub use error::StorebotError;
pub use types::{
    AdapterType, ChatMessage, GenerationRequest, HealthStatus, MessageId, OutboundMessage,
    OutboundPayload, Platform, Role, RunSnapshot, RunStatus, TokenUsage, ToolCall,
    ToolDefinition,
};

pub use traits::{
    BlobStoreAdapter, ChannelAdapter, EmbeddingAdapter, PluginAdapter, ProviderAdapter,
};
