// SPDX-FileCopyrightText: 2026 Storebot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Meta platform integration for Storebot.
//!
//! Covers the Graph API client, page credential refresh, outbound delivery
//! via [`MessengerChannel`], inbound webhook parsing and verification,
//! CDN image re-hosting, and OAuth channel onboarding.

pub mod credentials;
pub mod error;
pub mod format;
pub mod graph;
pub mod media;
pub mod onboarding;
pub mod sender;
pub mod webhook;

use std::time::Duration;

use storebot_config::model::MetaConfig;
use storebot_core::StorebotError;

pub use credentials::CredentialManager;
pub use error::{is_token_expired, GraphApiError};
pub use format::format_for_messenger;
pub use graph::GraphClient;
pub use media::{HttpBlobStore, MediaRehoster};
pub use onboarding::ChannelOnboarding;
pub use sender::MessengerChannel;
pub use webhook::{verify_challenge, verify_signature, Attachment, AttachmentKind, WebhookPayload};

/// Builds a Graph client from the `[meta]` config section.
pub fn graph_client(config: &MetaConfig) -> Result<GraphClient, StorebotError> {
    GraphClient::new(
        &config.graph_base_url,
        Duration::from_secs(config.timeout_secs),
    )
}
