// SPDX-FileCopyrightText: 2026 Storebot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Channel adapter trait for outbound delivery to messaging platforms.

use async_trait::async_trait;

use crate::error::StorebotError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{MessageId, OutboundMessage};

/// Delivers assistant output to end users on their originating platform.
///
/// Implementations resolve the page credential for `msg.page_id` themselves,
/// so callers only name the page, the recipient and the payload.
#[async_trait]
pub trait ChannelAdapter: PluginAdapter {
    /// Sends one payload to one recipient.
    async fn send(&self, msg: OutboundMessage) -> Result<MessageId, StorebotError>;
}
