// SPDX-FileCopyrightText: 2026 Storebot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock channel adapter for deterministic testing.
//!
//! `MockChannel` implements `ChannelAdapter` by capturing outbound messages
//! for assertion in tests. It can be switched into a failing mode to exercise
//! delivery error paths.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use storebot_core::types::{AdapterType, HealthStatus, MessageId, OutboundMessage, OutboundPayload};
use storebot_core::{ChannelAdapter, PluginAdapter, StorebotError};

/// A mock messaging channel that records everything it is asked to send.
pub struct MockChannel {
    sent: Arc<Mutex<Vec<OutboundMessage>>>,
    failing: AtomicBool,
}

impl MockChannel {
    /// Create a new mock channel with an empty capture buffer.
    pub fn new() -> Self {
        Self {
            sent: Arc::new(Mutex::new(Vec::new())),
            failing: AtomicBool::new(false),
        }
    }

    /// Make every subsequent `send` fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Get all messages that were sent through `send()`.
    pub async fn sent_messages(&self) -> Vec<OutboundMessage> {
        self.sent.lock().await.clone()
    }

    /// Sent payloads other than typing indicators.
    pub async fn sent_payloads(&self) -> Vec<OutboundPayload> {
        self.sent
            .lock()
            .await
            .iter()
            .filter(|m| m.payload != OutboundPayload::Typing)
            .map(|m| m.payload.clone())
            .collect()
    }

    /// Get the count of sent messages.
    pub async fn sent_count(&self) -> usize {
        self.sent.lock().await.len()
    }

    /// Clear all sent messages.
    pub async fn clear_sent(&self) {
        self.sent.lock().await.clear();
    }
}

impl Default for MockChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PluginAdapter for MockChannel {
    fn name(&self) -> &str {
        "mock-channel"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Channel
    }

    async fn health_check(&self) -> Result<HealthStatus, StorebotError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), StorebotError> {
        Ok(())
    }
}

#[async_trait]
impl ChannelAdapter for MockChannel {
    async fn send(&self, msg: OutboundMessage) -> Result<MessageId, StorebotError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StorebotError::channel("mock channel is failing"));
        }
        let id = format!("mock-msg-{}", uuid::Uuid::new_v4());
        self.sent.lock().await.push(msg);
        Ok(MessageId(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storebot_core::Platform;

    fn outbound(payload: OutboundPayload) -> OutboundMessage {
        OutboundMessage {
            page_id: "page-1".into(),
            platform: Platform::Facebook,
            recipient_id: "u1".into(),
            payload,
        }
    }

    #[tokio::test]
    async fn send_captures_outbound_messages() {
        let channel = MockChannel::new();
        let id = channel
            .send(outbound(OutboundPayload::Text("hello".into())))
            .await
            .unwrap();
        assert!(id.0.starts_with("mock-msg-"));
        channel.send(outbound(OutboundPayload::Typing)).await.unwrap();

        assert_eq!(channel.sent_count().await, 2);
        assert_eq!(
            channel.sent_payloads().await,
            vec![OutboundPayload::Text("hello".into())]
        );
    }

    #[tokio::test]
    async fn failing_mode_rejects_sends() {
        let channel = MockChannel::new();
        channel.set_failing(true);
        assert!(channel.send(outbound(OutboundPayload::Typing)).await.is_err());
        assert_eq!(channel.sent_count().await, 0);
    }
}
