// SPDX-FileCopyrightText: 2026 Storebot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Processing of Messenger and Instagram webhook deliveries.
//!
//! The HTTP handler acknowledges first and hands the payload to
//! [`MessengerPipeline::accept`], which processes it as a tracked background
//! task. Every event runs the same chain: echo and dedup filters, channel,
//! subscription and store lookups, attachment normalization, thread
//! resolution, one orchestrated turn, delivery and recording. Anything
//! missing along the chain drops the event silently.

use std::sync::Arc;

use storebot_core::{
    ChannelAdapter, OutboundMessage, OutboundPayload, Platform, StorebotError,
};
use storebot_meta::webhook::MessagingEvent;
use storebot_meta::{format_for_messenger, CredentialManager, WebhookPayload};
use storebot_storage::queries::{channels, stores};
use storebot_storage::{Channel, Database};
use storebot_usage::{active_subscription, TurnRecord};
use tracing::{debug, info, warn};

use crate::dedup::DedupCache;
use crate::normalizer::AttachmentNormalizer;
use crate::orchestrator::{AskRequest, Orchestrator};
use crate::shutdown::BackgroundTasks;
use crate::thread::ThreadResolver;

/// Why an event produced no reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    Echo,
    NoContent,
    Duplicate,
    NoChannel,
    NoSubscription,
    NoStore,
    EmptyAfterNormalize,
}

/// What happened to one messaging event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventOutcome {
    Replied { chat_id: String },
    Dropped(DropReason),
    /// A newer message on the thread took over before a reply was produced.
    Superseded,
    /// The reply could not be delivered; nothing was recorded.
    DeliveryFailed,
}

/// Webhook event processor.
pub struct MessengerPipeline {
    db: Database,
    dedup: Arc<DedupCache>,
    resolver: ThreadResolver,
    normalizer: AttachmentNormalizer,
    orchestrator: Arc<Orchestrator>,
    channel: Arc<dyn ChannelAdapter>,
    credentials: Option<CredentialManager>,
    tasks: BackgroundTasks,
}

impl MessengerPipeline {
    pub fn new(
        db: Database,
        dedup: Arc<DedupCache>,
        orchestrator: Arc<Orchestrator>,
        channel: Arc<dyn ChannelAdapter>,
    ) -> Self {
        Self {
            resolver: ThreadResolver::new(db.clone()),
            db,
            dedup,
            normalizer: AttachmentNormalizer::default(),
            orchestrator,
            channel,
            credentials: None,
            tasks: BackgroundTasks::new(),
        }
    }

    pub fn with_normalizer(mut self, normalizer: AttachmentNormalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    /// Refresh page tokens before re-hosting images. Without this the stored
    /// token is used as-is.
    pub fn with_credentials(mut self, credentials: CredentialManager) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn with_tasks(mut self, tasks: BackgroundTasks) -> Self {
        self.tasks = tasks;
        self
    }

    pub fn tasks(&self) -> &BackgroundTasks {
        &self.tasks
    }

    /// Queues a delivery for background processing and returns immediately.
    pub fn accept(self: &Arc<Self>, payload: WebhookPayload) {
        let pipeline = Arc::clone(self);
        self.tasks.spawn("webhook", async move {
            pipeline.handle_payload(&payload).await;
            Ok(())
        });
    }

    /// Processes every event of a delivery in order.
    pub async fn handle_payload(&self, payload: &WebhookPayload) -> Vec<EventOutcome> {
        let Some(platform) = payload.platform() else {
            debug!(object = %payload.object, "ignoring webhook for unsupported object");
            return Vec::new();
        };

        let mut outcomes = Vec::new();
        for event in payload.events() {
            let outcome = match self.handle_event(platform, event).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!(
                        sender_id = %event.sender.id,
                        page_id = %event.recipient.id,
                        error = %e,
                        "webhook event failed"
                    );
                    continue;
                }
            };
            if let EventOutcome::Dropped(reason) = outcome {
                debug!(sender_id = %event.sender.id, ?reason, "webhook event dropped");
            }
            outcomes.push(outcome);
        }
        outcomes
    }

    async fn access_token(&self, channel: &Channel) -> String {
        match &self.credentials {
            Some(credentials) => credentials.get_valid_access_token(channel).await,
            None => channel.access_token.clone(),
        }
    }

    /// Runs one messaging event through the chain.
    pub async fn handle_event(
        &self,
        platform: Platform,
        event: &MessagingEvent,
    ) -> Result<EventOutcome, StorebotError> {
        let sender_id = event.sender.id.as_str();
        let page_id = event.recipient.id.as_str();

        if event.is_echo() {
            return Ok(EventOutcome::Dropped(DropReason::Echo));
        }
        let text = event.text().unwrap_or_default();
        let attachments = event.attachments();
        if text.is_empty() && attachments.is_empty() {
            return Ok(EventOutcome::Dropped(DropReason::NoContent));
        }
        if let Some(mid) = event.message_id()
            && !self.dedup.check_and_mark(mid, sender_id)
        {
            info!(message_id = mid, sender_id, "duplicate webhook delivery skipped");
            return Ok(EventOutcome::Dropped(DropReason::Duplicate));
        }

        let Some(channel) = channels::find_channel(&self.db, page_id, platform, true).await? else {
            return Ok(EventOutcome::Dropped(DropReason::NoChannel));
        };
        let Some(subscription) = active_subscription(&self.db, &channel.user_id).await? else {
            return Ok(EventOutcome::Dropped(DropReason::NoSubscription));
        };
        let Some(store) = stores::find_store_by_page(&self.db, platform, page_id).await? else {
            return Ok(EventOutcome::Dropped(DropReason::NoStore));
        };

        let token = self.access_token(&channel).await;
        let user_text = self
            .normalizer
            .format_message_with_attachments(text, &attachments, Some(&token))
            .await;
        if user_text.trim().is_empty() {
            return Ok(EventOutcome::Dropped(DropReason::EmptyAfterNormalize));
        }
        let chat = self
            .resolver
            .resolve_thread(&store, platform, page_id, sender_id)
            .await?;

        let outbound = |payload| OutboundMessage {
            page_id: page_id.to_string(),
            platform,
            recipient_id: sender_id.to_string(),
            payload,
        };
        if platform == Platform::Facebook
            && let Err(e) = self.channel.send(outbound(OutboundPayload::Typing)).await
        {
            debug!(sender_id, error = %e, "typing indicator failed");
        }

        let outcome = self
            .orchestrator
            .ask(AskRequest {
                chat: &chat,
                store: &store,
                text: &user_text,
                recipient_id: Some(sender_id),
            })
            .await?;
        if outcome.is_superseded() {
            return Ok(EventOutcome::Superseded);
        }

        let mut reply = format_for_messenger(&outcome.text);
        if reply.is_empty() {
            reply = self.orchestrator.config().fallback_reply.clone();
        }
        if let Err(e) = self.channel.send(outbound(OutboundPayload::Text(reply.clone()))).await {
            warn!(thread_id = %chat.thread_id, sender_id, error = %e, "reply delivery failed");
            return Ok(EventOutcome::DeliveryFailed);
        }

        self.orchestrator
            .recorder()
            .record_exchange(TurnRecord {
                chat: &chat,
                user_text: &user_text,
                assistant_text: &reply,
                usage: outcome.usage,
                subscription_id: Some(&subscription.id),
            })
            .await?;
        info!(thread_id = %chat.thread_id, sender_id, state = %outcome.state, "reply sent");

        Ok(EventOutcome::Replied { chat_id: chat.id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use std::time::Duration;
    use storebot_meta::{GraphClient, MediaRehoster};
    use storebot_storage::queries::{chats, messages, subscriptions};
    use storebot_storage::{NewChannel, Store};
    use storebot_test_utils::mock_provider::completed;
    use storebot_test_utils::{MockBlobStore, TestHarness};
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};
    use crate::normalizer::IMAGE_CUE;
    use crate::testing::Fixture;

    fn delivery_with(object: &str, page_id: &str, sender: &str, message: Value) -> WebhookPayload {
        serde_json::from_value(json!({
            "object": object,
            "entry": [{
                "id": page_id,
                "messaging": [{
                    "sender": { "id": sender },
                    "recipient": { "id": page_id },
                    "message": message
                }]
            }]
        }))
        .unwrap()
    }

    fn delivery(object: &str, mid: &str, sender: &str, text: &str) -> WebhookPayload {
        delivery_with(
            object,
            TestHarness::PAGE_ID,
            sender,
            json!({ "mid": mid, "text": text }),
        )
    }

    async fn pipeline(harness: &Fixture) -> MessengerPipeline {
        MessengerPipeline::new(
            harness.db().clone(),
            Arc::new(DedupCache::new(std::time::Duration::from_secs(3600), 100)),
            Arc::clone(&harness.orchestrator),
            harness.channel.clone(),
        )
    }

    #[tokio::test]
    async fn greeting_is_answered_recorded_and_billed_once() {
        let harness = Fixture::build(
            TestHarness::builder()
                .with_script(vec![completed("**Hi** there!")])
                .with_subscribed_channel(),
        )
        .await;
        let pipeline = pipeline(&harness).await;

        let outcomes = pipeline.handle_payload(&delivery("page", "m1", "u1", "hello")).await;
        let EventOutcome::Replied { chat_id } = &outcomes[0] else {
            panic!("expected a reply, got {outcomes:?}");
        };

        let sent = harness.channel.sent_messages().await;
        assert_eq!(sent[0].payload, OutboundPayload::Typing);
        assert_eq!(harness.channel.sent_payloads().await, vec![OutboundPayload::Text("Hi there!".into())]);
        assert_eq!(sent[1].recipient_id, "u1");

        let transcript = messages::recent_messages(harness.db(), chat_id, 10).await.unwrap();
        let contents: Vec<_> = transcript.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["hello", "Hi there!"]);

        let sub = subscriptions::get_subscription(harness.db(), &harness.subscription.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(sub.tokens_used, 30);

        // Redelivery of the same event has no side effects.
        let replay = pipeline.handle_payload(&delivery("page", "m1", "u1", "hello")).await;
        assert_eq!(replay, vec![EventOutcome::Dropped(DropReason::Duplicate)]);
        assert_eq!(harness.provider.request_count().await, 1);
        assert_eq!(harness.channel.sent_count().await, 2);
        let sub = subscriptions::get_subscription(harness.db(), &harness.subscription.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(sub.tokens_used, 30);
    }

    #[tokio::test]
    async fn echoes_and_empty_events_are_ignored() {
        let harness = Fixture::build(TestHarness::builder().with_subscribed_channel()).await;
        let pipeline = pipeline(&harness).await;
        let payload: WebhookPayload = serde_json::from_value(json!({
            "object": "page",
            "entry": [{
                "messaging": [
                    {
                        "sender": { "id": TestHarness::PAGE_ID },
                        "recipient": { "id": "u1" },
                        "message": { "mid": "m1", "text": "echo", "is_echo": true }
                    },
                    {
                        "sender": { "id": "u1" },
                        "recipient": { "id": TestHarness::PAGE_ID },
                        "message": { "mid": "m2" }
                    }
                ]
            }]
        }))
        .unwrap();

        let outcomes = pipeline.handle_payload(&payload).await;
        assert_eq!(
            outcomes,
            vec![
                EventOutcome::Dropped(DropReason::Echo),
                EventOutcome::Dropped(DropReason::NoContent)
            ]
        );
        assert_eq!(harness.channel.sent_count().await, 0);
    }

    #[tokio::test]
    async fn unsubscribed_channel_drops_silently() {
        let harness = Fixture::build(TestHarness::builder()).await;
        let pipeline = pipeline(&harness).await;
        let outcomes = pipeline.handle_payload(&delivery("page", "m1", "u1", "hi")).await;
        assert_eq!(outcomes, vec![EventOutcome::Dropped(DropReason::NoChannel)]);
        assert_eq!(harness.provider.request_count().await, 0);
    }

    #[tokio::test]
    async fn missing_subscription_drops_silently() {
        let harness = Fixture::build(
            TestHarness::builder()
                .with_subscribed_channel()
                .without_subscription(),
        )
        .await;
        let pipeline = pipeline(&harness).await;
        let outcomes = pipeline.handle_payload(&delivery("page", "m1", "u1", "hi")).await;
        assert_eq!(outcomes, vec![EventOutcome::Dropped(DropReason::NoSubscription)]);
        assert_eq!(harness.channel.sent_count().await, 0);
    }

    #[tokio::test]
    async fn unknown_objects_are_ignored() {
        let harness = Fixture::build(TestHarness::builder().with_subscribed_channel()).await;
        let pipeline = pipeline(&harness).await;
        assert!(pipeline
            .handle_payload(&delivery("whatsapp_business_account", "m1", "u1", "hi"))
            .await
            .is_empty());
    }

    #[tokio::test]
    async fn delivery_failure_skips_recording() {
        let harness = Fixture::build(TestHarness::builder().with_subscribed_channel()).await;
        harness.channel.set_failing(true);
        let pipeline = pipeline(&harness).await;

        let outcomes = pipeline.handle_payload(&delivery("page", "m1", "u1", "hi")).await;
        assert_eq!(outcomes, vec![EventOutcome::DeliveryFailed]);

        let sub = subscriptions::get_subscription(harness.db(), &harness.subscription.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(sub.tokens_used, 0);
    }

    #[tokio::test]
    async fn accepted_deliveries_run_in_the_background() {
        let harness = Fixture::build(TestHarness::builder().with_subscribed_channel()).await;
        let pipeline = Arc::new(pipeline(&harness).await);

        pipeline.accept(delivery("page", "m1", "u1", "hi"));
        assert!(pipeline.tasks().drain(std::time::Duration::from_secs(5)).await);

        assert_eq!(
            harness.channel.sent_payloads().await,
            vec![OutboundPayload::Text("mock response".into())]
        );
    }

    #[tokio::test]
    async fn returning_user_keeps_their_conversation() {
        let harness = Fixture::build(TestHarness::builder().with_subscribed_channel()).await;
        let pipeline = pipeline(&harness).await;

        let first = pipeline.handle_payload(&delivery("page", "m1", "u1", "hi")).await;
        let second = pipeline.handle_payload(&delivery("page", "m2", "u1", "again")).await;
        let other = pipeline.handle_payload(&delivery("page", "m3", "u2", "hey")).await;

        assert_eq!(first, second);
        assert_ne!(first, other);
    }

    #[tokio::test]
    async fn image_only_message_is_rehosted_with_the_page_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/cdn/shoe.jpg"))
            .and(query_param("access_token", "page-token"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "image/jpeg")
                    .set_body_bytes(vec![7u8, 7, 7]),
            )
            .expect(1)
            .mount(&server)
            .await;
        let harness = Fixture::build(TestHarness::builder().with_subscribed_channel()).await;
        let blob = Arc::new(MockBlobStore::new());
        let graph = GraphClient::new(&server.uri(), Duration::from_secs(5)).unwrap();
        let rehoster = MediaRehoster::new(
            graph,
            blob.clone(),
            vec![server.address().ip().to_string()],
            "facebook-images",
        );
        let pipeline = pipeline(&harness)
            .await
            .with_normalizer(AttachmentNormalizer::new(Some(Arc::new(rehoster))));

        let image_url = format!("{}/cdn/shoe.jpg", server.uri());
        let payload = delivery_with(
            "page",
            TestHarness::PAGE_ID,
            "u1",
            json!({
                "mid": "m-img",
                "attachments": [{ "type": "image", "payload": { "url": image_url } }]
            }),
        );
        let outcomes = pipeline.handle_payload(&payload).await;
        let EventOutcome::Replied { chat_id } = &outcomes[0] else {
            panic!("expected a reply, got {outcomes:?}");
        };

        let uploads = blob.uploads().await;
        assert_eq!(uploads.len(), 1);
        let expected = format!("{IMAGE_CUE}\nhttps://blob.test/{}", uploads[0].key);
        let request = harness.provider.requests().await.pop().unwrap();
        assert_eq!(
            request.messages.last().unwrap().content.as_deref(),
            Some(expected.as_str())
        );
        let transcript = messages::recent_messages(harness.db(), chat_id, 10).await.unwrap();
        assert_eq!(transcript[0].content, expected);
    }

    #[tokio::test]
    async fn instagram_delivery_is_answered_on_instagram() {
        let harness = Fixture::build(TestHarness::builder()).await;
        stores::insert_store(
            harness.db(),
            &Store {
                id: "store-ig".into(),
                user_id: TestHarness::OWNER_ID.into(),
                name: "Insta Store".into(),
                instagram_page_id: Some("ig-1".into()),
                ..Store::default()
            },
        )
        .await
        .unwrap();
        let channel = channels::upsert_channel(
            harness.db(),
            &NewChannel {
                platform: Platform::Instagram,
                page_id: "ig-1".into(),
                user_id: TestHarness::OWNER_ID.into(),
                name: None,
                access_token: "ig-token".into(),
                token_expires_at: None,
                category: None,
                image_url: None,
                metadata: None,
            },
        )
        .await
        .unwrap();
        channels::set_channel_subscribed(harness.db(), &channel.id, true)
            .await
            .unwrap();
        let pipeline = pipeline(&harness).await;

        let payload = delivery_with("instagram", "ig-1", "igsid-1", json!({ "mid": "m1", "text": "hi" }));
        let outcomes = pipeline.handle_payload(&payload).await;
        assert!(matches!(outcomes[0], EventOutcome::Replied { .. }));

        // No typing indicator on Instagram; only the reply.
        let sent = harness.channel.sent_messages().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].platform, Platform::Instagram);
        assert_eq!(sent[0].page_id, "ig-1");
        assert_eq!(sent[0].recipient_id, "igsid-1");
        assert_eq!(sent[0].payload, OutboundPayload::Text("mock response".into()));

        let chat = chats::find_messenger_chat(harness.db(), "store-ig", Platform::Instagram, "igsid-1")
            .await
            .unwrap();
        assert!(chat.is_some());
    }

    #[tokio::test]
    async fn concurrent_redeliveries_are_answered_once() {
        let harness = Fixture::build(TestHarness::builder().with_subscribed_channel()).await;
        let pipeline = Arc::new(pipeline(&harness).await);

        pipeline.accept(delivery("page", "m-dup", "u1", "hi"));
        pipeline.accept(delivery("page", "m-dup", "u1", "hi"));
        assert!(pipeline.tasks().drain(Duration::from_secs(5)).await);

        assert_eq!(harness.provider.request_count().await, 1);
        assert_eq!(
            harness.channel.sent_payloads().await,
            vec![OutboundPayload::Text("mock response".into())]
        );
        let sub = subscriptions::get_subscription(harness.db(), &harness.subscription.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(sub.tokens_used, 30);
    }

    #[tokio::test]
    async fn blank_message_leaves_no_conversation_behind() {
        let harness = Fixture::build(TestHarness::builder().with_subscribed_channel()).await;
        let pipeline = pipeline(&harness).await;

        let outcomes = pipeline.handle_payload(&delivery("page", "m1", "u1", "   ")).await;
        assert_eq!(outcomes, vec![EventOutcome::Dropped(DropReason::EmptyAfterNormalize)]);

        let chat = chats::find_messenger_chat(harness.db(), TestHarness::STORE_ID, Platform::Facebook, "u1")
            .await
            .unwrap();
        assert!(chat.is_none());
        assert_eq!(harness.provider.request_count().await, 0);
    }
}
