// SPDX-FileCopyrightText: 2026 Storebot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end integration testing.
//!
//! `TestHarness` assembles a temp SQLite database seeded with a store, its
//! owner's paid subscription and (optionally) a subscribed Facebook page,
//! plus mock adapters and a tool dispatcher wired to them. Orchestration
//! layers build on top of these parts.

use std::sync::Arc;

use chrono::{Duration, Utc};
use storebot_config::model::AssistantConfig;
use storebot_core::{Platform, RunSnapshot, StorebotError};
use storebot_storage::database::format_timestamp;
use storebot_storage::queries::{channels, chats, stores, subscriptions};
use storebot_storage::{
    Chat, Database, NewChannel, NewChat, Store, Subscription, SubscriptionStatus,
};
use storebot_tools::ToolDispatcher;

use crate::mock_channel::MockChannel;
use crate::mock_provider::MockProvider;

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    provider: Option<MockProvider>,
    subscribed_channel: bool,
    subscription: bool,
    tokens_limit: i64,
    assistant: AssistantConfig,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            provider: None,
            subscribed_channel: false,
            subscription: true,
            tokens_limit: 100_000,
            assistant: AssistantConfig::default(),
        }
    }

    /// Script the provider's `start_run` snapshots.
    pub fn with_script(mut self, script: Vec<RunSnapshot>) -> Self {
        self.provider = Some(MockProvider::with_script(script));
        self
    }

    /// Use a preconfigured provider (polls, delays).
    pub fn with_provider(mut self, provider: MockProvider) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Connect and subscribe the store's Facebook page.
    pub fn with_subscribed_channel(mut self) -> Self {
        self.subscribed_channel = true;
        self
    }

    /// Leave the store owner without a subscription.
    pub fn without_subscription(mut self) -> Self {
        self.subscription = false;
        self
    }

    pub fn with_tokens_limit(mut self, limit: i64) -> Self {
        self.tokens_limit = limit;
        self
    }

    pub fn with_assistant_config(mut self, config: AssistantConfig) -> Self {
        self.assistant = config;
        self
    }

    /// Build the test harness, creating and seeding the database.
    pub async fn build(self) -> Result<TestHarness, StorebotError> {
        let temp_dir =
            tempfile::TempDir::new().map_err(|e| StorebotError::Storage { source: e.into() })?;
        let db_path = temp_dir.path().join("test.db");
        let db = Database::open(&db_path.to_string_lossy()).await?;

        let store = Store {
            id: TestHarness::STORE_ID.to_string(),
            user_id: TestHarness::OWNER_ID.to_string(),
            name: "Test Store".to_string(),
            email: Some("orders@test-store.example".to_string()),
            facebook_page_id: Some(TestHarness::PAGE_ID.to_string()),
            payment_methods: vec!["cash".to_string()],
            ..Store::default()
        };
        stores::insert_store(&db, &store).await?;

        let now = Utc::now();
        let subscription = Subscription {
            id: "sub-test".to_string(),
            user_id: TestHarness::OWNER_ID.to_string(),
            plan: "pro".to_string(),
            status: if self.subscription {
                SubscriptionStatus::Paid
            } else {
                SubscriptionStatus::Expired
            },
            start_date: format_timestamp(now - Duration::days(1)),
            end_date: format_timestamp(now + Duration::days(30)),
            tokens_limit: self.tokens_limit,
            tokens_used: 0,
        };
        subscriptions::insert_subscription(&db, &subscription).await?;

        if self.subscribed_channel {
            let channel = channels::upsert_channel(
                &db,
                &NewChannel {
                    platform: Platform::Facebook,
                    page_id: TestHarness::PAGE_ID.to_string(),
                    user_id: TestHarness::OWNER_ID.to_string(),
                    name: Some("Test Page".to_string()),
                    access_token: "page-token".to_string(),
                    token_expires_at: Some(format_timestamp(now + Duration::days(60))),
                    category: None,
                    image_url: None,
                    metadata: None,
                },
            )
            .await?;
            channels::set_channel_subscribed(&db, &channel.id, true).await?;
        }

        let provider = Arc::new(self.provider.unwrap_or_default());
        let channel = Arc::new(MockChannel::new());
        let tools = Arc::new(ToolDispatcher::new(db.clone()).with_channel(channel.clone()));

        Ok(TestHarness {
            db,
            store,
            subscription,
            provider,
            channel,
            tools,
            assistant: self.assistant,
            _temp_dir: temp_dir,
        })
    }
}

/// A complete test environment with mock adapters and temp storage.
pub struct TestHarness {
    db: Database,
    /// The seeded store.
    pub store: Store,
    /// The store owner's subscription as seeded.
    pub subscription: Subscription,
    pub provider: Arc<MockProvider>,
    pub channel: Arc<MockChannel>,
    /// Dispatcher over the harness database and mock channel.
    pub tools: Arc<ToolDispatcher>,
    pub assistant: AssistantConfig,
    _temp_dir: tempfile::TempDir,
}

impl TestHarness {
    pub const STORE_ID: &'static str = "store-1";
    pub const OWNER_ID: &'static str = "owner-1";
    pub const PAGE_ID: &'static str = "page-1";

    /// Create a new builder for configuring the test harness.
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    /// Creates the Facebook conversation of `channel_user_id`.
    pub async fn messenger_chat(&self, channel_user_id: &str) -> Result<Chat, StorebotError> {
        let chat = NewChat {
            store_id: Self::STORE_ID.to_string(),
            user_id: Self::OWNER_ID.to_string(),
            platform: Platform::Facebook,
            channel_page_id: Some(Self::PAGE_ID.to_string()),
            channel_user_id: Some(channel_user_id.to_string()),
            thread_id: format!("thread_{}", uuid::Uuid::new_v4().simple()),
        };
        match chats::create_chat_if_absent(&self.db, &chat).await? {
            Some(chat) => Ok(chat),
            None => chats::find_messenger_chat(
                &self.db,
                Self::STORE_ID,
                Platform::Facebook,
                channel_user_id,
            )
            .await?
            .ok_or_else(|| StorebotError::Internal("chat vanished".into())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storebot_usage::active_subscription;

    #[tokio::test]
    async fn builds_seeded_environment() {
        let harness = TestHarness::builder().with_subscribed_channel().build().await.unwrap();

        let store = stores::get_store(harness.db(), TestHarness::STORE_ID)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(store.facebook_page_id.as_deref(), Some(TestHarness::PAGE_ID));
        assert!(active_subscription(harness.db(), TestHarness::OWNER_ID)
            .await
            .unwrap()
            .is_some());
        assert!(channels::find_channel(harness.db(), TestHarness::PAGE_ID, Platform::Facebook, true)
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn messenger_chat_is_stable_per_user() {
        let harness = TestHarness::builder().build().await.unwrap();
        let a = harness.messenger_chat("u1").await.unwrap();
        let b = harness.messenger_chat("u1").await.unwrap();
        assert_eq!(a.id, b.id);
    }

    #[tokio::test]
    async fn without_subscription_has_no_active_plan() {
        let harness = TestHarness::builder().without_subscription().build().await.unwrap();
        assert!(active_subscription(harness.db(), TestHarness::OWNER_ID)
            .await
            .unwrap()
            .is_none());
    }
}
