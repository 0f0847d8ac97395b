// SPDX-FileCopyrightText: 2026 Storebot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Synchronous ask path used by the web widget.

use std::sync::Arc;

use serde::Serialize;
use storebot_core::{StorebotError, TokenUsage};
use storebot_storage::queries::stores;
use storebot_storage::{Database, StoredMessage, Subscription};
use storebot_usage::{require_active_subscription, TurnRecord};
use tracing::info;

use crate::orchestrator::{AskRequest, Orchestrator};
use crate::thread::ThreadResolver;

/// Token counts as reported to web callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageSummary {
    pub user_tokens: u32,
    pub bot_tokens: u32,
    pub total_tokens: u32,
}

impl From<TokenUsage> for UsageSummary {
    fn from(usage: TokenUsage) -> Self {
        Self {
            user_tokens: usage.prompt_tokens,
            bot_tokens: usage.completion_tokens,
            total_tokens: usage.total_tokens,
        }
    }
}

/// Reply to one web ask.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebReply {
    pub accepted: bool,
    pub message: String,
    pub usage: UsageSummary,
    pub thread_id: String,
    /// Subscription after billing this exchange.
    pub subscription: Option<Subscription>,
    /// Messages written for this exchange.
    pub messages: Vec<StoredMessage>,
    /// A newer message on the same thread answered instead.
    pub superseded: bool,
}

/// Store-scoped ask service for web conversations.
#[derive(Clone)]
pub struct WebAssistant {
    db: Database,
    resolver: ThreadResolver,
    orchestrator: Arc<Orchestrator>,
}

impl WebAssistant {
    pub fn new(db: Database, orchestrator: Arc<Orchestrator>) -> Self {
        Self {
            resolver: ThreadResolver::new(db.clone()),
            db,
            orchestrator,
        }
    }

    /// Answers `message` on `thread_id` (or a new thread) for `store_id`.
    ///
    /// Fails when the store is unknown or its owner has no active subscription.
    pub async fn ask(
        &self,
        store_id: &str,
        message: &str,
        thread_id: Option<&str>,
    ) -> Result<WebReply, StorebotError> {
        let store = stores::get_store(&self.db, store_id)
            .await?
            .ok_or_else(|| StorebotError::validation("storeId", "store not found"))?;
        let subscription = require_active_subscription(&self.db, &store.user_id).await?;
        let chat = self.resolver.resolve_web_thread(&store, thread_id).await?;

        let outcome = self
            .orchestrator
            .ask(AskRequest {
                chat: &chat,
                store: &store,
                text: message,
                recipient_id: None,
            })
            .await?;

        if outcome.is_superseded() {
            return Ok(WebReply {
                accepted: true,
                message: String::new(),
                usage: UsageSummary::from(outcome.usage),
                thread_id: chat.thread_id,
                subscription: Some(subscription),
                messages: Vec::new(),
                superseded: true,
            });
        }

        let recorded = self
            .orchestrator
            .recorder()
            .record_exchange(TurnRecord {
                chat: &chat,
                user_text: message,
                assistant_text: &outcome.text,
                usage: outcome.usage,
                subscription_id: Some(&subscription.id),
            })
            .await?;
        info!(thread_id = %chat.thread_id, store_id, state = %outcome.state, "web ask answered");

        Ok(WebReply {
            accepted: true,
            usage: UsageSummary::from(outcome.usage),
            message: outcome.text.clone(),
            thread_id: chat.thread_id,
            subscription: recorded.subscription,
            messages: vec![recorded.user_message, recorded.assistant_message],
            superseded: false,
        })
    }
}
