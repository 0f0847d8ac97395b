// SPDX-FileCopyrightText: 2026 Storebot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Atomic transcript append plus token billing.
//!
//! A completed exchange writes the user turn, the assistant turn and the
//! subscription increment in one SQLite transaction, so transcripts and
//! billing counters cannot diverge after a crash.

use storebot_core::{StorebotError, TokenUsage};
use storebot_storage::queries::{messages, subscriptions};
use storebot_storage::{now_timestamp, Chat, Database, MessageRole, StoredMessage, Subscription};
use tracing::{info, warn};

use crate::budget::warn_if_near_limit;

/// One finished turn to persist.
#[derive(Debug, Clone)]
pub struct TurnRecord<'a> {
    pub chat: &'a Chat,
    pub user_text: &'a str,
    pub assistant_text: &'a str,
    pub usage: TokenUsage,
    /// Subscription checked when the turn started; billed even if the turn
    /// itself pushed it over the limit. `None` bills the owner's current
    /// active subscription, if any.
    pub subscription_id: Option<&'a str>,
}

/// What was written for one exchange.
#[derive(Debug, Clone)]
pub struct RecordedExchange {
    pub user_message: StoredMessage,
    pub assistant_message: StoredMessage,
    /// Subscription after the increment; `None` when nothing was billed.
    pub subscription: Option<Subscription>,
}

/// What was written for a superseded turn.
#[derive(Debug, Clone)]
pub struct RecordedUserTurn {
    pub user_message: StoredMessage,
    /// Subscription after the increment; `None` when nothing was billed.
    pub subscription: Option<Subscription>,
}

/// Persists transcript turns and bills token usage.
#[derive(Clone)]
pub struct UsageRecorder {
    db: Database,
}

fn new_message(chat: &Chat, role: MessageRole, content: &str, tokens: u32, at: &str) -> StoredMessage {
    StoredMessage {
        id: uuid::Uuid::new_v4().to_string(),
        chat_id: chat.id.clone(),
        store_id: chat.store_id.clone(),
        user_id: chat.user_id.clone(),
        role,
        content: content.to_string(),
        tokens: i64::from(tokens),
        channel_user_id: chat.channel_user_id.clone(),
        created_at: at.to_string(),
    }
}

impl UsageRecorder {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Append both turns and add `usage.total_tokens` to the subscription.
    ///
    /// User turn carries prompt tokens, assistant turn completion tokens.
    pub async fn record_exchange(
        &self,
        turn: TurnRecord<'_>,
    ) -> Result<RecordedExchange, StorebotError> {
        let now = now_timestamp();
        let user_message = new_message(
            turn.chat,
            MessageRole::User,
            turn.user_text,
            turn.usage.prompt_tokens,
            &now,
        );
        let assistant_message = new_message(
            turn.chat,
            MessageRole::Assistant,
            turn.assistant_text,
            turn.usage.completion_tokens,
            &now,
        );
        let owner = turn.chat.user_id.clone();
        let subscription_id = turn.subscription_id.map(str::to_string);
        let total = i64::from(turn.usage.total_tokens);

        let (user_message, assistant_message, subscription) = self
            .db
            .connection()
            .call(move |conn| -> rusqlite::Result<_> {
                let tx = conn.transaction()?;
                messages::append_message_in(&tx, &user_message)?;
                messages::append_message_in(&tx, &assistant_message)?;

                let target = match subscription_id {
                    Some(id) => Some(id),
                    None => subscriptions::find_active_in(&tx, &owner, &now)?.map(|s| s.id),
                };
                let subscription = match target {
                    Some(id) => subscriptions::add_tokens_in(&tx, &id, total)?,
                    None => None,
                };

                tx.commit()?;
                Ok((user_message, assistant_message, subscription))
            })
            .await
            .map_err(storebot_storage::database::map_tr_err)?;

        match &subscription {
            Some(sub) => {
                info!(
                    chat_id = %turn.chat.id,
                    subscription_id = %sub.id,
                    total_tokens = total,
                    tokens_used = sub.tokens_used,
                    "exchange recorded"
                );
                warn_if_near_limit(sub);
            }
            None => warn!(
                chat_id = %turn.chat.id,
                total_tokens = total,
                "exchange recorded without a subscription to bill"
            ),
        }

        Ok(RecordedExchange {
            user_message,
            assistant_message,
            subscription,
        })
    }

    /// Append only the user turn and bill whatever the turn already spent.
    ///
    /// Used when a newer turn supersedes this one before it produced a reply,
    /// so the message still appears in the next turn's history. Provider
    /// rounds finished before the cancellation are billed to the owner's
    /// active subscription in the same transaction.
    pub async fn record_user_only(
        &self,
        chat: &Chat,
        user_text: &str,
        usage: TokenUsage,
    ) -> Result<RecordedUserTurn, StorebotError> {
        let now = now_timestamp();
        let message = new_message(chat, MessageRole::User, user_text, usage.total_tokens, &now);
        let owner = chat.user_id.clone();
        let total = i64::from(usage.total_tokens);

        let (user_message, subscription) = self
            .db
            .connection()
            .call(move |conn| -> rusqlite::Result<_> {
                let tx = conn.transaction()?;
                messages::append_message_in(&tx, &message)?;
                let subscription = if total > 0 {
                    match subscriptions::find_active_in(&tx, &owner, &now)? {
                        Some(active) => subscriptions::add_tokens_in(&tx, &active.id, total)?,
                        None => None,
                    }
                } else {
                    None
                };
                tx.commit()?;
                Ok((message, subscription))
            })
            .await
            .map_err(storebot_storage::database::map_tr_err)?;

        info!(chat_id = %chat.id, total_tokens = total, "superseded user turn recorded");
        if let Some(sub) = &subscription {
            warn_if_near_limit(sub);
        }
        Ok(RecordedUserTurn {
            user_message,
            subscription,
        })
    }
}
