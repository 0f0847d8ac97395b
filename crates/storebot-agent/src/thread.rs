// SPDX-FileCopyrightText: 2026 Storebot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Maps an end user (or an explicit web thread handle) to a conversation.
//!
//! Creation is insert-if-absent against unique indexes. A lost race returns
//! no row, and the resolver re-reads the winner's conversation.

use storebot_core::{Platform, StorebotError};
use storebot_storage::queries::chats;
use storebot_storage::{Chat, Database, NewChat, Store};
use tracing::{debug, info, warn};

const CREATE_ATTEMPTS: usize = 3;

/// A fresh external thread handle.
pub fn new_thread_id() -> String {
    format!("thread_{}", uuid::Uuid::new_v4().simple())
}

/// Finds or creates conversations.
#[derive(Clone)]
pub struct ThreadResolver {
    db: Database,
}

impl ThreadResolver {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// The conversation of `channel_user_id` on a messenger-class page.
    pub async fn resolve_thread(
        &self,
        store: &Store,
        platform: Platform,
        channel_page_id: &str,
        channel_user_id: &str,
    ) -> Result<Chat, StorebotError> {
        for attempt in 1..=CREATE_ATTEMPTS {
            if let Some(chat) =
                chats::find_messenger_chat(&self.db, &store.id, platform, channel_user_id).await?
            {
                return Ok(chat);
            }

            let new_chat = NewChat {
                store_id: store.id.clone(),
                user_id: store.user_id.clone(),
                platform,
                channel_page_id: Some(channel_page_id.to_string()),
                channel_user_id: Some(channel_user_id.to_string()),
                thread_id: new_thread_id(),
            };
            if let Some(chat) = chats::create_chat_if_absent(&self.db, &new_chat).await? {
                info!(
                    store_id = %store.id,
                    thread_id = %chat.thread_id,
                    chat_number = chat.chat_number,
                    "conversation created"
                );
                return Ok(chat);
            }
            debug!(store_id = %store.id, attempt, "lost conversation creation race, re-reading");
        }

        warn!(store_id = %store.id, channel_user_id, "conversation could not be resolved");
        Err(StorebotError::Internal(format!(
            "conversation for {channel_user_id} could not be resolved"
        )))
    }

    /// The web conversation for `thread_id`, or a new one.
    ///
    /// A supplied handle with no conversation yet is adopted as-is. A handle
    /// belonging to another store is rejected.
    pub async fn resolve_web_thread(
        &self,
        store: &Store,
        thread_id: Option<&str>,
    ) -> Result<Chat, StorebotError> {
        let thread_id = match thread_id.map(str::trim).filter(|t| !t.is_empty()) {
            Some(id) => id.to_string(),
            None => new_thread_id(),
        };

        for attempt in 1..=CREATE_ATTEMPTS {
            if let Some(chat) = chats::find_chat_by_thread(&self.db, &thread_id).await? {
                if chat.store_id != store.id {
                    return Err(StorebotError::validation(
                        "threadId",
                        "thread belongs to another store",
                    ));
                }
                return Ok(chat);
            }

            let new_chat = NewChat {
                store_id: store.id.clone(),
                user_id: store.user_id.clone(),
                platform: Platform::Web,
                channel_page_id: None,
                channel_user_id: None,
                thread_id: thread_id.clone(),
            };
            if let Some(chat) = chats::create_chat_if_absent(&self.db, &new_chat).await? {
                info!(store_id = %store.id, thread_id = %chat.thread_id, "web conversation created");
                return Ok(chat);
            }
            debug!(thread_id = %thread_id, attempt, "web thread created concurrently, re-reading");
        }

        Err(StorebotError::Internal(format!(
            "thread {thread_id} could not be resolved"
        )))
    }
}
