// SPDX-FileCopyrightText: 2026 Storebot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation lookups and race-safe creation.

use rusqlite::{params, OptionalExtension, Row};
use storebot_core::{Platform, StorebotError};

use crate::database::{now_timestamp, Database};
use crate::models::{Chat, NewChat};
use crate::queries::parse_column;

const CHAT_COLUMNS: &str = "id, store_id, user_id, platform, channel_page_id, channel_user_id, \
     thread_id, chat_number, created_at";

fn row_to_chat(row: &Row<'_>) -> rusqlite::Result<Chat> {
    Ok(Chat {
        id: row.get(0)?,
        store_id: row.get(1)?,
        user_id: row.get(2)?,
        platform: parse_column(row, 3)?,
        channel_page_id: row.get(4)?,
        channel_user_id: row.get(5)?,
        thread_id: row.get(6)?,
        chat_number: row.get(7)?,
        created_at: row.get(8)?,
    })
}

/// Name of the per-store conversation counter.
pub fn chat_counter_name(store_id: &str) -> String {
    format!("chat-{store_id}")
}

/// Find the conversation of one end user on one platform of one store.
pub async fn find_messenger_chat(
    db: &Database,
    store_id: &str,
    platform: Platform,
    channel_user_id: &str,
) -> Result<Option<Chat>, StorebotError> {
    let store_id = store_id.to_string();
    let platform = platform.to_string();
    let channel_user_id = channel_user_id.to_string();
    db.connection()
        .call(move |conn| -> rusqlite::Result<Option<Chat>> {
            conn.query_row(
                &format!(
                    "SELECT {CHAT_COLUMNS} FROM chats
                     WHERE store_id = ?1 AND platform = ?2 AND channel_user_id = ?3"
                ),
                params![store_id, platform, channel_user_id],
                row_to_chat,
            )
            .optional()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Find the most recent messenger-class conversation of an end user in a store.
pub async fn find_chat_by_channel_user(
    db: &Database,
    store_id: &str,
    channel_user_id: &str,
) -> Result<Option<Chat>, StorebotError> {
    let store_id = store_id.to_string();
    let channel_user_id = channel_user_id.to_string();
    db.connection()
        .call(move |conn| -> rusqlite::Result<Option<Chat>> {
            conn.query_row(
                &format!(
                    "SELECT {CHAT_COLUMNS} FROM chats
                     WHERE store_id = ?1 AND channel_user_id = ?2
                     ORDER BY chat_number DESC LIMIT 1"
                ),
                params![store_id, channel_user_id],
                row_to_chat,
            )
            .optional()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Find a conversation by its thread handle.
pub async fn find_chat_by_thread(
    db: &Database,
    thread_id: &str,
) -> Result<Option<Chat>, StorebotError> {
    let thread_id = thread_id.to_string();
    db.connection()
        .call(move |conn| -> rusqlite::Result<Option<Chat>> {
            conn.query_row(
                &format!("SELECT {CHAT_COLUMNS} FROM chats WHERE thread_id = ?1"),
                params![thread_id],
                row_to_chat,
            )
            .optional()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Insert a conversation unless one with the same identity already exists.
///
/// The counter increment and the insert share a transaction: when a unique
/// index rejects the row the transaction rolls back, so a lost race never
/// consumes a `chat_number`. Returns `None` on conflict; callers re-read.
pub async fn create_chat_if_absent(
    db: &Database,
    chat: &NewChat,
) -> Result<Option<Chat>, StorebotError> {
    let chat = chat.clone();
    let id = uuid::Uuid::new_v4().to_string();
    let now = now_timestamp();
    db.connection()
        .call(move |conn| -> rusqlite::Result<Option<Chat>> {
            let tx = conn.transaction()?;

            let chat_number: i64 = tx.query_row(
                "INSERT INTO store_counters (name, value) VALUES (?1, 1)
                 ON CONFLICT (name) DO UPDATE SET value = value + 1
                 RETURNING value",
                params![chat_counter_name(&chat.store_id)],
                |row| row.get(0),
            )?;

            let inserted = tx.execute(
                "INSERT INTO chats (id, store_id, user_id, platform, channel_page_id,
                     channel_user_id, thread_id, chat_number, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                 ON CONFLICT DO NOTHING",
                params![
                    id,
                    chat.store_id,
                    chat.user_id,
                    chat.platform.to_string(),
                    chat.channel_page_id,
                    chat.channel_user_id,
                    chat.thread_id,
                    chat_number,
                    now,
                ],
            )?;

            if inserted == 0 {
                // Dropping the transaction rolls back the counter bump.
                return Ok(None);
            }
            tx.commit()?;

            Ok(Some(Chat {
                id,
                store_id: chat.store_id,
                user_id: chat.user_id,
                platform: chat.platform,
                channel_page_id: chat.channel_page_id,
                channel_user_id: chat.channel_user_id,
                thread_id: chat.thread_id,
                chat_number,
                created_at: now,
            }))
        })
        .await
        .map_err(crate::database::map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::test_support::{open_db, seed_store};

    fn messenger_chat(store: &str, user: &str, thread: &str) -> NewChat {
        NewChat {
            store_id: store.into(),
            user_id: format!("owner-{store}"),
            platform: Platform::Facebook,
            channel_page_id: Some(format!("fb-{store}")),
            channel_user_id: Some(user.into()),
            thread_id: thread.into(),
        }
    }

    #[tokio::test]
    async fn chat_numbers_increase_per_store() {
        let (db, _dir) = open_db().await;
        seed_store(&db, "s1").await;
        seed_store(&db, "s2").await;

        let a = create_chat_if_absent(&db, &messenger_chat("s1", "u1", "t1"))
            .await
            .unwrap()
            .unwrap();
        let b = create_chat_if_absent(&db, &messenger_chat("s1", "u2", "t2"))
            .await
            .unwrap()
            .unwrap();
        let c = create_chat_if_absent(&db, &messenger_chat("s2", "u1", "t3"))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(a.chat_number, 1);
        assert_eq!(b.chat_number, 2);
        assert_eq!(c.chat_number, 1);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn duplicate_identity_returns_none_without_consuming_number() {
        let (db, _dir) = open_db().await;
        seed_store(&db, "s1").await;

        create_chat_if_absent(&db, &messenger_chat("s1", "u1", "t1"))
            .await
            .unwrap()
            .unwrap();
        let dup = create_chat_if_absent(&db, &messenger_chat("s1", "u1", "t-other"))
            .await
            .unwrap();
        assert!(dup.is_none());

        let next = create_chat_if_absent(&db, &messenger_chat("s1", "u2", "t2"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(next.chat_number, 2, "rolled-back insert must not skip a number");

        let found = find_messenger_chat(&db, "s1", Platform::Facebook, "u1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.thread_id, "t1");
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn web_chats_are_keyed_by_thread() {
        let (db, _dir) = open_db().await;
        seed_store(&db, "s1").await;

        let web = |thread: &str| NewChat {
            store_id: "s1".into(),
            user_id: "owner-s1".into(),
            platform: Platform::Web,
            channel_page_id: None,
            channel_user_id: None,
            thread_id: thread.into(),
        };
        assert!(create_chat_if_absent(&db, &web("w1")).await.unwrap().is_some());
        assert!(create_chat_if_absent(&db, &web("w2")).await.unwrap().is_some());
        assert!(create_chat_if_absent(&db, &web("w1")).await.unwrap().is_none());

        let chat = find_chat_by_thread(&db, "w2").await.unwrap().unwrap();
        assert_eq!(chat.platform, Platform::Web);
        assert!(chat.channel_user_id.is_none());
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn find_by_channel_user_ignores_platform() {
        let (db, _dir) = open_db().await;
        seed_store(&db, "s1").await;
        create_chat_if_absent(&db, &messenger_chat("s1", "u1", "t1"))
            .await
            .unwrap();

        let chat = find_chat_by_channel_user(&db, "s1", "u1").await.unwrap();
        assert_eq!(chat.map(|c| c.thread_id), Some("t1".to_string()));
        assert!(find_chat_by_channel_user(&db, "s1", "nobody").await.unwrap().is_none());
        db.close().await.unwrap();
    }
}
