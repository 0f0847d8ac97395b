// SPDX-FileCopyrightText: 2026 Storebot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Channel CRUD operations.

use rusqlite::{params, OptionalExtension, Row};
use storebot_core::{Platform, StorebotError};

use crate::database::{now_timestamp, Database};
use crate::models::{Channel, NewChannel};
use crate::queries::parse_column;

const CHANNEL_COLUMNS: &str = "id, platform, page_id, user_id, name, access_token, \
     token_expires_at, is_subscribed, category, image_url, metadata";

fn row_to_channel(row: &Row<'_>) -> rusqlite::Result<Channel> {
    let metadata: Option<String> = row.get(10)?;
    Ok(Channel {
        id: row.get(0)?,
        platform: parse_column(row, 1)?,
        page_id: row.get(2)?,
        user_id: row.get(3)?,
        name: row.get(4)?,
        access_token: row.get(5)?,
        token_expires_at: row.get(6)?,
        is_subscribed: row.get(7)?,
        category: row.get(8)?,
        image_url: row.get(9)?,
        metadata: metadata.and_then(|raw| serde_json::from_str(&raw).ok()),
    })
}

/// Insert or refresh a channel keyed by `(page_id, platform)`.
///
/// Reconnecting replaces the token and profile fields but keeps the id and
/// the subscription flag.
pub async fn upsert_channel(db: &Database, channel: &NewChannel) -> Result<Channel, StorebotError> {
    let channel = channel.clone();
    let new_id = uuid::Uuid::new_v4().to_string();
    let now = now_timestamp();
    db.connection()
        .call(move |conn| -> rusqlite::Result<Channel> {
            let metadata = channel.metadata.as_ref().map(|m| m.to_string());
            conn.query_row(
                &format!(
                    "INSERT INTO channels (id, platform, page_id, user_id, name, access_token,
                         token_expires_at, category, image_url, metadata, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?11)
                     ON CONFLICT (page_id, platform) DO UPDATE SET
                         user_id = excluded.user_id,
                         name = excluded.name,
                         access_token = excluded.access_token,
                         token_expires_at = excluded.token_expires_at,
                         category = excluded.category,
                         image_url = excluded.image_url,
                         metadata = excluded.metadata,
                         updated_at = excluded.updated_at
                     RETURNING {CHANNEL_COLUMNS}"
                ),
                params![
                    new_id,
                    channel.platform.to_string(),
                    channel.page_id,
                    channel.user_id,
                    channel.name,
                    channel.access_token,
                    channel.token_expires_at,
                    channel.category,
                    channel.image_url,
                    metadata,
                    now,
                ],
                row_to_channel,
            )
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Get a channel by id.
pub async fn get_channel(db: &Database, id: &str) -> Result<Option<Channel>, StorebotError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| -> rusqlite::Result<Option<Channel>> {
            conn.query_row(
                &format!("SELECT {CHANNEL_COLUMNS} FROM channels WHERE id = ?1"),
                params![id],
                row_to_channel,
            )
            .optional()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Find the channel for a page, optionally only if it is subscribed to webhooks.
pub async fn find_channel(
    db: &Database,
    page_id: &str,
    platform: Platform,
    subscribed_only: bool,
) -> Result<Option<Channel>, StorebotError> {
    let page_id = page_id.to_string();
    let platform = platform.to_string();
    db.connection()
        .call(move |conn| -> rusqlite::Result<Option<Channel>> {
            conn.query_row(
                &format!(
                    "SELECT {CHANNEL_COLUMNS} FROM channels
                     WHERE page_id = ?1 AND platform = ?2 AND (?3 = 0 OR is_subscribed = 1)"
                ),
                params![page_id, platform, subscribed_only],
                row_to_channel,
            )
            .optional()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Persist a refreshed page token.
pub async fn update_channel_token(
    db: &Database,
    id: &str,
    access_token: &str,
    expires_at: &str,
) -> Result<(), StorebotError> {
    let id = id.to_string();
    let access_token = access_token.to_string();
    let expires_at = expires_at.to_string();
    let now = now_timestamp();
    db.connection()
        .call(move |conn| -> rusqlite::Result<()> {
            conn.execute(
                "UPDATE channels SET access_token = ?2, token_expires_at = ?3, updated_at = ?4
                 WHERE id = ?1",
                params![id, access_token, expires_at, now],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Flip the webhook subscription flag.
pub async fn set_channel_subscribed(
    db: &Database,
    id: &str,
    subscribed: bool,
) -> Result<(), StorebotError> {
    let id = id.to_string();
    let now = now_timestamp();
    db.connection()
        .call(move |conn| -> rusqlite::Result<()> {
            conn.execute(
                "UPDATE channels SET is_subscribed = ?2, updated_at = ?3 WHERE id = ?1",
                params![id, subscribed, now],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}
