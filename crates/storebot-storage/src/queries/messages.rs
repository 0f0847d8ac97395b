// SPDX-FileCopyrightText: 2026 Storebot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Transcript operations.

use rusqlite::{params, Connection, Row};
use storebot_core::StorebotError;

use crate::database::Database;
use crate::models::StoredMessage;
use crate::queries::parse_column;

const MESSAGE_COLUMNS: &str =
    "id, chat_id, store_id, user_id, role, content, tokens, channel_user_id, created_at";

fn row_to_message(row: &Row<'_>) -> rusqlite::Result<StoredMessage> {
    Ok(StoredMessage {
        id: row.get(0)?,
        chat_id: row.get(1)?,
        store_id: row.get(2)?,
        user_id: row.get(3)?,
        role: parse_column(row, 4)?,
        content: row.get(5)?,
        tokens: row.get(6)?,
        channel_user_id: row.get(7)?,
        created_at: row.get(8)?,
    })
}

/// Append a message on an open connection or transaction.
pub fn append_message_in(conn: &Connection, msg: &StoredMessage) -> rusqlite::Result<()> {
    conn.execute(
        &format!(
            "INSERT INTO messages ({MESSAGE_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"
        ),
        params![
            msg.id,
            msg.chat_id,
            msg.store_id,
            msg.user_id,
            msg.role.to_string(),
            msg.content,
            msg.tokens,
            msg.channel_user_id,
            msg.created_at,
        ],
    )?;
    Ok(())
}

/// Append a single message.
pub async fn insert_message(db: &Database, msg: &StoredMessage) -> Result<(), StorebotError> {
    let msg = msg.clone();
    db.connection()
        .call(move |conn| -> rusqlite::Result<()> { append_message_in(conn, &msg) })
        .await
        .map_err(crate::database::map_tr_err)
}

/// The last `limit` messages of a chat, oldest first.
pub async fn recent_messages(
    db: &Database,
    chat_id: &str,
    limit: usize,
) -> Result<Vec<StoredMessage>, StorebotError> {
    let chat_id = chat_id.to_string();
    db.connection()
        .call(move |conn| -> rusqlite::Result<Vec<StoredMessage>> {
            let mut stmt = conn.prepare(&format!(
                "SELECT {MESSAGE_COLUMNS} FROM messages
                 WHERE chat_id = ?1
                 ORDER BY created_at DESC, rowid DESC
                 LIMIT ?2"
            ))?;
            let rows = stmt.query_map(params![chat_id, limit as i64], row_to_message)?;
            let mut messages = rows.collect::<rusqlite::Result<Vec<_>>>()?;
            messages.reverse();
            Ok(messages)
        })
        .await
        .map_err(crate::database::map_tr_err)
}
