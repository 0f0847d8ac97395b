// SPDX-FileCopyrightText: 2026 Storebot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Subscription (token budget) operations.

use rusqlite::{params, Connection, OptionalExtension, Row};
use storebot_core::StorebotError;

use crate::database::Database;
use crate::models::{Subscription, SubscriptionStatus};
use crate::queries::parse_column;

const SUBSCRIPTION_COLUMNS: &str =
    "id, user_id, plan, status, start_date, end_date, tokens_limit, tokens_used";

fn row_to_subscription(row: &Row<'_>) -> rusqlite::Result<Subscription> {
    Ok(Subscription {
        id: row.get(0)?,
        user_id: row.get(1)?,
        plan: row.get(2)?,
        status: parse_column(row, 3)?,
        start_date: row.get(4)?,
        end_date: row.get(5)?,
        tokens_limit: row.get(6)?,
        tokens_used: row.get(7)?,
    })
}

/// Insert a subscription row.
pub async fn insert_subscription(db: &Database, sub: &Subscription) -> Result<(), StorebotError> {
    let sub = sub.clone();
    db.connection()
        .call(move |conn| -> rusqlite::Result<()> {
            conn.execute(
                &format!(
                    "INSERT INTO subscriptions ({SUBSCRIPTION_COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"
                ),
                params![
                    sub.id,
                    sub.user_id,
                    sub.plan,
                    sub.status.to_string(),
                    sub.start_date,
                    sub.end_date,
                    sub.tokens_limit,
                    sub.tokens_used,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Active subscription of a user on an open connection or transaction.
pub fn find_active_in(
    conn: &Connection,
    user_id: &str,
    now: &str,
) -> rusqlite::Result<Option<Subscription>> {
    conn.query_row(
        &format!(
            "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions
             WHERE user_id = ?1 AND status = ?2 AND end_date >= ?3 AND tokens_used < tokens_limit
             ORDER BY end_date DESC
             LIMIT 1"
        ),
        params![user_id, SubscriptionStatus::Paid.to_string(), now],
        row_to_subscription,
    )
    .optional()
}

/// The user's paid, unexpired subscription with budget remaining, if any.
pub async fn find_active_subscription(
    db: &Database,
    user_id: &str,
    now: &str,
) -> Result<Option<Subscription>, StorebotError> {
    let user_id = user_id.to_string();
    let now = now.to_string();
    db.connection()
        .call(move |conn| -> rusqlite::Result<Option<Subscription>> {
            find_active_in(conn, &user_id, &now)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Get a subscription by id.
pub async fn get_subscription(
    db: &Database,
    id: &str,
) -> Result<Option<Subscription>, StorebotError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| -> rusqlite::Result<Option<Subscription>> {
            conn.query_row(
                &format!("SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions WHERE id = ?1"),
                params![id],
                row_to_subscription,
            )
            .optional()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Add `tokens` to a subscription's usage and return the updated row.
pub fn add_tokens_in(
    conn: &Connection,
    id: &str,
    tokens: i64,
) -> rusqlite::Result<Option<Subscription>> {
    conn.query_row(
        &format!(
            "UPDATE subscriptions SET tokens_used = tokens_used + ?2
             WHERE id = ?1
             RETURNING {SUBSCRIPTION_COLUMNS}"
        ),
        params![id, tokens],
        row_to_subscription,
    )
    .optional()
}
