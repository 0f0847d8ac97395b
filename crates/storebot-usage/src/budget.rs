// SPDX-FileCopyrightText: 2026 Storebot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Subscription budget checks.

use storebot_core::StorebotError;
use storebot_storage::queries::subscriptions;
use storebot_storage::{now_timestamp, Database, Subscription};
use tracing::{debug, warn};

/// Fraction of the token limit at which a warning is logged.
const WARN_RATIO: f64 = 0.8;

/// The user's active subscription, if any.
pub async fn active_subscription(
    db: &Database,
    user_id: &str,
) -> Result<Option<Subscription>, StorebotError> {
    let sub = subscriptions::find_active_subscription(db, user_id, &now_timestamp()).await?;
    match &sub {
        Some(sub) => warn_if_near_limit(sub),
        None => debug!(user_id, "no active subscription"),
    }
    Ok(sub)
}

/// Like [`active_subscription`] but fails with `SubscriptionInactive`.
pub async fn require_active_subscription(
    db: &Database,
    user_id: &str,
) -> Result<Subscription, StorebotError> {
    active_subscription(db, user_id)
        .await?
        .ok_or(StorebotError::SubscriptionInactive)
}

pub(crate) fn warn_if_near_limit(sub: &Subscription) {
    if sub.tokens_limit > 0 && sub.tokens_used as f64 >= sub.tokens_limit as f64 * WARN_RATIO {
        warn!(
            subscription_id = %sub.id,
            tokens_used = sub.tokens_used,
            tokens_limit = sub.tokens_limit,
            "approaching subscription token limit (80%+)"
        );
    }
}
