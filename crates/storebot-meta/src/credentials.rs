// SPDX-FileCopyrightText: 2026 Storebot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Lazy refresh of page access tokens.
//!
//! Refresh is best-effort: a failed refresh is logged and the held token is
//! returned, so a caller is never blocked on the Graph API being healthy.
//! Concurrent refreshes of one channel are allowed to race.

use chrono::{DateTime, Duration, Utc};
use storebot_core::StorebotError;
use storebot_storage::database::{format_timestamp, parse_timestamp};
use storebot_storage::queries::channels;
use storebot_storage::{Channel, Database};
use tracing::{info, warn};

use crate::graph::GraphClient;

/// Owns page tokens and refreshes them before expiry.
#[derive(Clone)]
pub struct CredentialManager {
    db: Database,
    graph: GraphClient,
    refresh_buffer: Duration,
    token_lifetime: Duration,
}

impl CredentialManager {
    pub fn new(
        db: Database,
        graph: GraphClient,
        refresh_buffer: std::time::Duration,
        token_lifetime_days: u32,
    ) -> Self {
        Self {
            db,
            graph,
            refresh_buffer: Duration::from_std(refresh_buffer).unwrap_or(Duration::hours(24)),
            token_lifetime: Duration::days(i64::from(token_lifetime_days)),
        }
    }

    /// True when the token has no recorded expiry or expires within the buffer.
    pub fn needs_refresh(&self, channel: &Channel, now: DateTime<Utc>) -> bool {
        match channel.token_expires_at.as_deref().and_then(parse_timestamp) {
            Some(expires_at) => now + self.refresh_buffer >= expires_at,
            None => true,
        }
    }

    /// Returns a usable token, refreshing first if it is close to expiry.
    pub async fn get_valid_access_token(&self, channel: &Channel) -> String {
        if !self.needs_refresh(channel, Utc::now()) {
            return channel.access_token.clone();
        }

        info!(page_id = %channel.page_id, "token expired or expiring soon, refreshing");
        match self.refresh(channel).await {
            Some(token) => token,
            None => {
                warn!(
                    page_id = %channel.page_id,
                    "token refresh failed, using existing token"
                );
                channel.access_token.clone()
            }
        }
    }

    /// Fetches and persists a fresh token. `None` on any failure.
    pub async fn refresh(&self, channel: &Channel) -> Option<String> {
        match self.try_refresh(channel).await {
            Ok(token) => Some(token),
            Err(e) => {
                warn!(page_id = %channel.page_id, error = %e, "failed to refresh page token");
                None
            }
        }
    }

    async fn try_refresh(&self, channel: &Channel) -> Result<String, StorebotError> {
        // Instagram accounts hold the token of their linked Facebook page.
        let node = channel.linked_facebook_page().unwrap_or(&channel.page_id);
        let token = self
            .graph
            .page_access_token(node, &channel.access_token)
            .await?;
        let expires_at = format_timestamp(Utc::now() + self.token_lifetime);
        channels::update_channel_token(&self.db, &channel.id, &token, &expires_at).await?;
        info!(page_id = %channel.page_id, expires_at = %expires_at, "page token refreshed");
        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storebot_core::Platform;
    use storebot_storage::NewChannel;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn setup(
        server: &MockServer,
        expires_at: Option<String>,
    ) -> (CredentialManager, Database, Channel, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open(dir.path().join("cred.db").to_str().unwrap())
            .await
            .unwrap();
        let channel = channels::upsert_channel(
            &db,
            &NewChannel {
                platform: Platform::Facebook,
                page_id: "page-1".into(),
                user_id: "owner".into(),
                name: None,
                access_token: "old-token".into(),
                token_expires_at: expires_at,
                category: None,
                image_url: None,
                metadata: None,
            },
        )
        .await
        .unwrap();
        let graph = GraphClient::new(&server.uri(), std::time::Duration::from_secs(5)).unwrap();
        let manager = CredentialManager::new(
            db.clone(),
            graph,
            std::time::Duration::from_secs(86_400),
            60,
        );
        (manager, db, channel, dir)
    }

    #[tokio::test]
    async fn fresh_token_is_returned_without_calling_graph() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;

        let expires = format_timestamp(Utc::now() + Duration::days(10));
        let (manager, db, channel, _dir) = setup(&server, Some(expires)).await;
        assert_eq!(manager.get_valid_access_token(&channel).await, "old-token");
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn expiring_token_is_refreshed_and_persisted() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/page-1"))
            .and(query_param("fields", "access_token"))
            .and(query_param("access_token", "old-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "new-token", "id": "page-1"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let expires = format_timestamp(Utc::now() + Duration::hours(2));
        let (manager, db, channel, _dir) = setup(&server, Some(expires)).await;
        assert_eq!(manager.get_valid_access_token(&channel).await, "new-token");

        let stored = channels::get_channel(&db, &channel.id).await.unwrap().unwrap();
        assert_eq!(stored.access_token, "new-token");
        let new_expiry = parse_timestamp(stored.token_expires_at.as_deref().unwrap()).unwrap();
        assert!(new_expiry > Utc::now() + Duration::days(59));
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn refresh_failure_falls_back_to_held_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/page-1"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": {"message": "Invalid OAuth access token", "code": 190}
            })))
            .mount(&server)
            .await;

        let (manager, db, channel, _dir) = setup(&server, None).await;
        assert!(manager.needs_refresh(&channel, Utc::now()));
        assert_eq!(manager.get_valid_access_token(&channel).await, "old-token");

        let stored = channels::get_channel(&db, &channel.id).await.unwrap().unwrap();
        assert_eq!(stored.access_token, "old-token");
        db.close().await.unwrap();
    }
}
