// SPDX-FileCopyrightText: 2026 Storebot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Connecting pages after OAuth, and toggling their webhook subscription.
//!
//! One authorisation yields every managed Facebook page, the Instagram
//! business account linked to each page, and every WhatsApp phone number
//! owned through the user's businesses. Each is upserted by
//! `(page_id, platform)`.

use chrono::{Duration, Utc};
use futures::future::join_all;
use serde_json::json;
use storebot_config::model::MetaConfig;
use storebot_core::{Platform, StorebotError};
use storebot_storage::database::format_timestamp;
use storebot_storage::queries::channels;
use storebot_storage::{Channel, Database, NewChannel};
use tracing::{info, warn};

use crate::graph::{GraphClient, PageAccount};

/// Keeps only ASCII alphanumerics of an OAuth `state` user id.
pub fn sanitize_user_id(raw: &str) -> Option<String> {
    let cleaned: String = raw.trim().chars().filter(char::is_ascii_alphanumeric).collect();
    (!cleaned.is_empty()).then_some(cleaned)
}

pub struct ChannelOnboarding {
    db: Database,
    graph: GraphClient,
    app_id: Option<String>,
    app_secret: Option<String>,
    redirect_url: Option<String>,
    token_lifetime: Duration,
}

impl ChannelOnboarding {
    pub fn new(db: Database, graph: GraphClient, config: &MetaConfig) -> Self {
        Self {
            db,
            graph,
            app_id: config.app_id.clone(),
            app_secret: config.app_secret.clone(),
            redirect_url: config.redirect_url.clone(),
            token_lifetime: Duration::days(i64::from(config.token_lifetime_days)),
        }
    }

    /// Exchanges `code`, discovers every channel and stores them for `user_id`.
    pub async fn connect(&self, code: &str, user_id: &str) -> Result<Vec<Channel>, StorebotError> {
        let (Some(app_id), Some(app_secret), Some(redirect_url)) =
            (&self.app_id, &self.app_secret, &self.redirect_url)
        else {
            return Err(StorebotError::Config(
                "meta.app_id, meta.app_secret and meta.redirect_url are required for onboarding"
                    .into(),
            ));
        };

        let user_token = self
            .graph
            .exchange_code(app_id, app_secret, redirect_url, code)
            .await?;
        let expires_at = format_timestamp(Utc::now() + self.token_lifetime);

        let (pages, whatsapp) = tokio::join!(
            self.discover_pages(&user_token, user_id, &expires_at),
            self.discover_whatsapp(&user_token, user_id, &expires_at),
        );
        let pages = pages?;

        let mut stored = Vec::with_capacity(pages.len() + whatsapp.len());
        for channel in whatsapp.iter().chain(pages.iter()) {
            stored.push(channels::upsert_channel(&self.db, channel).await?);
        }
        info!(user_id, channels = stored.len(), "channels connected");
        Ok(stored)
    }

    /// Facebook pages plus their linked Instagram accounts.
    pub async fn discover_pages(
        &self,
        user_token: &str,
        user_id: &str,
        expires_at: &str,
    ) -> Result<Vec<NewChannel>, StorebotError> {
        let pages = self.graph.list_pages(user_token).await?;
        let per_page = join_all(
            pages
                .iter()
                .map(|page| self.page_channels(page, user_id, expires_at)),
        )
        .await;
        Ok(per_page.into_iter().flatten().collect())
    }

    async fn page_channels(
        &self,
        page: &PageAccount,
        user_id: &str,
        expires_at: &str,
    ) -> Vec<NewChannel> {
        let mut found = vec![NewChannel {
            platform: Platform::Facebook,
            page_id: page.id.clone(),
            user_id: user_id.to_string(),
            name: page.name.clone(),
            access_token: page.access_token.clone(),
            token_expires_at: Some(expires_at.to_string()),
            category: page.category.clone(),
            image_url: page.picture.as_ref().and_then(|p| p.data.url.clone()),
            metadata: Some(json!({
                "fan_count": page.fan_count,
                "followers_count": page.followers_count,
                "link": page.link,
                "about": page.about,
                "phone": page.phone,
                "website": page.website,
                "verification_status": page.verification_status,
            })),
        }];

        match self.graph.instagram_account(&page.id, &page.access_token).await {
            Ok(Some(ig)) => found.push(NewChannel {
                platform: Platform::Instagram,
                page_id: ig.id.clone(),
                user_id: user_id.to_string(),
                name: ig.name.clone().or_else(|| ig.username.clone()),
                // The page token also authorises the linked Instagram account.
                access_token: page.access_token.clone(),
                token_expires_at: Some(expires_at.to_string()),
                category: page.category.clone(),
                image_url: ig.profile_picture_url.clone(),
                metadata: Some(json!({
                    "username": ig.username,
                    "linked_facebook_page": page.id,
                })),
            }),
            Ok(None) => {}
            Err(e) => warn!(page_id = %page.id, error = %e, "instagram lookup failed"),
        }
        found
    }

    /// WhatsApp phone numbers reachable through the user's businesses.
    ///
    /// Best-effort: failures at any level are logged and skipped.
    pub async fn discover_whatsapp(
        &self,
        user_token: &str,
        user_id: &str,
        expires_at: &str,
    ) -> Vec<NewChannel> {
        let mut found = Vec::new();
        let businesses = match self.graph.list_businesses(user_token).await {
            Ok(list) => list,
            Err(e) => {
                warn!(error = %e, "failed to list businesses");
                return found;
            }
        };

        for business in &businesses {
            let wabas = match self.graph.list_whatsapp_accounts(&business.id, user_token).await {
                Ok(list) => list,
                Err(e) => {
                    warn!(business_id = %business.id, error = %e, "failed to list whatsapp accounts");
                    continue;
                }
            };
            for waba in &wabas {
                let phones = match self.graph.list_phone_numbers(&waba.id, user_token).await {
                    Ok(list) => list,
                    Err(e) => {
                        warn!(waba_id = %waba.id, error = %e, "failed to list phone numbers");
                        continue;
                    }
                };
                found.extend(phones.into_iter().map(|phone| NewChannel {
                    platform: Platform::Whatsapp,
                    page_id: phone.id.clone(),
                    user_id: user_id.to_string(),
                    name: phone
                        .verified_name
                        .clone()
                        .or_else(|| phone.display_phone_number.clone()),
                    access_token: user_token.to_string(),
                    token_expires_at: Some(expires_at.to_string()),
                    category: Some("WhatsApp Business".into()),
                    image_url: None,
                    metadata: Some(json!({
                        "businessId": business.id,
                        "businessName": business.name,
                        "wabaId": waba.id,
                        "wabaName": waba.name,
                        "displayPhoneNumber": phone.display_phone_number,
                        "verifiedName": phone.verified_name,
                        "qualityRating": phone.quality_rating,
                        "codeVerificationStatus": phone.code_verification_status,
                        "newNumberStatus": phone.new_number_status,
                    })),
                }));
            }
        }
        found
    }

    /// Subscribes or unsubscribes the app to a channel's webhooks and records it.
    ///
    /// Instagram accounts are toggled through their linked Facebook page.
    pub async fn set_subscription(
        &self,
        channel_id: &str,
        subscribe: bool,
    ) -> Result<Channel, StorebotError> {
        let mut channel = channels::get_channel(&self.db, channel_id)
            .await?
            .ok_or_else(|| StorebotError::NotFound {
                entity: "channel",
                id: channel_id.to_string(),
            })?;
        let node = match channel.platform {
            Platform::Instagram => channel.linked_facebook_page().ok_or_else(|| {
                StorebotError::channel("instagram channel has no linked facebook page")
            })?,
            _ => channel.page_id.as_str(),
        };
        self.graph
            .set_app_subscription(node, &channel.access_token, subscribe)
            .await?;
        channels::set_channel_subscribed(&self.db, &channel.id, subscribe).await?;
        info!(channel_id, page_id = %channel.page_id, subscribe, "channel subscription updated");
        channel.is_subscribed = subscribe;
        Ok(channel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn setup(server: &MockServer) -> (ChannelOnboarding, Database, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open(dir.path().join("onboard.db").to_str().unwrap())
            .await
            .unwrap();
        let graph = GraphClient::new(&server.uri(), std::time::Duration::from_secs(5)).unwrap();
        let config = MetaConfig {
            app_id: Some("app".into()),
            app_secret: Some("secret".into()),
            redirect_url: Some("https://api.example.com/v1/facebook/callback".into()),
            ..MetaConfig::default()
        };
        (ChannelOnboarding::new(db.clone(), graph, &config), db, dir)
    }

    async fn json_get(server: &MockServer, at: &str, body: serde_json::Value) {
        Mock::given(method("GET"))
            .and(path(at))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(server)
            .await;
    }

    #[test]
    fn user_ids_are_sanitized() {
        assert_eq!(sanitize_user_id(" ab-12$c "), Some("ab12c".into()));
        assert_eq!(sanitize_user_id("$$"), None);
    }

    #[tokio::test]
    async fn connect_discovers_pages_instagram_and_whatsapp() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/oauth/access_token"))
            .and(query_param("code", "the-code"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"access_token": "user-token"})),
            )
            .mount(&server)
            .await;
        json_get(&server, "/me/accounts", serde_json::json!({"data": [
            {"id": "page-1", "name": "Cairo Threads", "access_token": "page-token", "category": "Clothing"}
        ]}))
        .await;
        json_get(&server, "/page-1", serde_json::json!({"instagram_business_account": {"id": "ig-1"}})).await;
        json_get(&server, "/ig-1", serde_json::json!({"id": "ig-1", "username": "cairo.threads"})).await;
        json_get(&server, "/me/businesses", serde_json::json!({"data": [{"id": "biz-1", "name": "Biz"}]})).await;
        json_get(
            &server,
            "/biz-1/owned_whatsapp_business_accounts",
            serde_json::json!({"data": [{"id": "waba-1"}]}),
        )
        .await;
        json_get(
            &server,
            "/waba-1/phone_numbers",
            serde_json::json!({"data": [{"id": "phone-1", "display_phone_number": "+20 100"}]}),
        )
        .await;

        let (onboarding, db, _dir) = setup(&server).await;
        let stored = onboarding.connect("the-code", "owner1").await.unwrap();
        assert_eq!(stored.len(), 3);

        let ig = channels::find_channel(&db, "ig-1", Platform::Instagram, false)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(ig.name.as_deref(), Some("cairo.threads"));
        assert_eq!(ig.access_token, "page-token");
        assert_eq!(ig.linked_facebook_page(), Some("page-1"));
        assert!(!ig.is_subscribed);

        let phone = channels::find_channel(&db, "phone-1", Platform::Whatsapp, false)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(phone.access_token, "user-token");
        assert_eq!(phone.name.as_deref(), Some("+20 100"));
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn connect_requires_app_credentials() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open(dir.path().join("x.db").to_str().unwrap()).await.unwrap();
        let graph = GraphClient::new(&server.uri(), std::time::Duration::from_secs(5)).unwrap();
        let onboarding = ChannelOnboarding::new(db.clone(), graph, &MetaConfig::default());
        assert!(matches!(
            onboarding.connect("code", "owner").await,
            Err(StorebotError::Config(_))
        ));
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn instagram_subscription_goes_through_linked_page() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/page-1/subscribed_apps"))
            .and(query_param("subscribed_fields", "messages,messaging_postbacks,messaging_optins"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"success": true})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/page-1/subscribed_apps"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"success": true})))
            .expect(1)
            .mount(&server)
            .await;

        let (onboarding, db, _dir) = setup(&server).await;
        let ig = channels::upsert_channel(
            &db,
            &NewChannel {
                platform: Platform::Instagram,
                page_id: "ig-1".into(),
                user_id: "owner".into(),
                name: None,
                access_token: "page-token".into(),
                token_expires_at: None,
                category: None,
                image_url: None,
                metadata: Some(serde_json::json!({"linked_facebook_page": "page-1"})),
            },
        )
        .await
        .unwrap();

        let updated = onboarding.set_subscription(&ig.id, true).await.unwrap();
        assert!(updated.is_subscribed);
        assert!(channels::find_channel(&db, "ig-1", Platform::Instagram, true)
            .await
            .unwrap()
            .is_some());

        let updated = onboarding.set_subscription(&ig.id, false).await.unwrap();
        assert!(!updated.is_subscribed);
        db.close().await.unwrap();
    }
}
