// SPDX-FileCopyrightText: 2026 Storebot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Outbound delivery to Messenger, Instagram and WhatsApp users.

use async_trait::async_trait;
use serde_json::{json, Value};
use storebot_core::traits::{ChannelAdapter, PluginAdapter};
use storebot_core::types::{GalleryElement, MessageId};
use storebot_core::{
    AdapterType, HealthStatus, OutboundMessage, OutboundPayload, Platform, StorebotError,
};
use storebot_storage::queries::channels;
use storebot_storage::{Channel, Database};
use tracing::{debug, info, warn};

use crate::credentials::CredentialManager;
use crate::error::is_token_expired;
use crate::graph::GraphClient;

/// Send API body for a Messenger-class recipient.
pub fn messenger_body(recipient_id: &str, payload: &OutboundPayload) -> Value {
    let recipient = json!({ "id": recipient_id });
    match payload {
        OutboundPayload::Text(text) => json!({
            "recipient": recipient,
            "message": { "text": text },
        }),
        OutboundPayload::Image { url } => json!({
            "recipient": recipient,
            "message": {
                "attachment": {
                    "type": "image",
                    "payload": { "url": url, "is_reusable": false },
                },
            },
        }),
        OutboundPayload::Gallery(elements) => json!({
            "recipient": recipient,
            "message": {
                "attachment": {
                    "type": "template",
                    "payload": {
                        "template_type": "generic",
                        "elements": elements.iter().map(gallery_element).collect::<Vec<_>>(),
                    },
                },
            },
        }),
        OutboundPayload::Typing => json!({
            "recipient": recipient,
            "sender_action": "typing_on",
        }),
    }
}

fn gallery_element(element: &GalleryElement) -> Value {
    let buttons: Vec<Value> = element
        .buttons
        .iter()
        .map(|b| json!({ "type": "web_url", "title": b.title, "url": b.url }))
        .collect();
    let title = if element.title.is_empty() {
        "Image"
    } else {
        element.title.as_str()
    };
    json!({
        "title": title,
        "image_url": element.image_url,
        "subtitle": element.subtitle.as_deref().unwrap_or_default(),
        "buttons": buttons,
    })
}

/// Cloud API body for a WhatsApp recipient. `None` for payloads WhatsApp
/// has no equivalent for.
pub fn whatsapp_body(recipient_id: &str, payload: &OutboundPayload) -> Option<Value> {
    let base = |kind: &str, content: Value| {
        let mut body = json!({
            "messaging_product": "whatsapp",
            "to": recipient_id,
            "type": kind,
        });
        body[kind] = content;
        body
    };
    match payload {
        OutboundPayload::Text(text) => Some(base("text", json!({ "body": text }))),
        OutboundPayload::Image { url } => Some(base("image", json!({ "link": url }))),
        OutboundPayload::Gallery(_) | OutboundPayload::Typing => None,
    }
}

/// Channel adapter over the Graph Send API.
///
/// Resolves the page credential per message, and on a token-expired error
/// refreshes once and retries once.
pub struct MessengerChannel {
    db: Database,
    graph: GraphClient,
    credentials: CredentialManager,
}

impl MessengerChannel {
    pub fn new(db: Database, graph: GraphClient, credentials: CredentialManager) -> Self {
        Self {
            db,
            graph,
            credentials,
        }
    }

    pub fn credentials(&self) -> &CredentialManager {
        &self.credentials
    }

    async fn post(
        &self,
        channel: &Channel,
        token: &str,
        recipient_id: &str,
        payload: &OutboundPayload,
    ) -> Result<MessageId, StorebotError> {
        match channel.platform {
            Platform::Facebook | Platform::Instagram => {
                self.graph
                    .send_message(token, &messenger_body(recipient_id, payload))
                    .await
            }
            Platform::Whatsapp => match whatsapp_body(recipient_id, payload) {
                Some(body) => self.graph.send_whatsapp(&channel.page_id, token, &body).await,
                None => {
                    debug!(page_id = %channel.page_id, "payload not supported on whatsapp, skipped");
                    Ok(MessageId(String::new()))
                }
            },
            Platform::Web => Err(StorebotError::channel(
                "web conversations have no outbound channel",
            )),
        }
    }

    /// Sends with `token`; on a token-expired error refreshes and retries once.
    pub async fn send_with_token(
        &self,
        channel: &Channel,
        recipient_id: &str,
        payload: &OutboundPayload,
        token: &str,
    ) -> Result<MessageId, StorebotError> {
        match self.post(channel, token, recipient_id, payload).await {
            Err(e) if is_token_expired(&e) => {
                warn!(page_id = %channel.page_id, "token expired during send, refreshing");
                let Some(fresh) = self.credentials.refresh(channel).await else {
                    return Err(e);
                };
                self.post(channel, &fresh, recipient_id, payload).await
            }
            other => other,
        }
    }
}

#[async_trait]
impl PluginAdapter for MessengerChannel {
    fn name(&self) -> &str {
        "meta"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Channel
    }

    async fn health_check(&self) -> Result<HealthStatus, StorebotError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), StorebotError> {
        info!("meta channel adapter shut down");
        Ok(())
    }
}

#[async_trait]
impl ChannelAdapter for MessengerChannel {
    async fn send(&self, msg: OutboundMessage) -> Result<MessageId, StorebotError> {
        let channel = channels::find_channel(&self.db, &msg.page_id, msg.platform, false)
            .await?
            .ok_or_else(|| StorebotError::NotFound {
                entity: "channel",
                id: msg.page_id.clone(),
            })?;
        let token = self.credentials.get_valid_access_token(&channel).await;
        self.send_with_token(&channel, &msg.recipient_id, &msg.payload, &token)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use storebot_core::types::GalleryButton;
    use storebot_storage::database::format_timestamp;
    use storebot_storage::NewChannel;
    use wiremock::matchers::{body_partial_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn setup(server: &MockServer, platform: Platform) -> (MessengerChannel, Database, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open(dir.path().join("send.db").to_str().unwrap())
            .await
            .unwrap();
        channels::upsert_channel(
            &db,
            &NewChannel {
                platform,
                page_id: "page-1".into(),
                user_id: "owner".into(),
                name: None,
                access_token: "old-token".into(),
                token_expires_at: Some(format_timestamp(Utc::now() + Duration::days(30))),
                category: None,
                image_url: None,
                metadata: None,
            },
        )
        .await
        .unwrap();
        let graph = GraphClient::new(&server.uri(), std::time::Duration::from_secs(5)).unwrap();
        let credentials = CredentialManager::new(
            db.clone(),
            graph.clone(),
            std::time::Duration::from_secs(86_400),
            60,
        );
        (MessengerChannel::new(db.clone(), graph, credentials), db, dir)
    }

    fn text_to(recipient: &str, text: &str) -> OutboundMessage {
        OutboundMessage {
            page_id: "page-1".into(),
            platform: Platform::Facebook,
            recipient_id: recipient.into(),
            payload: OutboundPayload::Text(text.into()),
        }
    }

    #[test]
    fn gallery_body_uses_generic_template() {
        let body = messenger_body(
            "u1",
            &OutboundPayload::Gallery(vec![GalleryElement {
                title: String::new(),
                image_url: "https://cdn.example.com/a.jpg".into(),
                subtitle: None,
                buttons: vec![GalleryButton {
                    title: "View".into(),
                    url: "https://shop.example.com/a".into(),
                }],
            }]),
        );
        let payload = &body["message"]["attachment"]["payload"];
        assert_eq!(payload["template_type"], "generic");
        assert_eq!(payload["elements"][0]["title"], "Image");
        assert_eq!(payload["elements"][0]["subtitle"], "");
        assert_eq!(payload["elements"][0]["buttons"][0]["type"], "web_url");
    }

    #[test]
    fn typing_body_is_sender_action() {
        let body = messenger_body("u1", &OutboundPayload::Typing);
        assert_eq!(body["sender_action"], "typing_on");
        assert!(body.get("message").is_none());
        assert!(whatsapp_body("u1", &OutboundPayload::Typing).is_none());
    }

    #[tokio::test]
    async fn send_delivers_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/me/messages"))
            .and(query_param("access_token", "old-token"))
            .and(body_partial_json(serde_json::json!({"message": {"text": "hello"}})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "recipient_id": "u1", "message_id": "m.1"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let (channel, db, _dir) = setup(&server, Platform::Facebook).await;
        let id = channel.send(text_to("u1", "hello")).await.unwrap();
        assert_eq!(id.0, "m.1");
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn expired_token_triggers_one_refresh_and_retry() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/me/messages"))
            .and(query_param("access_token", "old-token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": {"message": "Session has expired", "type": "OAuthException", "code": 190}
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/page-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "new-token"
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/me/messages"))
            .and(query_param("access_token", "new-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "message_id": "m.2"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let (channel, db, _dir) = setup(&server, Platform::Facebook).await;
        let id = channel.send(text_to("u1", "retry me")).await.unwrap();
        assert_eq!(id.0, "m.2");
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn other_graph_errors_are_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/me/messages"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": {"message": "No matching user found", "code": 100}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let (channel, db, _dir) = setup(&server, Platform::Facebook).await;
        let err = channel.send(text_to("ghost", "hi")).await.unwrap_err();
        assert!(err.to_string().contains("No matching user found"));
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn whatsapp_uses_cloud_api() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/page-1/messages"))
            .and(body_partial_json(serde_json::json!({
                "messaging_product": "whatsapp", "to": "2010", "text": {"body": "hi"}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "messages": [{"id": "wamid.1"}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let (channel, db, _dir) = setup(&server, Platform::Whatsapp).await;
        let id = channel
            .send(OutboundMessage {
                page_id: "page-1".into(),
                platform: Platform::Whatsapp,
                recipient_id: "2010".into(),
                payload: OutboundPayload::Text("hi".into()),
            })
            .await
            .unwrap();
        assert_eq!(id.0, "wamid.1");
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn unknown_page_is_not_found() {
        let server = MockServer::start().await;
        let (channel, db, _dir) = setup(&server, Platform::Facebook).await;
        let mut msg = text_to("u1", "hi");
        msg.page_id = "other".into();
        assert!(matches!(
            channel.send(msg).await,
            Err(StorebotError::NotFound { entity: "channel", .. })
        ));
        db.close().await.unwrap();
    }
}
