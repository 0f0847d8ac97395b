// SPDX-FileCopyrightText: 2026 Storebot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Thin HTTP client for the Graph API endpoints Storebot uses.
//!
//! Page-scoped calls pass the token as the `access_token` query parameter;
//! WhatsApp Cloud API calls use a bearer header. Any response carrying an
//! `error` object becomes a [`GraphApiError`] inside a channel error.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use storebot_core::types::MessageId;
use storebot_core::StorebotError;
use tracing::debug;

use crate::error::GraphErrorEnvelope;

/// Fields requested when a user grants page access.
const PAGE_FIELDS: &str = "id,name,access_token,category,picture,about,phone,website,\
     fan_count,followers_count,link,verification_status";
const PHONE_FIELDS: &str = "id,display_phone_number,verified_name,quality_rating,\
     code_verification_status,new_number_status";
const SUBSCRIBED_FIELDS: &str = "messages,messaging_postbacks,messaging_optins";

#[derive(Debug, Clone, Deserialize)]
pub struct GraphList<T> {
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PictureData {
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Picture {
    #[serde(default)]
    pub data: PictureData,
}

/// A Facebook page the authorising user manages.
#[derive(Debug, Clone, Deserialize)]
pub struct PageAccount {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    pub access_token: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub picture: Option<Picture>,
    #[serde(default)]
    pub about: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub fan_count: Option<u64>,
    #[serde(default)]
    pub followers_count: Option<u64>,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub verification_status: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InstagramAccount {
    pub id: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub profile_picture_url: Option<String>,
}

/// Any Graph node identified by id with an optional name (business, WABA).
#[derive(Debug, Clone, Deserialize)]
pub struct NamedNode {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PhoneNumber {
    pub id: String,
    #[serde(default)]
    pub display_phone_number: Option<String>,
    #[serde(default)]
    pub verified_name: Option<String>,
    #[serde(default)]
    pub quality_rating: Option<String>,
    #[serde(default)]
    pub code_verification_status: Option<String>,
    #[serde(default)]
    pub new_number_status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SendResponse {
    #[serde(default)]
    message_id: Option<String>,
    #[serde(default)]
    messages: Vec<NamedNode>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct InstagramLink {
    instagram_business_account: Option<NamedNode>,
}

/// HTTP client for the Graph API.
#[derive(Debug, Clone)]
pub struct GraphClient {
    client: reqwest::Client,
    base_url: String,
}

fn transport_error(context: &str, e: reqwest::Error) -> StorebotError {
    StorebotError::Channel {
        message: format!("{context}: {e}"),
        source: Some(Box::new(e)),
    }
}

impl GraphClient {
    /// Creates a client for `base_url` (for example `https://graph.facebook.com/v21.0`).
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, StorebotError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| transport_error("failed to build HTTP client", e))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn read_json<T: DeserializeOwned>(
        response: reqwest::Response,
        context: &str,
    ) -> Result<T, StorebotError> {
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| transport_error(context, e))?;
        debug!(status = %status, context, "graph response received");

        let value: serde_json::Value = match serde_json::from_str(&text) {
            Ok(value) => value,
            Err(e) if status.is_success() => {
                return Err(StorebotError::Channel {
                    message: format!("{context}: malformed response: {e}"),
                    source: Some(Box::new(e)),
                });
            }
            Err(_) => {
                return Err(StorebotError::channel(format!(
                    "{context}: HTTP {status}: {text}"
                )));
            }
        };

        if value.get("error").is_some() {
            return match serde_json::from_value::<GraphErrorEnvelope>(value) {
                Ok(envelope) => Err(envelope.error.into_channel_error(context)),
                Err(_) => Err(StorebotError::channel(format!(
                    "{context}: HTTP {status}: {text}"
                ))),
            };
        }
        if !status.is_success() {
            return Err(StorebotError::channel(format!(
                "{context}: HTTP {status}: {text}"
            )));
        }

        serde_json::from_value(value).map_err(|e| StorebotError::Channel {
            message: format!("{context}: unexpected response shape: {e}"),
            source: Some(Box::new(e)),
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
        context: &str,
    ) -> Result<T, StorebotError> {
        let response = self
            .client
            .get(self.url(path))
            .query(query)
            .send()
            .await
            .map_err(|e| transport_error(context, e))?;
        Self::read_json(response, context).await
    }

    /// Posts a Send API body (`recipient` plus `message` or `sender_action`).
    pub async fn send_message(
        &self,
        access_token: &str,
        body: &serde_json::Value,
    ) -> Result<MessageId, StorebotError> {
        let response = self
            .client
            .post(self.url("me/messages"))
            .query(&[("access_token", access_token)])
            .json(body)
            .send()
            .await
            .map_err(|e| transport_error("send message", e))?;
        let sent: SendResponse = Self::read_json(response, "send message").await?;
        Ok(MessageId(sent.message_id.unwrap_or_default()))
    }

    /// Posts a WhatsApp Cloud API message from `phone_number_id`.
    pub async fn send_whatsapp(
        &self,
        phone_number_id: &str,
        access_token: &str,
        body: &serde_json::Value,
    ) -> Result<MessageId, StorebotError> {
        let response = self
            .client
            .post(self.url(&format!("{phone_number_id}/messages")))
            .bearer_auth(access_token)
            .json(body)
            .send()
            .await
            .map_err(|e| transport_error("send whatsapp message", e))?;
        let sent: SendResponse = Self::read_json(response, "send whatsapp message").await?;
        Ok(MessageId(
            sent.messages
                .into_iter()
                .next()
                .map(|m| m.id)
                .unwrap_or_default(),
        ))
    }

    /// Reads a fresh page access token using the currently held one.
    pub async fn page_access_token(
        &self,
        page_id: &str,
        access_token: &str,
    ) -> Result<String, StorebotError> {
        let token: TokenResponse = self
            .get_json(
                page_id,
                &[("fields", "access_token"), ("access_token", access_token)],
                "refresh page token",
            )
            .await?;
        token
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| StorebotError::channel("refresh page token: no access token in response"))
    }

    /// Subscribes (or unsubscribes) the app to a page's messaging webhooks.
    pub async fn set_app_subscription(
        &self,
        page_id: &str,
        access_token: &str,
        subscribe: bool,
    ) -> Result<(), StorebotError> {
        let url = self.url(&format!("{page_id}/subscribed_apps"));
        let request = if subscribe {
            self.client.post(url)
        } else {
            self.client.delete(url)
        };
        let context = if subscribe {
            "subscribe app"
        } else {
            "unsubscribe app"
        };
        let response = request
            .query(&[
                ("access_token", access_token),
                ("subscribed_fields", SUBSCRIBED_FIELDS),
            ])
            .send()
            .await
            .map_err(|e| transport_error(context, e))?;
        let _: serde_json::Value = Self::read_json(response, context).await?;
        Ok(())
    }

    /// Exchanges an OAuth authorisation code for a user access token.
    pub async fn exchange_code(
        &self,
        app_id: &str,
        app_secret: &str,
        redirect_url: &str,
        code: &str,
    ) -> Result<String, StorebotError> {
        let token: TokenResponse = self
            .get_json(
                "oauth/access_token",
                &[
                    ("client_id", app_id),
                    ("redirect_uri", redirect_url),
                    ("client_secret", app_secret),
                    ("code", code),
                ],
                "exchange oauth code",
            )
            .await?;
        token
            .access_token
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| StorebotError::channel("exchange oauth code: no access token in response"))
    }

    pub async fn list_pages(&self, user_token: &str) -> Result<Vec<PageAccount>, StorebotError> {
        let pages: GraphList<PageAccount> = self
            .get_json(
                "me/accounts",
                &[("fields", PAGE_FIELDS), ("access_token", user_token)],
                "list pages",
            )
            .await?;
        Ok(pages.data)
    }

    /// The Instagram business account linked to a page, if any.
    pub async fn instagram_account(
        &self,
        page_id: &str,
        page_token: &str,
    ) -> Result<Option<InstagramAccount>, StorebotError> {
        let link: InstagramLink = self
            .get_json(
                page_id,
                &[
                    ("fields", "instagram_business_account"),
                    ("access_token", page_token),
                ],
                "lookup instagram link",
            )
            .await?;
        let Some(node) = link.instagram_business_account else {
            return Ok(None);
        };
        let account = self
            .get_json(
                &node.id,
                &[
                    ("fields", "id,username,name,profile_picture_url"),
                    ("access_token", page_token),
                ],
                "fetch instagram account",
            )
            .await?;
        Ok(Some(account))
    }

    pub async fn list_businesses(&self, user_token: &str) -> Result<Vec<NamedNode>, StorebotError> {
        let list: GraphList<NamedNode> = self
            .get_json(
                "me/businesses",
                &[("fields", "id,name"), ("access_token", user_token)],
                "list businesses",
            )
            .await?;
        Ok(list.data)
    }

    pub async fn list_whatsapp_accounts(
        &self,
        business_id: &str,
        user_token: &str,
    ) -> Result<Vec<NamedNode>, StorebotError> {
        let list: GraphList<NamedNode> = self
            .get_json(
                &format!("{business_id}/owned_whatsapp_business_accounts"),
                &[("fields", "id,name"), ("access_token", user_token)],
                "list whatsapp accounts",
            )
            .await?;
        Ok(list.data)
    }

    pub async fn list_phone_numbers(
        &self,
        waba_id: &str,
        user_token: &str,
    ) -> Result<Vec<PhoneNumber>, StorebotError> {
        let list: GraphList<PhoneNumber> = self
            .get_json(
                &format!("{waba_id}/phone_numbers"),
                &[("fields", PHONE_FIELDS), ("access_token", user_token)],
                "list phone numbers",
            )
            .await?;
        Ok(list.data)
    }

    /// Downloads platform-hosted media with the page token appended.
    ///
    /// Returns the bytes and the reported content type.
    pub async fn download(
        &self,
        url: &str,
        access_token: &str,
    ) -> Result<(Vec<u8>, String), StorebotError> {
        let response = self
            .client
            .get(url)
            .query(&[("access_token", access_token)])
            .send()
            .await
            .map_err(|e| transport_error("download media", e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(StorebotError::channel(format!(
                "download media: HTTP {status}"
            )));
        }
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("image/jpeg")
            .to_string();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| transport_error("download media", e))?;
        debug!(size = bytes.len(), content_type = %content_type, "media downloaded");
        Ok((bytes.to_vec(), content_type))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::is_token_expired;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn client(server: &MockServer) -> GraphClient {
        GraphClient::new(&server.uri(), Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn send_message_passes_token_as_query() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/me/messages"))
            .and(query_param("access_token", "page-tok"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "recipient_id": "u1", "message_id": "m.42"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let id = client(&server)
            .await
            .send_message("page-tok", &serde_json::json!({"recipient": {"id": "u1"}}))
            .await
            .unwrap();
        assert_eq!(id.0, "m.42");
    }

    #[tokio::test]
    async fn error_envelope_becomes_typed_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/me/messages"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": {"message": "Error validating access token", "type": "OAuthException", "code": 190}
            })))
            .mount(&server)
            .await;

        let err = client(&server)
            .await
            .send_message("stale", &serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(is_token_expired(&err), "{err}");
    }

    #[tokio::test]
    async fn error_in_success_body_is_still_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/page-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "error": {"message": "Unsupported get request", "code": 100}
            })))
            .mount(&server)
            .await;

        let err = client(&server)
            .await
            .page_access_token("page-1", "tok")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Unsupported get request"));
    }

    #[tokio::test]
    async fn instagram_account_follows_link() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/page-1"))
            .and(query_param("fields", "instagram_business_account"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "instagram_business_account": {"id": "ig-9"}, "id": "page-1"
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/ig-9"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "ig-9", "username": "cairo.threads"
            })))
            .mount(&server)
            .await;

        let account = client(&server)
            .await
            .instagram_account("page-1", "tok")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(account.id, "ig-9");
        assert_eq!(account.username.as_deref(), Some("cairo.threads"));
    }

    #[tokio::test]
    async fn download_reports_content_type() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v/t1/photo.png"))
            .and(query_param("access_token", "tok"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "image/png")
                    .set_body_bytes(vec![1u8, 2, 3]),
            )
            .mount(&server)
            .await;

        let url = format!("{}/v/t1/photo.png?stp=dst", server.uri());
        let (bytes, content_type) = client(&server).await.download(&url, "tok").await.unwrap();
        assert_eq!(bytes, vec![1, 2, 3]);
        assert_eq!(content_type, "image/png");
    }
}
