// SPDX-FileCopyrightText: 2026 Storebot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Inbound webhook payloads, the verification handshake, and signatures.

use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use storebot_core::Platform;

/// Top-level webhook delivery.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookPayload {
    pub object: String,
    #[serde(default)]
    pub entry: Vec<WebhookEntry>,
}

impl WebhookPayload {
    /// `page` deliveries come from Facebook, `instagram` from Instagram.
    pub fn platform(&self) -> Option<Platform> {
        match self.object.as_str() {
            "page" => Some(Platform::Facebook),
            "instagram" => Some(Platform::Instagram),
            _ => None,
        }
    }

    /// Every messaging event in the delivery, in order.
    pub fn events(&self) -> impl Iterator<Item = &MessagingEvent> {
        self.entry.iter().flat_map(|e| e.messaging.iter())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEntry {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub messaging: Vec<MessagingEvent>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Party {
    pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessagingEvent {
    pub sender: Party,
    pub recipient: Party,
    #[serde(default)]
    pub message: Option<InboundMessage>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct InboundMessage {
    #[serde(default)]
    pub mid: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub is_echo: bool,
    #[serde(default)]
    pub attachments: Vec<RawAttachment>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawAttachment {
    #[serde(rename = "type")]
    pub kind: AttachmentKind,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub payload: Option<AttachmentPayload>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AttachmentPayload {
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttachmentKind {
    Image,
    Video,
    Audio,
    File,
    #[serde(other)]
    Other,
}

/// An attachment that carries a fetchable URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub kind: AttachmentKind,
    pub url: String,
    pub title: Option<String>,
}

impl MessagingEvent {
    pub fn is_echo(&self) -> bool {
        self.message.as_ref().is_some_and(|m| m.is_echo)
    }

    pub fn text(&self) -> Option<&str> {
        self.message
            .as_ref()
            .and_then(|m| m.text.as_deref())
            .filter(|t| !t.is_empty())
    }

    pub fn message_id(&self) -> Option<&str> {
        self.message.as_ref().and_then(|m| m.mid.as_deref())
    }

    /// Attachments with a URL; ones without a payload URL are dropped.
    pub fn attachments(&self) -> Vec<Attachment> {
        self.message
            .iter()
            .flat_map(|m| m.attachments.iter())
            .filter_map(|a| {
                let url = a.payload.as_ref()?.url.clone()?;
                Some(Attachment {
                    kind: a.kind,
                    url,
                    title: a.title.clone(),
                })
            })
            .collect()
    }
}

/// Answers the `hub.*` subscription handshake. Returns the challenge to echo.
pub fn verify_challenge<'a>(
    mode: Option<&str>,
    token: Option<&str>,
    challenge: Option<&'a str>,
    expected_token: &str,
) -> Option<&'a str> {
    if mode != Some("subscribe") || expected_token.is_empty() || token != Some(expected_token) {
        return None;
    }
    challenge
}

/// Checks an `X-Hub-Signature-256` header against the raw request body.
pub fn verify_signature(app_secret: &str, signature_header: Option<&str>, body: &[u8]) -> bool {
    let signature = signature_header.unwrap_or("").trim();
    let signature = signature.strip_prefix("sha256=").unwrap_or(signature).trim();
    if signature.is_empty() {
        return false;
    }
    let Ok(expected) = hex::decode(signature) else {
        return false;
    };
    let Ok(mut mac) = Hmac::<Sha256>::new_from_slice(app_secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}
