// SPDX-FileCopyrightText: 2026 Storebot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Image and gallery pushes to the end user on Facebook Messenger.

use serde::Deserialize;
use serde_json::{json, Value};
use storebot_core::types::GalleryElement;
use storebot_core::{ChannelAdapter, OutboundMessage, OutboundPayload, Platform, StorebotError};
use storebot_storage::queries::{channels, chats};
use storebot_storage::Database;
use tracing::{debug, warn};

pub(crate) const SEND_FAILED: &str = "There was a problem sending the image";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SendImageArgs {
    #[serde(default)]
    pub recipient_id: String,
    pub image_url: String,
    #[serde(default)]
    pub caption: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GalleryImage {
    pub url: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub subtitle: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SendGalleryArgs {
    #[serde(default)]
    pub recipient_id: String,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub images: Vec<GalleryImage>,
}

/// Finds the subscribed Facebook page the recipient talks to in this store.
async fn recipient_page(
    db: &Database,
    store_id: &str,
    recipient_id: &str,
) -> Result<String, StorebotError> {
    let chat = chats::find_chat_by_channel_user(db, store_id, recipient_id)
        .await?
        .ok_or_else(|| StorebotError::NotFound {
            entity: "chat",
            id: recipient_id.to_string(),
        })?;
    let page_id = chat.channel_page_id.ok_or_else(|| StorebotError::NotFound {
        entity: "channel",
        id: recipient_id.to_string(),
    })?;
    channels::find_channel(db, &page_id, Platform::Facebook, true)
        .await?
        .map(|channel| channel.page_id)
        .ok_or(StorebotError::NotFound {
            entity: "channel",
            id: page_id,
        })
}

async fn deliver(
    channel: &dyn ChannelAdapter,
    page_id: &str,
    recipient_id: &str,
    payloads: Vec<OutboundPayload>,
) -> Result<(), StorebotError> {
    for payload in payloads {
        channel
            .send(OutboundMessage {
                page_id: page_id.to_string(),
                platform: Platform::Facebook,
                recipient_id: recipient_id.to_string(),
                payload,
            })
            .await?;
    }
    Ok(())
}

fn caption(text: Option<&str>) -> Option<OutboundPayload> {
    text.map(str::trim)
        .filter(|t| !t.is_empty())
        .map(|t| OutboundPayload::Text(t.to_string()))
}

/// Sends the image, then the caption if one was given.
///
/// Any failure along the way collapses into the same user-safe message.
pub(crate) async fn send_image(
    db: &Database,
    channel: &dyn ChannelAdapter,
    store_id: &str,
    args: SendImageArgs,
) -> Value {
    let result = async {
        let page_id = recipient_page(db, store_id, &args.recipient_id).await?;
        let mut payloads = vec![OutboundPayload::Image {
            url: args.image_url.clone(),
        }];
        payloads.extend(caption(args.caption.as_deref()));
        deliver(channel, &page_id, &args.recipient_id, payloads).await
    }
    .await;

    match result {
        Ok(()) => {
            debug!(recipient_id = %args.recipient_id, "image pushed");
            json!({
                "isAccepted": true,
                "message": "Image (and text if provided) sent successfully!"
            })
        }
        Err(e) => {
            warn!(recipient_id = %args.recipient_id, error = %e, "image push failed");
            json!({ "message": SEND_FAILED })
        }
    }
}

/// Sends the optional text, then every image as one generic-template gallery.
pub(crate) async fn send_gallery(
    db: &Database,
    channel: &dyn ChannelAdapter,
    store_id: &str,
    args: SendGalleryArgs,
) -> Value {
    let result = async {
        if args.images.is_empty() {
            return Err(StorebotError::Tool {
                message: "gallery has no images".into(),
            });
        }
        let page_id = recipient_page(db, store_id, &args.recipient_id).await?;
        let elements = args
            .images
            .iter()
            .map(|img| GalleryElement {
                title: img.title.clone().unwrap_or_default(),
                image_url: img.url.clone(),
                subtitle: img.subtitle.clone(),
                buttons: Vec::new(),
            })
            .collect();
        let mut payloads: Vec<OutboundPayload> = caption(args.text.as_deref()).into_iter().collect();
        payloads.push(OutboundPayload::Gallery(elements));
        deliver(channel, &page_id, &args.recipient_id, payloads).await
    }
    .await;

    match result {
        Ok(()) => {
            debug!(recipient_id = %args.recipient_id, images = args.images.len(), "gallery pushed");
            json!({
                "isAccepted": true,
                "message": "Text and gallery sent successfully!"
            })
        }
        Err(e) => {
            warn!(recipient_id = %args.recipient_id, error = %e, "gallery push failed");
            json!({ "message": SEND_FAILED })
        }
    }
}
