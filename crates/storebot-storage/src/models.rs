// SPDX-FileCopyrightText: 2026 Storebot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Row types for persisted entities.

use serde::{Deserialize, Serialize};
use storebot_core::Platform;
use strum::{Display, EnumString};

/// Assistant persona configured per store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistantProfile {
    pub name: Option<String>,
    pub persona: Option<String>,
    pub languages: Vec<String>,
    pub instructions: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShippingPolicy {
    pub is_shipping: bool,
    pub shipping_countries: Vec<String>,
    pub shipping_cities: Vec<String>,
    pub shipping_days: Option<u32>,
    pub shipping_cost: Option<f64>,
    pub free_shipping_over: Option<f64>,
    pub delivery_provider: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReturnPolicy {
    pub is_returnable: bool,
    pub return_days: Option<u32>,
    pub return_conditions: Vec<String>,
    pub return_shipping_payer: Option<String>,
    pub refund_types: Vec<String>,
}

/// A merchant store. Owned by the catalog; read-only for the assistant.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Store {
    pub id: String,
    /// Store owner; conversations and subscriptions hang off this user.
    pub user_id: String,
    pub name: String,
    pub category: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub description: Option<String>,
    pub notes: Option<String>,
    pub currency: Option<String>,
    pub facebook_page_id: Option<String>,
    pub instagram_page_id: Option<String>,
    pub assistant_profile: AssistantProfile,
    pub payment_methods: Vec<String>,
    pub shipping_policy: ShippingPolicy,
    pub return_policy: ReturnPolicy,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: String,
    pub store_id: String,
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: String,
    pub store_id: String,
    pub category_id: Option<String>,
    pub name: String,
    pub description: String,
    pub image_url: Option<String>,
    pub price: f64,
    pub stock: i64,
    pub track_inventory: bool,
}

/// A catalog image with its precomputed embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemImage {
    pub id: String,
    pub item_id: String,
    pub url: String,
    pub description: Option<String>,
    pub embedding: Option<Vec<f32>>,
}

/// A connected messaging page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Channel {
    pub id: String,
    pub platform: Platform,
    pub page_id: String,
    pub user_id: String,
    pub name: Option<String>,
    pub access_token: String,
    pub token_expires_at: Option<String>,
    pub is_subscribed: bool,
    pub category: Option<String>,
    pub image_url: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

impl Channel {
    /// Instagram accounts are managed through their linked Facebook page.
    pub fn linked_facebook_page(&self) -> Option<&str> {
        self.metadata
            .as_ref()
            .and_then(|m| m.get("linked_facebook_page"))
            .and_then(|v| v.as_str())
    }
}

/// Fields supplied when connecting or reconnecting a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewChannel {
    pub platform: Platform,
    pub page_id: String,
    pub user_id: String,
    pub name: Option<String>,
    pub access_token: String,
    pub token_expires_at: Option<String>,
    pub category: Option<String>,
    pub image_url: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

/// One conversation between a store assistant and one end user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Chat {
    pub id: String,
    pub store_id: String,
    pub user_id: String,
    pub platform: Platform,
    pub channel_page_id: Option<String>,
    pub channel_user_id: Option<String>,
    pub thread_id: String,
    pub chat_number: i64,
    pub created_at: String,
}

/// Identity of a conversation to create if it does not yet exist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewChat {
    pub store_id: String,
    pub user_id: String,
    pub platform: Platform,
    pub channel_page_id: Option<String>,
    pub channel_user_id: Option<String>,
    pub thread_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

/// A persisted transcript turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredMessage {
    pub id: String,
    pub chat_id: String,
    pub store_id: String,
    pub user_id: String,
    pub role: MessageRole,
    pub content: String,
    pub tokens: i64,
    pub channel_user_id: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum SubscriptionStatus {
    Pending,
    Paid,
    Expired,
    Cancelled,
}

/// A user's plan window and token budget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub id: String,
    pub user_id: String,
    pub plan: String,
    pub status: SubscriptionStatus,
    pub start_date: String,
    pub end_date: String,
    pub tokens_limit: i64,
    pub tokens_used: i64,
}

impl Subscription {
    /// Paid, not past its end date, and with budget remaining.
    pub fn is_active_at(&self, now: &str) -> bool {
        self.status == SubscriptionStatus::Paid
            && now <= self.end_date.as_str()
            && self.tokens_used < self.tokens_limit
    }
}

/// Little-endian f32 encoding used for embedding BLOBs.
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    vec.iter().flat_map(|f| f.to_le_bytes()).collect()
}

pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}
