// SPDX-FileCopyrightText: 2026 Storebot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The closed set of tools advertised to the model, with their JSON schemas.
//!
//! Every schema is strict: all properties are listed in `required` and
//! optional values are expressed as `["string", "null"]`.

use serde_json::{json, Value};
use storebot_core::ToolDefinition;
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};

/// A tool the assistant may call, addressed by its camelCase wire name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter)]
#[strum(serialize_all = "camelCase")]
pub enum ToolKind {
    SearchItems,
    SearchCategories,
    SearchItemsByImage,
    GetStoreShippingPolicy,
    GetStoreRefundPolicy,
    GetStorePaymentOptions,
    SendOrderByEmail,
    SendImageToFacebookUser,
    SendGalleryToFacebookUser,
}

fn store_id_property(description: &str) -> Value {
    json!({ "type": "string", "description": description })
}

fn object_schema(properties: Value, required: &[&str]) -> Value {
    json!({
        "type": "object",
        "properties": properties,
        "required": required,
        "additionalProperties": false,
    })
}

impl ToolKind {
    /// Resolves a wire name; `None` for names outside the registry.
    pub fn from_name(name: &str) -> Option<Self> {
        name.parse().ok()
    }

    pub fn description(self) -> &'static str {
        match self {
            ToolKind::SearchItems => "Search store items by name for a specific store",
            ToolKind::SearchCategories => {
                "Search store categories by name for a specific store, or get all categories if no category name is provided"
            }
            ToolKind::SearchItemsByImage => {
                "Search store items by image similarity for a specific store"
            }
            ToolKind::GetStoreShippingPolicy => "Get the shipping policy for a specific store",
            ToolKind::GetStoreRefundPolicy => "Get the refund/return policy for a specific store",
            ToolKind::GetStorePaymentOptions => {
                "Retrieve available payment options for a specific store (e.g., credit card, cash on delivery, PayPal, etc.)"
            }
            ToolKind::SendOrderByEmail => {
                "Sends a customer's order via email, including contact info, delivery address, and list of items."
            }
            ToolKind::SendImageToFacebookUser => {
                "Sends an image message to a Facebook Messenger user using their PSID."
            }
            ToolKind::SendGalleryToFacebookUser => {
                "Sends several images to a Facebook Messenger user as one gallery, optionally preceded by a text message."
            }
        }
    }

    pub fn parameters(self) -> Value {
        match self {
            ToolKind::SearchItems => object_schema(
                json!({
                    "storeId": store_id_property("The store ID to search items in"),
                    "nameQuery": {
                        "type": "string",
                        "description": "Part of the item name to search for"
                    },
                    "categoryId": {
                        "type": ["string", "null"],
                        "description": "Optional category ID to restrict the search to"
                    }
                }),
                &["storeId", "nameQuery", "categoryId"],
            ),
            ToolKind::SearchCategories => object_schema(
                json!({
                    "storeId": store_id_property("The store ID to search categories in"),
                    "categoryName": {
                        "type": ["string", "null"],
                        "description": "Part of the category name, or null to list all categories"
                    }
                }),
                &["storeId", "categoryName"],
            ),
            ToolKind::SearchItemsByImage => object_schema(
                json!({
                    "storeId": store_id_property("The store ID to search items in"),
                    "imageURL": {
                        "type": "string",
                        "description": "URL of the image sent by the customer"
                    }
                }),
                &["storeId", "imageURL"],
            ),
            ToolKind::GetStoreShippingPolicy => object_schema(
                json!({ "storeId": store_id_property("The store ID to get the shipping policy for") }),
                &["storeId"],
            ),
            ToolKind::GetStoreRefundPolicy => object_schema(
                json!({ "storeId": store_id_property("The store ID to get the refund policy for") }),
                &["storeId"],
            ),
            ToolKind::GetStorePaymentOptions => object_schema(
                json!({ "storeId": store_id_property("The store ID to get payment options for") }),
                &["storeId"],
            ),
            ToolKind::SendOrderByEmail => object_schema(
                json!({
                    "storeId": store_id_property("The store ID to register order with"),
                    "customerName": {
                        "type": "string",
                        "description": "Full name of the customer placing the order"
                    },
                    "customerPhone": {
                        "type": "string",
                        "description": "Customer's phone number for contact or delivery"
                    },
                    "deliveryAddress": {
                        "type": "string",
                        "description": "Full delivery address for the order"
                    },
                    "items": {
                        "type": "array",
                        "description": "Items the customer is ordering",
                        "items": {
                            "type": "object",
                            "properties": {
                                "itemId": {
                                    "type": ["string", "null"],
                                    "description": "Catalog ID of the item, if known"
                                },
                                "name": { "type": "string", "description": "Item name" },
                                "price": { "type": "number", "description": "Unit price" },
                                "quantity": { "type": "integer", "description": "Number of units" }
                            },
                            "required": ["itemId", "name", "price", "quantity"],
                            "additionalProperties": false
                        }
                    }
                }),
                &["storeId", "customerName", "customerPhone", "deliveryAddress", "items"],
            ),
            ToolKind::SendImageToFacebookUser => object_schema(
                json!({
                    "recipientId": {
                        "type": "string",
                        "description": "The PSID of the Facebook user"
                    },
                    "imageUrl": {
                        "type": "string",
                        "description": "Public URL of the image to send"
                    },
                    "caption": {
                        "type": ["string", "null"],
                        "description": "Optional text sent after the image"
                    }
                }),
                &["recipientId", "imageUrl", "caption"],
            ),
            ToolKind::SendGalleryToFacebookUser => object_schema(
                json!({
                    "recipientId": {
                        "type": "string",
                        "description": "The PSID of the Facebook user"
                    },
                    "text": {
                        "type": ["string", "null"],
                        "description": "Optional text sent before the gallery"
                    },
                    "images": {
                        "type": "array",
                        "description": "Gallery cards, one per image",
                        "items": {
                            "type": "object",
                            "properties": {
                                "url": { "type": "string", "description": "Image URL" },
                                "title": { "type": ["string", "null"], "description": "Card title" },
                                "subtitle": { "type": ["string", "null"], "description": "Card subtitle" }
                            },
                            "required": ["url", "title", "subtitle"],
                            "additionalProperties": false
                        }
                    }
                }),
                &["recipientId", "text", "images"],
            ),
        }
    }

    pub fn definition(self) -> ToolDefinition {
        ToolDefinition {
            name: self.to_string(),
            description: self.description().to_string(),
            parameters: self.parameters(),
            strict: true,
        }
    }

    /// The full registry, sorted by name for stable prompts.
    pub fn definitions() -> Vec<ToolDefinition> {
        let mut defs: Vec<ToolDefinition> = ToolKind::iter().map(ToolKind::definition).collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }
}
