// SPDX-FileCopyrightText: 2026 Storebot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Resolves model tool calls to JSON results.
//!
//! Dispatch never fails: unknown names, malformed arguments and handler
//! errors all come back as a `{"message": ...}` envelope that is fed to the
//! model like any other result.

use std::sync::Arc;

use futures::future::join_all;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use storebot_core::{ChannelAdapter, EmbeddingAdapter, StorebotError, ToolCall, ToolDefinition};
use storebot_storage::queries::stores;
use storebot_storage::{Database, Store};
use tracing::{debug, warn};

use crate::catalog::{self, SearchByImageArgs, SearchCategoriesArgs, SearchItemsArgs};
use crate::kind::ToolKind;
use crate::order::{self, OrderArgs, OrderMailer};
use crate::policy;
use crate::push::{self, SendGalleryArgs, SendImageArgs};

/// The conversation a batch of tool calls belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolContext {
    /// Store the conversation belongs to; tools never read another store.
    pub store_id: String,
    /// Messenger user of the conversation. Pushes only ever go to them;
    /// `None` (web widget) disables pushes.
    pub recipient_id: Option<String>,
}

/// Output of one dispatched call, keyed by the model's call id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutput {
    pub call_id: String,
    pub content: String,
}

#[derive(Debug, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoreArgs {
    store_id: String,
}

/// Fixed tool registry bound to the collaborators the tools need.
///
/// Collaborators are optional; a tool whose collaborator is missing answers
/// with an error envelope instead of being hidden from the model.
#[derive(Clone)]
pub struct ToolDispatcher {
    db: Database,
    embedder: Option<Arc<dyn EmbeddingAdapter>>,
    channel: Option<Arc<dyn ChannelAdapter>>,
    mailer: Option<Arc<dyn OrderMailer>>,
    decrement_stock: bool,
}

fn envelope(message: &str) -> Value {
    json!({ "message": message })
}

fn error_envelope(err: &StorebotError) -> Value {
    json!({ "message": "Error happened", "error": err.to_string() })
}

fn parse_args<T: DeserializeOwned>(raw: &str) -> Result<T, StorebotError> {
    serde_json::from_str(raw).map_err(|e| StorebotError::Tool {
        message: format!("invalid arguments: {e}"),
    })
}

fn missing(what: &str) -> StorebotError {
    StorebotError::Tool {
        message: format!("{what} is not configured"),
    }
}

/// Pins the model-supplied store id to the conversation's store.
fn scope_store(ctx: &ToolContext, kind: ToolKind, store_id: &mut String) {
    if *store_id != ctx.store_id {
        warn!(
            tool = %kind,
            requested = %store_id,
            store_id = %ctx.store_id,
            "tool call named another store; using the conversation's store"
        );
        *store_id = ctx.store_id.clone();
    }
}

/// Pins the model-supplied recipient to the conversation's user.
///
/// Returns `false` when the conversation has no Messenger user to push to.
fn scope_recipient(ctx: &ToolContext, kind: ToolKind, recipient_id: &mut String) -> bool {
    let Some(own) = ctx.recipient_id.as_deref() else {
        warn!(tool = %kind, requested = %recipient_id, "push refused, conversation has no messenger user");
        return false;
    };
    if recipient_id.as_str() != own {
        warn!(
            tool = %kind,
            requested = %recipient_id,
            recipient_id = %own,
            "tool call named another recipient; using the conversation's user"
        );
        *recipient_id = own.to_string();
    }
    true
}

impl ToolDispatcher {
    pub fn new(db: Database) -> Self {
        Self {
            db,
            embedder: None,
            channel: None,
            mailer: None,
            decrement_stock: true,
        }
    }

    pub fn with_embedder(mut self, embedder: Arc<dyn EmbeddingAdapter>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn with_channel(mut self, channel: Arc<dyn ChannelAdapter>) -> Self {
        self.channel = Some(channel);
        self
    }

    pub fn with_mailer(mut self, mailer: Arc<dyn OrderMailer>) -> Self {
        self.mailer = Some(mailer);
        self
    }

    /// Whether placed orders decrement stock of inventory-tracked items.
    pub fn with_stock_decrement(mut self, enabled: bool) -> Self {
        self.decrement_stock = enabled;
        self
    }

    /// Tool definitions advertised with every generation request.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        ToolKind::definitions()
    }

    /// Runs one tool call and returns its JSON-encoded result.
    pub async fn dispatch(&self, ctx: &ToolContext, call: &ToolCall) -> String {
        let Some(kind) = ToolKind::from_name(&call.name) else {
            warn!(tool = %call.name, "unknown tool requested");
            return envelope("Unknown tool name").to_string();
        };

        let value = match self.run(ctx, kind, &call.arguments).await {
            Ok(value) => {
                debug!(tool = %kind, call_id = %call.id, "tool call resolved");
                value
            }
            Err(e) => {
                warn!(tool = %kind, call_id = %call.id, error = %e, "tool call failed");
                error_envelope(&e)
            }
        };
        value.to_string()
    }

    /// Runs every call concurrently; outputs keep the order of `calls`.
    pub async fn dispatch_all(&self, ctx: &ToolContext, calls: &[ToolCall]) -> Vec<ToolOutput> {
        join_all(calls.iter().map(|call| async move {
            ToolOutput {
                call_id: call.id.clone(),
                content: self.dispatch(ctx, call).await,
            }
        }))
        .await
    }

    async fn load_store(&self, ctx: &ToolContext, kind: ToolKind, raw: &str) -> Result<Option<Store>, StorebotError> {
        let mut args: StoreArgs = parse_args(raw)?;
        scope_store(ctx, kind, &mut args.store_id);
        stores::get_store(&self.db, &args.store_id).await
    }

    async fn render_policy(
        &self,
        ctx: &ToolContext,
        kind: ToolKind,
        raw: &str,
        render: fn(&Store) -> String,
    ) -> Result<Value, StorebotError> {
        Ok(match self.load_store(ctx, kind, raw).await? {
            Some(store) => envelope(&render(&store)),
            None => envelope("no store found"),
        })
    }

    async fn run(&self, ctx: &ToolContext, kind: ToolKind, raw: &str) -> Result<Value, StorebotError> {
        match kind {
            ToolKind::SearchItems => {
                let mut args: SearchItemsArgs = parse_args(raw)?;
                scope_store(ctx, kind, &mut args.store_id);
                catalog::search_items(&self.db, &args).await
            }
            ToolKind::SearchCategories => {
                let mut args: SearchCategoriesArgs = parse_args(raw)?;
                scope_store(ctx, kind, &mut args.store_id);
                catalog::search_categories(&self.db, &args).await
            }
            ToolKind::SearchItemsByImage => {
                let mut args: SearchByImageArgs = parse_args(raw)?;
                scope_store(ctx, kind, &mut args.store_id);
                let embedder = self.embedder.as_deref().ok_or_else(|| missing("image search"))?;
                catalog::search_items_by_image(&self.db, embedder, &args).await
            }
            ToolKind::GetStoreShippingPolicy => {
                self.render_policy(ctx, kind, raw, policy::render_shipping_policy).await
            }
            ToolKind::GetStoreRefundPolicy => {
                self.render_policy(ctx, kind, raw, policy::render_return_policy).await
            }
            ToolKind::GetStorePaymentOptions => {
                self.render_policy(ctx, kind, raw, policy::render_payment_options).await
            }
            ToolKind::SendOrderByEmail => {
                let mut args: OrderArgs = parse_args(raw)?;
                scope_store(ctx, kind, &mut args.store_id);
                let mailer = self.mailer.as_deref().ok_or_else(|| missing("order email"))?;
                order::send_order_by_email(&self.db, mailer, self.decrement_stock, args).await
            }
            ToolKind::SendImageToFacebookUser => {
                let mut args: SendImageArgs = parse_args(raw)?;
                if !scope_recipient(ctx, kind, &mut args.recipient_id) {
                    return Ok(envelope(push::SEND_FAILED));
                }
                let channel = self.channel.as_deref().ok_or_else(|| missing("messenger channel"))?;
                Ok(push::send_image(&self.db, channel, &ctx.store_id, args).await)
            }
            ToolKind::SendGalleryToFacebookUser => {
                let mut args: SendGalleryArgs = parse_args(raw)?;
                if !scope_recipient(ctx, kind, &mut args.recipient_id) {
                    return Ok(envelope(push::SEND_FAILED));
                }
                let channel = self.channel.as_deref().ok_or_else(|| missing("messenger channel"))?;
                Ok(push::send_gallery(&self.db, channel, &ctx.store_id, args).await)
            }
        }
    }
}
