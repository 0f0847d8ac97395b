// SPDX-FileCopyrightText: 2026 Storebot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP request handlers for the gateway.

use std::collections::HashMap;

use axum::{
    body::Bytes,
    extract::{rejection::JsonRejection, Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use storebot_core::{Platform, StorebotError};
use storebot_meta::onboarding::sanitize_user_id;
use storebot_meta::{verify_challenge, verify_signature, WebhookPayload};
use tracing::{info, warn};

use crate::error::ApiError;
use crate::server::GatewayState;

/// Validated body of POST /v1/assistant/ask.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AskBody {
    pub message: String,
    pub thread_id: Option<String>,
    pub store_id: String,
}

impl AskBody {
    /// Checks `{message, threadId?, storeId}`, reporting the first bad field.
    pub fn from_json(body: &Value) -> Result<Self, StorebotError> {
        let message = match body.get("message") {
            None | Some(Value::Null) => {
                return Err(StorebotError::validation("message", "message is required"));
            }
            Some(Value::String(s)) if s.trim().is_empty() => {
                return Err(StorebotError::validation("message", "message is required"));
            }
            Some(Value::String(s)) => s.clone(),
            Some(_) => {
                return Err(StorebotError::validation("message", "message must be a string"));
            }
        };
        let thread_id = match body.get("threadId") {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) if s.trim().is_empty() => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(_) => {
                return Err(StorebotError::validation("threadId", "threadId must be a string"));
            }
        };
        let store_id = match body.get("storeId") {
            Some(Value::String(s)) if !s.trim().is_empty() => s.clone(),
            _ => return Err(StorebotError::validation("storeId", "storeId is required")),
        };
        Ok(Self {
            message,
            thread_id,
            store_id,
        })
    }
}

/// Response body for GET /health.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    /// Webhook deliveries still being processed.
    pub background_tasks: usize,
}

/// Subscription state of one channel after a toggle.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelStatusResponse {
    pub accepted: bool,
    pub channel_id: String,
    pub platform: Platform,
    pub page_id: String,
    pub is_subscribed: bool,
}

/// Query of GET /v1/facebook/callback.
#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    #[serde(default)]
    pub code: Option<String>,
    /// Carries the connecting user's id.
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// GET /health
pub async fn get_health(State(state): State<GatewayState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.health.start_time.elapsed().as_secs(),
        background_tasks: state.pipeline.tasks().len(),
    })
}

/// POST /v1/assistant/ask
///
/// Holds the request open until the turn finishes.
pub async fn post_ask(
    State(state): State<GatewayState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Response {
    let body = match body {
        Ok(Json(value)) => AskBody::from_json(&value),
        Err(rejection) => Err(StorebotError::Validation {
            field: None,
            message: rejection.body_text(),
        }),
    };
    let body = match body {
        Ok(body) => body,
        Err(e) => return ApiError(e).into_response(),
    };

    match state
        .web
        .ask(&body.store_id, &body.message, body.thread_id.as_deref())
        .await
    {
        Ok(reply) => (StatusCode::OK, Json(reply)).into_response(),
        Err(e) => ApiError(e).into_response(),
    }
}

/// GET /v1/assistant/messenger/webhook
///
/// Echoes `hub.challenge` when the handshake's verify token matches.
pub async fn get_webhook(
    State(state): State<GatewayState>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let challenge = verify_challenge(
        params.get("hub.mode").map(String::as_str),
        params.get("hub.verify_token").map(String::as_str),
        params.get("hub.challenge").map(String::as_str),
        &state.meta.verify_token,
    );
    match challenge {
        Some(challenge) => {
            info!("webhook verified");
            (StatusCode::OK, challenge.to_string()).into_response()
        }
        None => {
            warn!("webhook verification failed");
            StatusCode::FORBIDDEN.into_response()
        }
    }
}

/// POST /v1/assistant/messenger/webhook
///
/// Acknowledges with 200 before any processing. Only a bad signature is
/// refused.
pub async fn post_webhook(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if let Some(secret) = state.meta.app_secret.as_deref() {
        let signature = headers
            .get("x-hub-signature-256")
            .and_then(|v| v.to_str().ok());
        if !verify_signature(secret, signature, &body) {
            warn!("webhook signature rejected");
            return StatusCode::FORBIDDEN.into_response();
        }
    }

    match serde_json::from_slice::<WebhookPayload>(&body) {
        Ok(payload) => state.pipeline.accept(payload),
        Err(e) => warn!(error = %e, "unparseable webhook delivery ignored"),
    }
    (StatusCode::OK, "EVENT_RECEIVED").into_response()
}

/// POST /v1/channels/{id}/subscribe
pub async fn post_subscribe(state: State<GatewayState>, id: Path<String>) -> Response {
    toggle_subscription(state, id, true).await
}

/// POST /v1/channels/{id}/unsubscribe
pub async fn post_unsubscribe(state: State<GatewayState>, id: Path<String>) -> Response {
    toggle_subscription(state, id, false).await
}

async fn toggle_subscription(
    State(state): State<GatewayState>,
    Path(channel_id): Path<String>,
    subscribe: bool,
) -> Response {
    let Some(onboarding) = state.onboarding.as_ref() else {
        return ApiError(StorebotError::Config("meta onboarding is not configured".into()))
            .into_response();
    };
    match onboarding.set_subscription(&channel_id, subscribe).await {
        Ok(channel) => (
            StatusCode::OK,
            Json(ChannelStatusResponse {
                accepted: true,
                channel_id: channel.id,
                platform: channel.platform,
                page_id: channel.page_id,
                is_subscribed: channel.is_subscribed,
            }),
        )
            .into_response(),
        Err(e) => ApiError(e).into_response(),
    }
}

/// GET /v1/facebook/callback
///
/// Completes OAuth and redirects to the configured success or error page.
/// Without redirect URLs the outcome is returned as JSON.
pub async fn get_facebook_callback(
    State(state): State<GatewayState>,
    Query(params): Query<CallbackParams>,
) -> Response {
    match connect_channels(&state, &params).await {
        Ok(count) => match state.meta.success_redirect_url.as_deref() {
            Some(url) => Redirect::to(url).into_response(),
            None => (
                StatusCode::OK,
                Json(serde_json::json!({ "accepted": true, "channels": count })),
            )
                .into_response(),
        },
        Err(e) => {
            warn!(error = %e, "facebook onboarding failed");
            match state.meta.error_redirect_url.as_deref() {
                Some(url) => Redirect::to(url).into_response(),
                None => ApiError(e).into_response(),
            }
        }
    }
}

async fn connect_channels(
    state: &GatewayState,
    params: &CallbackParams,
) -> Result<usize, StorebotError> {
    if let Some(error) = params.error.as_deref() {
        return Err(StorebotError::validation("error", format!("authorization denied: {error}")));
    }
    let code = params
        .code
        .as_deref()
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| StorebotError::validation("code", "code is required"))?;
    let user_id = params
        .state
        .as_deref()
        .and_then(sanitize_user_id)
        .ok_or_else(|| StorebotError::validation("state", "state is required"))?;
    let onboarding = state
        .onboarding
        .as_ref()
        .ok_or_else(|| StorebotError::Config("meta onboarding is not configured".into()))?;

    let channels = onboarding.connect(code, &user_id).await?;
    Ok(channels.len())
}
