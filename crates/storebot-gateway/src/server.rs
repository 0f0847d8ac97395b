// SPDX-FileCopyrightText: 2026 Storebot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway HTTP server built on axum.
//!
//! Sets up routes, middleware, and shared state for the gateway.

use std::sync::Arc;

use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use storebot_agent::{MessengerPipeline, WebAssistant};
use storebot_config::model::{MetaConfig, ServerConfig};
use storebot_core::StorebotError;
use storebot_meta::ChannelOnboarding;
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::auth::{auth_middleware, AuthConfig};
use crate::handlers;

/// Health state for the unauthenticated health endpoint.
#[derive(Clone)]
pub struct HealthState {
    /// Process start time for uptime calculation.
    pub start_time: std::time::Instant,
}

/// Meta webhook and OAuth settings the handlers need.
#[derive(Clone, Default)]
pub struct MetaSettings {
    /// Expected `hub.verify_token` of the subscription handshake.
    pub verify_token: String,
    /// When set, deliveries must carry a valid `X-Hub-Signature-256`.
    pub app_secret: Option<String>,
    pub success_redirect_url: Option<String>,
    pub error_redirect_url: Option<String>,
}

impl From<&MetaConfig> for MetaSettings {
    fn from(config: &MetaConfig) -> Self {
        Self {
            verify_token: config.verify_token.clone().unwrap_or_default(),
            app_secret: config.app_secret.clone(),
            success_redirect_url: config.success_redirect_url.clone(),
            error_redirect_url: config.error_redirect_url.clone(),
        }
    }
}

impl std::fmt::Debug for MetaSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetaSettings")
            .field("verify_token", &"[redacted]")
            .field("app_secret", &self.app_secret.as_ref().map(|_| "[redacted]"))
            .field("success_redirect_url", &self.success_redirect_url)
            .field("error_redirect_url", &self.error_redirect_url)
            .finish()
    }
}

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct GatewayState {
    /// Synchronous ask path for web conversations.
    pub web: WebAssistant,
    /// Messenger/Instagram webhook processing.
    pub pipeline: Arc<MessengerPipeline>,
    /// OAuth onboarding and subscription toggling; `None` when Meta app
    /// credentials are not configured.
    pub onboarding: Option<Arc<ChannelOnboarding>>,
    pub meta: MetaSettings,
    /// Authentication configuration.
    pub auth: AuthConfig,
    pub health: HealthState,
}

/// Builds the gateway router.
///
/// Public routes:
/// - GET /health
/// - GET, POST /v1/assistant/messenger/webhook
/// - GET /v1/facebook/callback
///
/// Bearer-authenticated routes:
/// - POST /v1/assistant/ask
/// - POST /v1/channels/{id}/subscribe
/// - POST /v1/channels/{id}/unsubscribe
pub fn router(state: GatewayState) -> Router {
    let auth_state = state.auth.clone();

    let public_routes = Router::new()
        .route("/health", get(handlers::get_health))
        .route(
            "/v1/assistant/messenger/webhook",
            get(handlers::get_webhook).post(handlers::post_webhook),
        )
        .route("/v1/facebook/callback", get(handlers::get_facebook_callback))
        .with_state(state.clone());

    let api_routes = Router::new()
        .route("/v1/assistant/ask", post(handlers::post_ask))
        .route("/v1/channels/{id}/subscribe", post(handlers::post_subscribe))
        .route(
            "/v1/channels/{id}/unsubscribe",
            post(handlers::post_unsubscribe),
        )
        .route_layer(axum_middleware::from_fn_with_state(
            auth_state,
            auth_middleware,
        ))
        .with_state(state);

    Router::new().merge(public_routes).merge(api_routes).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive()),
    )
}

/// Start the gateway HTTP server and serve until `shutdown` is cancelled.
///
/// In-flight requests finish before this returns; webhook work already
/// accepted keeps running in the pipeline's background tasks.
pub async fn start_server(
    config: &ServerConfig,
    state: GatewayState,
    shutdown: CancellationToken,
) -> Result<(), StorebotError> {
    let app = router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| StorebotError::Channel {
            message: format!("failed to bind gateway to {addr}: {e}"),
            source: Some(Box::new(e)),
        })?;

    tracing::info!("gateway listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(|e| StorebotError::Channel {
            message: format!("gateway server error: {e}"),
            source: Some(Box::new(e)),
        })?;

    tracing::info!("gateway stopped");
    Ok(())
}
