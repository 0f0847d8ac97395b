// SPDX-FileCopyrightText: 2026 Storebot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP gateway for Storebot.
//!
//! Serves the bearer-authenticated web ask API, the public Meta webhook
//! (verification handshake and deliveries), OAuth onboarding callbacks and
//! channel subscription toggles. Webhook deliveries are acknowledged before
//! processing; the work runs on the pipeline's background tasks.

pub mod auth;
pub mod error;
pub mod handlers;
pub mod server;

pub use auth::AuthConfig;
pub use error::{ApiError, ErrorResponse};
pub use server::{router, start_server, GatewayState, HealthState, MetaSettings};
