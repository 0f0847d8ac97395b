// SPDX-FileCopyrightText: 2026 Storebot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed Graph API errors.

use serde::Deserialize;
use storebot_core::StorebotError;

/// Graph error code for an expired or invalidated access token.
pub const TOKEN_EXPIRED_CODE: i64 = 190;

/// Error object returned by the Graph API in `{"error": {...}}`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GraphApiError {
    pub message: String,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub code: i64,
    #[serde(rename = "error_subcode", default)]
    pub subcode: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GraphErrorEnvelope {
    pub error: GraphApiError,
}

impl GraphApiError {
    pub fn is_token_expired(&self) -> bool {
        self.code == TOKEN_EXPIRED_CODE
    }

    pub(crate) fn into_channel_error(self, context: &str) -> StorebotError {
        StorebotError::Channel {
            message: format!("{context}: Graph API error {} ({})", self.code, self.message),
            source: Some(Box::new(self)),
        }
    }
}

impl std::fmt::Display for GraphApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.subcode {
            Some(sub) => write!(f, "graph error {}/{}: {}", self.code, sub, self.message),
            None => write!(f, "graph error {}: {}", self.code, self.message),
        }
    }
}

impl std::error::Error for GraphApiError {}

/// Finds the Graph error carried by a channel error, if any.
pub fn graph_error(err: &StorebotError) -> Option<&GraphApiError> {
    match err {
        StorebotError::Channel {
            source: Some(source),
            ..
        } => source.downcast_ref::<GraphApiError>(),
        _ => None,
    }
}

/// True when `err` is a Graph "token expired" failure.
pub fn is_token_expired(err: &StorebotError) -> bool {
    graph_error(err).is_some_and(GraphApiError::is_token_expired)
}
