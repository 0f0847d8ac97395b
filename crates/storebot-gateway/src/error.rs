// SPDX-FileCopyrightText: 2026 Storebot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mapping of [`StorebotError`] onto HTTP responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use storebot_core::StorebotError;

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Always `false`.
    pub accepted: bool,
    pub message: String,
    /// Offending request field, for validation failures.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<&'static str>,
}

/// A handler failure rendered as `{accepted: false, message, field}`.
#[derive(Debug)]
pub struct ApiError(pub StorebotError);

impl From<StorebotError> for ApiError {
    fn from(err: StorebotError) -> Self {
        Self(err)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match &self.0 {
            StorebotError::Validation { .. } | StorebotError::SubscriptionInactive => {
                StatusCode::BAD_REQUEST
            }
            StorebotError::NotFound { .. } => StatusCode::NOT_FOUND,
            StorebotError::Channel { .. } | StorebotError::Provider { .. } => {
                StatusCode::BAD_GATEWAY
            }
            StorebotError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            StorebotError::Config(_) => StatusCode::SERVICE_UNAVAILABLE,
            StorebotError::Storage { .. }
            | StorebotError::Tool { .. }
            | StorebotError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let field = match &self.0 {
            StorebotError::Validation { field, .. } => *field,
            _ => None,
        };
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self.0, "request failed");
            "internal server error".to_string()
        } else {
            tracing::debug!(error = %self.0, status = status.as_u16(), "request rejected");
            self.0.to_string()
        };
        (
            status,
            Json(ErrorResponse {
                accepted: false,
                message,
                field,
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_maps_to_bad_request_with_field() {
        let err = ApiError(StorebotError::validation("storeId", "storeId is required"));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn inactive_subscription_is_a_client_error() {
        assert_eq!(
            ApiError(StorebotError::SubscriptionInactive).status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn upstream_failures_are_bad_gateway() {
        assert_eq!(
            ApiError(StorebotError::channel("graph down")).status(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            ApiError(StorebotError::NotFound {
                entity: "channel",
                id: "c1".into()
            })
            .status(),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn error_response_omits_missing_field() {
        let body = ErrorResponse {
            accepted: false,
            message: "nope".into(),
            field: None,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json, serde_json::json!({"accepted": false, "message": "nope"}));
    }
}
