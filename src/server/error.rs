//! API error types and JSON response formatting.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::cache::CacheError;
use crate::ttl::TtlError;

/// API error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

/// Error details in the response.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// API error type that converts to HTTP responses.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn invalid_ttl(err: &TtlError) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "INVALID_TTL", err.to_string())
            .with_details(serde_json::json!({ "ttl": err.input }))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.code,
                message: self.message,
                details: self.details,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<TtlError> for ApiError {
    fn from(err: TtlError) -> Self {
        Self::invalid_ttl(&err)
    }
}

impl From<CacheError> for ApiError {
    fn from(err: CacheError) -> Self {
        match &err {
            CacheError::NotLoaded { key } => {
                Self::new(StatusCode::CONFLICT, "KEY_NOT_LOADED", err.to_string())
                    .with_details(serde_json::json!({ "key": key }))
            }
            CacheError::NotComputing { key, state } => {
                Self::new(StatusCode::CONFLICT, "KEY_NOT_COMPUTING", err.to_string())
                    .with_details(serde_json::json!({ "key": key, "state": state }))
            }
            CacheError::Store(_) => Self::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "STORAGE_ERROR",
                err.to_string(),
            ),
        }
    }
}
