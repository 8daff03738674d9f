//! HTTP error rendering for prediapp-api
//!
//! Maps the shared domain error onto status codes and the
//! `{status, message, error}` JSON body returned by every endpoint.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use prediapp_common::Error;

/// Error type returned by every HTTP handler
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        let message = err.to_string();
        let (status, code) = match err {
            Error::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            Error::VariantMismatch(_) => (StatusCode::BAD_REQUEST, "variant_mismatch"),
            Error::Forbidden(_) => (StatusCode::FORBIDDEN, "forbidden"),
            Error::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            Error::Conflict(_) => (StatusCode::CONFLICT, "conflict"),
            Error::BadGateway(_) => (StatusCode::BAD_GATEWAY, "bad_gateway"),
            Error::Timeout(_) => (StatusCode::GATEWAY_TIMEOUT, "timeout"),
            Error::Database(_) | Error::Io(_) | Error::Config(_) | Error::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal")
            }
        };
        Self {
            status,
            code,
            message,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "status": self.status.as_u16(),
            "message": self.message,
            "error": self.code,
        }));
        (self.status, body).into_response()
    }
}

/// Convenience Result type for HTTP handlers
pub type ApiResult<T> = std::result::Result<T, ApiError>;
