use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;

/// Stable, machine-readable error codes exposed across the gateway boundary.
pub mod codes {
    pub const UNSUPPORTED_TASK: &str = "UNSUPPORTED_TASK";
    pub const INVALID_PAYLOAD: &str = "INVALID_PAYLOAD";
    pub const SERVICE_UNAVAILABLE: &str = "SERVICE_UNAVAILABLE";
    pub const SCHEMA_VALIDATION_FAILED: &str = "SCHEMA_VALIDATION_FAILED";
    pub const RATE_LIMIT: &str = "RATE_LIMIT";
    pub const DUPLICATE_SUBMISSION: &str = "DUPLICATE_SUBMISSION";
    pub const UNKNOWN_ERROR: &str = "UNKNOWN_ERROR";
}

/// The only error shape callers ever see: `{code, message}`.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{code}: {message}")]
pub struct NormalizedError {
    pub code: String,
    pub message: String,
}

impl NormalizedError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    fn status(&self) -> StatusCode {
        match self.code.as_str() {
            codes::UNSUPPORTED_TASK => StatusCode::NOT_FOUND,
            codes::INVALID_PAYLOAD => StatusCode::BAD_REQUEST,
            codes::RATE_LIMIT => StatusCode::TOO_MANY_REQUESTS,
            codes::DUPLICATE_SUBMISSION => StatusCode::CONFLICT,
            codes::SERVICE_UNAVAILABLE => StatusCode::SERVICE_UNAVAILABLE,
            codes::UNKNOWN_ERROR => StatusCode::INTERNAL_SERVER_ERROR,
            // schema failures and vendor-native errors are upstream defects
            _ => StatusCode::BAD_GATEWAY,
        }
    }
}

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Gateway(#[from] NormalizedError),

    #[error("Validation error: {0}")]
    Validation(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            AppError::Gateway(err) => (err.status(), err.code, err.message),
            AppError::Validation(msg) => (
                StatusCode::BAD_REQUEST,
                codes::INVALID_PAYLOAD.to_string(),
                msg,
            ),
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping_for_known_codes() {
        let cases = [
            (codes::UNSUPPORTED_TASK, StatusCode::NOT_FOUND),
            (codes::INVALID_PAYLOAD, StatusCode::BAD_REQUEST),
            (codes::RATE_LIMIT, StatusCode::TOO_MANY_REQUESTS),
            (codes::DUPLICATE_SUBMISSION, StatusCode::CONFLICT),
            (codes::SERVICE_UNAVAILABLE, StatusCode::SERVICE_UNAVAILABLE),
            (codes::SCHEMA_VALIDATION_FAILED, StatusCode::BAD_GATEWAY),
            (codes::UNKNOWN_ERROR, StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (code, status) in cases {
            assert_eq!(NormalizedError::new(code, "x").status(), status, "{code}");
        }
    }

    #[test]
    fn test_vendor_codes_map_to_bad_gateway() {
        let err = NormalizedError::new("VENDOR_TIMEOUT", "slow");
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_display_includes_code_and_message() {
        let err = NormalizedError::new(codes::RATE_LIMIT, "Too many requests");
        assert_eq!(err.to_string(), "RATE_LIMIT: Too many requests");
    }

    #[test]
    fn test_app_error_response_status() {
        let resp = AppError::Gateway(NormalizedError::new(codes::RATE_LIMIT, "slow down"))
            .into_response();
        assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
    }
}
