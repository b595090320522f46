use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

use patentflow_core::CompletionError;
use patentflow_logging::redact_sensitive_data;

/// Fixed message for every 500; internal detail stays in the logs.
pub const INTERNAL_ERROR_MESSAGE: &str = "服务器内部错误";

/// Returned for bodies that are not JSON or do not fit the request shape.
pub const MALFORMED_BODY_MESSAGE: &str = "请求体格式错误";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Completion(#[from] CompletionError),
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        warn!(status = %rejection.status(), detail = %rejection.body_text(), "Rejected request body");
        Self::Validation(MALFORMED_BODY_MESSAGE.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Validation(message) => (StatusCode::BAD_REQUEST, message),
            ApiError::Completion(CompletionError::MissingField(field)) => {
                (StatusCode::BAD_REQUEST, format!("缺少必填字段: {field}"))
            }
            ApiError::Completion(err) => {
                error!(error = %redact_sensitive_data(&err.to_string()), "Completion request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR_MESSAGE.to_string())
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

/// A present, non-blank string field, or a 400 with `message`.
pub(crate) fn required(value: Option<String>, message: &str) -> Result<String, ApiError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ApiError::Validation(message.to_string())),
    }
}

/// An optional string field, replaced by `default` when absent or blank.
pub(crate) fn or_default(value: Option<String>, default: &str) -> String {
    value
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}
