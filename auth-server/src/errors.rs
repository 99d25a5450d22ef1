use crate::services::ServiceError;
use axum::response::IntoResponse;
use axum::Json;
use http::StatusCode;
use log::error;
use serde_json::{json, Map, Value};
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct ApiError {
    pub detail: String,
    pub status_code: StatusCode,
}

impl ApiError {
    /// Create a new ApiError with a detail message and status code
    pub fn new<S: ToString>(detail: S, status_code: StatusCode) -> Self {
        Self {
            detail: detail.to_string(),
            status_code,
        }
    }

    /// Create new Internal Server Error (500) with a detail message
    pub fn internal<S: ToString>(detail: S) -> Self {
        Self::new(detail, StatusCode::INTERNAL_SERVER_ERROR)
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        error!("Service failure: {}", err);
        Self::internal(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status_code = self.status_code;
        let body = json!({
            "detail": self.detail,
        });
        (status_code, Json(body)).into_response()
    }
}

/// A missing, invalid or expired bearer token
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{error_type}")]
pub struct TokenError {
    /// Human-readable description
    pub message: Option<String>,
    /// Machine-readable error tag, e.g. `missing_token`
    pub error_type: String,
    pub status_code: StatusCode,
}

impl TokenError {
    /// Create a TokenError with the default status code (400)
    pub fn new<M: Into<String>>(message: Option<M>, error_type: &str) -> Self {
        Self {
            message: message.map(Into::into),
            error_type: error_type.to_string(),
            status_code: StatusCode::BAD_REQUEST,
        }
    }

    #[cfg(test)]
    pub fn with_status(mut self, status_code: StatusCode) -> Self {
        self.status_code = status_code;
        self
    }

    pub fn missing_token(message: &str) -> Self {
        Self::new(Some(message), "missing_token")
    }
}

/// Renders a token error as the status code and JSON payload sent to the client.
///
/// `error_description` is only present when the error has a non-empty message.
pub fn api_token_error(err: &TokenError) -> (StatusCode, Value) {
    let mut body = Map::new();
    body.insert("error".to_string(), Value::String(err.error_type.clone()));
    if let Some(message) = err.message.as_deref().filter(|m| !m.is_empty()) {
        body.insert(
            "error_description".to_string(),
            Value::String(message.to_string()),
        );
    }
    (err.status_code, Value::Object(body))
}

impl IntoResponse for TokenError {
    fn into_response(self) -> axum::response::Response {
        let (status_code, body) = api_token_error(&self);
        (status_code, Json(body)).into_response()
    }
}
