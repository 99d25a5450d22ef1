use super::extract::RequestUrl;
use crate::errors::ApiError;
use crate::headers::presets;
use crate::openapi::OAUTH_TAG;
use crate::services::ProtocolError;
use crate::state::AppState;
use axum::extract::{Form, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use http::header::CONTENT_TYPE;
use http::{HeaderMap, Method, StatusCode};
use log::{error, warn};
use serde_json::Value;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TokenEndpointError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    /// The provider refused the exchange; its body is passed through as is
    #[error("Token request rejected: {body}")]
    Rejected { body: String },
    #[error("Token response is not valid JSON: {0}")]
    InvalidBody(#[from] serde_json::Error),
}

impl IntoResponse for TokenEndpointError {
    fn into_response(self) -> Response {
        match self {
            Self::Protocol(err) => err.into_response(),
            Self::Rejected { body } => {
                let mut response =
                    (StatusCode::BAD_REQUEST, [(CONTENT_TYPE, "application/json")], body)
                        .into_response();
                presets::no_store().apply(&mut response);
                response
            }
            Self::InvalidBody(err) => {
                error!("Invalid token response from the OAuth provider: {}", err);
                ApiError::internal("Invalid token response").into_response()
            }
        }
    }
}

/// Exchange an authorization code for an access token (RFC 6749 Section 4.1.3)
#[utoipa::path(
    post,
    path = "/oauth/token",
    tag = OAUTH_TAG,
    request_body(
        content = HashMap<String, String>,
        content_type = "application/x-www-form-urlencoded",
        description = "grant_type, code, client_id and optionally redirect_uri"
    ),
    responses(
        (status = 200, description = "Access token issued"),
        (status = 400, description = "Token request rejected"),
    )
)]
pub(crate) async fn token_handler(
    State(state): State<AppState>,
    method: Method,
    headers: HeaderMap,
    RequestUrl(url): RequestUrl,
    Form(body): Form<HashMap<String, String>>,
) -> Result<Response, TokenEndpointError> {
    let response = state
        .oauth
        .create_token_response(&url, &method, &body, &headers)
        .await?;
    let raw = response.body.unwrap_or_default();

    if !response.status.is_success() {
        warn!("Token request rejected with status {}", response.status);
        return Err(TokenEndpointError::Rejected { body: raw });
    }

    let payload: Value = serde_json::from_str(&raw)?;
    let mut response = Json(payload).into_response();
    presets::no_store().apply(&mut response);
    Ok(response)
}
