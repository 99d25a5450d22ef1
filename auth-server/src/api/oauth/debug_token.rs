use super::extract::BearerToken;
use crate::errors::{ApiError, TokenError};
use crate::headers::presets;
use crate::models::{utc_iso8601, Token};
use crate::openapi::OAUTH_TAG;
use crate::services::{ServiceError, TokenService};
use crate::state::AppState;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::Json;
use log::debug;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

const MISSING_TOKEN: &str = "Bearer token is missing.";
const INVALID_TOKEN: &str = "Bearer token does not exist or is expired.";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ClientInfo {
    pub id: String,
    pub name: String,
}

/// Introspection result for a valid bearer token
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(untagged)]
pub enum TokenInfo {
    OAuth {
        userid: String,
        client: ClientInfo,
        issued_at: String,
        expires_at: String,
        expired: bool,
    },
    Developer {
        userid: String,
        issued_at: String,
        /// Always null, developer tokens do not expire
        expires_at: Option<String>,
        expired: bool,
    },
}

impl From<Token> for TokenInfo {
    fn from(token: Token) -> Self {
        match token {
            Token::OAuth(token) => Self::OAuth {
                expired: token.expired(),
                userid: token.userid,
                client: ClientInfo {
                    id: token.authclient.id,
                    name: token.authclient.name,
                },
                issued_at: utc_iso8601(&token.created),
                expires_at: utc_iso8601(&token.expires),
            },
            Token::Developer(token) => Self::Developer {
                expired: token.expired(),
                expires_at: token.expires().as_ref().map(utc_iso8601),
                issued_at: utc_iso8601(&token.created),
                userid: token.userid,
            },
        }
    }
}

#[derive(Debug, Error)]
pub enum DebugTokenError {
    #[error(transparent)]
    Token(#[from] TokenError),
    #[error(transparent)]
    Service(#[from] ServiceError),
}

impl IntoResponse for DebugTokenError {
    fn into_response(self) -> Response {
        match self {
            Self::Token(err) => err.into_response(),
            Self::Service(err) => ApiError::from(err).into_response(),
        }
    }
}

/// Looks up and describes a bearer token.
///
/// Unknown and expired tokens are both reported as `missing_token`.
pub(crate) async fn describe_token(
    tokens: &dyn TokenService,
    token: Option<&str>,
) -> Result<TokenInfo, DebugTokenError> {
    let token = token
        .filter(|token| !token.is_empty())
        .ok_or_else(|| TokenError::missing_token(MISSING_TOKEN))?;

    if !tokens.validate(token).await? {
        return Err(TokenError::missing_token(INVALID_TOKEN).into());
    }

    let record = tokens
        .fetch(token)
        .await?
        .ok_or_else(|| TokenError::missing_token(INVALID_TOKEN))?;
    Ok(record.into())
}

/// Describe the bearer token of the request
#[utoipa::path(
    get,
    path = "/oauth/debug_token",
    tag = OAUTH_TAG,
    params(
        ("Authorization" = String, Header, description = "Bearer token to describe"),
    ),
    responses(
        (status = 200, description = "Token details", body = TokenInfo),
        (status = 400, description = "Token missing, unknown or expired"),
    )
)]
pub(crate) async fn debug_token_handler(
    State(state): State<AppState>,
    BearerToken(token): BearerToken,
) -> Result<Response, DebugTokenError> {
    let info = describe_token(state.tokens.as_ref(), token.as_deref())
        .await
        .inspect_err(|err| debug!("Token introspection failed: {}", err))?;

    let mut response = Json(info).into_response();
    presets::private_no_cache().apply(&mut response);
    Ok(response)
}
