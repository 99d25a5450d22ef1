//! Front channel of the authorization-code flow.
//!
//! `GET` validates the request and either asks for consent (by returning the
//! consent context) or, for trusted clients, authorizes straight away. `POST`
//! records the user's consent. Both require a logged-in user and send
//! anonymous visitors to the login page with a `next` parameter pointing back
//! here.

use super::extract::{RequestUrl, SessionUser};
use crate::errors::ApiError;
use crate::models::{default_scopes, User};
use crate::openapi::OAUTH_TAG;
use crate::services::{ProtocolError, ServiceError};
use crate::state::AppState;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::Json;
use http::header::LOCATION;
use http::StatusCode;
use log::{debug, error, info};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;
use utoipa::ToSchema;

/// What the consent page needs to render
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ConsentContext {
    pub client_id: String,
    pub client_name: String,
    pub response_type: String,
    pub state: Option<String>,
    /// Username of the logged-in user
    pub username: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AuthorizeOutcome {
    /// Ask the user to confirm
    Consent(ConsentContext),
    /// Send the user agent back to the client
    Redirect(String),
}

impl IntoResponse for AuthorizeOutcome {
    fn into_response(self) -> Response {
        match self {
            Self::Consent(context) => (StatusCode::OK, Json(context)).into_response(),
            Self::Redirect(location) => found(location),
        }
    }
}

#[derive(Debug, Error)]
pub enum AuthorizeError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error("Login required, redirecting to {location}")]
    LoginRequired { location: String },
    #[error(transparent)]
    Service(#[from] ServiceError),
    #[error("Authorization response has no Location header")]
    MissingLocation,
}

impl IntoResponse for AuthorizeError {
    fn into_response(self) -> Response {
        match self {
            Self::Protocol(err) => err.into_response(),
            Self::LoginRequired { location } => found(location),
            Self::Service(err) => ApiError::from(err).into_response(),
            Self::MissingLocation => {
                error!("Authorization response has no Location header");
                ApiError::internal("Authorization failed").into_response()
            }
        }
    }
}

fn found(location: String) -> Response {
    (StatusCode::FOUND, [(LOCATION, location)]).into_response()
}

/// Authorization endpoint logic, independent of the HTTP plumbing
pub(crate) struct AuthorizeController<'a> {
    state: &'a AppState,
    url: &'a Url,
    userid: Option<&'a str>,
}

impl<'a> AuthorizeController<'a> {
    pub fn new(state: &'a AppState, url: &'a Url, userid: Option<&'a str>) -> Self {
        Self { state, url, userid }
    }

    /// Present the authorization request for consent
    pub async fn get(&self) -> Result<AuthorizeOutcome, AuthorizeError> {
        let (_, credentials) = self
            .state
            .oauth
            .validate_authorization_request(self.url)
            .await?;

        let user = self.require_user().await?;

        let client = self
            .state
            .clients
            .fetch(&credentials.client_id)
            .await?
            .ok_or_else(|| {
                ProtocolError::InvalidClient("Invalid client_id parameter value.".to_string())
            })?;

        if client.trusted {
            debug!("Client '{}' is trusted, skipping consent", client.id);
            return self.authorize(&user).await;
        }

        Ok(AuthorizeOutcome::Consent(ConsentContext {
            client_id: client.id,
            client_name: client.name,
            response_type: credentials.response_type.to_string(),
            state: credentials.state,
            username: user.username,
        }))
    }

    /// Confirm the authorization request
    pub async fn post(&self) -> Result<AuthorizeOutcome, AuthorizeError> {
        let user = self.require_user().await?;
        self.authorize(&user).await
    }

    async fn authorize(&self, user: &User) -> Result<AuthorizeOutcome, AuthorizeError> {
        // Requested scopes are ignored, every grant gets the default set
        let response = self
            .state
            .oauth
            .create_authorization_response(self.url, user, &default_scopes())
            .await?;

        let location = response
            .header(LOCATION.as_str())
            .ok_or(AuthorizeError::MissingLocation)?;

        info!("User '{}' authorized an OAuth client", user.userid);
        Ok(AuthorizeOutcome::Redirect(location.to_string()))
    }

    async fn require_user(&self) -> Result<User, AuthorizeError> {
        let user = match self.userid {
            Some(userid) => self.state.users.fetch(userid).await?,
            None => None,
        };

        user.ok_or_else(|| {
            debug!("No logged-in user, redirecting to login");
            AuthorizeError::LoginRequired {
                location: self.login_location(),
            }
        })
    }

    fn login_location(&self) -> String {
        format!(
            "{}?next={}",
            self.state.login_url,
            urlencoding::encode(self.url.as_str())
        )
    }
}

#[utoipa::path(
    get,
    path = "/oauth/authorize",
    tag = OAUTH_TAG,
    params(
        ("client_id" = String, Query, description = "Client identifier"),
        ("response_type" = String, Query, description = "Must be 'code'"),
        ("redirect_uri" = Option<String>, Query, description = "Must match the registered redirect URI"),
        ("state" = Option<String>, Query, description = "Opaque value echoed back to the client"),
    ),
    responses(
        (status = 200, description = "Consent required", body = ConsentContext),
        (status = 302, description = "Redirect to the login page, or to the client for trusted clients"),
        (status = 400, description = "Invalid authorization request"),
    )
)]
pub(crate) async fn authorize_get_handler(
    State(state): State<AppState>,
    RequestUrl(url): RequestUrl,
    SessionUser(userid): SessionUser,
) -> Result<AuthorizeOutcome, AuthorizeError> {
    AuthorizeController::new(&state, &url, userid.as_deref())
        .get()
        .await
}

#[utoipa::path(
    post,
    path = "/oauth/authorize",
    tag = OAUTH_TAG,
    params(
        ("client_id" = String, Query, description = "Client identifier"),
        ("response_type" = String, Query, description = "Must be 'code'"),
        ("state" = Option<String>, Query, description = "Opaque value echoed back to the client"),
    ),
    responses(
        (status = 302, description = "Redirect to the client with an authorization code"),
        (status = 400, description = "Invalid authorization request"),
    )
)]
pub(crate) async fn authorize_post_handler(
    State(state): State<AppState>,
    RequestUrl(url): RequestUrl,
    SessionUser(userid): SessionUser,
) -> Result<AuthorizeOutcome, AuthorizeError> {
    AuthorizeController::new(&state, &url, userid.as_deref())
        .post()
        .await
}
