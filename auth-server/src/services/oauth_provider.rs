//! OAuth 2.0 protocol engine.
//!
//! Implements the authorization-code grant (RFC 6749 Section 4.1) and token
//! revocation (RFC 7009). Controllers talk to it through the [`OAuthProvider`]
//! trait and only see [`ProviderResponse`]s; grant-level failures on the token
//! and revocation endpoints are rendered into the response body, while
//! malformed authorization requests fail with a [`ProtocolError`].

use super::{AuthTokenService, ClientService, ServiceError};
use crate::models::{default_scopes, AuthClient, ResponseType, Scopes, User};
use crate::store::{Store, StoreBackend};
use async_trait::async_trait;
use axum::response::IntoResponse;
use axum::Json;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::Utc;
use http::header::{AUTHORIZATION, CACHE_CONTROL, CONTENT_TYPE, LOCATION, PRAGMA};
use http::{HeaderMap, Method, StatusCode};
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use url::Url;

const AUTHORIZATION_PARAMS: [&str; 5] =
    ["client_id", "response_type", "redirect_uri", "scope", "state"];

/// Errors defined by RFC 6749 Section 4.1.2.1 and 5.2
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("invalid_request: {0}")]
    InvalidRequest(String),
    #[error("invalid_client: {0}")]
    InvalidClient(String),
    #[error("invalid_grant: {0}")]
    InvalidGrant(String),
    #[error("unauthorized_client: {0}")]
    UnauthorizedClient(String),
    #[error("unsupported_response_type: {0}")]
    UnsupportedResponseType(String),
    #[error("unsupported_grant_type: {0}")]
    UnsupportedGrantType(String),
    #[error("server_error: {0}")]
    ServerError(String),
}

impl ProtocolError {
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) => "invalid_request",
            Self::InvalidClient(_) => "invalid_client",
            Self::InvalidGrant(_) => "invalid_grant",
            Self::UnauthorizedClient(_) => "unauthorized_client",
            Self::UnsupportedResponseType(_) => "unsupported_response_type",
            Self::UnsupportedGrantType(_) => "unsupported_grant_type",
            Self::ServerError(_) => "server_error",
        }
    }

    pub fn description(&self) -> &str {
        match self {
            Self::InvalidRequest(description)
            | Self::InvalidClient(description)
            | Self::InvalidGrant(description)
            | Self::UnauthorizedClient(description)
            | Self::UnsupportedResponseType(description)
            | Self::UnsupportedGrantType(description)
            | Self::ServerError(description) => description,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidClient(_) => StatusCode::UNAUTHORIZED,
            Self::ServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        }
    }

    fn to_json(&self) -> Value {
        json!({
            "error": self.error_code(),
            "error_description": self.description(),
        })
    }
}

impl From<ServiceError> for ProtocolError {
    fn from(err: ServiceError) -> Self {
        error!("OAuth provider service failure: {}", err);
        Self::ServerError("The server encountered an unexpected error.".to_string())
    }
}

impl IntoResponse for ProtocolError {
    fn into_response(self) -> axum::response::Response {
        warn!("OAuth protocol error: {}", self);
        (self.status_code(), Json(self.to_json())).into_response()
    }
}

/// What the protocol engine answers: headers, optional body and status
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderResponse {
    pub headers: HashMap<String, String>,
    pub body: Option<String>,
    pub status: StatusCode,
}

impl ProviderResponse {
    fn no_store_headers() -> HashMap<String, String> {
        HashMap::from([
            (CACHE_CONTROL.to_string(), "no-store".to_string()),
            (PRAGMA.to_string(), "no-cache".to_string()),
        ])
    }

    fn json(status: StatusCode, body: &Value) -> Self {
        let mut headers = Self::no_store_headers();
        headers.insert(CONTENT_TYPE.to_string(), "application/json".to_string());
        Self {
            headers,
            body: Some(body.to_string()),
            status,
        }
    }

    fn error(err: &ProtocolError) -> Self {
        Self::json(err.status_code(), &err.to_json())
    }

    /// Value of a header, ignoring the case of its name
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// The validated parameters of an authorization request
#[derive(Debug, Clone, PartialEq)]
pub struct Credentials {
    pub client_id: String,
    /// The redirect URI the response will be sent to
    pub redirect_uri: String,
    pub response_type: ResponseType,
    pub state: Option<String>,
}

/// The OAuth 2.0 protocol operations the endpoints are built on
#[async_trait]
pub trait OAuthProvider: Send + Sync {
    /// Validate an authorization request URL, returning the requested scopes
    /// and the request's credentials
    async fn validate_authorization_request(
        &self,
        url: &Url,
    ) -> Result<(Scopes, Credentials), ProtocolError>;

    /// Issue an authorization code for `user` and redirect to the client
    async fn create_authorization_response(
        &self,
        url: &Url,
        user: &User,
        scopes: &Scopes,
    ) -> Result<ProviderResponse, ProtocolError>;

    /// Exchange an authorization code for an access token
    async fn create_token_response(
        &self,
        url: &Url,
        method: &Method,
        body: &HashMap<String, String>,
        headers: &HeaderMap,
    ) -> Result<ProviderResponse, ProtocolError>;

    /// Revoke an access or developer token
    async fn create_revocation_response(
        &self,
        url: &Url,
        body: &HashMap<String, String>,
    ) -> Result<ProviderResponse, ProtocolError>;
}

/// Authorization code storage model
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredAuthorizationCode {
    userid: String,
    client_id: String,
    redirect_uri: String,
    scopes: Scopes,
    /// Unix timestamp after which the code is unusable
    expires: i64,
}

/// Protocol engine backed by the client registry and the code/token store
#[derive(Clone)]
pub struct OAuthProviderService {
    clients: Arc<dyn ClientService>,
    tokens: AuthTokenService,
    store: Store,
    code_ttl: Duration,
    access_token_ttl: u64,
}

impl OAuthProviderService {
    pub fn new(
        clients: Arc<dyn ClientService>,
        tokens: AuthTokenService,
        store: Store,
        code_ttl: Duration,
        access_token_ttl: u64,
    ) -> Self {
        Self {
            clients,
            tokens,
            store,
            code_ttl,
            access_token_ttl,
        }
    }

    async fn authorization_request(
        &self,
        url: &Url,
    ) -> Result<(AuthClient, Scopes, Credentials), ProtocolError> {
        let params = authorization_params(url)?;

        let client_id = non_empty(&params, "client_id").ok_or_else(|| {
            ProtocolError::InvalidRequest("Missing client_id parameter.".to_string())
        })?;
        let client = self.clients.fetch(client_id).await?.ok_or_else(|| {
            ProtocolError::InvalidClient("Invalid client_id parameter value.".to_string())
        })?;

        // Only the registered redirect URI is ever used
        if let Some(redirect_uri) = params.get("redirect_uri") {
            if *redirect_uri != client.redirect_uri {
                return Err(ProtocolError::InvalidRequest(
                    "Mismatching redirect URI.".to_string(),
                ));
            }
        }

        let response_type: ResponseType = non_empty(&params, "response_type")
            .ok_or_else(|| {
                ProtocolError::InvalidRequest("Missing response_type parameter.".to_string())
            })?
            .parse()
            .map_err(ProtocolError::UnsupportedResponseType)?;
        if response_type != client.response_type {
            return Err(ProtocolError::UnauthorizedClient(format!(
                "Client is not allowed to use response type '{response_type}'."
            )));
        }

        let mut scopes: Scopes = params
            .get("scope")
            .map(|scope| scope.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default();
        if scopes.is_empty() {
            scopes = default_scopes();
        }

        let credentials = Credentials {
            client_id: client.id.clone(),
            redirect_uri: client.redirect_uri.clone(),
            response_type,
            state: params.get("state").cloned(),
        };
        Ok((client, scopes, credentials))
    }

    async fn exchange_code(
        &self,
        method: &Method,
        body: &HashMap<String, String>,
        headers: &HeaderMap,
    ) -> Result<ProviderResponse, ProtocolError> {
        if method != Method::POST {
            return Err(ProtocolError::InvalidRequest(format!(
                "Unsupported request method {method}."
            )));
        }

        let grant_type = non_empty(body, "grant_type").ok_or_else(|| {
            ProtocolError::InvalidRequest("Request is missing grant type.".to_string())
        })?;
        if grant_type != "authorization_code" {
            return Err(ProtocolError::UnsupportedGrantType(format!(
                "Grant type '{grant_type}' is not supported."
            )));
        }

        let client_id = basic_auth_client_id(headers)
            .or_else(|| non_empty(body, "client_id").map(str::to_string))
            .ok_or_else(|| ProtocolError::InvalidClient("Client authentication failed.".to_string()))?;
        let client = self.clients.fetch(&client_id).await?.ok_or_else(|| {
            ProtocolError::InvalidClient("Client authentication failed.".to_string())
        })?;

        let code = non_empty(body, "code").ok_or_else(|| {
            ProtocolError::InvalidRequest("Missing code parameter.".to_string())
        })?;
        let invalid_code =
            || ProtocolError::InvalidGrant("Invalid or expired authorization code.".to_string());

        // Taking the code consumes it, whatever the outcome below
        let stored: StoredAuthorizationCode = self
            .store
            .take(&code_key(code))
            .await
            .map_err(ServiceError::from)?
            .ok_or_else(invalid_code)?;

        if Utc::now().timestamp() >= stored.expires || stored.client_id != client.id {
            return Err(invalid_code());
        }
        if let Some(redirect_uri) = non_empty(body, "redirect_uri") {
            if redirect_uri != stored.redirect_uri {
                return Err(ProtocolError::InvalidGrant(
                    "Mismatching redirect URI.".to_string(),
                ));
            }
        }

        let token = self
            .tokens
            .create_oauth_token(&stored.userid, &client, self.access_token_ttl)
            .await?;

        info!(
            "Exchanged authorization code for an access token for user '{}' via client '{}'",
            stored.userid, client.id
        );

        let scope = stored.scopes.iter().cloned().collect::<Vec<_>>().join(" ");
        Ok(ProviderResponse::json(
            StatusCode::OK,
            &json!({
                "access_token": token.value,
                "token_type": "Bearer",
                "expires_in": self.access_token_ttl,
                "scope": scope,
            }),
        ))
    }

    async fn revoke(&self, body: &HashMap<String, String>) -> Result<ProviderResponse, ProtocolError> {
        let token = non_empty(body, "token").ok_or_else(|| {
            ProtocolError::InvalidRequest("Missing token parameter.".to_string())
        })?;

        // Unknown tokens are not an error (RFC 7009 Section 2.2)
        if !self.tokens.revoke(token).await? {
            debug!("Revocation requested for an unknown token");
        }

        Ok(ProviderResponse {
            headers: ProviderResponse::no_store_headers(),
            body: None,
            status: StatusCode::OK,
        })
    }
}

#[async_trait]
impl OAuthProvider for OAuthProviderService {
    async fn validate_authorization_request(
        &self,
        url: &Url,
    ) -> Result<(Scopes, Credentials), ProtocolError> {
        let (_, scopes, credentials) = self.authorization_request(url).await?;
        Ok((scopes, credentials))
    }

    async fn create_authorization_response(
        &self,
        url: &Url,
        user: &User,
        scopes: &Scopes,
    ) -> Result<ProviderResponse, ProtocolError> {
        let (client, _, credentials) = self.authorization_request(url).await?;

        let mut location = Url::parse(&credentials.redirect_uri).map_err(|e| {
            warn!("Client '{}' has an invalid redirect URI: {}", client.id, e);
            ProtocolError::InvalidRequest("Invalid redirect URI.".to_string())
        })?;

        let code = generate_code();
        let stored = StoredAuthorizationCode {
            userid: user.userid.clone(),
            client_id: client.id.clone(),
            redirect_uri: credentials.redirect_uri.clone(),
            scopes: scopes.clone(),
            expires: Utc::now()
                .timestamp()
                .saturating_add(i64::try_from(self.code_ttl.as_secs()).unwrap_or(i64::MAX)),
        };
        self.store
            .set(&code_key(&code), &stored, Some(self.code_ttl))
            .await
            .map_err(ServiceError::from)?;

        {
            let mut query = location.query_pairs_mut();
            query.append_pair("code", &code);
            if let Some(state) = &credentials.state {
                query.append_pair("state", state);
            }
        }

        info!(
            "Issued authorization code for user '{}' via client '{}'",
            user.userid, client.id
        );

        Ok(ProviderResponse {
            headers: HashMap::from([(LOCATION.to_string(), location.to_string())]),
            body: None,
            status: StatusCode::FOUND,
        })
    }

    async fn create_token_response(
        &self,
        _url: &Url,
        method: &Method,
        body: &HashMap<String, String>,
        headers: &HeaderMap,
    ) -> Result<ProviderResponse, ProtocolError> {
        render_error(self.exchange_code(method, body, headers).await)
    }

    async fn create_revocation_response(
        &self,
        _url: &Url,
        body: &HashMap<String, String>,
    ) -> Result<ProviderResponse, ProtocolError> {
        render_error(self.revoke(body).await)
    }
}

/// Client-caused errors become an error response; server errors propagate
fn render_error(
    result: Result<ProviderResponse, ProtocolError>,
) -> Result<ProviderResponse, ProtocolError> {
    match result {
        Err(err @ ProtocolError::ServerError(_)) => Err(err),
        Err(err) => {
            debug!("Rejected OAuth request: {}", err);
            Ok(ProviderResponse::error(&err))
        }
        ok => ok,
    }
}

/// Authorization parameters of the query string. Repeating one is an error.
fn authorization_params(url: &Url) -> Result<HashMap<String, String>, ProtocolError> {
    let mut params = HashMap::new();
    for (name, value) in url.query_pairs() {
        if !AUTHORIZATION_PARAMS.contains(&&*name) {
            continue;
        }
        if params.insert(name.to_string(), value.into_owned()).is_some() {
            return Err(ProtocolError::InvalidRequest(format!(
                "Duplicate {name} parameter."
            )));
        }
    }
    Ok(params)
}

fn non_empty<'a>(params: &'a HashMap<String, String>, name: &str) -> Option<&'a str> {
    params
        .get(name)
        .map(String::as_str)
        .filter(|value| !value.is_empty())
}

/// Client id from an HTTP Basic `Authorization` header (RFC 6749 Section 2.3.1)
fn basic_auth_client_id(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, encoded) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }
    let decoded = String::from_utf8(STANDARD.decode(encoded.trim()).ok()?).ok()?;
    let (client_id, _) = decoded.split_once(':')?;
    urlencoding::decode(client_id)
        .ok()
        .map(|client_id| client_id.into_owned())
        .filter(|client_id| !client_id.is_empty())
}

fn code_key(code: &str) -> String {
    format!("oauth_code:{code}")
}

fn generate_code() -> String {
    super::token::generate_token_value("")
}
