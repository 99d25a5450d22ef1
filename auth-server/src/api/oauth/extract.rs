//! Request extractors shared by the OAuth handlers

use crate::state::AppState;
use axum::extract::FromRequestParts;
use http::header::AUTHORIZATION;
use http::request::Parts;
use std::convert::Infallible;
use url::Url;

/// Absolute URL of the inbound request, as seen through the public base URL
#[derive(Debug, Clone)]
pub struct RequestUrl(pub Url);

impl FromRequestParts<AppState> for RequestUrl {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        Ok(Self(resolve_request_url(
            &state.public_url,
            parts.uri.path(),
            parts.uri.query(),
        )))
    }
}

/// Appends the request path to the base URL's own path, so a server mounted
/// under a prefix still reports its public URLs
fn resolve_request_url(base: &Url, path: &str, query: Option<&str>) -> Url {
    let mut url = base.clone();
    let prefix = base.path().trim_end_matches('/');
    url.set_path(&format!("{prefix}{path}"));
    url.set_query(query);
    url
}

/// User id of the logged-in user, if any
#[derive(Debug, Clone)]
pub struct SessionUser(pub Option<String>);

impl FromRequestParts<AppState> for SessionUser {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        Ok(Self(state.session.authenticated_userid(&parts.headers)))
    }
}

/// Token from an `Authorization: Bearer <token>` header
#[derive(Debug, Clone)]
pub struct BearerToken(pub Option<String>);

impl<S: Send + Sync> FromRequestParts<S> for BearerToken {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _: &S) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| {
                let (scheme, token) = value.split_once(' ')?;
                scheme
                    .eq_ignore_ascii_case("bearer")
                    .then(|| token.trim().to_string())
            })
            .filter(|token| !token.is_empty());
        Ok(Self(token))
    }
}
