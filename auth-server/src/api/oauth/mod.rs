//! OAuth 2.0 authorization server endpoints
//!
//! ## Supported flows
//! - Authorization Code Grant (RFC 6749 Section 4.1)
//! - Token Revocation (RFC 7009)
//! - Token introspection for debugging (`/oauth/debug_token`)

pub mod authorize;
pub mod debug_token;
pub mod extract;
pub mod revoke;
pub mod token;

use crate::state::AppState;
use axum::routing::{get, post};
use axum::Router;

/// Creates OAuth 2.0 routes
pub(super) fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/oauth/authorize",
            get(authorize::authorize_get_handler).post(authorize::authorize_post_handler),
        )
        .route("/oauth/token", post(token::token_handler))
        .route("/oauth/revoke", post(revoke::revoke_handler))
        .route("/oauth/debug_token", get(debug_token::debug_token_handler))
}
