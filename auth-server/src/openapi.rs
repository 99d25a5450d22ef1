use crate::api::{health, oauth};
use utoipa::OpenApi;

pub(crate) const HEALTH_TAG: &str = "Health API";
pub(crate) const OAUTH_TAG: &str = "OAuth 2.0 API";

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        health::ready_check,
        oauth::authorize::authorize_get_handler,
        oauth::authorize::authorize_post_handler,
        oauth::token::token_handler,
        oauth::revoke::revoke_handler,
        oauth::debug_token::debug_token_handler,
    ),
    tags(
        (name = HEALTH_TAG, description = "Health check endpoints"),
        (name = OAUTH_TAG, description = "Authorization code flow, token revocation and introspection"),
    ),
    info(
        title = "OAuth 2.0 Authorization Server",
        description = "Issues and manages bearer tokens for third-party clients",
        version = "0.1.0"
    )
)]
pub(crate) struct ApiDoc;
