use super::extract::RequestUrl;
use crate::openapi::OAUTH_TAG;
use crate::services::{ProtocolError, ProviderResponse};
use crate::state::AppState;
use axum::body::Body;
use axum::extract::{Form, State};
use axum::response::{IntoResponse, Response};
use http::{HeaderName, HeaderValue};
use log::warn;
use std::collections::HashMap;

/// Revoke an access or developer token (RFC 7009)
#[utoipa::path(
    post,
    path = "/oauth/revoke",
    tag = OAUTH_TAG,
    request_body(
        content = HashMap<String, String>,
        content_type = "application/x-www-form-urlencoded",
        description = "token to revoke"
    ),
    responses(
        (status = 200, description = "Token revoked, or it was not known"),
        (status = 400, description = "Missing token parameter"),
    )
)]
pub(crate) async fn revoke_handler(
    State(state): State<AppState>,
    RequestUrl(url): RequestUrl,
    Form(body): Form<HashMap<String, String>>,
) -> Result<Response, ProtocolError> {
    let response = state.oauth.create_revocation_response(&url, &body).await?;
    Ok(into_http_response(response))
}

fn into_http_response(provider_response: ProviderResponse) -> Response {
    let mut response = Body::from(provider_response.body.unwrap_or_default()).into_response();
    *response.status_mut() = provider_response.status;

    for (name, value) in provider_response.headers {
        match (
            HeaderName::try_from(name.as_str()),
            HeaderValue::try_from(value.as_str()),
        ) {
            (Ok(name), Ok(value)) => {
                response.headers_mut().insert(name, value);
            }
            _ => warn!("Dropping invalid provider response header '{}'", name),
        }
    }
    response
}

#[cfg(test)]
mod tests {
    use crate::services::AuthTokenService;
    use crate::test_utils::{MockProvider, ProviderCall, TestFixture, CLIENT_ID, USERID};
    use http::StatusCode;
    use std::collections::HashMap;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_it_forwards_the_form_to_the_provider() {
        let provider = Arc::new(MockProvider::new(CLIENT_ID));
        let fixture = TestFixture::with_provider(provider.clone());

        let response = fixture
            .post_form("/oauth/revoke", &[("token", "5768-abc")], None)
            .await;

        response.assert_ok();
        assert_eq!(
            provider.calls(),
            vec![ProviderCall::Revoke {
                url: "http://example.com/oauth/revoke".to_string(),
                body: HashMap::from([("token".to_string(), "5768-abc".to_string())]),
            }]
        );
    }

    #[tokio::test]
    async fn test_revoked_token_no_longer_validates() {
        let fixture = TestFixture::new();
        let token = AuthTokenService::new(
            fixture.state.store.clone(),
            fixture.settings.client_secret.clone(),
        )
        .create_developer_token(USERID)
        .await
        .unwrap();

        fixture
            .get_with_bearer("/oauth/debug_token", &token.value)
            .await
            .assert_ok();

        fixture
            .post_form("/oauth/revoke", &[("token", token.value.as_str())], None)
            .await
            .assert_ok();

        let response = fixture
            .get_with_bearer("/oauth/debug_token", &token.value)
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(response.json["error"], "missing_token");
    }

    #[tokio::test]
    async fn test_missing_token_is_rejected() {
        let fixture = TestFixture::new();

        let response = fixture.post_form("/oauth/revoke", &[], None).await;

        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(response.json["error"], "invalid_request");
    }
}
