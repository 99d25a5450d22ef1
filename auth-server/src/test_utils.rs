use crate::config::Settings;
use crate::create_app;
use crate::models::{AuthClient, ResponseType, Scopes, Token, User};
use crate::services::{
    Credentials, OAuthProvider, ProtocolError, ProviderResponse, ServiceError, TokenService,
};
use crate::state::AppState;
use crate::store::memory::InMemoryStore;
use crate::store::Store;
use async_trait::async_trait;
use axum::body::Body;
use axum::Router;
use http::header::{AUTHORIZATION, CONTENT_TYPE, LOCATION};
use http::{HeaderMap, Method, Request, StatusCode};
use http_body_util::BodyExt;
use log::LevelFilter;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tower::ServiceExt;
use url::Url;

pub const REDIRECT_URI: &str = "http://client.com/auth/callback";
pub const CLIENT_ID: &str = "the-client-id";
pub const TRUSTED_CLIENT_ID: &str = "trusted-client-id";
pub const USERID: &str = "acct:bob@example.com";

/// Test fixture for driving the full router in-process.
///
/// The fixture registers two clients (`CLIENT_ID`, and the trusted
/// `TRUSTED_CLIENT_ID`) and one user (`USERID`) in the settings. By default
/// every service is the real one, backed by an in-memory store; use
/// [`TestFixture::with_provider`] or [`TestFixture::with_tokens`] to swap in
/// the recording mocks below.
///
/// # Examples
///
/// ```rust
/// #[tokio::test]
/// async fn test_endpoint() {
///     let provider = Arc::new(MockProvider::new(CLIENT_ID));
///     let fixture = TestFixture::with_provider(provider.clone());
///
///     let response = fixture.get_as("/oauth/authorize?client_id=the-client-id", USERID).await;
///
///     response.assert_ok();
///     assert_eq!(provider.calls().len(), 1);
/// }
/// ```
pub struct TestFixture {
    /// The application router
    pub app: Router,
    /// Configuration settings
    pub settings: Settings,
    /// The state the router was built with
    pub state: AppState,
}

impl TestFixture {
    /// Creates a fixture with the real services
    pub fn new() -> Self {
        Self::build(None, None)
    }

    /// Creates a fixture around a replacement OAuth provider
    pub fn with_provider(provider: Arc<dyn OAuthProvider>) -> Self {
        Self::build(Some(provider), None)
    }

    /// Creates a fixture around a replacement token service
    pub fn with_tokens(tokens: Arc<dyn TokenService>) -> Self {
        Self::build(None, Some(tokens))
    }

    fn build(
        provider: Option<Arc<dyn OAuthProvider>>,
        tokens: Option<Arc<dyn TokenService>>,
    ) -> Self {
        Self::setup_logger(LevelFilter::Debug);

        let mut settings = Settings::for_test();
        settings.clients = vec![
            test_client(CLIENT_ID, false),
            test_client(TRUSTED_CLIENT_ID, true),
        ];
        settings.users = vec![User::new("bob", "example.com")];

        let store = Store::InMemory(InMemoryStore::new(16).expect("Failed to create test store"));
        let mut state =
            AppState::new(settings.clone(), store).expect("Failed to create test state");
        if let Some(provider) = provider {
            state.oauth = provider;
        }
        if let Some(tokens) = tokens {
            state.tokens = tokens;
        }

        Self {
            app: create_app(state.clone()),
            settings,
            state,
        }
    }

    /// Initializes the test logger with the given level
    pub fn setup_logger(level: LevelFilter) {
        let _ = env_logger::builder()
            .filter_level(level)
            .is_test(true)
            .try_init();
    }

    /// Creates a request builder, logged in as `userid` when given
    pub fn request_builder(
        &self,
        method: Method,
        uri: impl AsRef<str>,
        userid: Option<&str>,
    ) -> http::request::Builder {
        let mut builder = Request::builder().method(method).uri(uri.as_ref());
        if let Some(userid) = userid {
            builder = builder.header(self.settings.session_header.as_str(), userid);
        }
        builder
    }

    /// Sends an anonymous GET request
    pub async fn get(&self, uri: impl AsRef<str>) -> TestResponse {
        let request = self
            .request_builder(Method::GET, uri, None)
            .body(Body::empty())
            .expect("Failed to build request");
        self.send(request).await
    }

    /// Sends a GET request on behalf of a logged-in user
    pub async fn get_as(&self, uri: impl AsRef<str>, userid: &str) -> TestResponse {
        let request = self
            .request_builder(Method::GET, uri, Some(userid))
            .body(Body::empty())
            .expect("Failed to build request");
        self.send(request).await
    }

    /// Sends an anonymous GET request carrying a bearer token
    pub async fn get_with_bearer(&self, uri: impl AsRef<str>, token: &str) -> TestResponse {
        let request = self
            .request_builder(Method::GET, uri, None)
            .header(AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::empty())
            .expect("Failed to build request");
        self.send(request).await
    }

    /// Sends a form-encoded POST request
    pub async fn post_form(
        &self,
        uri: impl AsRef<str>,
        form: &[(&str, &str)],
        userid: Option<&str>,
    ) -> TestResponse {
        let body = form
            .iter()
            .map(|(name, value)| {
                format!("{}={}", urlencoding::encode(name), urlencoding::encode(value))
            })
            .collect::<Vec<_>>()
            .join("&");
        let request = self
            .request_builder(Method::POST, uri, userid)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body))
            .expect("Failed to build request");
        self.send(request).await
    }

    /// Sends a request and returns a TestResponse
    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .app
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .into_body()
            .collect()
            .await
            .expect("Failed to read response body")
            .to_bytes();
        let text = String::from_utf8_lossy(&body).into_owned();

        // Try to parse as JSON, defaulting to empty object if parsing fails or empty body
        let json = if !body.is_empty() {
            serde_json::from_slice(&body).unwrap_or_else(|_| serde_json::json!({}))
        } else {
            serde_json::json!({})
        };

        TestResponse {
            status,
            headers,
            text,
            json,
        }
    }
}

pub fn test_client(id: &str, trusted: bool) -> AuthClient {
    AuthClient {
        id: id.to_string(),
        name: format!("Client {id}"),
        redirect_uri: REDIRECT_URI.to_string(),
        response_type: ResponseType::Code,
        trusted,
    }
}

/// Response from a test request
pub struct TestResponse {
    /// HTTP status code
    pub status: StatusCode,
    pub headers: HeaderMap,
    /// Raw response body
    pub text: String,
    /// Response body as JSON (if present and valid JSON)
    pub json: Value,
}

impl TestResponse {
    /// Asserts that the response has the expected status code.
    ///
    /// # Panics
    ///
    /// Panics if the status code doesn't match the expected value.
    pub fn assert_status(&self, expected: StatusCode) -> &Self {
        assert_eq!(
            self.status, expected,
            "Expected status {} but got {} with body: {}",
            expected, self.status, self.text
        );
        self
    }

    /// Asserts that the response status is OK (200)
    pub fn assert_ok(&self) -> &Self {
        self.assert_status(StatusCode::OK)
    }

    /// Asserts a 302 redirect and returns its target
    pub fn assert_redirect(&self) -> &str {
        self.assert_status(StatusCode::FOUND);
        self.headers
            .get(LOCATION)
            .expect("Redirect without Location header")
            .to_str()
            .expect("Location header is not valid UTF-8")
    }
}

/// A call received by [`MockProvider`]
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderCall {
    Validate {
        url: String,
    },
    Authorize {
        url: String,
        userid: String,
        scopes: Scopes,
    },
    Token {
        url: String,
        method: Method,
        body: HashMap<String, String>,
        headers: HeaderMap,
    },
    Revoke {
        url: String,
        body: HashMap<String, String>,
    },
}

/// OAuth provider returning canned responses and recording every call
pub struct MockProvider {
    credentials: Credentials,
    validate_error: Option<ProtocolError>,
    token_response: ProviderResponse,
    calls: Mutex<Vec<ProviderCall>>,
}

impl MockProvider {
    /// A provider accepting any authorization request as coming from `client_id`
    pub fn new(client_id: &str) -> Self {
        Self {
            credentials: Credentials {
                client_id: client_id.to_string(),
                redirect_uri: REDIRECT_URI.to_string(),
                response_type: ResponseType::Code,
                state: Some("foobar".to_string()),
            },
            validate_error: None,
            token_response: ProviderResponse {
                headers: HashMap::new(),
                body: Some("{}".to_string()),
                status: StatusCode::OK,
            },
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_validate_error(mut self, err: ProtocolError) -> Self {
        self.validate_error = Some(err);
        self
    }

    pub fn with_token_response(mut self, status: StatusCode, body: &str) -> Self {
        self.token_response = ProviderResponse {
            headers: HashMap::from([(CONTENT_TYPE.to_string(), "application/json".to_string())]),
            body: Some(body.to_string()),
            status,
        };
        self
    }

    pub fn calls(&self) -> Vec<ProviderCall> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: ProviderCall) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl OAuthProvider for MockProvider {
    async fn validate_authorization_request(
        &self,
        url: &Url,
    ) -> Result<(Scopes, Credentials), ProtocolError> {
        self.record(ProviderCall::Validate {
            url: url.to_string(),
        });
        match &self.validate_error {
            Some(err) => Err(err.clone()),
            None => Ok((Scopes::from(["exploit".to_string()]), self.credentials.clone())),
        }
    }

    async fn create_authorization_response(
        &self,
        url: &Url,
        user: &User,
        scopes: &Scopes,
    ) -> Result<ProviderResponse, ProtocolError> {
        self.record(ProviderCall::Authorize {
            url: url.to_string(),
            userid: user.userid.clone(),
            scopes: scopes.clone(),
        });
        Ok(ProviderResponse {
            headers: HashMap::from([(
                LOCATION.to_string(),
                format!("{}?code=abcdef123456", self.credentials.redirect_uri),
            )]),
            body: None,
            status: StatusCode::FOUND,
        })
    }

    async fn create_token_response(
        &self,
        url: &Url,
        method: &Method,
        body: &HashMap<String, String>,
        headers: &HeaderMap,
    ) -> Result<ProviderResponse, ProtocolError> {
        self.record(ProviderCall::Token {
            url: url.to_string(),
            method: method.clone(),
            body: body.clone(),
            headers: headers.clone(),
        });
        Ok(self.token_response.clone())
    }

    async fn create_revocation_response(
        &self,
        url: &Url,
        body: &HashMap<String, String>,
    ) -> Result<ProviderResponse, ProtocolError> {
        self.record(ProviderCall::Revoke {
            url: url.to_string(),
            body: body.clone(),
        });
        Ok(ProviderResponse {
            headers: HashMap::new(),
            body: None,
            status: StatusCode::OK,
        })
    }
}

/// Token service with a fixed answer, recording the tokens it was asked about
pub struct MockTokenService {
    valid: bool,
    token: Option<Token>,
    calls: Mutex<Vec<String>>,
}

impl MockTokenService {
    pub fn new(valid: bool, token: Option<Token>) -> Self {
        Self {
            valid,
            token,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl TokenService for MockTokenService {
    async fn validate(&self, token: &str) -> Result<bool, ServiceError> {
        self.calls.lock().unwrap().push(token.to_string());
        Ok(self.valid)
    }

    async fn fetch(&self, token: &str) -> Result<Option<Token>, ServiceError> {
        self.calls.lock().unwrap().push(token.to_string());
        Ok(self.token.clone())
    }
}
