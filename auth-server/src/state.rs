use crate::config::Settings;
use crate::services::{
    AuthTokenService, ClientService, HeaderSessionPolicy, InMemoryClientService,
    InMemoryUserService, OAuthProvider, OAuthProviderService, SessionPolicy, TokenService,
    UserService,
};
use crate::store::{Store, StoreBackend};
use http::header::InvalidHeaderName;
use log::{error, warn};
use std::sync::Arc;
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum StateError {
    #[error("Invalid URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("Invalid session header name: {0}")]
    InvalidHeader(#[from] InvalidHeaderName),
}

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    /// Base against which request paths are resolved into absolute URLs
    pub public_url: Arc<Url>,
    pub login_url: Arc<Url>,
    pub store: Store,
    pub oauth: Arc<dyn OAuthProvider>,
    pub users: Arc<dyn UserService>,
    pub clients: Arc<dyn ClientService>,
    pub tokens: Arc<dyn TokenService>,
    /// Issues tokens into the same store `tokens` reads from
    pub token_issuer: AuthTokenService,
    pub session: Arc<dyn SessionPolicy>,
}

impl AppState {
    /// Wires the default service implementations on top of `store`
    pub fn new(settings: Settings, store: Store) -> Result<Self, StateError> {
        let public_url = Url::parse(&settings.public_url).map_err(|source| StateError::InvalidUrl {
            url: settings.public_url.clone(),
            source,
        })?;
        let login_url = public_url
            .join(&settings.login_url)
            .map_err(|source| StateError::InvalidUrl {
                url: settings.login_url.clone(),
                source,
            })?;

        if settings.client_secret.is_empty() {
            warn!("No client secret configured, token storage keys are unkeyed digests");
        }

        let clients: Arc<dyn ClientService> =
            Arc::new(InMemoryClientService::new(settings.clients.clone()));
        let tokens = AuthTokenService::new(store.clone(), settings.client_secret.clone());
        let oauth = OAuthProviderService::new(
            clients.clone(),
            tokens.clone(),
            store.clone(),
            settings.oauth.code_lifetime(),
            settings.oauth.access_token_ttl,
        );

        Ok(Self {
            public_url: Arc::new(public_url),
            login_url: Arc::new(login_url),
            store,
            oauth: Arc::new(oauth),
            users: Arc::new(InMemoryUserService::new(settings.users.clone())),
            clients,
            tokens: Arc::new(tokens.clone()),
            token_issuer: tokens,
            session: Arc::new(HeaderSessionPolicy::new(&settings.session_header)?),
            settings: Arc::new(settings),
        })
    }

    /// Check if all components are healthy
    pub async fn health_check(&self) -> bool {
        match self.store.health_check().await {
            Ok(()) => true,
            Err(e) => {
                error!("Store health check failed: {}", e);
                false
            }
        }
    }
}
