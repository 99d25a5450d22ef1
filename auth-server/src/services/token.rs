//! Bearer token issuance, lookup and revocation

use super::ServiceError;
use crate::models::{AuthClient, DeveloperToken, OAuthToken, Token};
use crate::store::{Store, StoreBackend};
use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::Utc;
use log::debug;
use rand::RngCore;
use sha2::{Digest, Sha256};
use std::time::Duration;

/// Prefix of access tokens issued through the OAuth flow
pub const OAUTH_TOKEN_PREFIX: &str = "5768-";
/// Prefix of developer tokens
pub const DEVELOPER_TOKEN_PREFIX: &str = "6879-";

/// Read access to bearer tokens
#[async_trait]
pub trait TokenService: Send + Sync {
    /// Whether `token` exists and has not expired
    async fn validate(&self, token: &str) -> Result<bool, ServiceError>;

    /// The token record for `token`, expired or not
    async fn fetch(&self, token: &str) -> Result<Option<Token>, ServiceError>;
}

/// Token service backed by the code/token store.
///
/// Records are stored under a SHA-256 digest of the token value keyed with
/// the configured secret, so the store never holds usable credentials as keys.
#[derive(Clone)]
pub struct AuthTokenService {
    store: Store,
    secret: String,
}

impl AuthTokenService {
    pub fn new(store: Store, secret: impl Into<String>) -> Self {
        Self {
            store,
            secret: secret.into(),
        }
    }

    fn storage_key(&self, value: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.secret.as_bytes());
        hasher.update(b":");
        hasher.update(value.as_bytes());
        format!("token:{:x}", hasher.finalize())
    }

    /// Issue an access token for `userid` acting through `authclient`
    pub async fn create_oauth_token(
        &self,
        userid: &str,
        authclient: &AuthClient,
        ttl_secs: u64,
    ) -> Result<OAuthToken, ServiceError> {
        let lifetime = i64::try_from(ttl_secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .ok_or(ServiceError::InvalidLifetime(ttl_secs))?;
        let created = Utc::now();
        let token = OAuthToken {
            value: generate_token_value(OAUTH_TOKEN_PREFIX),
            userid: userid.to_string(),
            authclient: authclient.clone(),
            created,
            expires: created + lifetime,
        };

        self.store
            .set(
                &self.storage_key(&token.value),
                &Token::OAuth(token.clone()),
                Some(Duration::from_secs(ttl_secs)),
            )
            .await?;

        debug!(
            "Issued OAuth token for user '{}' via client '{}', expires in {}s",
            userid, authclient.id, ttl_secs
        );
        Ok(token)
    }

    /// Issue a developer token for `userid`; it never expires
    pub async fn create_developer_token(&self, userid: &str) -> Result<DeveloperToken, ServiceError> {
        let token = DeveloperToken {
            value: generate_token_value(DEVELOPER_TOKEN_PREFIX),
            userid: userid.to_string(),
            created: Utc::now(),
        };

        self.store
            .set(
                &self.storage_key(&token.value),
                &Token::Developer(token.clone()),
                None,
            )
            .await?;

        debug!("Issued developer token for user '{}'", userid);
        Ok(token)
    }

    /// Remove a token. Returns whether a token was actually removed.
    pub async fn revoke(&self, value: &str) -> Result<bool, ServiceError> {
        let removed: Option<Token> = self.store.take(&self.storage_key(value)).await?;
        if let Some(token) = &removed {
            debug!("Revoked token of user '{}'", token.userid());
        }
        Ok(removed.is_some())
    }
}

#[async_trait]
impl TokenService for AuthTokenService {
    async fn validate(&self, token: &str) -> Result<bool, ServiceError> {
        Ok(self
            .fetch(token)
            .await?
            .is_some_and(|record| !record.expired()))
    }

    async fn fetch(&self, token: &str) -> Result<Option<Token>, ServiceError> {
        Ok(self.store.get::<Token>(&self.storage_key(token)).await?)
    }
}

/// 32 random bytes, URL-safe base64 without padding, behind `prefix`
pub(crate) fn generate_token_value(prefix: &str) -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    format!("{prefix}{}", URL_SAFE_NO_PAD.encode(bytes))
}
