//! OAuth 2.0 configuration

use confique::Config;
use std::time::Duration;

/// OAuth 2.0 configuration
#[derive(Debug, Config, Clone)]
pub struct OAuthConfig {
    /// Access token lifetime in seconds (default: 3600 = 1 hour)
    #[config(env = "AUTH_OAUTH_ACCESS_TOKEN_TTL", default = 3600)]
    pub access_token_ttl: u64,

    /// Authorization code lifetime in seconds (default: 600 = 10 minutes)
    #[config(env = "AUTH_OAUTH_CODE_TTL", default = 600)]
    pub code_ttl: u64,
}

impl OAuthConfig {
    pub fn code_lifetime(&self) -> Duration {
        Duration::from_secs(self.code_ttl)
    }
}
