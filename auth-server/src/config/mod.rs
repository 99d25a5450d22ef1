use crate::models::{AuthClient, User};
use confique::Config;

pub mod oauth;
pub mod store;

pub(crate) use crate::config::oauth::OAuthConfig;
pub(crate) use crate::config::store::{MemoryStoreConfig, RedisStoreConfig, StoreConfig, StoreKind};

/// Environment variable naming an optional TOML configuration file
pub const CONFIG_FILE_ENV: &str = "AUTH_CONFIG_FILE";

/// Main configuration structure for the authorization server
#[derive(Debug, Config, Clone)]
pub struct Settings {
    /// The port the server will listen to (default: 5000)
    #[config(env = "AUTH_PORT", default = 5000)]
    pub port: u16,

    /// Externally visible base URL, used to rebuild absolute request URLs
    #[config(env = "AUTH_PUBLIC_URL", default = "http://localhost:5000")]
    pub public_url: String,

    /// Login page, relative to `public_url` or absolute
    #[config(env = "AUTH_LOGIN_URL", default = "/login")]
    pub login_url: String,

    /// Secret keying the digests under which tokens are stored
    #[config(env = "AUTH_CLIENT_SECRET", default = "")]
    pub client_secret: String,

    /// Header through which the upstream session layer passes the
    /// authenticated user id
    #[config(env = "AUTH_SESSION_HEADER", default = "X-Authenticated-Userid")]
    pub session_header: String,

    #[config(nested)]
    pub oauth: OAuthConfig,

    #[config(nested)]
    pub store: StoreConfig,

    /// Registered OAuth clients
    #[config(default = [])]
    pub clients: Vec<AuthClient>,

    /// Known user accounts
    #[config(default = [])]
    pub users: Vec<User>,

    /// User ids to mint a developer token for at startup
    #[config(default = [])]
    pub developer_tokens: Vec<String>,
}

impl Settings {
    /// Loads the configuration from `AUTH_*` environment variables, layered
    /// over the TOML file named by `AUTH_CONFIG_FILE` when set
    pub fn load() -> Result<Self, confique::Error> {
        let mut builder = Settings::builder().env();
        if let Ok(path) = std::env::var(CONFIG_FILE_ENV) {
            builder = builder.file(path);
        }
        builder.load()
    }

    #[cfg(test)]
    pub fn for_test() -> Self {
        Self {
            port: 0, // Let the OS choose a port
            public_url: "http://example.com".to_string(),
            login_url: "/login".to_string(),
            client_secret: "notsosecretafterall".to_string(),
            session_header: "X-Authenticated-Userid".to_string(),
            oauth: OAuthConfig {
                access_token_ttl: 3600,
                code_ttl: 600,
            },
            store: StoreConfig {
                kind: StoreKind::InMemory,
                memory: MemoryStoreConfig { capacity: 16 },
                redis: RedisStoreConfig::default(),
            },
            clients: Vec::new(),
            users: Vec::new(),
            developer_tokens: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Settings::builder().load().unwrap();
        assert_eq!(config.port, 5000);
        assert_eq!(config.public_url, "http://localhost:5000");
        assert_eq!(config.login_url, "/login");
        assert_eq!(config.client_secret, "");
        assert_eq!(config.session_header, "X-Authenticated-Userid");
        assert_eq!(config.oauth.access_token_ttl, 3600);
        assert_eq!(config.oauth.code_ttl, 600);
        assert_eq!(config.store.kind, StoreKind::InMemory);
        assert_eq!(config.store.memory.capacity, 128);
        assert_eq!(config.store.redis.url, "");
        assert!(config.clients.is_empty());
        assert!(config.users.is_empty());
        assert!(config.developer_tokens.is_empty());
    }

    #[test]
    fn test_env_config() {
        std::env::set_var("AUTH_PORT", "8080");
        std::env::set_var("AUTH_CLIENT_SECRET", "s3cret");
        std::env::set_var("AUTH_STORE_KIND", "redis");
        std::env::set_var("AUTH_STORE_REDIS_URL", "redis://localhost:6379");

        let config = Settings::builder().env().load().unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.client_secret, "s3cret");
        assert_eq!(config.store.kind, StoreKind::Redis);
        assert_eq!(config.store.redis.url, "redis://localhost:6379");

        std::env::remove_var("AUTH_PORT");
        std::env::remove_var("AUTH_CLIENT_SECRET");
        std::env::remove_var("AUTH_STORE_KIND");
        std::env::remove_var("AUTH_STORE_REDIS_URL");
    }
}
