use confique::Config;
use serde::Deserialize;

/// Specifies which store implementation keeps codes and tokens
#[derive(Debug, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum StoreKind {
    #[default]
    InMemory,
    Redis,
}

/// Configuration for the code and token store
#[derive(Debug, Config, Clone)]
pub struct StoreConfig {
    /// Store type: "in-memory" (default) or "redis"
    #[config(env = "AUTH_STORE_KIND", default = "in-memory")]
    pub kind: StoreKind,

    /// In-memory store specific configuration
    #[config(nested)]
    pub memory: MemoryStoreConfig,

    /// Redis store specific configuration
    #[config(nested)]
    pub redis: RedisStoreConfig,
}

/// In-memory store configuration options
#[derive(Debug, Config, Clone)]
pub struct MemoryStoreConfig {
    /// Maximum capacity in MiB (default: 128 MiB)
    #[config(env = "AUTH_STORE_MEMORY_CAPACITY", default = 128)]
    pub capacity: usize,
}

/// Redis store configuration options
#[derive(Debug, Config, Clone)]
pub struct RedisStoreConfig {
    /// Redis connection string
    #[config(env = "AUTH_STORE_REDIS_URL", default = "")]
    pub url: String,
}

impl Default for RedisStoreConfig {
    fn default() -> Self {
        Self { url: String::new() }
    }
}
