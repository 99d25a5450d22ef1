use crate::config::{StoreConfig, StoreKind};
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;
use thiserror::Error;

pub mod memory;
pub mod redis;

/// Errors that can occur during store operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Failed to serialize value: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Failed to parse value: {0}")]
    Deserialization(String),
    #[error("Redis error: {0}")]
    Redis(String),
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Key/value storage for authorization codes and bearer tokens.
///
/// Every entry carries its own lifetime: `None` keeps the entry until it is
/// taken, and backends must not evict it to make room. Developer tokens rely on this.
#[async_trait::async_trait]
pub trait StoreBackend: Send + Sync {
    /// Store a value, replacing any previous value under the same key
    async fn set<T: Serialize + Send + Sync>(
        &self,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
    ) -> Result<(), StoreError>;

    /// Retrieve a value
    async fn get<T: DeserializeOwned + Send + Sync>(
        &self,
        key: &str,
    ) -> Result<Option<T>, StoreError>;

    /// Atomically remove a value and return it.
    ///
    /// Two concurrent callers never both observe the same value, which is
    /// what keeps authorization codes single-use.
    async fn take<T: DeserializeOwned + Send + Sync>(
        &self,
        key: &str,
    ) -> Result<Option<T>, StoreError>;

    /// Returns Ok(()) if the backend is reachable
    async fn health_check(&self) -> Result<(), String>;
}

/// Store implementation selected at startup from configuration
#[derive(Clone)]
pub enum Store {
    /// In-process store using Moka
    InMemory(memory::InMemoryStore),
    /// Redis-backed store, shared between server replicas
    Redis(redis::RedisStore),
}

#[async_trait::async_trait]
impl StoreBackend for Store {
    async fn set<T: Serialize + Send + Sync>(
        &self,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
    ) -> Result<(), StoreError> {
        match self {
            Self::InMemory(store) => store.set(key, value, ttl).await,
            Self::Redis(store) => store.set(key, value, ttl).await,
        }
    }

    async fn get<T: DeserializeOwned + Send + Sync>(
        &self,
        key: &str,
    ) -> Result<Option<T>, StoreError> {
        match self {
            Self::InMemory(store) => store.get(key).await,
            Self::Redis(store) => store.get(key).await,
        }
    }

    async fn take<T: DeserializeOwned + Send + Sync>(
        &self,
        key: &str,
    ) -> Result<Option<T>, StoreError> {
        match self {
            Self::InMemory(store) => store.take(key).await,
            Self::Redis(store) => store.take(key).await,
        }
    }

    async fn health_check(&self) -> Result<(), String> {
        match self {
            Self::InMemory(store) => store.health_check().await,
            Self::Redis(store) => store.health_check().await,
        }
    }
}

/// Creates the store backend named by the configuration
pub async fn create_store(config: &StoreConfig) -> Result<Store, StoreError> {
    match config.kind {
        StoreKind::InMemory => {
            let store =
                memory::InMemoryStore::new(config.memory.capacity).map_err(StoreError::Config)?;
            Ok(Store::InMemory(store))
        }
        StoreKind::Redis => {
            if config.redis.url.is_empty() {
                return Err(StoreError::Config(
                    "Redis URL is required for the Redis store".to_string(),
                ));
            }
            let store = redis::RedisStore::new(&config.redis.url)
                .await
                .map_err(StoreError::Config)?;
            Ok(Store::Redis(store))
        }
    }
}
