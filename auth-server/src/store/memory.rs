use super::{StoreBackend, StoreError};
use async_trait::async_trait;
use moka::future::Cache as MokaCache;
use moka::Expiry;
use serde::{de::DeserializeOwned, Serialize};
use std::time::{Duration, Instant};

#[derive(Clone)]
struct Entry {
    data: String,
    ttl: Option<Duration>,
}

/// Expires each entry after its own TTL
struct EntryExpiry;

impl Expiry<String, Entry> for EntryExpiry {
    fn expire_after_create(&self, _key: &String, value: &Entry, _created_at: Instant) -> Option<Duration> {
        value.ttl
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &Entry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        value.ttl
    }
}

/// In-process store.
///
/// Entries with a TTL live in a size-bounded cache and may be evicted under
/// memory pressure. Entries without one (developer tokens) live in a separate
/// unbounded cache and are only removed explicitly.
#[derive(Clone)]
pub struct InMemoryStore {
    expiring: MokaCache<String, Entry>,
    persistent: MokaCache<String, Entry>,
}

impl InMemoryStore {
    /// Initialize a new in-memory store holding at most `capacity_mib` MiB of expiring entries
    pub fn new(capacity_mib: usize) -> Result<Self, String> {
        let max_capacity_bytes: u64 = capacity_mib
            .checked_mul(1024 * 1024)
            .and_then(|bytes| bytes.try_into().ok())
            .ok_or_else(|| format!("Capacity overflow: {capacity_mib} MiB"))?;

        let expiring = MokaCache::builder()
            .expire_after(EntryExpiry)
            .weigher(|_key, value: &Entry| -> u32 {
                value.data.len().try_into().unwrap_or(u32::MAX)
            })
            .max_capacity(max_capacity_bytes)
            .build();
        let persistent = MokaCache::builder().build();

        Ok(Self {
            expiring,
            persistent,
        })
    }

    fn decode<T: DeserializeOwned>(entry: Option<Entry>) -> Result<Option<T>, StoreError> {
        match entry {
            Some(entry) => serde_json::from_str(&entry.data)
                .map_err(|e| StoreError::Deserialization(e.to_string()))
                .map(Some),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl StoreBackend for InMemoryStore {
    async fn set<T: Serialize + Send + Sync>(
        &self,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
    ) -> Result<(), StoreError> {
        let data = serde_json::to_string(value)?;
        let key = key.to_string();
        match ttl {
            Some(_) => {
                self.persistent.invalidate(&key).await;
                self.expiring.insert(key, Entry { data, ttl }).await;
            }
            None => {
                self.expiring.invalidate(&key).await;
                self.persistent.insert(key, Entry { data, ttl }).await;
            }
        }
        Ok(())
    }

    async fn get<T: DeserializeOwned + Send + Sync>(
        &self,
        key: &str,
    ) -> Result<Option<T>, StoreError> {
        let entry = match self.expiring.get(key).await {
            Some(entry) => Some(entry),
            None => self.persistent.get(key).await,
        };
        Self::decode(entry)
    }

    async fn take<T: DeserializeOwned + Send + Sync>(
        &self,
        key: &str,
    ) -> Result<Option<T>, StoreError> {
        let entry = match self.expiring.remove(key).await {
            Some(entry) => Some(entry),
            None => self.persistent.remove(key).await,
        };
        Self::decode(entry)
    }

    async fn health_check(&self) -> Result<(), String> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct TestData {
        field: String,
    }

    #[tokio::test]
    async fn test_entry_expiration() {
        let store = InMemoryStore::new(128).unwrap();

        let data = TestData {
            field: "test".to_string(),
        };

        store
            .set("short", &data, Some(Duration::from_secs(1)))
            .await
            .unwrap();
        store.set("forever", &data, None).await.unwrap();
        let retrieved: TestData = store.get("short").await.unwrap().unwrap();
        assert_eq!(data, retrieved);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(store.get::<TestData>("short").await.unwrap().is_none());
        assert_eq!(store.get::<TestData>("forever").await.unwrap(), Some(data));
    }

    #[tokio::test]
    async fn test_undecodable_value() {
        let store = InMemoryStore::new(128).unwrap();
        store.set("key", &"not an object", None).await.unwrap();

        let result = store.get::<TestData>("key").await;
        assert!(matches!(result, Err(StoreError::Deserialization(_))));
    }

    #[tokio::test]
    async fn test_health_check() {
        let store = InMemoryStore::new(1).unwrap();
        let result = store.health_check().await;
        assert!(result.is_ok(), "health check failed: {:?}", result);
    }

    #[tokio::test]
    async fn test_capacity_limit() {
        let store = InMemoryStore::new(1).unwrap();

        // 300 KiB * 10 entries exceeds the 1 MiB limit
        let data = "x".repeat(1024 * 300);
        let ttl = Some(Duration::from_secs(600));

        for i in 0..10 {
            let key = format!("key_{}", i);
            store.set(&key, &data, ttl).await.unwrap();
            // give moka time to run eviction
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        store.expiring.run_pending_tasks().await;

        let mut found_items = 0;
        for i in 0..10 {
            let key = format!("key_{}", i);
            if store.get::<String>(&key).await.unwrap().is_some() {
                found_items += 1;
            }
        }

        assert!(
            found_items < 10,
            "Expected some items to be evicted, but found {} items",
            found_items
        );
    }

    #[tokio::test]
    async fn test_entries_without_ttl_survive_capacity_pressure() {
        let store = InMemoryStore::new(1).unwrap();
        let data = TestData {
            field: "developer".to_string(),
        };
        store.set("forever", &data, None).await.unwrap();

        let filler = "x".repeat(1024 * 300);
        for i in 0..10 {
            store
                .set(&format!("key_{}", i), &filler, Some(Duration::from_secs(600)))
                .await
                .unwrap();
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        store.expiring.run_pending_tasks().await;
        store.persistent.run_pending_tasks().await;

        assert_eq!(store.get::<TestData>("forever").await.unwrap(), Some(data));
    }

    #[tokio::test]
    async fn test_set_moves_entry_between_lifetimes() {
        let store = InMemoryStore::new(1).unwrap();
        store.set("key", &"first", None).await.unwrap();
        store
            .set("key", &"second", Some(Duration::from_secs(60)))
            .await
            .unwrap();

        assert_eq!(store.take::<String>("key").await.unwrap().as_deref(), Some("second"));
        assert_eq!(store.get::<String>("key").await.unwrap(), None);
    }
}
