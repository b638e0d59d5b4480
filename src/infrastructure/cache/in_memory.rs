//! In-memory store implementation using moka

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache as MokaCache;
use moka::ops::compute::Op;
use tokio::time::Instant;

use crate::domain::{CacheError, CacheStore};

const WRONG_TYPE: &str = "WRONGTYPE Operation against a key holding the wrong kind of value";

/// Configuration for the in-memory store
#[derive(Debug, Clone, Default)]
pub struct InMemoryStoreConfig {
    /// Maximum number of keys, unbounded when `None`
    pub max_capacity: Option<u64>,
}

impl InMemoryStoreConfig {
    /// Bounds the number of keys.
    ///
    /// Once the bound is reached moka evicts entries silently, so a bounded
    /// store no longer keeps every acknowledged write.
    pub fn with_max_capacity(mut self, capacity: u64) -> Self {
        self.max_capacity = Some(capacity);
        self
    }
}

#[derive(Debug, Clone)]
enum StoredValue {
    Bytes(Vec<u8>),
    List(VecDeque<Vec<u8>>),
}

/// Entry stored in moka
#[derive(Debug, Clone)]
struct StoreEntry {
    value: StoredValue,
    expires_at: Option<Instant>,
}

impl StoreEntry {
    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Instant::now() >= at)
    }
}

/// Which end of a list an operation works on
#[derive(Debug, Clone, Copy)]
enum End {
    Front,
    Back,
}

/// Thread-safe in-memory store with Redis string and list semantics
///
/// Expiry is tracked per entry against the tokio clock, so tests running
/// with a paused runtime can advance time deterministically.
#[derive(Debug)]
pub struct InMemoryStore {
    entries: MokaCache<Vec<u8>, StoreEntry>,
}

impl InMemoryStore {
    /// Creates a new store with default configuration
    pub fn new() -> Self {
        Self::with_config(InMemoryStoreConfig::default())
    }

    /// Creates a new store with the given configuration
    pub fn with_config(config: InMemoryStoreConfig) -> Self {
        let mut builder = MokaCache::builder();

        if let Some(capacity) = config.max_capacity {
            builder = builder.max_capacity(capacity);
        }

        Self {
            entries: builder.build(),
        }
    }

    async fn live_entry(&self, key: &[u8]) -> Option<StoreEntry> {
        let entry = self.entries.get(key).await?;

        if entry.is_expired() {
            self.purge_expired(key).await;
            return None;
        }

        Some(entry)
    }

    /// Removes the entry only if it is still expired when the lock is held
    async fn purge_expired(&self, key: &[u8]) {
        self.entries
            .entry(key.to_vec())
            .and_compute_with(|current| {
                let op = match current {
                    Some(entry) if entry.value().is_expired() => Op::Remove,
                    _ => Op::Nop,
                };
                std::future::ready(op)
            })
            .await;
    }

    async fn push(&self, key: &[u8], value: &[u8], end: End) -> Result<u64, CacheError> {
        let mut outcome = Ok(0);

        self.entries
            .entry(key.to_vec())
            .and_compute_with(|current| {
                let current = current.map(|e| e.into_value()).filter(|e| !e.is_expired());

                let op = match current {
                    Some(StoreEntry {
                        value: StoredValue::Bytes(_),
                        ..
                    }) => {
                        outcome = Err(CacheError::store(WRONG_TYPE));
                        Op::Nop
                    }
                    Some(StoreEntry {
                        value: StoredValue::List(mut list),
                        expires_at,
                    }) => {
                        push_to(&mut list, value, end);
                        outcome = Ok(list.len() as u64);
                        Op::Put(StoreEntry {
                            value: StoredValue::List(list),
                            expires_at,
                        })
                    }
                    None => {
                        let mut list = VecDeque::new();
                        push_to(&mut list, value, end);
                        outcome = Ok(1);
                        Op::Put(StoreEntry {
                            value: StoredValue::List(list),
                            expires_at: None,
                        })
                    }
                };

                std::future::ready(op)
            })
            .await;

        outcome
    }

    async fn pop(&self, key: &[u8], end: End) -> Result<Option<Vec<u8>>, CacheError> {
        let mut outcome = Ok(None);

        self.entries
            .entry(key.to_vec())
            .and_compute_with(|current| {
                let op = match current.map(|e| e.into_value()) {
                    Some(entry) if entry.is_expired() => Op::Remove,
                    Some(StoreEntry {
                        value: StoredValue::Bytes(_),
                        ..
                    }) => {
                        outcome = Err(CacheError::store(WRONG_TYPE));
                        Op::Nop
                    }
                    Some(StoreEntry {
                        value: StoredValue::List(mut list),
                        expires_at,
                    }) => {
                        let popped = match end {
                            End::Front => list.pop_front(),
                            End::Back => list.pop_back(),
                        };
                        outcome = Ok(popped);

                        if list.is_empty() {
                            Op::Remove
                        } else {
                            Op::Put(StoreEntry {
                                value: StoredValue::List(list),
                                expires_at,
                            })
                        }
                    }
                    None => Op::Nop,
                };

                std::future::ready(op)
            })
            .await;

        outcome
    }
}

fn push_to(list: &mut VecDeque<Vec<u8>>, value: &[u8], end: End) {
    match end {
        End::Front => list.push_front(value.to_vec()),
        End::Back => list.push_back(value.to_vec()),
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheStore for InMemoryStore {
    async fn ping(&self) -> Result<(), CacheError> {
        Ok(())
    }

    async fn exists(&self, key: &[u8]) -> Result<bool, CacheError> {
        Ok(self.live_entry(key).await.is_some())
    }

    async fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, CacheError> {
        match self.live_entry(key).await {
            Some(StoreEntry {
                value: StoredValue::Bytes(bytes),
                ..
            }) => Ok(Some(bytes)),
            Some(_) => Err(CacheError::store(WRONG_TYPE)),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &[u8], value: &[u8]) -> Result<(), CacheError> {
        let entry = StoreEntry {
            value: StoredValue::Bytes(value.to_vec()),
            expires_at: None,
        };
        self.entries.insert(key.to_vec(), entry).await;
        Ok(())
    }

    async fn expire(&self, key: &[u8], ttl: Duration) -> Result<bool, CacheError> {
        let mut applied = false;

        self.entries
            .entry(key.to_vec())
            .and_compute_with(|current| {
                let op = match current.map(|e| e.into_value()) {
                    Some(entry) if entry.is_expired() => Op::Remove,
                    Some(mut entry) => {
                        entry.expires_at = Some(Instant::now() + ttl);
                        applied = true;
                        Op::Put(entry)
                    }
                    None => Op::Nop,
                };
                std::future::ready(op)
            })
            .await;

        Ok(applied)
    }

    async fn delete(&self, key: &[u8]) -> Result<bool, CacheError> {
        Ok(self.entries.remove(key).await.is_some_and(|e| !e.is_expired()))
    }

    async fn rpush(&self, key: &[u8], value: &[u8]) -> Result<u64, CacheError> {
        self.push(key, value, End::Back).await
    }

    async fn lpush(&self, key: &[u8], value: &[u8]) -> Result<u64, CacheError> {
        self.push(key, value, End::Front).await
    }

    async fn rpop(&self, key: &[u8]) -> Result<Option<Vec<u8>>, CacheError> {
        self.pop(key, End::Back).await
    }

    async fn lpop(&self, key: &[u8]) -> Result<Option<Vec<u8>>, CacheError> {
        self.pop(key, End::Front).await
    }

    async fn llen(&self, key: &[u8]) -> Result<u64, CacheError> {
        match self.live_entry(key).await {
            Some(StoreEntry {
                value: StoredValue::List(list),
                ..
            }) => Ok(list.len() as u64),
            Some(_) => Err(CacheError::store(WRONG_TYPE)),
            None => Ok(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[tokio::test]
    async fn test_set_and_get() {
        let store = InMemoryStore::new();

        store.set(b"key1", b"value1").await.unwrap();

        assert_eq!(store.get(b"key1").await.unwrap(), Some(b"value1".to_vec()));
        assert!(store.exists(b"key1").await.unwrap());
    }

    #[tokio::test]
    async fn test_get_missing() {
        let store = InMemoryStore::new();

        assert_eq!(store.get(b"missing").await.unwrap(), None);
        assert!(!store.exists(b"missing").await.unwrap());
    }

    #[tokio::test]
    async fn test_delete() {
        let store = InMemoryStore::new();
        store.set(b"key1", b"value1").await.unwrap();

        assert!(store.delete(b"key1").await.unwrap());
        assert!(!store.delete(b"key1").await.unwrap());
        assert_eq!(store.get(b"key1").await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expire() {
        let store = InMemoryStore::new();
        store.set(b"key1", b"value1").await.unwrap();

        assert!(store.expire(b"key1", Duration::from_secs(5)).await.unwrap());

        tokio::time::advance(Duration::from_secs(4)).await;
        assert!(store.exists(b"key1").await.unwrap());

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(!store.exists(b"key1").await.unwrap());
    }

    #[tokio::test]
    async fn test_expire_missing_key() {
        let store = InMemoryStore::new();
        assert!(!store.expire(b"missing", Duration::from_secs(5)).await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_clears_expiry() {
        let store = InMemoryStore::new();
        store.set(b"key1", b"value1").await.unwrap();
        store.expire(b"key1", Duration::from_secs(5)).await.unwrap();

        store.set(b"key1", b"value2").await.unwrap();
        tokio::time::advance(Duration::from_secs(10)).await;

        assert_eq!(store.get(b"key1").await.unwrap(), Some(b"value2".to_vec()));
    }

    #[tokio::test]
    async fn test_list_operations() {
        let store = InMemoryStore::new();

        assert_eq!(store.rpush(b"list", b"b").await.unwrap(), 1);
        assert_eq!(store.rpush(b"list", b"c").await.unwrap(), 2);
        assert_eq!(store.lpush(b"list", b"a").await.unwrap(), 3);
        assert_eq!(store.llen(b"list").await.unwrap(), 3);

        assert_eq!(store.lpop(b"list").await.unwrap(), Some(b"a".to_vec()));
        assert_eq!(store.rpop(b"list").await.unwrap(), Some(b"c".to_vec()));
        assert_eq!(store.rpop(b"list").await.unwrap(), Some(b"b".to_vec()));

        assert_eq!(store.rpop(b"list").await.unwrap(), None);
        assert_eq!(store.llen(b"list").await.unwrap(), 0);
        assert!(!store.exists(b"list").await.unwrap());
    }

    #[tokio::test]
    async fn test_wrong_type() {
        let store = InMemoryStore::new();
        store.set(b"string", b"value").await.unwrap();
        store.rpush(b"list", b"value").await.unwrap();

        assert!(store.rpush(b"string", b"x").await.is_err());
        assert!(store.lpop(b"string").await.is_err());
        assert!(store.llen(b"string").await.is_err());
        assert!(store.get(b"list").await.is_err());
    }

    #[tokio::test]
    async fn test_unbounded_by_default_keeps_every_write() {
        let store = InMemoryStore::new();

        for i in 0..100 {
            store.set(format!("key-{}", i).as_bytes(), b"value").await.unwrap();
        }
        store.entries.run_pending_tasks().await;

        for i in 0..100 {
            assert!(store.exists(format!("key-{}", i).as_bytes()).await.unwrap());
        }
    }

    #[tokio::test]
    async fn test_bounded_config() {
        let config = InMemoryStoreConfig::default().with_max_capacity(2);
        assert_eq!(config.max_capacity, Some(2));
        assert_eq!(InMemoryStoreConfig::default().max_capacity, None);

        let store = InMemoryStore::with_config(config);
        store.set(b"key", b"value").await.unwrap();
        assert_eq!(store.get(b"key").await.unwrap(), Some(b"value".to_vec()));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_expire_does_not_lose_concurrent_pushes() {
        let mut rounds_with_lost_pushes = 0;

        for round in 0..200 {
            let store = Arc::new(InMemoryStore::new());
            let key = format!("list-{}", round).into_bytes();
            store.rpush(&key, b"seed").await.unwrap();

            let pusher = {
                let store = store.clone();
                let key = key.clone();
                tokio::spawn(async move {
                    for _ in 0..50 {
                        store.rpush(&key, b"item").await.unwrap();
                    }
                })
            };
            let expirer = {
                let store = store.clone();
                let key = key.clone();
                tokio::spawn(async move {
                    for _ in 0..50 {
                        store.expire(&key, Duration::from_secs(600)).await.unwrap();
                    }
                })
            };

            pusher.await.unwrap();
            expirer.await.unwrap();

            if store.llen(&key).await.unwrap() != 51 {
                rounds_with_lost_pushes += 1;
            }
        }

        assert_eq!(rounds_with_lost_pushes, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_entry_purge_keeps_fresh_write() {
        let store = InMemoryStore::new();
        store.set(b"key1", b"old").await.unwrap();
        store.expire(b"key1", Duration::from_secs(1)).await.unwrap();
        tokio::time::advance(Duration::from_secs(2)).await;

        store.set(b"key1", b"new").await.unwrap();
        store.purge_expired(b"key1").await;

        assert_eq!(store.get(b"key1").await.unwrap(), Some(b"new".to_vec()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_expire_on_expired_key() {
        let store = InMemoryStore::new();
        store.set(b"key1", b"value1").await.unwrap();
        store.expire(b"key1", Duration::from_secs(1)).await.unwrap();
        tokio::time::advance(Duration::from_secs(2)).await;

        assert!(!store.expire(b"key1", Duration::from_secs(60)).await.unwrap());
        assert!(!store.exists(b"key1").await.unwrap());
    }

    #[tokio::test]
    async fn test_set_replaces_list() {
        let store = InMemoryStore::new();
        store.rpush(b"key", b"item").await.unwrap();

        store.set(b"key", b"value").await.unwrap();

        assert_eq!(store.get(b"key").await.unwrap(), Some(b"value".to_vec()));
    }
}
