//! Backing store trait definition

use std::time::Duration;

use async_trait::async_trait;

use crate::domain::CacheError;

#[cfg(test)]
use mockall::automock;

/// Primitive commands of the key/value store behind a cache handler.
///
/// Each method maps to a single Redis command. Keys and values are raw bytes.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Liveness check (PING)
    async fn ping(&self) -> Result<(), CacheError>;

    /// Checks if a key exists (EXISTS)
    async fn exists(&self, key: &[u8]) -> Result<bool, CacheError>;

    /// Reads a value (GET)
    async fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, CacheError>;

    /// Writes a value without expiry (SET)
    async fn set(&self, key: &[u8], value: &[u8]) -> Result<(), CacheError>;

    /// Sets the TTL of an existing key (EXPIRE), returns false if absent
    async fn expire(&self, key: &[u8], ttl: Duration) -> Result<bool, CacheError>;

    /// Removes a key (DEL), returns false if absent
    async fn delete(&self, key: &[u8]) -> Result<bool, CacheError>;

    /// Appends to a list (RPUSH), returns the new length
    async fn rpush(&self, key: &[u8], value: &[u8]) -> Result<u64, CacheError>;

    /// Prepends to a list (LPUSH), returns the new length
    async fn lpush(&self, key: &[u8], value: &[u8]) -> Result<u64, CacheError>;

    /// Removes and returns the last list element (RPOP)
    async fn rpop(&self, key: &[u8]) -> Result<Option<Vec<u8>>, CacheError>;

    /// Removes and returns the first list element (LPOP)
    async fn lpop(&self, key: &[u8]) -> Result<Option<Vec<u8>>, CacheError>;

    /// Returns the list length (LLEN), zero if absent
    async fn llen(&self, key: &[u8]) -> Result<u64, CacheError>;
}
