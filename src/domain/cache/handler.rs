//! Cache handler trait definition

use std::fmt::Debug;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, error};

use super::key::CacheKey;
use super::readiness::Initialization;
use crate::domain::CacheError;

/// Cache access contract shared by the Redis backed handler and the stub
///
/// This trait works on raw bytes to be dyn-compatible.
/// Use the `CacheHandlerExt` helpers for strings and JSON values.
#[async_trait]
pub trait CacheHandler: Send + Sync + Debug {
    /// Probes the backing store and starts the retry loop if it is down
    async fn initialize(&self) -> Initialization;

    /// Returns true once operations are permitted
    fn is_ready(&self) -> bool;

    /// Writes a value, replacing any existing entry.
    ///
    /// A `None` or zero TTL keeps the entry until it is deleted.
    async fn set_raw(
        &self,
        key: &[u8],
        value: &[u8],
        ttl: Option<Duration>,
    ) -> Result<(), CacheError>;

    /// Reads a value
    async fn get_raw(&self, key: &[u8]) -> Result<Option<Vec<u8>>, CacheError>;

    /// Checks if a key is present
    async fn exists(&self, key: &[u8]) -> Result<bool, CacheError>;

    /// Removes an entry; absent keys are ignored
    async fn delete(&self, key: &[u8]) -> Result<(), CacheError>;

    /// Appends to the list at `key`, returning its new length
    async fn rpush_raw(&self, key: &[u8], value: &[u8]) -> Result<u64, CacheError>;

    /// Prepends to the list at `key`, returning its new length
    async fn lpush_raw(&self, key: &[u8], value: &[u8]) -> Result<u64, CacheError>;

    /// Removes and returns the last element of the list at `key`
    async fn rpop_raw(&self, key: &[u8]) -> Result<Option<Vec<u8>>, CacheError>;

    /// Removes and returns the first element of the list at `key`
    async fn lpop_raw(&self, key: &[u8]) -> Result<Option<Vec<u8>>, CacheError>;

    /// Length of the list at `key`, zero if absent
    async fn llen(&self, key: &[u8]) -> Result<u64, CacheError>;
}

fn to_json<V: Serialize + ?Sized>(value: &V) -> Result<Vec<u8>, CacheError> {
    serde_json::to_vec(value).map_err(|e| {
        error!(error = %e, "Unable to serialize cache value");
        CacheError::serialization(format!("Unable to process object - Error was {}", e), e)
    })
}

fn from_json<V: DeserializeOwned>(key: &str, payload: &[u8]) -> Result<V, CacheError> {
    serde_json::from_slice(payload).map_err(|e| {
        debug!(
            key,
            payload = %String::from_utf8_lossy(payload),
            "Failed to parse cached value"
        );
        error!(key, error = %e, "Failed to deserialize cached value");
        CacheError::serialization(format!("Failed to get key [{}]", key), e)
    })
}

fn from_utf8(key: &str, payload: Vec<u8>) -> Result<String, CacheError> {
    String::from_utf8(payload).map_err(|e| {
        error!(key, error = %e, "Cached value is not valid UTF-8");
        CacheError::serialization(format!("Failed to get key [{}]", key), e)
    })
}

/// Extension trait providing string, byte and JSON operations
pub trait CacheHandlerExt: CacheHandler {
    /// Stores a string value
    fn set_string<'a, K>(
        &'a self,
        key: &'a K,
        value: &'a str,
        ttl: Option<Duration>,
    ) -> impl Future<Output = Result<(), CacheError>> + Send + 'a
    where
        K: CacheKey + ?Sized,
    {
        async move { self.set_raw(key.as_key_bytes(), value.as_bytes(), ttl).await }
    }

    /// Reads a string value
    fn get_string<'a, K>(
        &'a self,
        key: &'a K,
    ) -> impl Future<Output = Result<Option<String>, CacheError>> + Send + 'a
    where
        K: CacheKey + ?Sized,
    {
        async move {
            match self.get_raw(key.as_key_bytes()).await? {
                Some(payload) => Ok(Some(from_utf8(&key.display(), payload)?)),
                None => Ok(None),
            }
        }
    }

    /// Stores an opaque binary value
    fn set_bytes<'a, K>(
        &'a self,
        key: &'a K,
        value: &'a [u8],
        ttl: Option<Duration>,
    ) -> impl Future<Output = Result<(), CacheError>> + Send + 'a
    where
        K: CacheKey + ?Sized,
    {
        async move { self.set_raw(key.as_key_bytes(), value, ttl).await }
    }

    /// Reads an opaque binary value
    fn get_bytes<'a, K>(
        &'a self,
        key: &'a K,
    ) -> impl Future<Output = Result<Option<Vec<u8>>, CacheError>> + Send + 'a
    where
        K: CacheKey + ?Sized,
    {
        async move { self.get_raw(key.as_key_bytes()).await }
    }

    /// Stores a value serialized as JSON
    fn set_json<'a, K, V>(
        &'a self,
        key: &'a K,
        value: &'a V,
        ttl: Option<Duration>,
    ) -> impl Future<Output = Result<(), CacheError>> + Send + 'a
    where
        K: CacheKey + ?Sized,
        V: Serialize + Sync + ?Sized,
    {
        async move {
            let payload = to_json(value)?;
            self.set_raw(key.as_key_bytes(), &payload, ttl).await
        }
    }

    /// Reads a JSON value into `V`
    fn get_json<'a, K, V>(
        &'a self,
        key: &'a K,
    ) -> impl Future<Output = Result<Option<V>, CacheError>> + Send + 'a
    where
        K: CacheKey + ?Sized,
        V: DeserializeOwned + Send + 'a,
    {
        async move {
            match self.get_raw(key.as_key_bytes()).await? {
                Some(payload) => Ok(Some(from_json(&key.display(), &payload)?)),
                None => Ok(None),
            }
        }
    }

    /// Reads a JSON array into a list of `V`
    fn get_list<'a, K, V>(
        &'a self,
        key: &'a K,
    ) -> impl Future<Output = Result<Option<Vec<V>>, CacheError>> + Send + 'a
    where
        K: CacheKey + ?Sized,
        V: DeserializeOwned + Send + 'a,
    {
        self.get_json::<K, Vec<V>>(key)
    }

    /// Appends a string to a list
    fn rpush_string<'a, K>(
        &'a self,
        key: &'a K,
        value: &'a str,
    ) -> impl Future<Output = Result<u64, CacheError>> + Send + 'a
    where
        K: CacheKey + ?Sized,
    {
        async move { self.rpush_raw(key.as_key_bytes(), value.as_bytes()).await }
    }

    /// Prepends a string to a list
    fn lpush_string<'a, K>(
        &'a self,
        key: &'a K,
        value: &'a str,
    ) -> impl Future<Output = Result<u64, CacheError>> + Send + 'a
    where
        K: CacheKey + ?Sized,
    {
        async move { self.lpush_raw(key.as_key_bytes(), value.as_bytes()).await }
    }

    /// Appends a JSON serialized value to a list
    fn rpush_json<'a, K, V>(
        &'a self,
        key: &'a K,
        value: &'a V,
    ) -> impl Future<Output = Result<u64, CacheError>> + Send + 'a
    where
        K: CacheKey + ?Sized,
        V: Serialize + Sync + ?Sized,
    {
        async move {
            let payload = to_json(value)?;
            self.rpush_raw(key.as_key_bytes(), &payload).await
        }
    }

    /// Prepends a JSON serialized value to a list
    fn lpush_json<'a, K, V>(
        &'a self,
        key: &'a K,
        value: &'a V,
    ) -> impl Future<Output = Result<u64, CacheError>> + Send + 'a
    where
        K: CacheKey + ?Sized,
        V: Serialize + Sync + ?Sized,
    {
        async move {
            let payload = to_json(value)?;
            self.lpush_raw(key.as_key_bytes(), &payload).await
        }
    }

    /// Pops the last list element as a string
    fn rpop_string<'a, K>(
        &'a self,
        key: &'a K,
    ) -> impl Future<Output = Result<Option<String>, CacheError>> + Send + 'a
    where
        K: CacheKey + ?Sized,
    {
        async move {
            match self.rpop_raw(key.as_key_bytes()).await? {
                Some(payload) => Ok(Some(from_utf8(&key.display(), payload)?)),
                None => Ok(None),
            }
        }
    }

    /// Pops the first list element as a string
    fn lpop_string<'a, K>(
        &'a self,
        key: &'a K,
    ) -> impl Future<Output = Result<Option<String>, CacheError>> + Send + 'a
    where
        K: CacheKey + ?Sized,
    {
        async move {
            match self.lpop_raw(key.as_key_bytes()).await? {
                Some(payload) => Ok(Some(from_utf8(&key.display(), payload)?)),
                None => Ok(None),
            }
        }
    }

    /// Pops the last list element and parses it as JSON
    fn rpop_json<'a, K, V>(
        &'a self,
        key: &'a K,
    ) -> impl Future<Output = Result<Option<V>, CacheError>> + Send + 'a
    where
        K: CacheKey + ?Sized,
        V: DeserializeOwned + Send + 'a,
    {
        async move {
            match self.rpop_raw(key.as_key_bytes()).await? {
                Some(payload) => Ok(Some(from_json(&key.display(), &payload)?)),
                None => Ok(None),
            }
        }
    }

    /// Pops the first list element and parses it as JSON
    fn lpop_json<'a, K, V>(
        &'a self,
        key: &'a K,
    ) -> impl Future<Output = Result<Option<V>, CacheError>> + Send + 'a
    where
        K: CacheKey + ?Sized,
        V: DeserializeOwned + Send + 'a,
    {
        async move {
            match self.lpop_raw(key.as_key_bytes()).await? {
                Some(payload) => Ok(Some(from_json(&key.display(), &payload)?)),
                None => Ok(None),
            }
        }
    }
}

// Blanket implementation for all types implementing CacheHandler
impl<T: CacheHandler + ?Sized> CacheHandlerExt for T {}
