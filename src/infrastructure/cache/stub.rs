//! No-op cache handler for the local profile

use std::time::Duration;

use async_trait::async_trait;
use tracing::trace;

use crate::domain::cache::display_key;
use crate::domain::{CacheError, CacheHandler, Initialization};

/// Handler that stores nothing
///
/// Always ready. Writes are discarded and reads behave as if the key was
/// never written.
#[derive(Debug, Default, Clone, Copy)]
pub struct CacheHandlerStub;

impl CacheHandlerStub {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CacheHandler for CacheHandlerStub {
    async fn initialize(&self) -> Initialization {
        Initialization::Ready
    }

    fn is_ready(&self) -> bool {
        true
    }

    async fn set_raw(
        &self,
        key: &[u8],
        _value: &[u8],
        _ttl: Option<Duration>,
    ) -> Result<(), CacheError> {
        trace!(key = %display_key(key), "Discarding cache write");
        Ok(())
    }

    async fn get_raw(&self, _key: &[u8]) -> Result<Option<Vec<u8>>, CacheError> {
        Ok(None)
    }

    async fn exists(&self, _key: &[u8]) -> Result<bool, CacheError> {
        Ok(false)
    }

    async fn delete(&self, _key: &[u8]) -> Result<(), CacheError> {
        Ok(())
    }

    async fn rpush_raw(&self, _key: &[u8], _value: &[u8]) -> Result<u64, CacheError> {
        Ok(0)
    }

    async fn lpush_raw(&self, _key: &[u8], _value: &[u8]) -> Result<u64, CacheError> {
        Ok(0)
    }

    async fn rpop_raw(&self, _key: &[u8]) -> Result<Option<Vec<u8>>, CacheError> {
        Ok(None)
    }

    async fn lpop_raw(&self, _key: &[u8]) -> Result<Option<Vec<u8>>, CacheError> {
        Ok(None)
    }

    async fn llen(&self, _key: &[u8]) -> Result<u64, CacheError> {
        Ok(0)
    }
}
