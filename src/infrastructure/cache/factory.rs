//! Cache handler factory for profile based selection

use std::sync::Arc;

use tracing::info;

use crate::config::{Profile, RedisEnvironment};
use crate::domain::{CacheError, CacheHandler};

use super::client::StoreCacheHandler;
use super::redis::RedisSentinelStore;
use super::stub::CacheHandlerStub;

/// Factory for creating cache handlers
#[derive(Debug, Default)]
pub struct CacheHandlerFactory;

impl CacheHandlerFactory {
    /// Creates a new cache handler factory
    pub fn new() -> Self {
        Self
    }

    /// Creates the handler matching the environment's profile
    ///
    /// Nothing connects here; call `initialize` on the result.
    pub fn create(&self, environment: &RedisEnvironment) -> Arc<dyn CacheHandler> {
        match environment.profile() {
            Profile::Local => {
                info!("Local profile, using cache stub");
                Arc::new(CacheHandlerStub::new())
            }
            Profile::Server => {
                info!(
                    master = %environment.master_name(),
                    sentinels = ?environment.sentinels(),
                    "Server profile, using Redis Sentinel cache"
                );
                let store = RedisSentinelStore::new(environment);
                Arc::new(StoreCacheHandler::with_retry_policy(
                    store,
                    environment.retry_policy(),
                ))
            }
        }
    }

    /// Reads `REDIS_*` variables and creates the matching handler
    pub fn from_env(&self) -> Result<Arc<dyn CacheHandler>, CacheError> {
        let environment = RedisEnvironment::from_env()?;
        Ok(self.create(&environment))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::CacheHandlerExt;

    #[tokio::test]
    async fn test_factory_local_profile() {
        let factory = CacheHandlerFactory::new();

        let handler = factory.create(&RedisEnvironment::local());

        assert!(handler.is_ready());
        handler.set_string("k", "v", None).await.unwrap();
        assert_eq!(handler.get_string("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_factory_server_profile_is_not_ready_before_initialize() {
        let factory = CacheHandlerFactory::new();
        let environment = RedisEnvironment::server("mymaster", ["127.0.0.1:26379"]);

        let handler = factory.create(&environment);

        assert!(!handler.is_ready());
        let result = handler.get_string("k").await;
        assert!(matches!(result, Err(CacheError::NotReady)));
    }

    #[test]
    fn test_factory_debug_output() {
        let factory = CacheHandlerFactory::new();
        let environment = RedisEnvironment::server("mymaster", ["127.0.0.1:26379"]);

        let handler = factory.create(&environment);

        assert!(format!("{:?}", handler).contains("StoreCacheHandler"));
    }
}
