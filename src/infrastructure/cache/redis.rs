//! Redis Sentinel backed store

use std::fmt;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::sentinel::{Sentinel, SentinelNodeConnectionInfo};
use redis::{AsyncCommands, RedisConnectionInfo, RedisError, RedisResult};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::config::RedisEnvironment;
use crate::domain::{CacheError, CacheStore};

/// Turns a `host:port` sentinel address into a connection URL
fn sentinel_url(address: &str) -> String {
    if address.contains("://") {
        address.to_string()
    } else {
        format!("redis://{}", address)
    }
}

/// Lazily connects to the master currently advertised by the sentinels.
///
/// The sentinel client and the master connection are created on first use
/// and memoized. A connection that fails with an I/O error is discarded so the
/// next call asks the sentinels for the master again.
pub struct SentinelPool {
    master_name: String,
    sentinels: Vec<String>,
    node_info: SentinelNodeConnectionInfo,
    sentinel: Mutex<Option<Sentinel>>,
    connection: RwLock<Option<MultiplexedConnection>>,
}

impl fmt::Debug for SentinelPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SentinelPool")
            .field("master_name", &self.master_name)
            .field("sentinels", &self.sentinels)
            .field("connection", &"<MultiplexedConnection>")
            .finish()
    }
}

impl SentinelPool {
    /// Creates the pool without connecting
    pub fn new(environment: &RedisEnvironment) -> Self {
        let node_info = SentinelNodeConnectionInfo {
            tls_mode: None,
            redis_connection_info: Some(RedisConnectionInfo {
                password: environment.password().map(str::to_string),
                ..Default::default()
            }),
        };

        Self {
            master_name: environment.master_name().to_string(),
            sentinels: environment
                .sentinels()
                .iter()
                .map(|s| sentinel_url(s))
                .collect(),
            node_info,
            sentinel: Mutex::new(None),
            connection: RwLock::new(None),
        }
    }

    pub fn master_name(&self) -> &str {
        &self.master_name
    }

    /// Returns a handle on the master connection, connecting if needed
    pub async fn connection(&self) -> Result<MultiplexedConnection, CacheError> {
        if let Some(connection) = self.connection.read().await.as_ref() {
            return Ok(connection.clone());
        }

        let mut slot = self.connection.write().await;

        if let Some(connection) = slot.as_ref() {
            return Ok(connection.clone());
        }

        let mut guard = self.sentinel.lock().await;
        let sentinel = match guard.take() {
            Some(sentinel) => sentinel,
            None => Sentinel::build(self.sentinels.clone()).map_err(|e| {
                CacheError::store_with("Failed to build Sentinel client", e)
            })?,
        };
        let sentinel = guard.insert(sentinel);

        let client = sentinel
            .async_master_for(&self.master_name, Some(&self.node_info))
            .await
            .map_err(|e| {
                CacheError::store_with(
                    format!("Failed to resolve master '{}'", self.master_name),
                    e,
                )
            })?;

        let connection = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| {
                CacheError::store_with(
                    format!("Failed to connect to master '{}'", self.master_name),
                    e,
                )
            })?;

        info!(master = %self.master_name, "Connected to Redis master");
        *slot = Some(connection.clone());

        Ok(connection)
    }

    /// Drops the memoized master connection
    pub async fn invalidate(&self) {
        if self.connection.write().await.take().is_some() {
            debug!(master = %self.master_name, "Discarded Redis master connection");
        }
    }
}

/// Store speaking the Redis protocol to the Sentinel-discovered master
#[derive(Debug)]
pub struct RedisSentinelStore {
    pool: SentinelPool,
}

impl RedisSentinelStore {
    pub fn new(environment: &RedisEnvironment) -> Self {
        Self {
            pool: SentinelPool::new(environment),
        }
    }

    pub fn pool(&self) -> &SentinelPool {
        &self.pool
    }

    async fn run<T, F, Fut>(&self, command: &str, op: F) -> Result<T, CacheError>
    where
        F: FnOnce(MultiplexedConnection) -> Fut,
        Fut: Future<Output = RedisResult<T>>,
    {
        let connection = self.pool.connection().await?;

        match op(connection).await {
            Ok(value) => Ok(value),
            Err(e) => {
                if is_connection_failure(&e) {
                    warn!(command, error = %e, "Redis connection failed, will reconnect");
                    self.pool.invalidate().await;
                }

                Err(CacheError::store_with(format!("Redis {} failed", command), e))
            }
        }
    }
}

/// EXPIRE takes whole seconds; partial seconds round up
fn expire_secs(ttl: Duration) -> i64 {
    let secs = ttl.as_secs() + u64::from(ttl.subsec_nanos() > 0);
    i64::try_from(secs.max(1)).unwrap_or(i64::MAX)
}

fn is_connection_failure(error: &RedisError) -> bool {
    error.is_io_error() || error.is_connection_dropped() || error.is_connection_refusal()
}

#[async_trait]
impl CacheStore for RedisSentinelStore {
    async fn ping(&self) -> Result<(), CacheError> {
        let _pong: String = self
            .run("PING", |mut conn| async move {
                redis::cmd("PING").query_async::<String>(&mut conn).await
            })
            .await?;

        Ok(())
    }

    async fn exists(&self, key: &[u8]) -> Result<bool, CacheError> {
        self.run("EXISTS", |mut conn| async move { conn.exists::<_, bool>(key).await })
            .await
    }

    async fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, CacheError> {
        self.run("GET", |mut conn| async move {
            conn.get::<_, Option<Vec<u8>>>(key).await
        })
        .await
    }

    async fn set(&self, key: &[u8], value: &[u8]) -> Result<(), CacheError> {
        self.run("SET", |mut conn| async move { conn.set::<_, _, ()>(key, value).await })
            .await
    }

    async fn expire(&self, key: &[u8], ttl: Duration) -> Result<bool, CacheError> {
        let ttl_secs = expire_secs(ttl);

        self.run("EXPIRE", |mut conn| async move {
            conn.expire::<_, bool>(key, ttl_secs).await
        })
        .await
    }

    async fn delete(&self, key: &[u8]) -> Result<bool, CacheError> {
        let deleted: u64 = self
            .run("DEL", |mut conn| async move { conn.del::<_, u64>(key).await })
            .await?;

        Ok(deleted > 0)
    }

    async fn rpush(&self, key: &[u8], value: &[u8]) -> Result<u64, CacheError> {
        self.run("RPUSH", |mut conn| async move {
            conn.rpush::<_, _, u64>(key, value).await
        })
        .await
    }

    async fn lpush(&self, key: &[u8], value: &[u8]) -> Result<u64, CacheError> {
        self.run("LPUSH", |mut conn| async move {
            conn.lpush::<_, _, u64>(key, value).await
        })
        .await
    }

    async fn rpop(&self, key: &[u8]) -> Result<Option<Vec<u8>>, CacheError> {
        self.run("RPOP", |mut conn| async move {
            conn.rpop::<_, Option<Vec<u8>>>(key, None).await
        })
        .await
    }

    async fn lpop(&self, key: &[u8]) -> Result<Option<Vec<u8>>, CacheError> {
        self.run("LPOP", |mut conn| async move {
            conn.lpop::<_, Option<Vec<u8>>>(key, None).await
        })
        .await
    }

    async fn llen(&self, key: &[u8]) -> Result<u64, CacheError> {
        self.run("LLEN", |mut conn| async move { conn.llen::<_, u64>(key).await })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Note: the ignored tests require a Redis master monitored by a sentinel
    // on 127.0.0.1:26379 under the name "mymaster"

    fn get_test_environment() -> RedisEnvironment {
        RedisEnvironment::server("mymaster", ["127.0.0.1:26379"])
    }

    #[test]
    fn test_sentinel_url() {
        assert_eq!(sentinel_url("sentinel-1:26379"), "redis://sentinel-1:26379");
        assert_eq!(sentinel_url("redis://sentinel-1:26379"), "redis://sentinel-1:26379");
    }

    #[test]
    fn test_expire_secs_rounds_up() {
        assert_eq!(expire_secs(Duration::from_secs(30)), 30);
        assert_eq!(expire_secs(Duration::from_millis(1500)), 2);
        assert_eq!(expire_secs(Duration::from_millis(200)), 1);
        assert_eq!(expire_secs(Duration::from_nanos(30_000_000_001)), 31);
    }

    #[test]
    fn test_pool_is_lazy() {
        let environment = RedisEnvironment::server("mymaster", ["a:26379", "b:26379"])
            .with_password("secret");
        let store = RedisSentinelStore::new(&environment);

        assert_eq!(store.pool().master_name(), "mymaster");
        assert_eq!(
            store.pool().sentinels,
            vec!["redis://a:26379".to_string(), "redis://b:26379".to_string()]
        );
        let debug = format!("{:?}", store);
        assert!(debug.contains("mymaster"));
        assert!(!debug.contains("secret"));
    }

    #[tokio::test]
    #[ignore = "Requires running Redis Sentinel"]
    async fn test_redis_ping() {
        let store = RedisSentinelStore::new(&get_test_environment());
        store.ping().await.unwrap();
    }

    #[tokio::test]
    #[ignore = "Requires running Redis Sentinel"]
    async fn test_redis_set_get_delete() {
        let store = RedisSentinelStore::new(&get_test_environment());

        store.set(b"sentinel-cache:test", b"value").await.unwrap();
        assert_eq!(
            store.get(b"sentinel-cache:test").await.unwrap(),
            Some(b"value".to_vec())
        );

        assert!(store.delete(b"sentinel-cache:test").await.unwrap());
        assert!(!store.exists(b"sentinel-cache:test").await.unwrap());
    }

    #[tokio::test]
    #[ignore = "Requires running Redis Sentinel"]
    async fn test_redis_list_operations() {
        let store = RedisSentinelStore::new(&get_test_environment());
        let key: &[u8] = b"sentinel-cache:list";

        store.delete(key).await.unwrap();
        store.rpush(key, b"b").await.unwrap();
        store.lpush(key, b"a").await.unwrap();
        assert_eq!(store.llen(key).await.unwrap(), 2);

        assert_eq!(store.lpop(key).await.unwrap(), Some(b"a".to_vec()));
        assert_eq!(store.rpop(key).await.unwrap(), Some(b"b".to_vec()));
        assert_eq!(store.rpop(key).await.unwrap(), None);
    }
}
