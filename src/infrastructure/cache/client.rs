//! Readiness-gated cache handler over a backing store

use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::domain::cache::display_key;
use crate::domain::{
    CacheError, CacheHandler, CacheStore, Initialization, ReadinessState, RetryHandle,
    RetryPolicy,
};

struct Shared<S> {
    store: S,
    state: watch::Sender<ReadinessState>,
    retry_policy: RetryPolicy,
}

/// Cache handler delegating every operation to a `CacheStore`
///
/// Operations fail with `CacheError::NotReady` until `initialize` has seen
/// the store answer a liveness probe.
pub struct StoreCacheHandler<S: CacheStore + 'static> {
    shared: Arc<Shared<S>>,
}

impl<S: CacheStore + 'static> fmt::Debug for StoreCacheHandler<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreCacheHandler")
            .field("state", &*self.shared.state.borrow())
            .field("retry_policy", &self.shared.retry_policy)
            .finish()
    }
}

impl<S: CacheStore + 'static> StoreCacheHandler<S> {
    /// Creates a handler retrying with the default policy
    pub fn new(store: S) -> Self {
        Self::with_retry_policy(store, RetryPolicy::default())
    }

    /// Creates a handler with a custom startup retry policy
    pub fn with_retry_policy(store: S, retry_policy: RetryPolicy) -> Self {
        let (state, _) = watch::channel(ReadinessState::Pending);

        Self {
            shared: Arc::new(Shared {
                store,
                state,
                retry_policy,
            }),
        }
    }

    /// Returns the backing store
    pub fn store(&self) -> &S {
        &self.shared.store
    }

    /// Current readiness state
    pub fn state(&self) -> ReadinessState {
        *self.shared.state.borrow()
    }

    fn ensure_ready(&self) -> Result<(), CacheError> {
        if self.shared.state.borrow().is_ready() {
            Ok(())
        } else {
            debug!("Cache operation rejected, handler is not ready");
            Err(CacheError::NotReady)
        }
    }

    fn retry_handle(&self) -> RetryHandle {
        RetryHandle::new(self.shared.state.subscribe())
    }
}

fn store_failure(message: String, error: CacheError) -> CacheError {
    error!(error = %error, "{}", message);
    CacheError::store_with(message, error)
}

/// Probes the store until it answers, the policy gives up or the handler is dropped
async fn retry_until_ready<S: CacheStore + 'static>(shared: Weak<Shared<S>>) {
    let mut attempt: u32 = 0;

    loop {
        attempt += 1;

        let Some(shared) = shared.upgrade() else {
            debug!(attempt, "Cache handler dropped, stopping liveness probe");
            return;
        };

        shared.state.send_replace(ReadinessState::Probing { attempt });
        warn!(attempt, "Retrying cache store access");

        match shared.store.ping().await {
            Ok(()) => {
                shared.state.send_replace(ReadinessState::Ready);
                info!(attempt, "Cache store reachable, handler is ready");
                return;
            }
            Err(e) if shared.retry_policy.is_exhausted(attempt) => {
                error!(attempt, error = %e, "Giving up on cache store access");
                shared
                    .state
                    .send_replace(ReadinessState::Exhausted { attempts: attempt });
                return;
            }
            Err(e) => {
                debug!(attempt, error = %e, "Cache store still unreachable");
            }
        }

        let interval = shared.retry_policy.interval;
        drop(shared);
        tokio::time::sleep(interval).await;
    }
}

#[async_trait]
impl<S: CacheStore + 'static> CacheHandler for StoreCacheHandler<S> {
    async fn initialize(&self) -> Initialization {
        let claimed = self.shared.state.send_if_modified(|state| match state {
            ReadinessState::Pending | ReadinessState::Exhausted { .. } => {
                *state = ReadinessState::Probing { attempt: 0 };
                true
            }
            _ => false,
        });

        if !claimed {
            let ready = self.shared.state.borrow().is_ready();
            return if ready {
                Initialization::Ready
            } else {
                Initialization::Retrying(self.retry_handle())
            };
        }

        match self.shared.store.ping().await {
            Ok(()) => {
                self.shared.state.send_replace(ReadinessState::Ready);
                info!("Cache store reachable, handler is ready");
                Initialization::Ready
            }
            Err(e) => {
                error!(
                    error = %e,
                    "Unable to access cache store - will enter retry mode"
                );
                let handle = self.retry_handle();

                if self.shared.retry_policy.is_exhausted(0) {
                    error!("Retries disabled, giving up on cache store access");
                    self.shared
                        .state
                        .send_replace(ReadinessState::Exhausted { attempts: 0 });
                } else {
                    tokio::spawn(retry_until_ready(Arc::downgrade(&self.shared)));
                }

                Initialization::Retrying(handle)
            }
        }
    }

    fn is_ready(&self) -> bool {
        self.shared.state.borrow().is_ready()
    }

    async fn set_raw(
        &self,
        key: &[u8],
        value: &[u8],
        ttl: Option<Duration>,
    ) -> Result<(), CacheError> {
        self.ensure_ready()?;
        let store = &self.shared.store;

        let result: Result<(), CacheError> = async {
            if store.exists(key).await? {
                store.delete(key).await?;
            }

            store.set(key, value).await?;

            if let Some(ttl) = ttl.filter(|ttl| !ttl.is_zero()) {
                store.expire(key, ttl).await?;
            }

            Ok(())
        }
        .await;

        result.map_err(|e| store_failure(format!("Failed to set key [{}]", display_key(key)), e))
    }

    async fn get_raw(&self, key: &[u8]) -> Result<Option<Vec<u8>>, CacheError> {
        self.ensure_ready()?;

        self.shared
            .store
            .get(key)
            .await
            .map_err(|e| store_failure(format!("Failed to get key [{}]", display_key(key)), e))
    }

    async fn exists(&self, key: &[u8]) -> Result<bool, CacheError> {
        self.ensure_ready()?;

        self.shared
            .store
            .exists(key)
            .await
            .map_err(|e| store_failure(format!("Failed to check key [{}]", display_key(key)), e))
    }

    async fn delete(&self, key: &[u8]) -> Result<(), CacheError> {
        self.ensure_ready()?;

        self.shared
            .store
            .delete(key)
            .await
            .map(|_| ())
            .map_err(|e| store_failure(format!("Failed to delete key [{}]", display_key(key)), e))
    }

    async fn rpush_raw(&self, key: &[u8], value: &[u8]) -> Result<u64, CacheError> {
        self.ensure_ready()?;

        self.shared
            .store
            .rpush(key, value)
            .await
            .map_err(|e| store_failure(format!("Failed to rpush key [{}]", display_key(key)), e))
    }

    async fn lpush_raw(&self, key: &[u8], value: &[u8]) -> Result<u64, CacheError> {
        self.ensure_ready()?;

        self.shared
            .store
            .lpush(key, value)
            .await
            .map_err(|e| store_failure(format!("Failed to lpush key [{}]", display_key(key)), e))
    }

    async fn rpop_raw(&self, key: &[u8]) -> Result<Option<Vec<u8>>, CacheError> {
        self.ensure_ready()?;

        self.shared
            .store
            .rpop(key)
            .await
            .map_err(|e| store_failure(format!("Failed to rpop key [{}]", display_key(key)), e))
    }

    async fn lpop_raw(&self, key: &[u8]) -> Result<Option<Vec<u8>>, CacheError> {
        self.ensure_ready()?;

        self.shared
            .store
            .lpop(key)
            .await
            .map_err(|e| store_failure(format!("Failed to lpop key [{}]", display_key(key)), e))
    }

    async fn llen(&self, key: &[u8]) -> Result<u64, CacheError> {
        self.ensure_ready()?;

        self.shared.store.llen(key).await.map_err(|e| {
            store_failure(format!("Failed to get llen for key [{}]", display_key(key)), e)
        })
    }
}
