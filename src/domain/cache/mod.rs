//! Cache domain - Cache handler contract and backing store abstraction

mod handler;
mod key;
mod readiness;
mod store;

pub use handler::{CacheHandler, CacheHandlerExt};
pub(crate) use key::display_key;
pub use key::{CacheKey, SessionKeyGenerator, TokenClaims};
pub use readiness::{
    Initialization, ReadinessState, RetryHandle, RetryPolicy, DEFAULT_RETRY_INTERVAL,
};
pub use store::CacheStore;

#[cfg(test)]
pub use store::MockCacheStore;
