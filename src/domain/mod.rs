//! Domain layer - Cache contracts, keys and cached value types

pub mod cache;
pub mod cookie;
pub mod error;

pub use cache::{
    CacheHandler, CacheHandlerExt, CacheKey, CacheStore, Initialization, ReadinessState,
    RetryHandle, RetryPolicy, SessionKeyGenerator, TokenClaims,
};
pub use cookie::PersistentCookie;
pub use error::{BoxError, CacheError};
