//! Sentinel Cache
//!
//! A cache client for Redis deployments fronted by Sentinel, with support for:
//! - Master discovery through a set of sentinels
//! - Readiness gating with a background retry loop
//! - String, binary, JSON and list values
//! - A no-op stub for local development

pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::{AppConfig, Profile, RedisEnvironment};
pub use domain::{
    CacheError, CacheHandler, CacheHandlerExt, CacheKey, Initialization, PersistentCookie,
    RetryPolicy, SessionKeyGenerator, TokenClaims,
};
pub use infrastructure::cache::{CacheHandlerFactory, CacheHandlerStub, StoreCacheHandler};
