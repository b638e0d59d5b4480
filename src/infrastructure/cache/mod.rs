//! Cache infrastructure - Handler and store implementations

mod client;
mod factory;
mod in_memory;
mod redis;
mod stub;

pub use client::StoreCacheHandler;
pub use factory::CacheHandlerFactory;
pub use in_memory::{InMemoryStore, InMemoryStoreConfig};
pub use redis::{RedisSentinelStore, SentinelPool};
pub use stub::CacheHandlerStub;
