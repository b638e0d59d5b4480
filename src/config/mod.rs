//! Configuration - logging settings and Redis connection environment

mod app_config;
mod environment;

pub use app_config::{AppConfig, LogFormat, LoggingConfig};
pub use environment::{Profile, RedisEnvironment};
