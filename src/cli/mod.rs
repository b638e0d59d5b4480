//! CLI module for the Sentinel cache
//!
//! Wires a cache handler from the `REDIS_*` environment and runs a single
//! command against it:
//! - `ping`, `get`, `set`, `del`, `exists`: key/value access
//! - `push`, `pop`, `len`: list access
//! - `session-key`: prints the session cookie key for a JWT

use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{debug, info};

use crate::config::{AppConfig, RedisEnvironment};
use crate::domain::{CacheHandler, CacheHandlerExt, SessionKeyGenerator, TokenClaims};
use crate::infrastructure::cache::CacheHandlerFactory;
use crate::infrastructure::logging;

const NIL: &str = "(nil)";

/// Sentinel cache - Redis Sentinel backed cache client
#[derive(Debug, Parser)]
#[command(name = "sentinel-cache")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Seconds to wait for the cache to become ready
    #[arg(long, global = true, default_value_t = 30)]
    pub wait_secs: u64,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand, PartialEq)]
pub enum Command {
    /// Check that the cache is reachable
    Ping,

    /// Read a value
    Get { key: String },

    /// Write a value, replacing any existing one
    Set {
        key: String,
        value: String,

        /// Expiry in seconds, 0 keeps the value forever
        #[arg(long)]
        ttl: Option<u64>,
    },

    /// Delete a key
    Del { key: String },

    /// Check whether a key exists
    Exists { key: String },

    /// Append to a list
    Push {
        key: String,
        value: String,

        /// Prepend instead of append
        #[arg(long)]
        left: bool,
    },

    /// Remove and print the last element of a list
    Pop {
        key: String,

        /// Pop the first element instead
        #[arg(long)]
        left: bool,
    },

    /// Print the length of a list
    Len { key: String },

    /// Print the session cookie key derived from a JWT
    SessionKey { token: String },
}

/// Run the CLI
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load().unwrap_or_default();
    logging::init_logging(&config.logging);

    if let Command::SessionKey { token } = &cli.command {
        println!("{}", session_key(token)?);
        return Ok(());
    }

    let environment = RedisEnvironment::from_env().context("Invalid Redis environment")?;
    info!(profile = %environment.profile(), "Starting cache client");

    let handler = CacheHandlerFactory::new().create(&environment);

    let wait = Duration::from_secs(cli.wait_secs);
    tokio::time::timeout(wait, handler.initialize().await.wait())
        .await
        .with_context(|| format!("Cache not ready after {} seconds", cli.wait_secs))??;

    let output = execute(handler.as_ref(), cli.command).await?;
    println!("{}", output);

    Ok(())
}

fn session_key(token: &str) -> anyhow::Result<String> {
    let claims = TokenClaims::from_verified_token(token)?;
    Ok(SessionKeyGenerator::new().middleware_cookie_key(&claims)?)
}

/// Runs one command against a ready handler and returns what to print
pub async fn execute(handler: &dyn CacheHandler, command: Command) -> anyhow::Result<String> {
    debug!(?command, "Executing cache command");

    let output = match command {
        Command::Ping => "PONG".to_string(),
        Command::Get { key } => handler
            .get_bytes(&key)
            .await?
            .map(|value| String::from_utf8_lossy(&value).into_owned())
            .unwrap_or_else(|| NIL.to_string()),
        Command::Set { key, value, ttl } => {
            handler
                .set_string(&key, &value, ttl.map(Duration::from_secs))
                .await?;
            "OK".to_string()
        }
        Command::Del { key } => {
            handler.delete(key.as_bytes()).await?;
            "OK".to_string()
        }
        Command::Exists { key } => handler.exists(key.as_bytes()).await?.to_string(),
        Command::Push { key, value, left } => {
            let len = if left {
                handler.lpush_string(&key, &value).await?
            } else {
                handler.rpush_string(&key, &value).await?
            };
            len.to_string()
        }
        Command::Pop { key, left } => {
            let popped = if left {
                handler.lpop_raw(key.as_bytes()).await?
            } else {
                handler.rpop_raw(key.as_bytes()).await?
            };
            popped
                .map(|value| String::from_utf8_lossy(&value).into_owned())
                .unwrap_or_else(|| NIL.to_string())
        }
        Command::Len { key } => handler.llen(key.as_bytes()).await?.to_string(),
        Command::SessionKey { token } => session_key(&token)?,
    };

    Ok(output)
}
