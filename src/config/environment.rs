//! Redis connection settings read from `REDIS_*` environment variables

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

use crate::domain::{CacheError, RetryPolicy};

const ENV_PREFIX: &str = "REDIS";

/// Deployment profile selecting the real store or the no-op stub
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Profile {
    /// Local development, no backing store
    Local,
    /// Redis Sentinel backed store
    #[default]
    Server,
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Profile::Local => write!(f, "local"),
            Profile::Server => write!(f, "server"),
        }
    }
}

impl FromStr for Profile {
    type Err = std::convert::Infallible;

    /// `local` (any case) selects `Local`, everything else `Server`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("local") {
            Ok(Profile::Local)
        } else {
            Ok(Profile::Server)
        }
    }
}

/// Variables as read from the environment, before validation
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawEnvironment {
    profile: Option<String>,
    mastername: Option<String>,
    password: Option<String>,
    sentinels: Option<String>,
    retry_interval_secs: Option<String>,
    retry_max_attempts: Option<String>,
}

/// Connection settings for the Sentinel backed cache
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedisEnvironment {
    master_name: String,
    password: Option<String>,
    sentinels: BTreeSet<String>,
    profile: Profile,
    retry_policy: RetryPolicy,
}

impl RedisEnvironment {
    /// Settings for the local profile
    pub fn local() -> Self {
        Self {
            master_name: String::new(),
            password: None,
            sentinels: BTreeSet::new(),
            profile: Profile::Local,
            retry_policy: RetryPolicy::default(),
        }
    }

    /// Settings for the server profile
    pub fn server<I, S>(master_name: impl Into<String>, sentinels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            master_name: master_name.into(),
            password: None,
            sentinels: sentinels.into_iter().map(Into::into).collect(),
            profile: Profile::Server,
            retry_policy: RetryPolicy::default(),
        }
    }

    /// Sets the master password
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Sets the startup retry policy
    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    /// Reads the settings from the process environment
    pub fn from_env() -> Result<Self, CacheError> {
        Self::load(config::Environment::with_prefix(ENV_PREFIX))
    }

    /// Reads the settings from the given variables instead of the process environment
    pub fn from_vars<I, K, V>(vars: I) -> Result<Self, CacheError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let vars: HashMap<String, String> = vars
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();

        Self::load(config::Environment::with_prefix(ENV_PREFIX).source(Some(vars)))
    }

    fn load(source: config::Environment) -> Result<Self, CacheError> {
        let raw: RawEnvironment = config::Config::builder()
            .add_source(source)
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| {
                CacheError::configuration(format!("Unable to read environment: {}", e))
            })?;

        Self::validate(raw)
    }

    fn validate(raw: RawEnvironment) -> Result<Self, CacheError> {
        let retry_policy = parse_retry_policy(&raw)?;

        let profile = match raw.profile {
            Some(profile) => require("REDIS_PROFILE", Some(profile))?
                .parse()
                .unwrap_or_default(),
            None => Profile::Server,
        };

        if profile == Profile::Local {
            return Ok(Self::local().with_retry_policy(retry_policy));
        }

        let master_name = require("REDIS_MASTERNAME", raw.mastername)?;
        let sentinels: BTreeSet<String> = require("REDIS_SENTINELS", raw.sentinels)?
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();

        if sentinels.is_empty() {
            return Err(CacheError::configuration(
                "Expected environment variable: REDIS_SENTINELS",
            ));
        }

        // unset means no password, set but empty is a mistake
        let password = match raw.password {
            Some(password) => Some(require("REDIS_PASSWORD", Some(password))?),
            None => None,
        };

        Ok(Self {
            master_name,
            password,
            sentinels,
            profile,
            retry_policy,
        })
    }

    pub fn master_name(&self) -> &str {
        &self.master_name
    }

    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }

    pub fn sentinels(&self) -> &BTreeSet<String> {
        &self.sentinels
    }

    pub fn profile(&self) -> Profile {
        self.profile
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry_policy
    }
}

fn require(name: &str, value: Option<String>) -> Result<String, CacheError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| CacheError::configuration(format!("Expected environment variable: {}", name)))
}

fn parse_retry_policy(raw: &RawEnvironment) -> Result<RetryPolicy, CacheError> {
    let mut policy = RetryPolicy::default();

    if let Some(value) = &raw.retry_interval_secs {
        let secs: u64 = value.trim().parse().map_err(|_| {
            CacheError::configuration(format!("Invalid REDIS_RETRY_INTERVAL_SECS: {}", value))
        })?;
        policy = policy.with_interval(Duration::from_secs(secs));
    }

    if let Some(value) = &raw.retry_max_attempts {
        let attempts: u32 = value.trim().parse().map_err(|_| {
            CacheError::configuration(format!("Invalid REDIS_RETRY_MAX_ATTEMPTS: {}", value))
        })?;
        policy = policy.with_max_attempts(attempts);
    }

    Ok(policy)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server_vars() -> Vec<(&'static str, &'static str)> {
        vec![
            ("REDIS_MASTERNAME", "mymaster"),
            ("REDIS_SENTINELS", "sentinel-1:26379, sentinel-2:26379,sentinel-1:26379"),
        ]
    }

    #[test]
    fn test_profile_from_str() {
        assert_eq!("local".parse::<Profile>().unwrap(), Profile::Local);
        assert_eq!("LOCAL".parse::<Profile>().unwrap(), Profile::Local);
        assert_eq!("server".parse::<Profile>().unwrap(), Profile::Server);
        assert_eq!("anything".parse::<Profile>().unwrap(), Profile::Server);
    }

    #[test]
    fn test_profile_display() {
        assert_eq!(Profile::Local.to_string(), "local");
        assert_eq!(Profile::Server.to_string(), "server");
    }

    #[test]
    fn test_server_environment() {
        let env = RedisEnvironment::from_vars(server_vars()).unwrap();

        assert_eq!(env.profile(), Profile::Server);
        assert_eq!(env.master_name(), "mymaster");
        assert_eq!(env.password(), None);
        assert_eq!(
            env.sentinels().iter().cloned().collect::<Vec<_>>(),
            vec!["sentinel-1:26379".to_string(), "sentinel-2:26379".to_string()]
        );
        assert_eq!(env.retry_policy(), RetryPolicy::default());
    }

    #[test]
    fn test_server_environment_with_password() {
        let mut vars = server_vars();
        vars.push(("REDIS_PASSWORD", "secret"));

        let env = RedisEnvironment::from_vars(vars).unwrap();
        assert_eq!(env.password(), Some("secret"));
    }

    #[test]
    fn test_local_profile_needs_no_connection_settings() {
        let env = RedisEnvironment::from_vars([("REDIS_PROFILE", "local")]).unwrap();

        assert_eq!(env.profile(), Profile::Local);
        assert!(env.sentinels().is_empty());
        assert_eq!(env, RedisEnvironment::local());
    }

    #[test]
    fn test_server_profile_is_default() {
        let result = RedisEnvironment::from_vars(Vec::<(String, String)>::new());

        let error = result.unwrap_err();
        assert_eq!(
            error.to_string(),
            "Configuration error: Expected environment variable: REDIS_MASTERNAME"
        );
    }

    #[test]
    fn test_missing_sentinels() {
        let result = RedisEnvironment::from_vars([("REDIS_MASTERNAME", "mymaster")]);

        assert!(matches!(result, Err(CacheError::Configuration { .. })));
    }

    #[test]
    fn test_empty_variable_counts_as_missing() {
        let result = RedisEnvironment::from_vars([
            ("REDIS_MASTERNAME", ""),
            ("REDIS_SENTINELS", "sentinel:26379"),
        ]);

        assert!(matches!(result, Err(CacheError::Configuration { .. })));
    }

    #[test]
    fn test_sentinel_list_of_separators_only() {
        let result = RedisEnvironment::from_vars([
            ("REDIS_MASTERNAME", "mymaster"),
            ("REDIS_SENTINELS", " , ,"),
        ]);

        assert!(result.is_err());
    }

    #[test]
    fn test_retry_policy_from_environment() {
        let mut vars = server_vars();
        vars.push(("REDIS_RETRY_INTERVAL_SECS", "2"));
        vars.push(("REDIS_RETRY_MAX_ATTEMPTS", "5"));

        let env = RedisEnvironment::from_vars(vars).unwrap();
        assert_eq!(
            env.retry_policy(),
            RetryPolicy::default()
                .with_interval(Duration::from_secs(2))
                .with_max_attempts(5)
        );
    }

    #[test]
    fn test_invalid_retry_interval() {
        let mut vars = server_vars();
        vars.push(("REDIS_RETRY_INTERVAL_SECS", "soon"));

        let result = RedisEnvironment::from_vars(vars);
        assert!(matches!(result, Err(CacheError::Configuration { .. })));
    }

    #[test]
    fn test_invalid_retry_max_attempts() {
        let mut vars = server_vars();
        vars.push(("REDIS_RETRY_MAX_ATTEMPTS", "-1"));

        let result = RedisEnvironment::from_vars(vars);
        assert!(matches!(result, Err(CacheError::Configuration { .. })));

        let mut vars = server_vars();
        vars.push(("REDIS_RETRY_MAX_ATTEMPTS", "many"));

        let error = RedisEnvironment::from_vars(vars).unwrap_err();
        assert_eq!(
            error.to_string(),
            "Configuration error: Invalid REDIS_RETRY_MAX_ATTEMPTS: many"
        );
    }

    #[test]
    fn test_zero_retry_max_attempts() {
        let mut vars = server_vars();
        vars.push(("REDIS_RETRY_MAX_ATTEMPTS", "0"));

        let env = RedisEnvironment::from_vars(vars).unwrap();
        assert_eq!(env.retry_policy().max_attempts, Some(0));
    }

    #[test]
    fn test_empty_password_is_rejected() {
        let mut vars = server_vars();
        vars.push(("REDIS_PASSWORD", ""));

        let error = RedisEnvironment::from_vars(vars).unwrap_err();
        assert_eq!(
            error.to_string(),
            "Configuration error: Expected environment variable: REDIS_PASSWORD"
        );
    }

    #[test]
    fn test_empty_profile_is_rejected() {
        let mut vars = server_vars();
        vars.push(("REDIS_PROFILE", ""));

        let result = RedisEnvironment::from_vars(vars);
        assert!(matches!(result, Err(CacheError::Configuration { .. })));
    }

    #[test]
    fn test_builder_constructors() {
        let env = RedisEnvironment::server("mymaster", ["s1:26379", "s2:26379"])
            .with_password("pw")
            .with_retry_policy(RetryPolicy::default().with_max_attempts(1));

        assert_eq!(env.profile(), Profile::Server);
        assert_eq!(env.sentinels().len(), 2);
        assert_eq!(env.password(), Some("pw"));
        assert_eq!(env.retry_policy().max_attempts, Some(1));
    }
}
