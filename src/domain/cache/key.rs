//! Cache keys and session key generation

use std::borrow::Cow;

use jsonwebtoken::{DecodingKey, Validation};
use serde::Deserialize;

use crate::domain::CacheError;

/// Trait for types that can be used as cache keys
///
/// Keys are opaque byte sequences on the wire. String keys are stored as
/// their UTF-8 bytes, so `"k"` and `b"k"` address the same entry.
pub trait CacheKey: Send + Sync {
    /// Returns the key as raw bytes
    fn as_key_bytes(&self) -> &[u8];

    /// Returns a printable form of the key for logs and error messages
    fn display(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(self.as_key_bytes())
    }
}

impl CacheKey for str {
    fn as_key_bytes(&self) -> &[u8] {
        self.as_bytes()
    }

    fn display(&self) -> Cow<'_, str> {
        Cow::Borrowed(self)
    }
}

impl CacheKey for String {
    fn as_key_bytes(&self) -> &[u8] {
        self.as_bytes()
    }

    fn display(&self) -> Cow<'_, str> {
        Cow::Borrowed(self)
    }
}

impl CacheKey for [u8] {
    fn as_key_bytes(&self) -> &[u8] {
        self
    }
}

impl CacheKey for Vec<u8> {
    fn as_key_bytes(&self) -> &[u8] {
        self
    }
}

impl<const N: usize> CacheKey for [u8; N] {
    fn as_key_bytes(&self) -> &[u8] {
        self
    }
}

/// Printable form of a raw key
pub(crate) fn display_key(key: &[u8]) -> Cow<'_, str> {
    String::from_utf8_lossy(key)
}

const SESSION_KEY_PREFIX: &str = "BDJSESSIONID";
const REPLAY_ID_SCOPE: &str = "replayid";

/// Claims needed to derive a session cache key
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TokenClaims {
    /// Subject of the token
    pub sub: String,
    /// Space separated scope list
    #[serde(default)]
    pub scope: String,
}

impl TokenClaims {
    pub fn new(sub: impl Into<String>, scope: impl Into<String>) -> Self {
        Self {
            sub: sub.into(),
            scope: scope.into(),
        }
    }

    /// Reads the claims of a JWT that has already been verified upstream.
    ///
    /// Signature and expiry are not checked here.
    pub fn from_verified_token(token: &str) -> Result<Self, CacheError> {
        let mut validation = Validation::default();
        validation.insecure_disable_signature_validation();
        validation.validate_exp = false;
        validation.required_spec_claims.clear();

        jsonwebtoken::decode::<Self>(token, &DecodingKey::from_secret(&[]), &validation)
            .map(|data| data.claims)
            .map_err(|e| CacheError::key_generation(format!("Failed to read token claims: {}", e)))
    }
}

/// Builds cache keys for persisted middleware session cookies
#[derive(Debug, Clone, Default)]
pub struct SessionKeyGenerator;

impl SessionKeyGenerator {
    pub fn new() -> Self {
        Self
    }

    /// Returns `BDJSESSIONID/{sub}/{replay id}` for the given claims
    pub fn middleware_cookie_key(&self, claims: &TokenClaims) -> Result<String, CacheError> {
        let replay_id = claims
            .scope
            .split(' ')
            .find(|scope| scope.to_lowercase().starts_with(REPLAY_ID_SCOPE))
            .ok_or_else(|| CacheError::key_generation("JWT doesn't support replayId"))?;

        let guid = replay_id
            .split(':')
            .nth(1)
            .filter(|guid| !guid.is_empty())
            .ok_or_else(|| {
                CacheError::key_generation(format!("Malformed replayId scope: {}", replay_id))
            })?;

        Ok(format!("{}/{}/{}", SESSION_KEY_PREFIX, claims.sub, guid))
    }
}
