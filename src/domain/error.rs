use thiserror::Error;

/// Boxed error carried as the cause of a wrapped failure
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors surfaced by cache handlers and their configuration
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Cache is not initialized yet, so it can't be accessed. Please try again later")]
    NotReady,

    #[error("Serialization error: {message}")]
    Serialization {
        message: String,
        #[source]
        source: BoxError,
    },

    #[error("Store error: {message}")]
    Store {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Cache store still unreachable after {attempts} attempts")]
    RetriesExhausted { attempts: u32 },

    #[error("Key generation error: {message}")]
    KeyGeneration { message: String },
}

impl CacheError {
    pub fn serialization(message: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Serialization {
            message: message.into(),
            source: source.into(),
        }
    }

    pub fn store(message: impl Into<String>) -> Self {
        Self::Store {
            message: message.into(),
            source: None,
        }
    }

    pub fn store_with(message: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Store {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn key_generation(message: impl Into<String>) -> Self {
        Self::KeyGeneration {
            message: message.into(),
        }
    }

    /// Returns true for the error raised before the handler is initialized
    pub fn is_not_ready(&self) -> bool {
        matches!(self, Self::NotReady)
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error as _;

    use super::*;

    #[test]
    fn test_not_ready_error() {
        let error = CacheError::NotReady;
        assert!(error.is_not_ready());
        assert_eq!(
            error.to_string(),
            "Cache is not initialized yet, so it can't be accessed. Please try again later"
        );
    }

    #[test]
    fn test_store_error_keeps_cause() {
        let cause = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let error = CacheError::store_with("Failed to set key [k]", cause);

        assert_eq!(error.to_string(), "Store error: Failed to set key [k]");
        assert_eq!(error.source().map(|e| e.to_string()), Some("refused".to_string()));
    }

    #[test]
    fn test_store_error_without_cause() {
        let error = CacheError::store("WRONGTYPE");
        assert!(error.source().is_none());
    }

    #[test]
    fn test_configuration_error() {
        let error = CacheError::configuration("Expected environment variable: REDIS_SENTINELS");
        assert_eq!(
            error.to_string(),
            "Configuration error: Expected environment variable: REDIS_SENTINELS"
        );
    }
}
