//! Session cookie persisted in the cache

use std::fmt;

use serde::{Deserialize, Serialize};

/// Name/value pair of an HTTP cookie kept across requests
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PersistentCookie {
    name: String,
    value: String,
}

impl PersistentCookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    /// Renders the cookie as a `Cookie` header pair
    pub fn to_header_value(&self) -> String {
        format!("{}={}", self.name, self.value)
    }
}

impl fmt::Display for PersistentCookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PersistentCookie{{name='{}', value='{}'}}", self.name, self.value)
    }
}
