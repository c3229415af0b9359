//! Storage types for the outreach engine.
//!
//! Key-value entries are scoped by namespace (the signed-in user) and a
//! purpose key such as `connections`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Storage purpose for the cached connection list.
pub const CONNECTIONS_KEY: &str = "connections";

/// Storage purpose for the "connections may have changed" dirty flag.
pub const CONNECTIONS_CHANGED_KEY: &str = "connections_changed";

/// Storage purpose for the per-session "connections initialized" marker.
pub const CONNECTIONS_INITIALIZED_KEY: &str = "connections_initialized";

/// Per-user scope for cached data and flags.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheNamespace(String);

impl CacheNamespace {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self(user_id.into())
    }

    pub fn user_id(&self) -> &str {
        &self.0
    }

    /// Display form of a scoped key, `"{purpose}:{user_id}"`.
    pub fn scoped(&self, purpose: &str) -> String {
        format!("{purpose}:{}", self.0)
    }
}

impl std::fmt::Display for CacheNamespace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A key-value entry in the persistent store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KvEntry {
    pub namespace: String,
    pub key: String,
    pub value: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scoped_key_format() {
        let ns = CacheNamespace::new("user-42");
        assert_eq!(ns.scoped(CONNECTIONS_KEY), "connections:user-42");
        assert_eq!(ns.user_id(), "user-42");
        assert_eq!(ns.to_string(), "user-42");
    }
}
