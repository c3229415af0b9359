//! Key-value store trait.
//!
//! Defines the interface for namespace-scoped key-value storage. The same
//! shape serves both the durable store (cached connections, dirty flag) and
//! the session store (one-shot markers that die with the process).
//! Implementations live in outreach-infra.

use outreach_types::error::RepositoryError;
use outreach_types::storage::KvEntry;

/// Trait for namespace-scoped key-value storage.
///
/// Stores arbitrary JSON values keyed by namespace (the user id) and a
/// purpose key. Uses RPITIT (native async fn in traits, Rust 2024 edition).
pub trait KvStore: Send + Sync {
    /// Get a value by key. Returns None if the key does not exist.
    fn get(
        &self,
        namespace: &str,
        key: &str,
    ) -> impl std::future::Future<Output = Result<Option<serde_json::Value>, RepositoryError>> + Send;

    /// Set a value for a key (upsert).
    fn set(
        &self,
        namespace: &str,
        key: &str,
        value: &serde_json::Value,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Delete a key. No-op if key does not exist.
    fn delete(
        &self,
        namespace: &str,
        key: &str,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// List all keys in a namespace.
    fn list_keys(
        &self,
        namespace: &str,
    ) -> impl std::future::Future<Output = Result<Vec<String>, RepositoryError>> + Send;

    /// Get the full entry including timestamps.
    fn get_entry(
        &self,
        namespace: &str,
        key: &str,
    ) -> impl std::future::Future<Output = Result<Option<KvEntry>, RepositoryError>> + Send;
}
