//! In-memory `KvStore` for session-scoped markers.
//!
//! Entries die with the process, which is exactly the lifetime of the
//! "connections initialized" marker.

use chrono::Utc;
use dashmap::DashMap;
use outreach_core::storage::kv_store::KvStore;
use outreach_types::error::RepositoryError;
use outreach_types::storage::KvEntry;

#[derive(Debug, Default)]
pub struct MemoryKvStore {
    entries: DashMap<(String, String), KvEntry>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn entry_key(namespace: &str, key: &str) -> (String, String) {
    (namespace.to_string(), key.to_string())
}

impl KvStore for MemoryKvStore {
    async fn get(
        &self,
        namespace: &str,
        key: &str,
    ) -> Result<Option<serde_json::Value>, RepositoryError> {
        Ok(self
            .entries
            .get(&entry_key(namespace, key))
            .map(|entry| entry.value.clone()))
    }

    async fn set(
        &self,
        namespace: &str,
        key: &str,
        value: &serde_json::Value,
    ) -> Result<(), RepositoryError> {
        let now = Utc::now();
        self.entries
            .entry(entry_key(namespace, key))
            .and_modify(|entry| {
                entry.value = value.clone();
                entry.updated_at = now;
            })
            .or_insert_with(|| KvEntry {
                namespace: namespace.to_string(),
                key: key.to_string(),
                value: value.clone(),
                created_at: now,
                updated_at: now,
            });
        Ok(())
    }

    async fn delete(&self, namespace: &str, key: &str) -> Result<(), RepositoryError> {
        self.entries.remove(&entry_key(namespace, key));
        Ok(())
    }

    async fn list_keys(&self, namespace: &str) -> Result<Vec<String>, RepositoryError> {
        let mut keys: Vec<String> = self
            .entries
            .iter()
            .filter(|entry| entry.key().0 == namespace)
            .map(|entry| entry.key().1.clone())
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn get_entry(
        &self,
        namespace: &str,
        key: &str,
    ) -> Result<Option<KvEntry>, RepositoryError> {
        Ok(self
            .entries
            .get(&entry_key(namespace, key))
            .map(|entry| entry.value().clone()))
    }
}
