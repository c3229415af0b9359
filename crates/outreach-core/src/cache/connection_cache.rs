//! In-memory connection cache mirrored to the durable key-value store.
//!
//! One cache instance follows the signed-in user: `set_namespace` switches
//! scope and drops whatever the previous user had in memory. Every mutating
//! call writes through to the store before it returns, and the in-memory
//! copy is only replaced once that write succeeded.

use std::sync::Arc;

use outreach_types::connection::{Connection, ConnectionPatch};
use outreach_types::error::RepositoryError;
use outreach_types::storage::{CONNECTIONS_CHANGED_KEY, CONNECTIONS_KEY, CacheNamespace};
use tokio::sync::Mutex;

use crate::storage::kv_store::KvStore;

/// Errors from cache operations.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("no cache namespace set; sign in first")]
    NamespaceNotSet,

    #[error("namespace changed from '{expected}' while the operation was pending")]
    NamespaceChanged { expected: String },

    #[error("storage error: {0}")]
    Storage(#[from] RepositoryError),
}

#[derive(Default)]
struct CacheInner {
    namespace: Option<CacheNamespace>,
    connections: Vec<Connection>,
}

/// Authoritative in-memory view of one user's connections.
///
/// The tokio mutex is held across the store write, so concurrent
/// read-modify-write sequences (`update`, `set_multiple`) serialize.
pub struct ConnectionCache<K: KvStore> {
    store: Arc<K>,
    inner: Mutex<CacheInner>,
}

impl<K: KvStore> ConnectionCache<K> {
    pub fn new(store: Arc<K>) -> Self {
        Self {
            store,
            inner: Mutex::new(CacheInner::default()),
        }
    }

    /// Switch to `user_id`'s namespace, clearing in-memory state.
    pub async fn set_namespace(&self, user_id: &str) {
        let mut inner = self.inner.lock().await;
        let namespace = CacheNamespace::new(user_id);
        tracing::debug!(
            from = inner.namespace.as_ref().map(|n| n.user_id()),
            to = namespace.user_id(),
            "switching connection cache namespace"
        );
        inner.namespace = Some(namespace);
        inner.connections.clear();
    }

    /// The active namespace, if any.
    pub async fn namespace(&self) -> Option<CacheNamespace> {
        self.inner.lock().await.namespace.clone()
    }

    /// Populate memory from the durable store. No network I/O.
    ///
    /// Returns the number of records loaded. A missing value is a no-op;
    /// an unreadable one is logged and treated as missing.
    pub async fn load_from_storage(&self) -> Result<usize, CacheError> {
        let mut inner = self.inner.lock().await;
        let namespace = inner.namespace.clone().ok_or(CacheError::NamespaceNotSet)?;

        let Some(value) = self.store.get(namespace.user_id(), CONNECTIONS_KEY).await? else {
            tracing::debug!(namespace = %namespace, "no stored connections");
            return Ok(0);
        };

        match serde_json::from_value::<Vec<Connection>>(value) {
            Ok(connections) => {
                inner.connections = connections;
                tracing::debug!(
                    namespace = %namespace,
                    count = inner.connections.len(),
                    "loaded connections from storage"
                );
                Ok(inner.connections.len())
            }
            Err(err) => {
                tracing::warn!(
                    namespace = %namespace,
                    "ignoring unreadable stored connections: {err}"
                );
                Ok(0)
            }
        }
    }

    /// Snapshot of every cached connection.
    pub async fn get_all(&self) -> Vec<Connection> {
        self.inner.lock().await.connections.clone()
    }

    pub async fn get(&self, id: &str) -> Option<Connection> {
        self.inner
            .lock()
            .await
            .connections
            .iter()
            .find(|c| c.id == id)
            .cloned()
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.connections.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.connections.is_empty()
    }

    /// Replace the whole cache and persist it.
    ///
    /// A later record with an already-seen id replaces the earlier one.
    pub async fn set_multiple(&self, connections: Vec<Connection>) -> Result<(), CacheError> {
        let mut inner = self.inner.lock().await;
        let namespace = inner.namespace.clone().ok_or(CacheError::NamespaceNotSet)?;
        let deduped = dedupe_by_id(connections);
        self.persist(&namespace, &deduped).await?;
        inner.connections = deduped;
        Ok(())
    }

    /// Like `set_multiple`, but only if `expected` is still the active namespace.
    ///
    /// Used for network results, which must not land in another user's cache
    /// after a sign-out/sign-in during the fetch.
    pub async fn set_multiple_in(
        &self,
        expected: &CacheNamespace,
        connections: Vec<Connection>,
    ) -> Result<(), CacheError> {
        let mut inner = self.inner.lock().await;
        if inner.namespace.as_ref() != Some(expected) {
            return Err(CacheError::NamespaceChanged {
                expected: expected.user_id().to_string(),
            });
        }
        let deduped = dedupe_by_id(connections);
        self.persist(expected, &deduped).await?;
        inner.connections = deduped;
        Ok(())
    }

    /// Merge `patch` into the connection with `id` and persist.
    ///
    /// Returns `Ok(false)` without touching storage if the id is absent.
    pub async fn update(&self, id: &str, patch: &ConnectionPatch) -> Result<bool, CacheError> {
        let mut inner = self.inner.lock().await;
        let namespace = inner.namespace.clone().ok_or(CacheError::NamespaceNotSet)?;

        let Some(pos) = inner.connections.iter().position(|c| c.id == id) else {
            tracing::debug!(namespace = %namespace, id, "update for unknown connection ignored");
            return Ok(false);
        };

        let mut updated = inner.connections.clone();
        if !updated[pos].apply(patch) {
            return Ok(true);
        }
        self.persist(&namespace, &updated).await?;
        inner.connections = updated;
        Ok(true)
    }

    /// Drop cached connections from memory and storage.
    pub async fn clear(&self) -> Result<(), CacheError> {
        let mut inner = self.inner.lock().await;
        if let Some(namespace) = &inner.namespace {
            self.store.delete(namespace.user_id(), CONNECTIONS_KEY).await?;
        }
        inner.connections.clear();
        Ok(())
    }

    // -- Dirty flag --

    /// Record that connections may have changed since the last full fetch.
    pub async fn mark_changed(&self) -> Result<(), CacheError> {
        let namespace = self.require_namespace().await?;
        self.store
            .set(
                namespace.user_id(),
                CONNECTIONS_CHANGED_KEY,
                &serde_json::Value::Bool(true),
            )
            .await?;
        tracing::debug!(namespace = %namespace, "connections marked as changed");
        Ok(())
    }

    pub async fn is_changed(&self) -> Result<bool, CacheError> {
        let namespace = self.require_namespace().await?;
        let value = self
            .store
            .get(namespace.user_id(), CONNECTIONS_CHANGED_KEY)
            .await?;
        Ok(matches!(value, Some(serde_json::Value::Bool(true))))
    }

    pub async fn clear_changed(&self) -> Result<(), CacheError> {
        let namespace = self.require_namespace().await?;
        self.store
            .delete(namespace.user_id(), CONNECTIONS_CHANGED_KEY)
            .await?;
        Ok(())
    }

    /// The durable store backing this cache.
    pub fn store(&self) -> &Arc<K> {
        &self.store
    }

    async fn require_namespace(&self) -> Result<CacheNamespace, CacheError> {
        self.namespace().await.ok_or(CacheError::NamespaceNotSet)
    }

    async fn persist(
        &self,
        namespace: &CacheNamespace,
        connections: &[Connection],
    ) -> Result<(), CacheError> {
        let value = serde_json::to_value(connections)
            .map_err(|e| RepositoryError::Serialization(e.to_string()))?;
        self.store
            .set(namespace.user_id(), CONNECTIONS_KEY, &value)
            .await?;
        Ok(())
    }
}

fn dedupe_by_id(connections: Vec<Connection>) -> Vec<Connection> {
    let mut out: Vec<Connection> = Vec::with_capacity(connections.len());
    for conn in connections {
        match out.iter_mut().find(|c| c.id == conn.id) {
            Some(existing) => *existing = conn,
            None => out.push(conn),
        }
    }
    out
}
