//! Refetch decision policy and namespace lifecycle.
//!
//! `ConnectionLoader` decides, on each page/session entry, whether the
//! cached connection list can be served as is or a network fetch is due:
//!
//! 1. Dirty flag set: fetch, then clear the flag.
//! 2. Cache empty and this session has not initialized connections: fetch.
//! 3. Otherwise: serve the cache.
//!
//! A failed fetch leaves the cache, the flag and the session marker as they
//! were. Stale-but-valid data beats an empty list after a network blip.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use outreach_types::connection::{Connection, ConnectionPatch};
use outreach_types::error::{FetchError, RepositoryError};
use outreach_types::event::{NotificationLevel, OutreachEvent};
use outreach_types::storage::{CONNECTIONS_INITIALIZED_KEY, CONNECTIONS_KEY, CacheNamespace};

use crate::event::EventBus;
use crate::service::ConnectionSource;
use crate::storage::kv_store::KvStore;

use super::connection_cache::{CacheError, ConnectionCache};
use super::fetch::FetchCoordinator;

/// Errors from loading connections.
#[derive(Debug, thiserror::Error)]
pub enum LoaderError {
    #[error("not signed in")]
    NotSignedIn,

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error("failed to fetch connections: {0}")]
    Fetch(#[from] FetchError),

    #[error("session store error: {0}")]
    Session(#[from] RepositoryError),
}

/// Outcome of the refetch policy for one entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefetchDecision {
    /// Something changed connections out-of-band; fetch and clear the flag.
    FetchChanged,
    /// First load of this session with nothing cached.
    FetchInitial,
    /// Serve from cache without network I/O.
    UseCache,
}

impl RefetchDecision {
    /// Pure decision function.
    pub fn decide(changed: bool, cache_empty: bool, session_initialized: bool) -> Self {
        if changed {
            RefetchDecision::FetchChanged
        } else if cache_empty && !session_initialized {
            RefetchDecision::FetchInitial
        } else {
            RefetchDecision::UseCache
        }
    }
}

/// Where a `load_connections` result came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadSource {
    Network,
    Cache,
}

#[derive(Debug, Clone)]
pub struct LoadedConnections {
    pub connections: Vec<Connection>,
    pub source: LoadSource,
}

/// Loads the signed-in user's connections, fetching only when needed.
///
/// `K` is the durable store shared with the cache; `M` is the session store
/// holding the one-shot "initialized" marker.
pub struct ConnectionLoader<S: ConnectionSource, K: KvStore, M: KvStore> {
    cache: Arc<ConnectionCache<K>>,
    fetcher: FetchCoordinator<S>,
    session: Arc<M>,
    event_bus: EventBus,
}

impl<S, K, M> ConnectionLoader<S, K, M>
where
    S: ConnectionSource + 'static,
    K: KvStore,
    M: KvStore,
{
    pub fn new(
        cache: Arc<ConnectionCache<K>>,
        source: Arc<S>,
        session: Arc<M>,
        event_bus: EventBus,
    ) -> Self {
        Self {
            cache,
            fetcher: FetchCoordinator::new(source),
            session,
            event_bus,
        }
    }

    pub fn cache(&self) -> &Arc<ConnectionCache<K>> {
        &self.cache
    }

    pub fn fetcher(&self) -> &FetchCoordinator<S> {
        &self.fetcher
    }

    /// Create the namespace for `user_id` and hydrate it from storage.
    pub async fn sign_in(&self, user_id: &str) -> Result<usize, LoaderError> {
        self.cache.set_namespace(user_id).await;
        let loaded = self.cache.load_from_storage().await?;
        tracing::info!(user_id, cached = loaded, "signed in");
        Ok(loaded)
    }

    /// Tear down the namespace: cache cleared, dirty flag and session marker reset.
    pub async fn sign_out(&self) -> Result<(), LoaderError> {
        let namespace = self.namespace().await?;
        self.cache.clear().await?;
        self.cache.clear_changed().await?;
        self.session
            .delete(namespace.user_id(), CONNECTIONS_INITIALIZED_KEY)
            .await?;
        tracing::info!(user_id = namespace.user_id(), "signed out");
        Ok(())
    }

    /// Flag that connections changed out-of-band; the next load refetches.
    pub async fn mark_changed(&self) -> Result<(), LoaderError> {
        self.cache.mark_changed().await?;
        Ok(())
    }

    /// Run the refetch policy and return the resulting connection list.
    pub async fn load_connections(&self) -> Result<LoadedConnections, LoaderError> {
        let namespace = self.namespace().await?;

        let changed = self.cache.is_changed().await?;
        let cache_empty = self.cache.is_empty().await;
        let session_initialized = self.session_initialized(&namespace).await?;

        let decision = RefetchDecision::decide(changed, cache_empty, session_initialized);
        tracing::debug!(
            namespace = %namespace,
            changed,
            cache_empty,
            session_initialized,
            ?decision,
            "connection refetch decision"
        );

        match decision {
            RefetchDecision::UseCache => Ok(LoadedConnections {
                connections: self.cache.get_all().await,
                source: LoadSource::Cache,
            }),
            RefetchDecision::FetchChanged | RefetchDecision::FetchInitial => {
                let connections = self.fetch_and_store(&namespace).await?;
                if decision == RefetchDecision::FetchChanged {
                    self.cache.clear_changed().await?;
                }
                Ok(LoadedConnections {
                    connections,
                    source: LoadSource::Network,
                })
            }
        }
    }

    /// Fetch regardless of the policy. Clears the dirty flag on success.
    pub async fn refresh(&self) -> Result<Vec<Connection>, LoaderError> {
        let namespace = self.namespace().await?;
        let connections = self.fetch_and_store(&namespace).await?;
        self.cache.clear_changed().await?;
        Ok(connections)
    }

    /// Patch one cached connection. Returns `false` if it is not cached.
    pub async fn update_connection(
        &self,
        id: &str,
        patch: &ConnectionPatch,
    ) -> Result<bool, LoaderError> {
        Ok(self.cache.update(id, patch).await?)
    }

    /// When the cached list was last written, if ever.
    pub async fn last_fetched_at(&self) -> Result<Option<DateTime<Utc>>, LoaderError> {
        let namespace = self.namespace().await?;
        let entry = self
            .cache
            .store()
            .get_entry(namespace.user_id(), CONNECTIONS_KEY)
            .await
            .map_err(CacheError::from)?;
        Ok(entry.map(|e| e.updated_at))
    }

    async fn namespace(&self) -> Result<CacheNamespace, LoaderError> {
        self.cache.namespace().await.ok_or(LoaderError::NotSignedIn)
    }

    async fn session_initialized(&self, namespace: &CacheNamespace) -> Result<bool, LoaderError> {
        let marker = self
            .session
            .get(namespace.user_id(), CONNECTIONS_INITIALIZED_KEY)
            .await?;
        Ok(matches!(marker, Some(serde_json::Value::Bool(true))))
    }

    async fn fetch_and_store(&self, namespace: &CacheNamespace) -> Result<Vec<Connection>, LoaderError> {
        let connections = match self.fetcher.fetch_all(namespace).await {
            Ok(connections) => connections,
            Err(err) => {
                self.event_bus.publish(OutreachEvent::notification(
                    NotificationLevel::Warning,
                    "Could not load connections",
                    err.to_string(),
                ));
                return Err(err.into());
            }
        };

        self.cache
            .set_multiple_in(namespace, connections.clone())
            .await?;
        self.session
            .set(
                namespace.user_id(),
                CONNECTIONS_INITIALIZED_KEY,
                &serde_json::Value::Bool(true),
            )
            .await?;

        tracing::info!(
            namespace = %namespace,
            count = connections.len(),
            "connections refreshed from network"
        );
        self.event_bus.publish(OutreachEvent::ConnectionsFetched {
            namespace: namespace.scoped(CONNECTIONS_KEY),
            count: connections.len(),
        });

        Ok(connections)
    }
}
