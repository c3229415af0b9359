//! Deduplicated "fetch all connections" coordinator.
//!
//! Concurrent callers asking for the same namespace share one in-flight
//! network call. The shared future clears its own slot when it settles, so
//! the next caller after a failure starts a fresh fetch instead of
//! replaying the stale error.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use outreach_types::connection::Connection;
use outreach_types::error::FetchError;
use outreach_types::storage::CacheNamespace;

use crate::service::ConnectionSource;

type SharedFetch = Shared<BoxFuture<'static, Result<Arc<Vec<Connection>>, FetchError>>>;

/// One optional in-flight fetch per namespace.
pub struct FetchCoordinator<S: ConnectionSource> {
    source: Arc<S>,
    /// Never held across an await point.
    in_flight: Arc<Mutex<HashMap<String, SharedFetch>>>,
}

impl<S: ConnectionSource + 'static> FetchCoordinator<S> {
    pub fn new(source: Arc<S>) -> Self {
        Self {
            source,
            in_flight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Fetch every connection for `namespace`, joining an in-flight call if
    /// one exists.
    ///
    /// Every joined caller sees the same success value or the same error.
    pub async fn fetch_all(&self, namespace: &CacheNamespace) -> Result<Vec<Connection>, FetchError> {
        let fetch = {
            let mut slots = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
            match slots.get(namespace.user_id()) {
                Some(existing) => {
                    tracing::debug!(namespace = %namespace, "joining in-flight connection fetch");
                    existing.clone()
                }
                None => {
                    let fetch = self.start_fetch(namespace.user_id().to_string());
                    slots.insert(namespace.user_id().to_string(), fetch.clone());
                    fetch
                }
            }
        };

        fetch.await.map(|connections| connections.as_ref().clone())
    }

    /// Whether a fetch for `namespace` is currently in flight.
    pub fn in_flight(&self, namespace: &CacheNamespace) -> bool {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(namespace.user_id())
    }

    fn start_fetch(&self, key: String) -> SharedFetch {
        let source = Arc::clone(&self.source);
        let slots = Arc::clone(&self.in_flight);

        tracing::debug!(namespace = key.as_str(), "starting connection fetch");

        async move {
            let result = source.fetch_connections().await.map(Arc::new);
            slots
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&key);
            match &result {
                Ok(connections) => tracing::debug!(
                    namespace = key.as_str(),
                    count = connections.len(),
                    "connection fetch settled"
                ),
                Err(err) => tracing::warn!(namespace = key.as_str(), "connection fetch failed: {err}"),
            }
            result
        }
        .boxed()
        .shared()
    }
}
