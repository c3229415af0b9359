//! Connection caching: the per-user cache, fetch deduplication, and the
//! refetch policy that ties them together.

pub mod connection_cache;
pub mod fetch;
pub mod loader;

pub use connection_cache::{CacheError, ConnectionCache};
pub use fetch::FetchCoordinator;
pub use loader::{ConnectionLoader, LoadSource, LoadedConnections, LoaderError, RefetchDecision};
