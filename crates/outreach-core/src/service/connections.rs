//! ConnectionSource trait definition.

use outreach_types::connection::Connection;
use outreach_types::error::FetchError;

/// Remote source of the authenticated user's full connection list.
///
/// No pagination contract: one call returns every record.
/// Implementations live in outreach-infra (e.g., `HttpConnectionSource`).
pub trait ConnectionSource: Send + Sync {
    /// Fetch all connections for the current user.
    fn fetch_connections(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<Connection>, FetchError>> + Send;
}
