//! MessageGenerator trait definition.

use outreach_types::error::GenerationError;
use outreach_types::generation::GenerationRequest;

/// Opaque service mapping a connection, topic and sender profile to message text.
///
/// Uses RPITIT like the other ports. The orchestrator drops the returned
/// future when a run is stopped mid-flight, so implementations must be
/// cancel-safe.
pub trait MessageGenerator: Send + Sync {
    /// Generate one outreach message.
    fn generate_message(
        &self,
        request: &GenerationRequest,
    ) -> impl std::future::Future<Output = Result<String, GenerationError>> + Send;
}
