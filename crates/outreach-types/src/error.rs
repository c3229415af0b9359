use thiserror::Error;

/// Errors from key-value store operations (used by trait definitions in outreach-core).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database connection error")]
    Connection,

    #[error("query error: {0}")]
    Query(String),

    #[error("entity not found")]
    NotFound,

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Errors from fetching the connection list.
///
/// `Clone` because one in-flight fetch result is handed to every caller that
/// joined it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("connection source unreachable: {0}")]
    Transport(String),

    #[error("connection source returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid connection payload: {0}")]
    Decode(String),

    #[error("no user namespace is active")]
    NoNamespace,
}

/// Errors from the external message generation service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationError {
    #[error("rate limited by generation service")]
    RateLimited,

    #[error("generation request timed out")]
    Timeout,

    #[error("generation service unavailable: {0}")]
    Unavailable(String),

    #[error("generation request rejected: {0}")]
    InvalidRequest(String),

    #[error("generation service returned an empty message")]
    EmptyMessage,

    #[error("not authorized to call generation service")]
    Unauthorized,

    #[error("generation service misconfigured: {0}")]
    Configuration(String),
}

impl GenerationError {
    /// Failures that may succeed if the same request is sent again.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            GenerationError::RateLimited | GenerationError::Timeout | GenerationError::Unavailable(_)
        )
    }

    /// Failures that affect every connection, not just the current one.
    pub fn is_systemic(&self) -> bool {
        matches!(
            self,
            GenerationError::Unauthorized | GenerationError::Configuration(_)
        )
    }
}

/// Errors surfaced by the workflow orchestrator's public operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkflowError {
    #[error("invalid request: {0}")]
    Validation(String),

    #[error("a generation run is already in progress")]
    AlreadyRunning,

    #[error("no message is awaiting approval")]
    NotAwaitingApproval,

    #[error("connection cache error: {0}")]
    Cache(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repository_error_display() {
        let err = RepositoryError::Query("syntax error".to_string());
        assert_eq!(err.to_string(), "query error: syntax error");
    }

    #[test]
    fn test_fetch_error_display() {
        let err = FetchError::Status {
            status: 502,
            body: "bad gateway".to_string(),
        };
        assert!(err.to_string().contains("502"));
        assert!(err.to_string().contains("bad gateway"));
    }

    #[test]
    fn test_generation_error_classes() {
        assert!(GenerationError::RateLimited.is_transient());
        assert!(GenerationError::Unavailable("503".into()).is_transient());
        assert!(!GenerationError::EmptyMessage.is_transient());
        assert!(GenerationError::Unauthorized.is_systemic());
        assert!(!GenerationError::Timeout.is_systemic());
    }
}
