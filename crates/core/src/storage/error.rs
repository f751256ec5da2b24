use thiserror::Error;

/// Classified failure reported by a store client.
///
/// Adapters map their native errors onto these variants by error type, never
/// by message text, so callers can rely on [`StoreError::is_conditional_check_failed`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Conditional check failed: {0}")]
    ConditionalCheckFailed(String),
    #[error("Resource not found: {0}")]
    ResourceNotFound(String),
    #[error("Throughput exceeded: {0}")]
    Throughput(String),
    #[error("Validation failed: {0}")]
    Validation(String),
    #[error("Service error {code}: {message}")]
    Service { code: String, message: String },
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Store call timed out")]
    Timeout,
}

impl StoreError {
    /// True when the store rejected a write because its precondition was false.
    pub fn is_conditional_check_failed(&self) -> bool {
        matches!(self, Self::ConditionalCheckFailed(_))
    }
}

/// Result type for store client calls.
pub type StoreResult<T> = std::result::Result<T, StoreError>;
