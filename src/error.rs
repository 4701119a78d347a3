use thiserror::Error;

/// Result alias used across the gateway.
pub type Result<T> = std::result::Result<T, GatewayError>;

/// Failures surfaced by the client, writers and orchestrator.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum GatewayError {
    /// The endpoint could not be reached. Fatal to an ingestion run.
    #[error("connection error: {0}")]
    Connection(String),

    /// The server rejected a single query (unknown name, bad params, ...).
    #[error("query error: {0}")]
    Query(String),

    /// Input had the wrong shape; raised before any I/O.
    #[error("validation error: {0}")]
    Validation(String),

    /// The blocking worker running a call panicked or was cancelled.
    #[error("worker error: {0}")]
    Worker(String),
}

impl GatewayError {
    /// Whether this failure should abort a whole ingestion run instead of
    /// being recorded against a single record.
    pub fn is_fatal(&self) -> bool {
        matches!(self, GatewayError::Connection(_) | GatewayError::Validation(_))
    }
}
