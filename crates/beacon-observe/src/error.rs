//! Error types for encoding and delivery.

use thiserror::Error;

/// Errors while preparing or delivering a batch.
#[derive(Debug, Error)]
pub enum ObserveError {
    /// The envelope could not be serialized.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The transport reported a failure.
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// No collection endpoint is configured.
    #[error("Server URL is not configured")]
    MissingEndpoint,
}

/// Failure reported by a [`Transport`](crate::Transport).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The request reached the host primitive and failed.
    #[error("Request failed: {0}")]
    Failed(String),

    /// The transport dropped the completion without resolving it.
    #[error("Transport dropped the request without completing it")]
    Abandoned,
}

/// Result type for observe operations.
pub type ObserveResult<T> = std::result::Result<T, ObserveError>;
