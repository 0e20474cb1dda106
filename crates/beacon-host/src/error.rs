//! Error types for the interception layer.

use beacon_core::ConstructKind;
use thiserror::Error;

/// Errors related to host construct registration and dispatch.
#[derive(Debug, Error)]
pub enum HostError {
    /// A definition was handed to a factory of another family.
    #[error("Definition of kind {actual} passed to the {expected} factory")]
    KindMismatch {
        /// Family the factory registers.
        expected: ConstructKind,
        /// Family of the definition.
        actual: ConstructKind,
    },

    /// The host rejected the registration.
    #[error("Failed to register {kind} '{identifier}': {reason}")]
    Registration {
        /// Construct family.
        kind: ConstructKind,
        /// Route or component identifier.
        identifier: String,
        /// The reason for failure.
        reason: String,
    },

    /// No handler with this name exists on the definition.
    #[error("No handler '{name}' on {kind} '{identifier}'")]
    HandlerNotFound {
        /// Construct family.
        kind: ConstructKind,
        /// Route or component identifier.
        identifier: String,
        /// The handler name.
        name: String,
    },
}

/// Result type for host operations.
pub type HostResult<T> = std::result::Result<T, HostError>;
