//! Core error types for Beacon.
//!
//! Errors are grouped by origin so callers can tell a bad configuration
//! apart from bad textual input.

use thiserror::Error;

/// Top-level error type for Beacon core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Error while loading or validating configuration.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A log kind name that is not part of the wire contract.
    #[error("Unknown log kind: '{0}'")]
    UnknownLogKind(String),
}

/// Errors while loading or validating a [`TrackerConfig`](crate::TrackerConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration text could not be parsed.
    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// IO error reading the configuration file.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A configuration value is not acceptable.
    #[error("Invalid configuration: {field}: {reason}")]
    Invalid {
        /// The offending field, using its wire name.
        field: &'static str,
        /// Why the value was rejected.
        reason: String,
    },
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Result type alias for configuration operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
