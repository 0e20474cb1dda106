//! Encoded event records as they appear on the wire.

use serde::{Deserialize, Serialize};

use beacon_core::LogKind;

/// Field keys, in the order they appear in every record.
pub mod keys {
    /// End-user identifier read from storage.
    pub const USER_ID: &str = "userId";
    /// Client identity.
    pub const TRACE_ID: &str = "traceId";
    /// Wire kind.
    pub const TYPE: &str = "type";
    /// Route, component, URL or entry path.
    pub const PATH: &str = "path";
    /// Referrer path.
    pub const REFERRER_PATH: &str = "referrerPath";
    /// Kind-specific description.
    pub const DESCRIPTION: &str = "description";
}

/// A single key/value pair of a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    /// Field key.
    pub key: String,
    /// Field value.
    pub value: String,
}

impl Field {
    /// Create a field.
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// An encoded telemetry event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Seconds since the Unix epoch.
    pub time: u64,
    /// Ordered fields.
    pub contents: Vec<Field>,
}

impl EventRecord {
    /// Look up a field value.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.contents
            .iter()
            .find(|field| field.key == key)
            .map(|field| field.value.as_str())
    }

    /// Wire kind, if the `type` field holds a known kind.
    pub fn kind(&self) -> Option<LogKind> {
        self.get(keys::TYPE).and_then(|kind| kind.parse().ok())
    }

    /// The `description` field.
    pub fn description(&self) -> Option<&str> {
        self.get(keys::DESCRIPTION)
    }
}
