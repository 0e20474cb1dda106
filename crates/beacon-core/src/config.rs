//! Configuration for the tracking client.
//!
//! The recognized options mirror what the host passes at initialization:
//! `serverUrl`, `appId`, `uIdStorageKey` and `sendLog`. Every option is
//! optional and falls back to a default.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};

/// Collection endpoint used when no `serverUrl` is supplied.
pub const DEFAULT_SERVER_URL: &str =
    "https://api2.middleware.sit.marriott.com.cn/frontend-log-service/api/logs";

/// Storage key holding the current end-user identifier.
pub const DEFAULT_UID_STORAGE_KEY: &str = "userId";

/// How flushed batches leave the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryMode {
    /// Batches are signed and posted to the collection endpoint.
    Remote,
    /// Batches are signed, logged locally and discarded.
    LocalOnly,
}

/// Configuration for the tracking client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TrackerConfig {
    /// Collection endpoint.
    ///
    /// `None` only when explicitly cleared with [`TrackerConfig::without_endpoint`];
    /// an empty string in a config file falls back to the default.
    #[serde(deserialize_with = "endpoint_or_default")]
    pub server_url: Option<String>,

    /// Value of the envelope `source` field.
    pub app_id: String,

    /// Storage key used to read the end-user identifier for each record.
    #[serde(rename = "uIdStorageKey")]
    pub uid_storage_key: String,

    /// Post batches to the endpoint. When false, batches are only logged.
    pub send_log: bool,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            server_url: Some(DEFAULT_SERVER_URL.to_string()),
            app_id: String::new(),
            uid_storage_key: DEFAULT_UID_STORAGE_KEY.to_string(),
            send_log: false,
        }
    }
}

impl TrackerConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the collection endpoint. An empty URL keeps the default.
    pub fn with_server_url(mut self, url: impl Into<String>) -> Self {
        let url = url.into();
        self.server_url = Some(if url.is_empty() {
            DEFAULT_SERVER_URL.to_string()
        } else {
            url
        });
        self
    }

    /// Clear the collection endpoint.
    pub fn without_endpoint(mut self) -> Self {
        self.server_url = None;
        self
    }

    /// Set the envelope source.
    pub fn with_app_id(mut self, app_id: impl Into<String>) -> Self {
        self.app_id = app_id.into();
        self
    }

    /// Set the storage key for the end-user identifier.
    pub fn with_uid_storage_key(mut self, key: impl Into<String>) -> Self {
        self.uid_storage_key = key.into();
        self
    }

    /// Enable or disable posting batches to the endpoint.
    pub fn with_send_log(mut self, enabled: bool) -> Self {
        self.send_log = enabled;
        self
    }

    /// How flushed batches are delivered.
    pub fn delivery_mode(&self) -> DeliveryMode {
        if self.send_log {
            DeliveryMode::Remote
        } else {
            DeliveryMode::LocalOnly
        }
    }

    /// Parse a configuration from TOML text.
    pub fn from_toml_str(text: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration from a TOML file.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Check that the configuration can be used.
    pub fn validate(&self) -> ConfigResult<()> {
        if let Some(url) = &self.server_url {
            if !(url.starts_with("https://") || url.starts_with("http://")) {
                return Err(ConfigError::Invalid {
                    field: "serverUrl",
                    reason: format!("expected an http(s) URL, got '{}'", url),
                });
            }
        }

        if self.uid_storage_key.is_empty() {
            return Err(ConfigError::Invalid {
                field: "uIdStorageKey",
                reason: "must not be empty".to_string(),
            });
        }

        Ok(())
    }
}

fn endpoint_or_default<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let url = Option::<String>::deserialize(deserializer)?;
    Ok(Some(match url {
        Some(url) if !url.is_empty() => url,
        _ => DEFAULT_SERVER_URL.to_string(),
    }))
}
