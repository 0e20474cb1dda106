//! Subcommand implementations.

pub mod sign;
pub mod simulate;
pub mod validate;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use tracing::debug;

use beacon_core::TrackerConfig;

use crate::OutputFormat;

/// Where the tracker configuration comes from.
///
/// The file is read first, then the endpoint override is applied on top.
#[derive(Args, Debug, Default, Clone)]
pub struct ConfigSource {
    /// Tracker configuration file (TOML)
    #[arg(short, long, global = true, env = "BEACON_CONFIG")]
    pub config: Option<PathBuf>,

    /// Collection endpoint, overriding serverUrl from the file
    #[arg(long, global = true, env = "BEACON_SERVER_URL")]
    pub server_url: Option<String>,
}

impl ConfigSource {
    /// Resolve the configuration, falling back to the defaults.
    pub fn load(&self) -> Result<TrackerConfig> {
        let mut config = match &self.config {
            Some(path) => TrackerConfig::load(path).with_context(|| {
                format!("Failed to load configuration from {}", path.display())
            })?,
            None => TrackerConfig::default(),
        };

        if let Some(url) = &self.server_url {
            config = config.with_server_url(url.as_str());
            config.validate().context("Invalid --server-url")?;
        }

        debug!(
            app_id = %config.app_id,
            server_url = ?config.server_url,
            mode = ?config.delivery_mode(),
            "Resolved configuration"
        );
        Ok(config)
    }
}

/// Print `value` as JSON in the requested layout.
pub fn print_json<T: Serialize>(value: &T, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::JsonCompact => println!("{}", serde_json::to_string(value)?),
        _ => println!("{}", serde_json::to_string_pretty(value)?),
    }
    Ok(())
}
