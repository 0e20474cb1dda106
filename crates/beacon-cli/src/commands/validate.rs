//! Validate command - Validate a tracker configuration file.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use serde::Serialize;

use beacon_core::{DEFAULT_SERVER_URL, DeliveryMode, TrackerConfig};

use crate::OutputFormat;
use crate::commands::print_json;

/// Arguments for the validate command.
#[derive(Args)]
pub struct ValidateArgs {
    /// Path to the configuration file
    #[arg(required = true, value_name = "CONFIG")]
    pub path: PathBuf,
}

/// Validation result.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ValidationResult {
    valid: bool,
    path: String,
    config: Option<TrackerConfig>,
    delivery: Option<&'static str>,
    warnings: Vec<String>,
    errors: Vec<String>,
}

/// Execute the validate command.
pub fn execute(args: ValidateArgs, format: OutputFormat) -> Result<()> {
    let mut result = ValidationResult {
        valid: true,
        path: args.path.display().to_string(),
        config: None,
        delivery: None,
        warnings: Vec::new(),
        errors: Vec::new(),
    };

    match TrackerConfig::load(&args.path) {
        Ok(config) => {
            if config.app_id.is_empty() {
                result
                    .warnings
                    .push("appId is empty - batches will have an empty source".to_string());
            }
            if config.server_url.as_deref() == Some(DEFAULT_SERVER_URL) {
                result
                    .warnings
                    .push("serverUrl is the default collection endpoint".to_string());
            }
            result.delivery = Some(match config.delivery_mode() {
                DeliveryMode::Remote => "remote",
                DeliveryMode::LocalOnly => {
                    result
                        .warnings
                        .push("sendLog is false - batches are only logged locally".to_string());
                    "local-only"
                }
            });
            result.config = Some(config);
        }
        Err(e) => {
            result.valid = false;
            result.errors.push(e.to_string());
        }
    }

    match format {
        OutputFormat::Human => {
            if let Some(config) = &result.config {
                println!("Configuration is valid: {}", result.path);
                println!("  App id:      {}", config.app_id);
                println!(
                    "  Server URL:  {}",
                    config.server_url.as_deref().unwrap_or("(none)")
                );
                println!("  UID key:     {}", config.uid_storage_key);
                println!("  Delivery:    {}", result.delivery.unwrap_or("unknown"));

                if !result.warnings.is_empty() {
                    println!("\nWarnings:");
                    for warning in &result.warnings {
                        println!("  - {}", warning);
                    }
                }
            } else {
                println!("Configuration is INVALID: {}", result.path);
                for error in &result.errors {
                    println!("  Error: {}", error);
                }
            }
        }
        OutputFormat::Json | OutputFormat::JsonCompact => print_json(&result, format)?,
    }

    if result.valid {
        Ok(())
    } else {
        Err(anyhow::anyhow!("Validation failed"))
    }
}
