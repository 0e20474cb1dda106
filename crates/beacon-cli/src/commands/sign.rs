//! Sign command - Compute the signature of a batch envelope.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;

use beacon_core::{Clock, SystemClock};
use beacon_observe::{Envelope, EventRecord, SIGNING_SALT, SignedPayload};

use crate::OutputFormat;
use crate::commands::{ConfigSource, print_json};

/// Arguments for the sign command.
#[derive(Args)]
pub struct SignArgs {
    /// Unix timestamp in seconds (default: now)
    #[arg(short, long)]
    pub timestamp: Option<u64>,

    /// Envelope source (default: appId from the configuration)
    #[arg(short, long)]
    pub app_id: Option<String>,

    /// JSON file holding an array of records (default: empty batch)
    #[arg(short, long)]
    pub logs: Option<PathBuf>,
}

/// Execute the sign command.
pub fn execute(args: SignArgs, source: &ConfigSource, format: OutputFormat) -> Result<()> {
    let app_id = match args.app_id {
        Some(app_id) => app_id,
        None => source.load()?.app_id,
    };
    let logs = match &args.logs {
        Some(path) => read_logs(path)?,
        None => Vec::new(),
    };
    let timestamp = args.timestamp.unwrap_or_else(|| SystemClock.unix_seconds());

    let payload = SignedPayload::new(Envelope::new(app_id, logs), timestamp)
        .context("Failed to sign envelope")?;

    match format {
        OutputFormat::Human => {
            println!("Source:    {}", payload.data.source);
            println!("Topic:     {}", payload.data.topic);
            println!("Records:   {}", payload.len());
            println!("Timestamp: {}", payload.timestamp);
            println!("Salt:      {}", SIGNING_SALT);
            println!("Signature: {}", payload.sign);
        }
        OutputFormat::Json | OutputFormat::JsonCompact => print_json(&payload, format)?,
    }

    Ok(())
}

fn read_logs(path: &Path) -> Result<Vec<EventRecord>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&text)
        .with_context(|| format!("{} is not a JSON array of records", path.display()))
}
