//! Beacon CLI - Sign batches, check tracker configurations and replay a
//! simulated host session against the real pipeline.

use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use beacon_core::ConfigError;

mod commands;

use commands::ConfigSource;

/// Exit status when the configuration cannot be loaded or is invalid.
const EXIT_CONFIG: u8 = 2;

/// Beacon Behavioral Telemetry Client
#[derive(Parser)]
#[command(name = "beacon")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub source: ConfigSource,

    /// Output format
    #[arg(short = 'f', long, global = true, default_value = "human")]
    pub format: OutputFormat,

    /// Verbosity level (-v shows local-only payloads and deliveries, -vv the
    /// flush decisions, -vvv every record)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (suppress non-essential output)
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

/// Output format options.
#[derive(Clone, Copy, Debug, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable output
    #[default]
    Human,
    /// JSON output
    Json,
    /// Compact JSON (single line)
    JsonCompact,
}

/// Available commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Sign a batch envelope
    Sign(commands::sign::SignArgs),
    /// Validate a tracker configuration file
    Validate(commands::validate::ValidateArgs),
    /// Drive an in-memory host through a simulated session
    Simulate(commands::simulate::SimulateArgs),
}

/// Filter for the beacon crates. `RUST_LOG` wins when set.
fn log_filter(verbose: u8, quiet: bool) -> EnvFilter {
    let level = match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, 2) => "debug",
        _ => "trace",
    };

    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "beacon={level},beacon_core={level},beacon_host={level},beacon_observe={level}"
        ))
    })
}

/// Configuration problems exit with their own status so scripts can tell
/// them from delivery failures.
fn exit_status(error: &anyhow::Error) -> u8 {
    if error.chain().any(|cause| cause.is::<ConfigError>()) {
        EXIT_CONFIG
    } else {
        1
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Payloads go to stdout, diagnostics to stderr
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(cli.verbose, cli.quiet))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Sign(args) => commands::sign::execute(args, &cli.source, cli.format),
        Commands::Validate(args) => commands::validate::execute(args, cli.format),
        Commands::Simulate(args) => {
            commands::simulate::execute(args, &cli.source, cli.format, cli.quiet)
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if !cli.quiet {
                eprintln!("Error: {:#}", e);
            }
            ExitCode::from(exit_status(&e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "beacon",
            "simulate",
            "--pages",
            "2",
            "--server-url",
            "https://collector.example.com/logs",
            "-vv",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 2);
        assert_eq!(
            cli.source.server_url.as_deref(),
            Some("https://collector.example.com/logs")
        );
        assert!(matches!(cli.command, Commands::Simulate(ref args) if args.pages == 2));
    }

    #[test]
    fn test_config_errors_exit_with_config_status() {
        let config = anyhow::Error::new(ConfigError::Invalid {
            field: "serverUrl",
            reason: "expected an http(s) URL".to_string(),
        })
        .context("Failed to load configuration");
        assert_eq!(exit_status(&config), EXIT_CONFIG);

        let delivery = anyhow::anyhow!("simulated outage");
        assert_eq!(exit_status(&delivery), 1);
    }
}
