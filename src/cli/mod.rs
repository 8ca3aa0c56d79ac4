//! Gurukul Monitor Command Line Interface.
//!
//! Operator entry points: run the monitor, one-shot checks, config
//! validation and reading a running monitor's snapshot.

pub mod commands;
pub mod output;

pub use commands::*;
pub use output::*;

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Parser, Subcommand};

// ═══════════════════════════════════════════════════════════════════════════════
// ARGUMENTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Gurukul Monitor - health monitoring and alerting for platform services
#[derive(Debug, Parser)]
#[command(name = "gurukul-monitor")]
#[command(author = "Gurukul Platform Team")]
#[command(version = crate::VERSION)]
#[command(about = "Probe platform services, track their health and raise alerts", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the monitor configuration file
    #[arg(short, long, env = "MONITOR_CONFIG", default_value = "monitor.json", global = true)]
    pub config: PathBuf,

    /// Output format: text, json or json-pretty
    #[arg(short, long, default_value = "text", global = true)]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Subcommands
#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Commands {
    /// Run the monitor until Ctrl-C
    Run {
        /// Override the snapshot API bind address
        #[arg(long)]
        bind: Option<SocketAddr>,

        /// Do not serve the snapshot API
        #[arg(long)]
        no_api: bool,
    },

    /// Probe every service once; exit 0 only if the system is healthy
    Check,

    /// Validate the configuration and list services
    Validate,

    /// Print the snapshot of a running monitor
    Snapshot {
        /// Base URL of the running monitor's API
        #[arg(long, default_value = "http://127.0.0.1:9090")]
        url: String,
    },
}

impl Commands {
    /// Subcommand name as typed
    pub fn name(&self) -> &'static str {
        match self {
            Commands::Run { .. } => "run",
            Commands::Check => "check",
            Commands::Validate => "validate",
            Commands::Snapshot { .. } => "snapshot",
        }
    }
}

impl Cli {
    /// Formatter for the selected output format
    pub fn output(&self) -> OutputFormatter {
        OutputFormatter::new(self.format)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run() {
        let cli = Cli::try_parse_from(["gurukul-monitor", "run", "--bind", "127.0.0.1:8081"]).unwrap();
        assert_eq!(
            cli.command,
            Commands::Run {
                bind: Some("127.0.0.1:8081".parse().unwrap()),
                no_api: false,
            }
        );
        assert_eq!(cli.format, OutputFormat::Text);
    }

    #[test]
    fn test_parse_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["gurukul-monitor", "check", "--format", "json", "-c", "prod.json"]).unwrap();
        assert_eq!(cli.command, Commands::Check);
        assert_eq!(cli.format, OutputFormat::Json);
        assert_eq!(cli.config, PathBuf::from("prod.json"));
    }

    #[test]
    fn test_parse_rejects_unknown_format() {
        assert!(Cli::try_parse_from(["gurukul-monitor", "validate", "--format", "xml"]).is_err());
    }

    #[test]
    fn test_snapshot_default_url() {
        let cli = Cli::try_parse_from(["gurukul-monitor", "snapshot"]).unwrap();
        assert_eq!(
            cli.command,
            Commands::Snapshot {
                url: "http://127.0.0.1:9090".into()
            }
        );
    }
}
