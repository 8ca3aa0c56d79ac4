//! Gurukul Monitor
//!
//! Runs the health monitor, one-shot checks and config validation.

use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use console::style;

use gurukul_monitor::cli::{self, Cli};

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run(&cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {:#}", style("Error:").red().bold(), e);
            ExitCode::from(2)
        }
    }
}

async fn run(cli: &Cli) -> anyhow::Result<ExitCode> {
    let code = cli::execute(cli)
        .await
        .with_context(|| format!("{} failed", cli.command.name()))?;
    Ok(code)
}
