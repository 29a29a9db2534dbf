//! pageflow command-line entry point.
//!
//! Drives the runtime primitives from a terminal: coalesced lookups against
//! real endpoints, visibility checks over recorded layouts, and scheduler
//! replays of recorded mutation timelines. Logs go to stderr as JSON so
//! stdout stays machine-readable.

use anyhow::Result;
use clap::{Parser, Subcommand};
use pageflow_core::AppConfig;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Debug, Parser)]
#[command(name = "pageflow", version, about = "Page runtime helpers: coalesced lookups, visibility, scheduling")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Resolve a JSON resource through the coalescing cache.
    Lookup(commands::lookup::LookupArgs),
    /// Evaluate element visibility for a recorded layout.
    Visible(commands::visible::VisibleArgs),
    /// Replay a mutation timeline through the scheduler.
    Replay(commands::replay::ReplayArgs),
    /// Print the effective configuration.
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let cli = Cli::parse();
    let config = AppConfig::load()?;
    tracing::debug!(namespace = %config.namespace, "loaded configuration");

    let output = match cli.command {
        Command::Lookup(args) => commands::lookup::run(&config, args).await?,
        Command::Visible(args) => commands::visible::run(&config, args)?,
        Command::Replay(args) => commands::replay::run(&config, args).await?,
        Command::Config => serde_json::to_value(&config)?,
    };

    println!("{}", serde_json::to_string_pretty(&output)?);

    Ok(())
}
