//! Till CLI - offline-first point-of-sale records from the terminal
//!
//! All commands work against the local store; only `sync` talks to the
//! remote, and only when it is configured.

mod cli;
mod commands;
mod error;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(Cli::parse()).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Commands::Booking { command } => commands::booking::run(command, cli.data_dir),
        Commands::Ledger { command } => commands::ledger::run(command, cli.data_dir),
        Commands::Stock { command } => commands::stock::run(command, cli.data_dir),
        Commands::Pending { json } => commands::pending::run(json, cli.data_dir),
        Commands::Sync => commands::sync::run(cli.data_dir).await,
    }
}
