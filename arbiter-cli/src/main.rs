//! Arbiter CLI - Command-line interface
//!
//! Commands:
//! - run: Run a tournament from a TOML settings file
//! - probe: Start one engine, perform its handshake, print its identity

use clap::{Parser, Subcommand};

mod probe_cmd;
mod run_cmd;
mod settings;

#[derive(Parser)]
#[command(name = "arbiter")]
#[command(about = "Chess engine tournament orchestrator")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a tournament
    Run(run_cmd::RunArgs),
    /// Probe a single engine executable
    Probe(probe_cmd::ProbeArgs),
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run(args) => run_cmd::run(args),
        Commands::Probe(args) => probe_cmd::run(args),
    }
}
