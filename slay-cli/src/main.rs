//! Slay CLI - Command-line interface
//!
//! Commands:
//! - watch: Follow a game headlessly, logging every turn
//! - snapshot: Print one recorded turn with its region summary

mod snapshot;
mod watch;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use snapshot::SnapshotArgs;
use watch::WatchArgs;

#[derive(Parser)]
#[command(name = "slay")]
#[command(about = "Client for the Slay hex strategy server")]
struct Cli {
    /// Debug logging (RUST_LOG overrides)
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect and follow the live game
    Watch(WatchArgs),
    /// Fetch and print a history snapshot
    Snapshot(SnapshotArgs),
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Watch(args) => watch::run(args),
        Commands::Snapshot(args) => snapshot::run(args),
    }
}
