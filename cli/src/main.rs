mod commands;
mod config;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{
    check::CheckCommand, files::FilesCommand, list::ListCommand, prune::PruneCommand,
    restore::RestoreCommand, snapshot::SnapshotCommand, stats::StatsCommand,
};
use config::{FileConfig, Settings};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(
    name = "backuptool",
    about = "Point-in-time directory backups with deduplicated storage",
    long_about = "Backuptool captures directory trees into numbered snapshots, storing each distinct file content once"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long, global = true, env = "BACKUPTOOL_DB", help = "Path to database file [default: .backuptool.db]")]
    db: Option<PathBuf>,

    #[arg(long, global = true, env = "BACKUPTOOL_CONFIG", help = "Path to config file")]
    config: Option<PathBuf>,

    #[arg(short, long, global = true, help = "Enable verbose output")]
    verbose: bool,

    #[arg(short, long, global = true, help = "Enable quiet mode")]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Take a snapshot of a directory")]
    Snapshot(SnapshotCommand),

    #[command(about = "List snapshots")]
    List(ListCommand),

    #[command(about = "Restore a snapshot to a directory")]
    Restore(RestoreCommand),

    #[command(about = "Prune snapshots up to a given snapshot")]
    Prune(PruneCommand),

    #[command(about = "List files in a snapshot")]
    Files(FilesCommand),

    #[command(about = "Show repository statistics")]
    Stats(StatsCommand),

    #[command(about = "Check repository integrity")]
    Check(CheckCommand),
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    init_tracing(cli.verbose, cli.quiet);

    match run(&cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: &Cli) -> Result<ExitCode> {
    let file_config = FileConfig::load(cli.config.as_deref())?;
    let settings = Settings::resolve(cli.db.as_deref(), cli.quiet, file_config);
    debug!("Using store {}", settings.db.display());

    match cli.command {
        Commands::Snapshot(ref cmd) => cmd.run(&settings).await,
        Commands::List(ref cmd) => cmd.run(&settings),
        Commands::Restore(ref cmd) => cmd.run(&settings).await,
        Commands::Prune(ref cmd) => cmd.run(&settings),
        Commands::Files(ref cmd) => cmd.run(&settings),
        Commands::Stats(ref cmd) => cmd.run(&settings),
        Commands::Check(ref cmd) => cmd.run(&settings),
    }
}

fn init_tracing(verbose: bool, quiet: bool) {
    let level = if quiet {
        "warn"
    } else if verbose {
        "debug"
    } else {
        "info"
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("backuptool={level},backuptool_core={level}")));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to install logger: {e}");
    }
}
