//! AWT Sync CLI
//!
//! Runs one sync of AWT tracking data into cloud storage. Meant to be
//! triggered by a scheduler (cron, Cloud Scheduler) once a day.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::error;
use tracing_subscriber::EnvFilter;

use awt_core::SyncError;

mod commands;
mod output;

use output::{Output, OutputFormat};

#[derive(Parser)]
#[command(name = "awt-sync")]
#[command(about = "Sync AWT wildlife tracking data to cloud storage")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Quiet mode - minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (defaults to ~/.config/awt-sync/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one sync (default)
    Run,
    /// Show persisted sync state
    Status,
    /// Show effective configuration
    Config,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let output = Output::new(OutputFormat::from_flags(cli.json, cli.quiet));
    let config_path = cli.config.as_ref();

    let result = match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => commands::run::run(config_path, &output).await,
        Commands::Status => commands::status::show(config_path, &output).await,
        Commands::Config => commands::config::show(config_path, &output),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            report_failure(&e);
            ExitCode::FAILURE
        }
    }
}

/// Log a fatal error as one line naming the failed step
fn report_failure(err: &anyhow::Error) {
    match err.downcast_ref::<SyncError>() {
        Some(sync_err) => error!("AWT data sync failed during {}: {}", sync_err.step(), sync_err),
        None => error!("AWT data sync failed: {:#}", err),
    }
}

/// Log to stderr so stdout stays usable for --json output
///
/// `RUST_LOG` takes precedence over `--verbose`.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("awt_core={},awt_cli={}", level, level)));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
