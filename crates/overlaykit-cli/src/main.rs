mod completion;
mod dispatch;
mod render;

use std::path::PathBuf;

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use completion::CliCompletionShell;

#[derive(Parser, Debug)]
#[command(name = "overlaykit")]
#[command(
    about = "Installs and toggles a runtime overlay inside a host editor tree",
    long_about = None
)]
pub(crate) struct Cli {
    /// Path to overlaykit.toml (defaults to ./overlaykit.toml).
    #[arg(long, env = "OVERLAYKIT_CONFIG", global = true)]
    config: Option<PathBuf>,
    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create the helper root and copy host subtrees into it.
    Prepare,
    /// Install a base/overlay pair from the artifact cache.
    Install {
        #[arg(long)]
        base: String,
        #[arg(long)]
        overlay: String,
        #[arg(long)]
        base_source: Option<String>,
        #[arg(long)]
        overlay_source: Option<String>,
    },
    /// Show the installed versions and overlay state.
    Status,
    /// Verify the installed tree is in place.
    Check,
    Enable,
    Disable,
    /// Disable the overlay and delete the installed tree.
    Uninstall,
    /// Put the pristine target directory back.
    RestoreOriginal,
    /// Finish or undo an install that was interrupted.
    Recover,
    /// Remember a new artifact cache location.
    SetCacheDir { path: PathBuf },
    Completions {
        #[arg(value_enum)]
        shell: CliCompletionShell,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    dispatch::run_cli(cli)
}

fn init_tracing(verbose: u8) {
    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let filter = EnvFilter::try_new(log_directive(verbose, rust_log.as_deref()))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let _ = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .with(filter)
        .try_init();
}

/// `-v` flags win over `RUST_LOG`; with neither only warnings are shown.
fn log_directive(verbose: u8, rust_log: Option<&str>) -> String {
    match (verbose, rust_log) {
        (0, Some(directive)) if !directive.trim().is_empty() => directive.to_string(),
        (0, _) => "warn".to_string(),
        (1, _) => "info".to_string(),
        (2, _) => "debug".to_string(),
        _ => "trace".to_string(),
    }
}
