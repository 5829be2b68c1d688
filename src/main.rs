//! fugitive-harness - drives a headless Neovim running jj-fugitive
//!
//! Launches the editor, connects over its RPC socket, runs an ordered suite
//! of checks and reports the tally. Exit status is 0 only when every case
//! passed.

use clap::Parser;
use colored::Colorize;
use fugitive_harness::{cli, commands::Commands, common::logging, Error};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "fugitive-harness", about = "Remote-control test harness for jj-fugitive")]
#[command(version, long_about = None)]
struct Cli {
    /// Configuration file (default: platform config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Debug-level diagnostics on stderr
    #[arg(long, short, global = true)]
    verbose: bool,

    /// Also write full diagnostics to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let guard = logging::init(cli.verbose, cli.log_file.as_deref());

    let code = match cli::dispatch(cli.command, cli.config.as_deref()).await {
        Ok(true) => 0,
        Ok(false) => 1,
        Err(e @ (Error::Timeout(_) | Error::Interrupted)) => {
            eprintln!("{}", format!("⏰ {e}").yellow().bold());
            1
        }
        Err(e) if e.is_fatal() => {
            eprintln!("{}", format!("💥 Fatal error: {e}").red().bold());
            1
        }
        Err(e) => {
            eprintln!("Error: {e}");
            1
        }
    };

    drop(guard);
    std::process::exit(code);
}
