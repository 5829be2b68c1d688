//! CLI command definitions
//!
//! Defines the clap commands for the harness.

use clap::{Args, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum Commands {
    /// Run a built-in suite against a fresh host
    Run {
        /// Suite to run
        #[arg(long, value_enum, default_value_t = Suite::RemoteApi)]
        suite: Suite,

        #[command(flatten)]
        host: HostArgs,
    },

    /// Execute a test scenario defined in a YAML file
    Scenario {
        /// Path to the YAML test scenario file
        path: PathBuf,

        #[command(flatten)]
        host: HostArgs,
    },

    /// Check that the host and version-control binaries can be found
    Check,
}

/// Built-in suites
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Suite {
    /// Repository, command registration, status content and options
    RemoteApi,
    /// Status buffer reload through fed keys
    StatusReload,
}

/// Options shared by every command that launches a host
#[derive(Args, Debug, Clone, Default)]
pub struct HostArgs {
    /// Plugin directory added to the runtime path (default: current directory)
    #[arg(long)]
    pub plugin_dir: Option<PathBuf>,

    /// Whole-run timeout in seconds, overriding the config file
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Write a JSON report to this path
    #[arg(long)]
    pub report: Option<PathBuf>,
}
