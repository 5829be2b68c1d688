//! CLI command handling
//!
//! Loads configuration, starts a session, runs the selected scenario and
//! always tears the session down before returning.

use colored::Colorize;
use std::path::{Path, PathBuf};

use crate::commands::{Commands, HostArgs, Suite};
use crate::common::config::Config;
use crate::common::{Error, Result};
use crate::host::resolve_binary;
use crate::session::{watchdog, Session};
use crate::testing::{suites, Report, TestScenario};

/// Dispatch a CLI command
///
/// Returns whether every case passed.
pub async fn dispatch(command: Commands, config_path: Option<&Path>) -> Result<bool> {
    let mut config = Config::load(config_path)?;

    match command {
        Commands::Run { suite, host } => {
            let scenario = match suite {
                Suite::RemoteApi => suites::remote_api(&config.status),
                Suite::StatusReload => suites::status_reload(&config.status),
            };
            execute(&mut config, scenario, &host).await
        }

        Commands::Scenario { path, host } => {
            let scenario = TestScenario::load(&path)?;
            execute(&mut config, scenario, &host).await
        }

        Commands::Check => Ok(check(&config)),
    }
}

async fn execute(config: &mut Config, scenario: TestScenario, args: &HostArgs) -> Result<bool> {
    if let Some(secs) = args.timeout {
        config.timeouts.run_secs = secs;
    }
    let plugin_dir = plugin_dir(args.plugin_dir.as_deref())?;
    let budget = config.timeouts.run_budget();

    println!("Starting headless Neovim with jj-fugitive...");
    tracing::info!(plugin_dir = %plugin_dir.display(), "Starting session");

    let mut session =
        watchdog::race(Session::start(config, &plugin_dir), budget, budget).await??;
    println!("{}", "✅ Neovim started successfully".green());

    let runner = scenario.into_runner();
    let remaining = session.remaining();
    let outcome = watchdog::race(runner.run(&mut session), remaining, budget).await;

    println!("Cleaning up...");
    session.cleanup().await;

    let report = outcome?;
    if let Some(path) = &args.report {
        // The tally alone decides the exit code
        if let Err(e) = write_report(path, &report) {
            tracing::warn!("{}", e);
        }
    }
    Ok(report.success())
}

fn plugin_dir(explicit: Option<&Path>) -> Result<PathBuf> {
    let dir = match explicit {
        Some(dir) => dir.to_path_buf(),
        None => std::env::current_dir()?,
    };
    dir.canonicalize().map_err(|e| Error::FileRead {
        path: dir.display().to_string(),
        error: e.to_string(),
    })
}

fn write_report(path: &Path, report: &Report) -> Result<()> {
    let json = serde_json::to_string_pretty(&report.to_json())?;
    std::fs::write(path, json).map_err(|e| {
        Error::Config(format!("Failed to write report '{}': {}", path.display(), e))
    })?;
    tracing::info!(path = %path.display(), "Report written");
    Ok(())
}

/// Print which binaries resolve; true when all do
fn check(config: &Config) -> bool {
    let binaries = [("host", &config.host.binary), ("vcs", &config.vcs.binary)];
    let mut all_found = true;

    for (role, binary) in binaries {
        match resolve_binary(binary) {
            Some(path) => println!(
                "  {} {:<5} {}",
                "✓".green(),
                role,
                path.display()
            ),
            None => {
                all_found = false;
                println!(
                    "  {} {:<5} {} (not found)",
                    "✗".red(),
                    role,
                    binary.display()
                );
            }
        }
    }
    all_found
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plugin_dir_defaults_to_cwd() {
        let dir = plugin_dir(None).unwrap();
        assert_eq!(dir, std::env::current_dir().unwrap().canonicalize().unwrap());
    }

    #[test]
    fn test_missing_plugin_dir_is_error() {
        let err = plugin_dir(Some(Path::new("/nonexistent/plugin/dir"))).unwrap_err();
        assert!(matches!(err, Error::FileRead { .. }));
    }

    #[test]
    fn test_report_write_failure_is_an_error_value() {
        let report = Report::default();
        let err = write_report(Path::new("/nonexistent/dir/report.json"), &report).unwrap_err();
        assert!(err.to_string().contains("Failed to write report"));
    }

    #[test]
    fn test_report_is_written_as_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        write_report(&path, &Report::default()).unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json["total"], 0);
        assert_eq!(json["success"], true);
    }

    #[test]
    fn test_check_reports_missing_binary() {
        let mut config = Config::default();
        config.host.binary = PathBuf::from("definitely-not-a-real-editor-binary");
        assert!(!check(&config));
    }
}
