//! Configuration file handling

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::paths::config_path;
use super::Result;
use crate::host::PollPolicy;

/// Main configuration structure
#[derive(Debug, Deserialize, Default, Clone)]
pub struct Config {
    /// Host editor settings
    #[serde(default)]
    pub host: HostConfig,

    /// Version-control CLI settings
    #[serde(default)]
    pub vcs: VcsConfig,

    /// Timeout and polling settings
    #[serde(default)]
    pub timeouts: Timeouts,

    /// What the status buffer is expected to look like
    #[serde(default)]
    pub status: StatusConfig,
}

/// Host editor settings
#[derive(Debug, Deserialize, Clone)]
pub struct HostConfig {
    /// Binary name (looked up on PATH) or explicit path
    #[serde(default = "default_host_binary")]
    pub binary: PathBuf,

    /// Runtime file sourced after startup to load the plugin
    #[serde(default = "default_entry_script")]
    pub entry_script: String,

    /// Grace period between SIGTERM and SIGKILL on teardown
    #[serde(default = "default_terminate_grace")]
    pub terminate_grace_ms: u64,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            binary: default_host_binary(),
            entry_script: default_entry_script(),
            terminate_grace_ms: default_terminate_grace(),
        }
    }
}

fn default_host_binary() -> PathBuf {
    PathBuf::from("nvim")
}
fn default_entry_script() -> String {
    "plugin/jj-fugitive.lua".to_string()
}
fn default_terminate_grace() -> u64 {
    2000
}

/// Version-control CLI settings
#[derive(Debug, Deserialize, Clone)]
pub struct VcsConfig {
    #[serde(default = "default_vcs_binary")]
    pub binary: PathBuf,
}

impl Default for VcsConfig {
    fn default() -> Self {
        Self {
            binary: default_vcs_binary(),
        }
    }
}

fn default_vcs_binary() -> PathBuf {
    PathBuf::from("jj")
}

/// Timeout settings
#[derive(Debug, Deserialize, Clone)]
pub struct Timeouts {
    /// How many times to look for the socket file
    #[serde(default = "default_socket_attempts")]
    pub socket_attempts: u32,

    /// Delay between socket checks
    #[serde(default = "default_interval")]
    pub socket_interval_ms: u64,

    /// How many times to re-check a post-condition after a command
    #[serde(default = "default_settle_attempts")]
    pub settle_attempts: u32,

    /// Delay between post-condition checks
    #[serde(default = "default_interval")]
    pub settle_interval_ms: u64,

    /// Wall-clock budget for the whole run
    #[serde(default = "default_run_secs")]
    pub run_secs: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            socket_attempts: default_socket_attempts(),
            socket_interval_ms: default_interval(),
            settle_attempts: default_settle_attempts(),
            settle_interval_ms: default_interval(),
            run_secs: default_run_secs(),
        }
    }
}

fn default_socket_attempts() -> u32 {
    50
}
fn default_interval() -> u64 {
    100
}
fn default_settle_attempts() -> u32 {
    30
}
fn default_run_secs() -> u64 {
    60
}

impl Timeouts {
    pub fn socket_policy(&self) -> PollPolicy {
        PollPolicy::new(
            self.socket_attempts,
            Duration::from_millis(self.socket_interval_ms),
        )
    }

    pub fn settle_policy(&self) -> PollPolicy {
        PollPolicy::new(
            self.settle_attempts,
            Duration::from_millis(self.settle_interval_ms),
        )
    }

    pub fn run_budget(&self) -> Duration {
        Duration::from_secs(self.run_secs)
    }
}

/// Expectations about the plugin's status buffer
#[derive(Debug, Deserialize, Clone)]
pub struct StatusConfig {
    /// Command that opens the status buffer
    #[serde(default = "default_status_command")]
    pub command: String,

    /// Substring every status buffer name contains
    #[serde(default = "default_marker")]
    pub marker: String,

    /// Commands the plugin must define
    #[serde(default = "default_commands")]
    pub commands: Vec<String>,

    /// Fragments the status buffer must show
    #[serde(default = "default_patterns")]
    pub patterns: Vec<String>,

    /// Header line that must survive a reload
    #[serde(default = "default_header")]
    pub header: String,

    /// Keys that trigger a reload inside the status buffer
    #[serde(default = "default_reload_keys")]
    pub reload_keys: String,
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            command: default_status_command(),
            marker: default_marker(),
            commands: default_commands(),
            patterns: default_patterns(),
            header: default_header(),
            reload_keys: default_reload_keys(),
        }
    }
}

fn default_status_command() -> String {
    "JStatus".to_string()
}
fn default_marker() -> String {
    "jj-status".to_string()
}
fn default_commands() -> Vec<String> {
    ["JStatus", "JLog", "JDiff", "JCommit", "JNew"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}
fn default_patterns() -> Vec<String> {
    ["jj-fugitive Status", "Working copy", "Commands:"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}
fn default_header() -> String {
    "jj-fugitive Status".to_string()
}
fn default_reload_keys() -> String {
    "r".to_string()
}

impl Config {
    /// Load configuration from an explicit file or the default location
    ///
    /// Returns default configuration if no file exists
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }
        if let Some(path) = config_path() {
            if path.exists() {
                return Self::from_file(&path);
            }
        }
        Ok(Self::default())
    }

    fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| super::Error::FileRead {
            path: path.display().to_string(),
            error: e.to_string(),
        })?;
        Self::parse(&content)
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| super::Error::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.timeouts.socket_attempts == 0 {
            return Err(super::Error::Config(
                "timeouts.socket_attempts must be at least 1".to_string(),
            ));
        }
        if self.timeouts.settle_attempts == 0 {
            return Err(super::Error::Config(
                "timeouts.settle_attempts must be at least 1".to_string(),
            ));
        }
        if self.status.marker.is_empty() {
            return Err(super::Error::Config(
                "status.marker must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_plugin_conventions() {
        let config = Config::default();
        assert_eq!(config.host.binary, PathBuf::from("nvim"));
        assert_eq!(config.status.marker, "jj-status");
        assert_eq!(config.status.commands.len(), 5);
        assert_eq!(config.timeouts.socket_policy().ceiling(), Duration::from_secs(5));
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = Config::parse(
            r#"
            [host]
            binary = "/opt/nvim/bin/nvim"

            [timeouts]
            run_secs = 30
            "#,
        )
        .unwrap();
        assert_eq!(config.host.binary, PathBuf::from("/opt/nvim/bin/nvim"));
        assert_eq!(config.host.entry_script, "plugin/jj-fugitive.lua");
        assert_eq!(config.timeouts.run_secs, 30);
        assert_eq!(config.timeouts.socket_attempts, 50);
    }

    #[test]
    fn test_rejects_zero_attempts() {
        let err = Config::parse("[timeouts]\nsocket_attempts = 0\n").unwrap_err();
        assert!(matches!(err, crate::common::Error::Config(_)));
    }

    #[test]
    fn test_rejects_malformed_toml() {
        let err = Config::parse("[host\nbinary = 1").unwrap_err();
        assert!(matches!(err, crate::common::Error::ConfigParse(_)));
    }
}
