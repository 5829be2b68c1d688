//! Error types for the harness
//!
//! Startup and timeout errors abort the whole run. Everything raised while a
//! test case executes is contained by the runner and turned into a failed or
//! errored case.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the harness
#[derive(Error, Debug)]
pub enum Error {
    // === Startup Errors ===
    #[error("Host binary '{name}' not found. Searched: {searched}")]
    HostNotFound { name: String, searched: String },

    #[error("Version-control binary '{0}' not found on PATH")]
    VcsNotFound(String),

    #[error("Failed to start host: {0}")]
    HostStartFailed(String),

    #[error("Host exited during startup (code {code:?}){output}")]
    HostExited { code: Option<i32>, output: String },

    #[error("Host socket {} did not appear after {attempts} attempts", path.display())]
    SocketTimeout { path: PathBuf, attempts: u32 },

    #[error("Failed to connect to host socket: {0}")]
    ConnectionFailed(#[source] io::Error),

    #[error("Not connected to the host")]
    NotConnected,

    // === Per-case Errors ===
    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("Test assertion failed: {0}")]
    TestAssertion(String),

    // === Run-level Errors ===
    #[error("Test run timed out after {0} seconds")]
    Timeout(u64),

    #[error("Test run interrupted")]
    Interrupted,

    // === Configuration Errors ===
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration file: {0}")]
    ConfigParse(String),

    // === IO Errors ===
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to read file '{path}': {error}")]
    FileRead { path: String, error: String },

    // === Serialization Errors ===
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a host not found error with search locations
    pub fn host_not_found<S: AsRef<str>>(name: &str, paths: &[S]) -> Self {
        Self::HostNotFound {
            name: name.to_string(),
            searched: paths.iter().map(|s| s.as_ref()).collect::<Vec<_>>().join(", "),
        }
    }

    /// Create an assertion failure
    pub fn assertion(message: impl Into<String>) -> Self {
        Self::TestAssertion(message.into())
    }

    /// Whether this error is an observed-state mismatch rather than a fault
    pub fn is_assertion(&self) -> bool {
        matches!(self, Self::TestAssertion(_))
    }

    /// Whether this error aborts the whole run
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::HostNotFound { .. }
                | Self::VcsNotFound(_)
                | Self::HostStartFailed(_)
                | Self::HostExited { .. }
                | Self::SocketTimeout { .. }
                | Self::ConnectionFailed(_)
                | Self::Timeout(_)
                | Self::Interrupted
        )
    }
}

impl From<Box<nvim_rs::error::CallError>> for Error {
    fn from(e: Box<nvim_rs::error::CallError>) -> Self {
        Error::Rpc(e.to_string())
    }
}
