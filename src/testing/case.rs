//! Test case abstraction

use async_trait::async_trait;
use serde::Serialize;

use crate::common::{Error, Result};

/// Lifecycle of a single case
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseState {
    Pending,
    Running,
    Passed,
    /// Observed state did not match
    Failed,
    /// The check itself blew up (RPC error, IO error, ...)
    Errored,
}

impl CaseState {
    /// Terminal state for a finished check
    pub fn from_result(result: &Result<()>) -> Self {
        match result {
            Ok(()) => Self::Passed,
            Err(e) if e.is_assertion() => Self::Failed,
            Err(_) => Self::Errored,
        }
    }

    pub fn is_finished(self) -> bool {
        matches!(self, Self::Passed | Self::Failed | Self::Errored)
    }
}

/// A named check run against a context `C`
///
/// Return `Err(Error::TestAssertion)` for a mismatch; any other error marks
/// the case as errored.
#[async_trait]
pub trait TestCase<C: Send>: Send + Sync {
    fn name(&self) -> &str;

    async fn run(&self, ctx: &mut C) -> Result<()>;
}

/// Print a passing sub-check
pub fn pass(message: impl AsRef<str>) {
    use colored::Colorize;
    println!("  {} {}", "✅ PASS:".green(), message.as_ref());
}

/// Build an assertion failure
pub fn fail<T>(message: impl Into<String>) -> Result<T> {
    Err(Error::assertion(message))
}
