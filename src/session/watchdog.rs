//! Whole-run timeout and interrupt handling
//!
//! Individual RPC calls carry no deadline of their own, so the run as a
//! whole races against a wall-clock budget and against SIGINT/SIGTERM. The
//! losing future is dropped; the caller then runs the normal cleanup.

use std::future::Future;
use std::time::Duration;

use crate::common::{Error, Result};

/// Run `fut` unless `remaining` runs out or the process is signalled first
///
/// A timeout reports `limit`, the configured budget for the whole run, not
/// whatever was left of it when this leg started.
pub async fn race<F: Future>(fut: F, remaining: Duration, limit: Duration) -> Result<F::Output> {
    tokio::select! {
        output = fut => Ok(output),
        _ = tokio::time::sleep(remaining) => {
            tracing::warn!(limit_secs = limit.as_secs(), "Run budget exhausted");
            Err(Error::Timeout(limit.as_secs()))
        }
        _ = shutdown_signal() => {
            tracing::info!("Received shutdown signal");
            Err(Error::Interrupted)
        }
    }
}

#[cfg(unix)]
async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let (mut sigterm, mut sigint) =
        match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
            (Ok(term), Ok(int)) => (term, int),
            (Err(e), _) | (_, Err(e)) => {
                tracing::warn!("Signal handlers unavailable: {}", e);
                return std::future::pending().await;
            }
        };

    tokio::select! {
        _ = sigterm.recv() => {}
        _ = sigint.recv() => {}
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Ctrl-C handler unavailable: {}", e);
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_finishes_within_budget() {
        let result = race(async { 7 }, Duration::from_secs(5), Duration::from_secs(5)).await;
        assert_eq!(result.unwrap(), 7);
    }

    #[tokio::test(start_paused = true)]
    async fn test_budget_expiry_is_timeout() {
        let slow = tokio::time::sleep(Duration::from_secs(60));
        let err = race(slow, Duration::from_secs(30), Duration::from_secs(30))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Timeout(30)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_reports_configured_limit() {
        let slow = tokio::time::sleep(Duration::from_secs(60));
        let remaining = Duration::from_millis(59_400);
        let err = race(slow, remaining, Duration::from_secs(60)).await.unwrap_err();
        assert!(matches!(err, Error::Timeout(60)));
        assert_eq!(err.to_string(), "Test run timed out after 60 seconds");
    }
}
