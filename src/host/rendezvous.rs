//! Bounded polling for out-of-process state
//!
//! The host gives no push notification when it is ready or when a command
//! has finished redrawing, so every wait in the harness is a bounded
//! retry-poll of the condition it actually needs.

use std::future::Future;
use std::path::Path;
use std::time::Duration;

/// How often and how long to poll
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Total number of checks, including the first one
    pub attempts: u32,
    /// Delay between checks
    pub interval: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            attempts: 50,
            interval: Duration::from_millis(100),
        }
    }
}

impl PollPolicy {
    pub fn new(attempts: u32, interval: Duration) -> Self {
        Self { attempts, interval }
    }

    /// Upper bound on the time spent polling
    pub fn ceiling(&self) -> Duration {
        self.interval * self.attempts
    }
}

/// Run `check` until it yields a value or the policy is exhausted
///
/// The first check runs immediately; a sleep of `interval` separates later
/// checks. Returns `None` after `attempts` checks without a value.
pub async fn poll_until<T, F, Fut>(policy: PollPolicy, mut check: F) -> Option<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Option<T>>,
{
    for attempt in 0..policy.attempts {
        if attempt > 0 {
            tokio::time::sleep(policy.interval).await;
        }
        if let Some(value) = check().await {
            tracing::trace!(attempt, "poll condition met");
            return Some(value);
        }
    }
    None
}

/// How a wait for the control socket ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rendezvous {
    /// The socket file exists
    Ready,
    /// The host process is gone; the socket will never appear
    HostExited,
    /// Attempts exhausted with the host still running
    TimedOut,
}

/// Wait for the host's control socket to appear on disk
///
/// `exited` is checked on every attempt so a host that dies during startup
/// ends the wait at once instead of after the whole window.
pub async fn wait_for_socket<E>(path: &Path, policy: PollPolicy, mut exited: E) -> Rendezvous
where
    E: FnMut() -> bool,
{
    tracing::debug!(
        path = %path.display(),
        attempts = policy.attempts,
        "Waiting for host socket"
    );
    let outcome = poll_until(policy, || {
        let seen = if path.exists() {
            Some(Rendezvous::Ready)
        } else if exited() {
            Some(Rendezvous::HostExited)
        } else {
            None
        };
        async move { seen }
    })
    .await;
    outcome.unwrap_or(Rendezvous::TimedOut)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_default_ceiling_is_five_seconds() {
        assert_eq!(PollPolicy::default().ceiling(), Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_stops_after_attempts() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let result: Option<()> = poll_until(PollPolicy::new(4, Duration::from_millis(10)), || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                None
            }
        })
        .await;

        assert!(result.is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_returns_first_value() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let result = poll_until(PollPolicy::new(10, Duration::from_millis(10)), || {
            let counter = counter.clone();
            async move {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                (n == 2).then_some(n)
            }
        })
        .await;

        assert_eq!(result, Some(2));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_wait_for_socket_sees_late_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("late.sock");

        let writer_path = path.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            std::fs::write(writer_path, b"").unwrap();
        });

        let outcome = wait_for_socket(&path, PollPolicy::new(50, Duration::from_millis(10)), || false).await;
        assert_eq!(outcome, Rendezvous::Ready);
    }

    #[tokio::test]
    async fn test_wait_for_socket_gives_up() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("never.sock");
        let outcome = wait_for_socket(&path, PollPolicy::new(3, Duration::from_millis(5)), || false).await;
        assert_eq!(outcome, Rendezvous::TimedOut);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_socket_stops_when_host_exits() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("never.sock");
        let mut checks = 0;
        let outcome = wait_for_socket(&path, PollPolicy::new(50, Duration::from_millis(100)), || {
            checks += 1;
            checks >= 2
        })
        .await;

        assert_eq!(outcome, Rendezvous::HostExited);
        assert_eq!(checks, 2);
    }
}
