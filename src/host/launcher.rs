//! Host process launching and teardown
//!
//! Starts Neovim headless with `--listen` on the run's socket, the plugin
//! directory on its runtimepath, and the plugin entry script sourced.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;

use crate::common::config::HostConfig;
use crate::common::{Error, Result};

/// Host output lines kept for startup diagnostics
const OUTPUT_TAIL_LINES: usize = 40;

/// How long to wait for output drainers once the host has exited
const DRAIN_WAIT: Duration = Duration::from_millis(200);

/// Locate a binary by name on PATH, or verify an explicit path
pub fn resolve_binary(binary: &Path) -> Option<PathBuf> {
    which::which(binary).ok()
}

/// Start the host editor for one session
pub async fn start(config: &HostConfig, plugin_dir: &Path, socket: &Path) -> Result<HostProcess> {
    let binary = resolve_binary(&config.binary).ok_or_else(|| {
        let searched = std::env::var("PATH").unwrap_or_default();
        let dirs: Vec<&str> = searched.split(':').filter(|s| !s.is_empty()).collect();
        Error::host_not_found(&config.binary.display().to_string(), &dirs)
    })?;

    let mut cmd = Command::new(&binary);
    cmd.arg("--headless")
        .arg("--listen")
        .arg(socket)
        .arg("--cmd")
        .arg(format!("set rtp+={}", plugin_dir.display()))
        .arg("-c")
        .arg(format!("runtime {}", config.entry_script));

    tracing::info!(
        binary = %binary.display(),
        socket = %socket.display(),
        plugin_dir = %plugin_dir.display(),
        "Starting headless host"
    );

    let mut host = HostProcess::spawn(cmd)?;

    // Catch hosts that die straight away (bad flags, broken init.lua)
    tokio::task::yield_now().await;
    if let Some(err) = host.startup_failure().await {
        return Err(err);
    }

    Ok(host)
}

/// A running host process with its captured output
pub struct HostProcess {
    child: Child,
    pid: Option<u32>,
    output: Arc<Mutex<VecDeque<String>>>,
    drainers: Vec<JoinHandle<()>>,
}

impl HostProcess {
    /// Spawn `cmd` with piped output and no stdin
    pub fn spawn(mut cmd: Command) -> Result<Self> {
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .map_err(|e| Error::HostStartFailed(e.to_string()))?;
        let pid = child.id();

        let output = Arc::new(Mutex::new(VecDeque::with_capacity(OUTPUT_TAIL_LINES)));
        let mut drainers = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            drainers.push(tokio::spawn(drain(stdout, "stdout", output.clone())));
        }
        if let Some(stderr) = child.stderr.take() {
            drainers.push(tokio::spawn(drain(stderr, "stderr", output.clone())));
        }

        tracing::debug!(?pid, "Host process spawned");

        Ok(Self {
            child,
            pid,
            output,
            drainers,
        })
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Exit status if the process has already exited
    pub fn exit_status(&mut self) -> Option<ExitStatus> {
        self.child.try_wait().ok().flatten()
    }

    pub fn is_running(&mut self) -> bool {
        self.exit_status().is_none()
    }

    /// Build a startup error if the host has already exited
    pub async fn startup_failure(&mut self) -> Option<Error> {
        let status = self.exit_status()?;
        for drainer in self.drainers.drain(..) {
            let _ = tokio::time::timeout(DRAIN_WAIT, drainer).await;
        }
        Some(Error::HostExited {
            code: status.code(),
            output: self.output_tail(),
        })
    }

    /// Last lines the host wrote, each prefixed with a newline
    pub fn output_tail(&self) -> String {
        let lines = match self.output.lock() {
            Ok(lines) => lines,
            Err(poisoned) => poisoned.into_inner(),
        };
        lines.iter().map(|line| format!("\n  {}", line)).collect()
    }

    /// Ask the host to exit, escalating to SIGKILL after `grace`
    pub async fn terminate(&mut self, grace: Duration) -> std::io::Result<()> {
        if !self.is_running() {
            return Ok(());
        }

        #[cfg(unix)]
        if let Some(pid) = self.pid {
            // SAFETY: pid belongs to our un-reaped child, so it cannot be recycled
            unsafe {
                libc::kill(pid as libc::pid_t, libc::SIGTERM);
            }
        }
        #[cfg(not(unix))]
        self.child.start_kill()?;

        match tokio::time::timeout(grace, self.child.wait()).await {
            Ok(status) => {
                tracing::debug!(status = ?status.as_ref().ok(), "Host exited");
                status.map(|_| ())
            }
            Err(_) => {
                tracing::warn!(
                    grace_ms = grace.as_millis() as u64,
                    "Host ignored SIGTERM, killing"
                );
                self.child.kill().await
            }
        }
    }

    /// Fire-and-forget kill for synchronous teardown paths
    pub fn start_kill(&mut self) {
        if self.is_running() {
            let _ = self.child.start_kill();
        }
    }
}

async fn drain<R>(stream: R, name: &'static str, tail: Arc<Mutex<VecDeque<String>>>)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(stream).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        tracing::trace!(target: "fugitive_harness::host::output", stream = name, "{}", line);
        let mut tail = match tail.lock() {
            Ok(tail) => tail,
            Err(poisoned) => poisoned.into_inner(),
        };
        if tail.len() == OUTPUT_TAIL_LINES {
            tail.pop_front();
        }
        tail.push_back(line);
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_binary_is_startup_error() {
        let config = HostConfig {
            binary: PathBuf::from("definitely-not-a-real-editor-binary"),
            ..HostConfig::default()
        };
        let dir = tempfile::tempdir().unwrap();
        let err = start(&config, dir.path(), &dir.path().join("s.sock"))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, Error::HostNotFound { .. }));
    }

    #[tokio::test]
    async fn test_early_exit_reports_output() {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg("echo 'E5113: broken plugin' >&2; exit 3");
        let mut host = HostProcess::spawn(cmd).unwrap();

        let err = loop {
            if let Some(err) = host.startup_failure().await {
                break err;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        };

        match err {
            Error::HostExited { code, output } => {
                assert_eq!(code, Some(3));
                assert!(output.contains("E5113: broken plugin"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_terminate_stops_long_running_process() {
        let mut cmd = Command::new("sleep");
        cmd.arg("30");
        let mut host = HostProcess::spawn(cmd).unwrap();
        assert!(host.is_running());

        host.terminate(Duration::from_secs(2)).await.unwrap();
        assert!(!host.is_running());

        // Second terminate is a no-op
        host.terminate(Duration::from_secs(2)).await.unwrap();
    }

    #[tokio::test]
    async fn test_terminate_escalates_to_kill() {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg("trap '' TERM; sleep 30");
        let mut host = HostProcess::spawn(cmd).unwrap();
        // Give the shell a moment to install the trap
        tokio::time::sleep(Duration::from_millis(100)).await;

        host.terminate(Duration::from_millis(100)).await.unwrap();
        assert!(!host.is_running());
    }
}
