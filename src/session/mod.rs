//! One harness run against one host process
//!
//! A `Session` owns the socket path, the host process and the RPC
//! connection. `cleanup` tears all three down in order and can be called any
//! number of times; `Drop` does a synchronous best-effort version for paths
//! that never reach it.

pub mod watchdog;

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::common::config::Config;
use crate::common::{paths, Error, Result};
use crate::host::{self, resolve_binary, wait_for_socket, HostProcess, PollPolicy, Rendezvous};
use crate::rpc::RpcClient;

/// A live harness session
pub struct Session {
    socket: PathBuf,
    host: Option<HostProcess>,
    rpc: Option<RpcClient>,
    deadline: Instant,
    settle: PollPolicy,
    grace: Duration,
    vcs: PathBuf,
    cleaned: bool,
}

impl Session {
    /// Launch the host, wait for its socket and connect
    ///
    /// Any failure after the host was spawned tears it down before returning.
    pub async fn start(config: &Config, plugin_dir: &Path) -> Result<Self> {
        let vcs = resolve_binary(&config.vcs.binary)
            .ok_or_else(|| Error::VcsNotFound(config.vcs.binary.display().to_string()))?;

        let socket = paths::unique_socket_path();
        paths::ensure_socket_dir(&socket)?;
        if paths::remove_socket(&socket)? {
            tracing::debug!(socket = %socket.display(), "Removed stale socket");
        }

        let mut session = Self {
            socket,
            host: None,
            rpc: None,
            deadline: Instant::now() + config.timeouts.run_budget(),
            settle: config.timeouts.settle_policy(),
            grace: Duration::from_millis(config.host.terminate_grace_ms),
            vcs,
            cleaned: false,
        };

        match session.launch(config, plugin_dir).await {
            Ok(()) => Ok(session),
            Err(e) => {
                tracing::debug!("Startup failed, cleaning up: {}", e);
                session.cleanup().await;
                Err(e)
            }
        }
    }

    async fn launch(&mut self, config: &Config, plugin_dir: &Path) -> Result<()> {
        let host = self
            .host
            .insert(host::start(&config.host, plugin_dir, &self.socket).await?);

        let policy = config.timeouts.socket_policy();
        match wait_for_socket(&self.socket, policy, || !host.is_running()).await {
            Rendezvous::Ready => {}
            Rendezvous::HostExited | Rendezvous::TimedOut => {
                if let Some(err) = host.startup_failure().await {
                    return Err(err);
                }
                return Err(Error::SocketTimeout {
                    path: self.socket.clone(),
                    attempts: policy.attempts,
                });
            }
        }

        let rpc = RpcClient::connect(&self.socket).await?;
        if !rpc.wait_until_entered(self.settle).await {
            tracing::warn!("Host did not report VimEnter, continuing anyway");
        }
        self.rpc = Some(rpc);

        tracing::info!(pid = ?host.pid(), "Host ready");
        Ok(())
    }

    /// The RPC connection, if still open
    pub fn rpc(&self) -> Result<&RpcClient> {
        self.rpc.as_ref().ok_or(Error::NotConnected)
    }

    pub fn socket(&self) -> &Path {
        &self.socket
    }

    /// Policy for waiting on asynchronous effects of commands
    pub fn settle(&self) -> PollPolicy {
        self.settle
    }

    /// Resolved path of the version-control binary
    pub fn vcs_binary(&self) -> &Path {
        &self.vcs
    }

    /// Time left before the run deadline
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    /// Tear the session down; safe to call repeatedly
    ///
    /// Quit the host over RPC, close the connection, terminate the process,
    /// remove the socket. A failing step never skips the ones after it.
    pub async fn cleanup(&mut self) {
        if !self.cleaned {
            tracing::info!("Cleaning up session");
            self.cleaned = true;
        }

        if let Some(rpc) = self.rpc.take() {
            rpc.quit().await;
            rpc.close();
        }

        if let Some(mut host) = self.host.take() {
            if let Err(e) = host.terminate(self.grace).await {
                tracing::warn!("Failed to stop host: {}", e);
            }
        }

        match paths::remove_socket(&self.socket) {
            Ok(true) => tracing::debug!(socket = %self.socket.display(), "Removed socket"),
            Ok(false) => {}
            Err(e) => tracing::warn!("Failed to remove socket {}: {}", self.socket.display(), e),
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        // Best-effort since we can't await in drop
        if let Some(rpc) = self.rpc.take() {
            rpc.close();
        }
        if let Some(mut host) = self.host.take() {
            host.start_kill();
        }
        let _ = paths::remove_socket(&self.socket);
    }
}
