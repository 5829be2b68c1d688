//! Client side of the host's msgpack-RPC socket

use std::path::Path;
use std::time::Duration;

use nvim_rs::error::LoopError;
use nvim_rs::Neovim;
use rmpv::Value;
use tokio::task::JoinHandle;

use crate::common::{Error, Result};
use crate::host::{poll_until, PollPolicy};

use super::buffer::{BufferView, WindowView};
use super::handler::{HarnessHandler, Writer};

/// How long `quit` waits for the host to acknowledge `qall!`
const QUIT_TIMEOUT: Duration = Duration::from_secs(1);

/// Connection to a running host
pub struct RpcClient {
    nvim: Neovim<Writer>,
    io: JoinHandle<std::result::Result<(), Box<LoopError>>>,
}

impl RpcClient {
    /// Connect to the host listening on `path`
    pub async fn connect(path: &Path) -> Result<Self> {
        let (nvim, io) = nvim_rs::create::tokio::new_path(path, HarnessHandler)
            .await
            .map_err(Error::ConnectionFailed)?;
        tracing::debug!(socket = %path.display(), "Connected to host");
        Ok(Self { nvim, io })
    }

    /// Run an Ex command
    pub async fn command(&self, text: &str) -> Result<()> {
        tracing::debug!(command = text, "RPC command");
        Ok(self.nvim.command(text).await?)
    }

    /// Evaluate a Vimscript expression
    pub async fn eval(&self, expr: &str) -> Result<Value> {
        let value = self.nvim.eval(expr).await?;
        tracing::trace!(expr, %value, "RPC eval");
        Ok(value)
    }

    /// Call a Vimscript function
    pub async fn call_function(&self, name: &str, args: Vec<Value>) -> Result<Value> {
        Ok(self.nvim.call_function(name, args).await?)
    }

    /// All buffers in the host's enumeration order
    pub async fn list_buffers(&self) -> Result<Vec<BufferView>> {
        let buffers = self.nvim.list_bufs().await?;
        Ok(buffers
            .into_iter()
            .map(|buffer| BufferView::new(buffer, self.nvim.clone()))
            .collect())
    }

    pub async fn list_windows(&self) -> Result<Vec<WindowView>> {
        let windows = self.nvim.list_wins().await?;
        Ok(windows
            .into_iter()
            .map(|window| WindowView { window })
            .collect())
    }

    /// Queue keys as if typed; `escape_special` escapes K_SPECIAL bytes
    pub async fn feed_keys(&self, keys: &str, mode: &str, escape_special: bool) -> Result<()> {
        tracing::debug!(keys, mode, "RPC feedkeys");
        Ok(self.nvim.feedkeys(keys, mode, escape_special).await?)
    }

    /// Whether a user command is defined
    pub async fn command_exists(&self, name: &str) -> Result<bool> {
        let value = self.eval(&format!("exists(':{}')", name)).await?;
        Ok(is_truthy(&value))
    }

    /// First buffer whose name contains `marker`
    ///
    /// Buffers whose name cannot be read are skipped.
    pub async fn find_buffer(&self, marker: &str) -> Result<Option<BufferView>> {
        let buffers = self.list_buffers().await?;
        let mut named = Vec::with_capacity(buffers.len());
        for buffer in buffers {
            let name = buffer.name().await;
            named.push((buffer, name));
        }
        Ok(select_by_marker(named, marker))
    }

    /// Poll until a buffer matching `marker` exists
    pub async fn wait_for_buffer(
        &self,
        marker: &str,
        policy: PollPolicy,
    ) -> Result<Option<BufferView>> {
        let found = poll_until(policy, move || async move {
            match self.find_buffer(marker).await {
                Ok(Some(buffer)) => Some(Ok(buffer)),
                Ok(None) => None,
                Err(e) => Some(Err(e)),
            }
        })
        .await;
        found.transpose()
    }

    /// One line per buffer, for failure diagnostics
    pub async fn describe_buffers(&self) -> Result<Vec<String>> {
        let mut lines = Vec::new();
        for buffer in self.list_buffers().await? {
            let number = buffer
                .number()
                .await
                .map(|n| n.to_string())
                .unwrap_or_else(|_| "?".to_string());
            let name = match buffer.name().await {
                Ok(name) if !name.is_empty() => name,
                _ => "<unnamed>".to_string(),
            };
            lines.push(format!("Buffer {}: {}", number, name));
        }
        Ok(lines)
    }

    /// Make the first window showing `buffer` current
    ///
    /// Returns false when no window displays it.
    pub async fn focus_buffer(&self, buffer: &BufferView) -> Result<bool> {
        let target = buffer.number().await?;
        for view in self.list_windows().await? {
            match view.buffer_number().await {
                Ok(number) if number == target => {
                    self.nvim.set_current_win(&view.window).await?;
                    return Ok(true);
                }
                Ok(_) => {}
                Err(e) => tracing::debug!("Skipping window: {}", e),
            }
        }
        Ok(false)
    }

    /// Wait for the host to finish its startup sequence
    pub async fn wait_until_entered(&self, policy: PollPolicy) -> bool {
        poll_until(policy, move || async move {
            match self.eval("v:vim_did_enter").await {
                Ok(value) if is_truthy(&value) => Some(()),
                _ => None,
            }
        })
        .await
        .is_some()
    }

    /// Ask the host to exit, ignoring any error
    ///
    /// The host usually drops the connection before replying.
    pub async fn quit(&self) {
        match tokio::time::timeout(QUIT_TIMEOUT, self.nvim.command("qall!")).await {
            Ok(Ok(())) => tracing::debug!("Host acknowledged qall!"),
            Ok(Err(e)) => tracing::debug!("qall! ended with: {}", e),
            Err(_) => tracing::debug!("qall! not acknowledged"),
        }
    }

    /// Drop the connection and stop its I/O task
    pub fn close(self) {
        let Self { nvim, io } = self;
        drop(nvim);
        io.abort();
    }
}

/// First candidate whose name contains `marker`, in iteration order
///
/// Candidates whose name lookup failed never match.
pub fn select_by_marker<B>(
    candidates: impl IntoIterator<Item = (B, Result<String>)>,
    marker: &str,
) -> Option<B> {
    candidates.into_iter().find_map(|(candidate, name)| match name {
        Ok(name) if name.contains(marker) => Some(candidate),
        Ok(_) => None,
        Err(e) => {
            tracing::trace!("Buffer name unavailable: {}", e);
            None
        }
    })
}

/// Vimscript truthiness for values returned by `eval`
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Boolean(b) => *b,
        Value::Integer(i) => i.as_i64().map(|n| n != 0).unwrap_or(true),
        Value::String(s) => s
            .as_str()
            .map(|s| s.trim().parse::<i64>().map(|n| n != 0).unwrap_or(false))
            .unwrap_or(false),
        _ => false,
    }
}
