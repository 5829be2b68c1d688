//! nvim-rs `Handler` for the harness connection
//!
//! The harness only ever asks; anything the host sends unprompted is logged
//! and dropped.

use async_trait::async_trait;
use nvim_rs::{compat::tokio::Compat, Handler, Neovim};
use rmpv::Value;
use tokio::io::WriteHalf;

#[cfg(unix)]
type Connection = tokio::net::UnixStream;
#[cfg(windows)]
type Connection = tokio::net::windows::named_pipe::NamedPipeClient;

/// Write half of the socket connection as nvim-rs sees it
pub type Writer = Compat<WriteHalf<Connection>>;

#[derive(Clone, Default)]
pub struct HarnessHandler;

#[async_trait]
impl Handler for HarnessHandler {
    type Writer = Writer;

    async fn handle_request(
        &self,
        name: String,
        _args: Vec<Value>,
        _neovim: Neovim<Self::Writer>,
    ) -> Result<Value, Value> {
        tracing::debug!(%name, "Rejecting request from host");
        Err(Value::from(format!("fugitive-harness does not handle '{}'", name)))
    }

    async fn handle_notify(&self, name: String, args: Vec<Value>, _neovim: Neovim<Self::Writer>) {
        tracing::debug!(%name, args = args.len(), "Ignoring notification from host");
    }
}
