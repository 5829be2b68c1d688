//! fugitive-harness - remote-control test harness for jj-fugitive
//!
//! This library launches a headless Neovim with the plugin on its runtime
//! path, talks to it over msgpack-RPC and runs ordered assertions against
//! the buffers the plugin creates.

pub mod cli;
pub mod commands;
pub mod common;
pub mod host;
pub mod rpc;
pub mod session;
pub mod testing;

// Re-export commonly used types for tests
pub use common::{Error, Result};
pub use session::Session;
