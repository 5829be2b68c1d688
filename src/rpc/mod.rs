//! RPC access to the host editor
//!
//! Wraps nvim-rs with the handful of calls the harness needs and with
//! marker-based buffer lookup.

pub mod buffer;
pub mod client;
pub mod handler;

pub use buffer::{BufferView, OptionValue, WindowView};
pub use client::{is_truthy, select_by_marker, RpcClient};
