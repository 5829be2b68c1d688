//! Host editor process management
//!
//! Launching the headless editor and waiting for its control socket.

pub mod launcher;
pub mod rendezvous;

pub use launcher::{resolve_binary, start, HostProcess};
pub use rendezvous::{poll_until, wait_for_socket, PollPolicy, Rendezvous};
