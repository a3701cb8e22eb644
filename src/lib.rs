//! Tabscope: remote browser tab observation and control
//!
//! This library lets a remote client observe and drive a live browser tab
//! over the DevTools debugger protocol: one physical debugger connection
//! multiplexed into per-tab logical sessions, a stable-id interactable tree
//! over DOM snapshots, a broadcast store for cross-component notification, a
//! staged ack/response RPC gateway, and a cursor coordinator holding one
//! authoritative pointer record per tab.

pub mod error;
pub mod config;

pub mod bus;
pub mod context;
pub mod cursor;
pub mod gateway;
pub mod handlers;
pub mod transport;
pub mod tree;

// Re-exports
pub use error::{Error, ErrorKind, Result};

/// Tabscope library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
