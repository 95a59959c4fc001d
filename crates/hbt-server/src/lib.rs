#![doc = include_str!("../README.md")]

pub mod client;
pub mod daemon;
pub mod error;
pub mod protocol;

pub use client::Client;
pub use daemon::{
    CACHE_NAME, DEFAULT_PORT, DEFAULT_SAVE_INTERVAL, Daemon, MAX_REQUEST_BYTES, ServerConfig,
    SharedGraph, shutdown_signal,
};
pub use error::ProtocolError;
pub use protocol::{Request, dispatch, process_command};
