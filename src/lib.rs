//! Writegate - non-blocking response output
//!
//! Core library for the per-response output channel, its transports, and a
//! thin HTTP response facade on top.

pub mod channel;
pub mod config;
pub mod error;
pub mod http;
pub mod server;
pub mod transport;

pub use channel::{Channel, Dispatch, TokioDispatch, WritabilityListener};
pub use error::{ChannelError, ErrorKind};
