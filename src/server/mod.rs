//! Demo server streaming a response body through the non-blocking channel.
//!
//! Every accepted connection gets one response whose body is written in
//! non-blocking mode: the connection task writes while the channel is ready,
//! and [`ChunkedBody`] continues from the listener callback until the body is
//! complete.

pub mod body;
pub mod connection;
pub mod listener;

pub use body::ChunkedBody;
pub use connection::Connection;
