//! HTTP response facade.
//!
//! The facade owns the response head and the per-response output channel.
//! It forwards body writes to the channel after a single committed-state
//! guard, and enforces that a body is produced through one handle only.
//!
//! # Lifecycle
//!
//! ```text
//!        ┌──────────────────┐
//!        │   Uncommitted    │ ← status and headers may change
//!        └──────┬───────────┘
//!               │ first body write, flush, finish or send_status
//!               ▼
//!        ┌──────────────────┐
//!        │    Committed     │ ← head queued on the channel, mutators ignored
//!        └──────┬───────────┘
//!               │ finish / close_connection
//!               ▼
//!        ┌──────────────────┐
//!        │     Finished     │ ← recycle() returns to Uncommitted
//!        └──────────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use std::io::Write;
//! use std::sync::Arc;
//! use writegate::channel::{Channel, Task};
//! use writegate::config::ChannelConfig;
//! use writegate::http::response::{Response, StatusCode};
//! use writegate::transport::MemoryTransport;
//!
//! let transport = Arc::new(MemoryTransport::unbounded());
//! let channel = Channel::new(
//!     Arc::clone(&transport),
//!     Arc::new(|task: Task| task()),
//!     &ChannelConfig::default(),
//! );
//!
//! let mut response = Response::new(channel);
//! response.set_status(StatusCode::Ok);
//! response.set_content_length(2);
//! response.output_stream().unwrap().write_all(b"hi").unwrap();
//! response.finish().unwrap();
//!
//! assert!(transport.sent().ends_with(b"\r\n\r\nhi"));
//! ```

pub mod response;
pub mod writer;

pub use response::{BodyMode, Response, StatusCode};
pub use writer::{BodyStream, BodyWriter};
