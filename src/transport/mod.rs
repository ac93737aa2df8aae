//! Transport adapters.
//!
//! A transport is the non-blocking send capability a [`Channel`](crate::channel::Channel)
//! drains into. It never blocks: a send either hands over some prefix of the
//! bytes or reports that the peer's window is full. When capacity returns the
//! adapter invokes the callback registered through [`Transport::on_writable`].
//! Adapters may invoke it more than once per readiness change; the channel
//! tolerates duplicates.

use std::io;
use std::sync::Arc;

pub mod memory;
pub mod tcp;

pub use memory::MemoryTransport;
pub use tcp::TcpTransport;

/// Callback fired by a transport when it may accept bytes again.
pub type WakeFn = Arc<dyn Fn() + Send + Sync + 'static>;

/// Result of a single non-blocking send attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendOutcome {
    /// Number of leading bytes the transport took.
    pub accepted: usize,
    /// The transport ran out of capacity during this attempt.
    pub would_block: bool,
}

impl SendOutcome {
    pub fn complete(accepted: usize) -> Self {
        Self {
            accepted,
            would_block: false,
        }
    }

    pub fn blocked(accepted: usize) -> Self {
        Self {
            accepted,
            would_block: true,
        }
    }
}

pub trait Transport: Send + Sync + 'static {
    /// Attempts to hand `bytes` to the network layer without blocking.
    fn try_send(&self, bytes: &[u8]) -> io::Result<SendOutcome>;

    /// Registers `wake` to run once the transport becomes writable.
    fn on_writable(&self, wake: WakeFn);

    /// Releases transport resources. Calling it twice is harmless.
    fn close(&self);
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn try_send(&self, bytes: &[u8]) -> io::Result<SendOutcome> {
        (**self).try_send(bytes)
    }

    fn on_writable(&self, wake: WakeFn) {
        (**self).on_writable(wake)
    }

    fn close(&self) {
        (**self).close()
    }
}
