//! In-memory transport with a scriptable send window.
//!
//! Bytes accepted by [`MemoryTransport::try_send`] are appended to an internal
//! sink. A byte budget simulates a full socket buffer, a pending failure
//! simulates a reset connection, and [`MemoryTransport::signal_writable`]
//! plays the role of the reactor reporting writability.

use std::io;

use parking_lot::Mutex;

use super::{SendOutcome, Transport, WakeFn};

#[derive(Default)]
struct MemoryState {
    sent: Vec<u8>,
    // None = unlimited
    budget: Option<usize>,
    failure: Option<io::ErrorKind>,
    wake: Option<WakeFn>,
    registrations: usize,
    closed: bool,
}

#[derive(Default)]
pub struct MemoryTransport {
    state: Mutex<MemoryState>,
}

impl MemoryTransport {
    /// Transport that accepts everything.
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// Transport that accepts at most `budget` bytes before blocking.
    pub fn with_budget(budget: usize) -> Self {
        let transport = Self::default();
        transport.set_budget(Some(budget));
        transport
    }

    pub fn set_budget(&self, budget: Option<usize>) {
        self.state.lock().budget = budget;
    }

    /// Adds `bytes` to the remaining budget. No effect when unlimited.
    pub fn grant(&self, bytes: usize) {
        let mut state = self.state.lock();
        if let Some(budget) = state.budget.as_mut() {
            *budget += bytes;
        }
    }

    /// Makes every subsequent send fail with `kind`.
    pub fn fail_with(&self, kind: io::ErrorKind) {
        self.state.lock().failure = Some(kind);
    }

    /// Invokes the most recently registered writability callback.
    ///
    /// The callback is kept, so repeated calls deliver duplicate signals the
    /// way a level-triggered reactor would. Returns `false` when nothing has
    /// been registered yet.
    pub fn signal_writable(&self) -> bool {
        let wake = self.state.lock().wake.clone();
        match wake {
            Some(wake) => {
                wake();
                true
            }
            None => false,
        }
    }

    /// Everything accepted so far, in order.
    pub fn sent(&self) -> Vec<u8> {
        self.state.lock().sent.clone()
    }

    pub fn sent_len(&self) -> usize {
        self.state.lock().sent.len()
    }

    /// How many times a writability callback was registered.
    pub fn registrations(&self) -> usize {
        self.state.lock().registrations
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }
}

impl Transport for MemoryTransport {
    fn try_send(&self, bytes: &[u8]) -> io::Result<SendOutcome> {
        let mut state = self.state.lock();
        if let Some(kind) = state.failure {
            return Err(io::Error::new(kind, "injected transport failure"));
        }
        if state.closed {
            return Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "memory transport closed",
            ));
        }

        let accepted = match state.budget {
            Some(budget) => budget.min(bytes.len()),
            None => bytes.len(),
        };
        if let Some(budget) = state.budget.as_mut() {
            *budget -= accepted;
        }
        state.sent.extend_from_slice(&bytes[..accepted]);

        if accepted < bytes.len() {
            Ok(SendOutcome::blocked(accepted))
        } else {
            Ok(SendOutcome::complete(accepted))
        }
    }

    fn on_writable(&self, wake: WakeFn) {
        let mut state = self.state.lock();
        state.registrations += 1;
        state.wake = Some(wake);
    }

    fn close(&self) {
        let mut state = self.state.lock();
        state.closed = true;
        state.wake = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn budget_limits_accepted_bytes() {
        let transport = MemoryTransport::with_budget(4);
        let outcome = transport.try_send(b"abcdef").unwrap();
        assert_eq!(outcome, SendOutcome::blocked(4));
        assert_eq!(transport.sent(), b"abcd");

        transport.grant(10);
        let outcome = transport.try_send(b"ef").unwrap();
        assert_eq!(outcome, SendOutcome::complete(2));
        assert_eq!(transport.sent(), b"abcdef");
    }

    #[test]
    fn injected_failure_surfaces_as_io_error() {
        let transport = MemoryTransport::unbounded();
        transport.fail_with(io::ErrorKind::ConnectionReset);
        let err = transport.try_send(b"x").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::ConnectionReset);
    }

    #[test]
    fn signal_without_registration_is_noop() {
        let transport = MemoryTransport::unbounded();
        assert!(!transport.signal_writable());
    }
}
