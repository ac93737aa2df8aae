//! Bounded FIFO of bytes awaiting the transport.

use std::io;

use bytes::{Buf, BytesMut};

use crate::error::ChannelError;
use crate::transport::Transport;

/// Outcome of [`OutputBuffer::drain_to`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Drain {
    /// Every buffered byte reached the transport.
    Complete,
    /// The transport stopped accepting; bytes remain buffered.
    Blocked,
}

#[derive(Debug)]
pub struct OutputBuffer {
    bytes: BytesMut,
    capacity: usize,
}

impl OutputBuffer {
    /// A zero `capacity` is raised to one byte; an empty buffer could never
    /// make progress.
    pub fn new(capacity: usize) -> Self {
        if capacity == 0 {
            tracing::warn!("output buffer capacity of zero raised to one byte");
        }
        let capacity = capacity.max(1);
        Self {
            bytes: BytesMut::with_capacity(capacity),
            capacity,
        }
    }

    /// Appends as much of `bytes` as fits and returns the accepted count.
    pub fn offer(&mut self, bytes: &[u8]) -> usize {
        let n = bytes.len().min(self.remaining());
        self.bytes.extend_from_slice(&bytes[..n]);
        n
    }

    /// Appends all of `bytes` or nothing.
    pub fn offer_all(&mut self, bytes: &[u8]) -> Result<(), ChannelError> {
        if bytes.len() > self.remaining() {
            return Err(ChannelError::CapacityExceeded {
                requested: bytes.len(),
                available: self.remaining(),
                capacity: self.capacity,
            });
        }
        self.bytes.extend_from_slice(bytes);
        Ok(())
    }

    /// Pushes buffered bytes through `transport`, stopping at the first
    /// blocked or zero-progress send.
    pub fn drain_to<T: Transport + ?Sized>(&mut self, transport: &T) -> io::Result<Drain> {
        while !self.bytes.is_empty() {
            let outcome = transport.try_send(&self.bytes)?;
            let accepted = outcome.accepted.min(self.bytes.len());
            self.bytes.advance(accepted);

            if outcome.would_block || accepted == 0 {
                tracing::trace!(
                    accepted,
                    pending = self.bytes.len(),
                    "transport blocked during drain"
                );
                return Ok(Drain::Blocked);
            }
        }
        Ok(Drain::Complete)
    }

    /// Discards everything still buffered.
    pub fn clear(&mut self) {
        self.bytes.clear();
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn remaining(&self) -> usize {
        self.capacity - self.bytes.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
