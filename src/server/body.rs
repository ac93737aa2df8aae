use anyhow::Context;
use bytes::Bytes;
use parking_lot::Mutex;

use crate::channel::{Channel, WritabilityListener};
use crate::error::ChannelError;
use crate::transport::Transport;

/// Streams `chunks` copies of a fixed chunk through a non-blocking channel.
///
/// [`ChunkedBody::resume`] writes while the channel is ready and returns as
/// soon as it is not. The same call is made by the producer for the initial
/// burst and by the listener callback after each readiness transition; the
/// internal lock keeps the two from writing concurrently.
pub struct ChunkedBody<T: Transport> {
    channel: Channel<T>,
    chunk: Bytes,
    remaining: Mutex<usize>,
}

impl<T: Transport> ChunkedBody<T> {
    pub fn new(channel: Channel<T>, chunks: usize, chunk_size: usize) -> Self {
        let chunk: Vec<u8> = (0..chunk_size).map(|i| b'a' + (i % 26) as u8).collect();
        Self {
            channel,
            chunk: Bytes::from(chunk),
            remaining: Mutex::new(chunks),
        }
    }

    /// Total body length in bytes.
    pub fn content_length(&self) -> u64 {
        (*self.remaining.lock() * self.chunk.len()) as u64
    }

    pub fn remaining(&self) -> usize {
        *self.remaining.lock()
    }

    pub fn resume(&self) -> Result<(), ChannelError> {
        let mut remaining = self.remaining.lock();
        while self.channel.is_ready() {
            if *remaining == 0 {
                return self.channel.finish();
            }
            self.channel.write(&self.chunk)?;
            *remaining -= 1;
        }
        tracing::trace!(remaining = *remaining, "body paused until writable");
        Ok(())
    }
}

impl<T: Transport> WritabilityListener for ChunkedBody<T> {
    fn on_write_possible(&self) -> anyhow::Result<()> {
        self.resume().context("Failed to continue streaming body")
    }

    fn on_error(&self, error: &ChannelError) {
        tracing::warn!(
            error = %error,
            remaining = self.remaining(),
            "body streaming aborted"
        );
    }
}
