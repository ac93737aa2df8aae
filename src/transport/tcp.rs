use std::io;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::net::TcpStream;
use tokio::runtime::Handle;
use tokio::sync::watch;

use super::{SendOutcome, Transport, WakeFn};

/// Transport over a tokio [`TcpStream`].
///
/// Sends go through `try_write`, which never parks the caller. Writability
/// is observed by a task spawned on the runtime that awaits
/// [`TcpStream::writable`] and then fires the registered callback. Closing
/// the transport cancels pending waiters, so the socket is released even
/// when the peer has stopped reading.
pub struct TcpTransport {
    stream: Mutex<Option<Arc<TcpStream>>>,
    closed: watch::Sender<bool>,
    handle: Handle,
}

impl TcpTransport {
    /// Wraps `stream`; writability tasks are spawned on `handle`.
    pub fn new(stream: TcpStream, handle: Handle) -> Self {
        Self {
            stream: Mutex::new(Some(Arc::new(stream))),
            closed: watch::Sender::new(false),
            handle,
        }
    }

    fn stream(&self) -> Option<Arc<TcpStream>> {
        self.stream.lock().clone()
    }
}

impl Transport for TcpTransport {
    fn try_send(&self, bytes: &[u8]) -> io::Result<SendOutcome> {
        let Some(stream) = self.stream() else {
            return Err(io::Error::new(io::ErrorKind::NotConnected, "transport closed"));
        };

        match stream.try_write(bytes) {
            Ok(0) if !bytes.is_empty() => Err(io::Error::new(
                io::ErrorKind::WriteZero,
                "connection closed while writing",
            )),
            Ok(n) => Ok(SendOutcome::complete(n)),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(SendOutcome::blocked(0)),
            Err(e) => Err(e),
        }
    }

    fn on_writable(&self, wake: WakeFn) {
        let Some(stream) = self.stream() else {
            return;
        };
        let mut closed = self.closed.subscribe();

        self.handle.spawn(async move {
            tokio::select! {
                ready = stream.writable() => {
                    // An error here resurfaces on the next try_write, so wake either way.
                    if let Err(e) = ready {
                        tracing::trace!(error = %e, "writable readiness failed");
                    }
                    wake();
                }
                _ = closed.wait_for(|closed| *closed) => {
                    tracing::trace!("writable wait cancelled by close");
                }
            }
        });
    }

    fn close(&self) {
        // Dropping the last Arc closes the socket. Waiters drop their clones
        // once they see the close signal.
        let stream = self.stream.lock().take();
        self.closed.send_replace(true);
        if stream.is_some() {
            tracing::trace!("tcp transport closed");
        }
    }
}
