//! Error taxonomy for the output channel.

use std::io;

/// Coarse classification of a [`ChannelError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Wrong write discipline, write without readiness, second listener.
    ProtocolViolation,
    /// A non-blocking write would overflow the output buffer.
    CapacityExceeded,
    /// The underlying connection failed or timed out.
    TransportFailure,
    /// Operation on a closed or failed channel.
    AlreadyClosed,
    /// The writability listener returned an error or panicked.
    ListenerFailure,
}

/// Errors reported by [`Channel`](crate::channel::Channel) operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChannelError {
    #[error("protocol violation: {0}")]
    ProtocolViolation(&'static str),

    #[error("write of {requested} bytes exceeds output buffer ({available} of {capacity} bytes free)")]
    CapacityExceeded {
        requested: usize,
        available: usize,
        capacity: usize,
    },

    #[error("transport failure ({kind:?}): {message}")]
    TransportFailure { kind: io::ErrorKind, message: String },

    #[error("channel already closed")]
    AlreadyClosed,

    #[error("writability listener failed: {0}")]
    ListenerFailure(String),
}

impl ChannelError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ChannelError::ProtocolViolation(_) => ErrorKind::ProtocolViolation,
            ChannelError::CapacityExceeded { .. } => ErrorKind::CapacityExceeded,
            ChannelError::TransportFailure { .. } => ErrorKind::TransportFailure,
            ChannelError::AlreadyClosed => ErrorKind::AlreadyClosed,
            ChannelError::ListenerFailure(_) => ErrorKind::ListenerFailure,
        }
    }

    /// Wraps an I/O error raised by the transport.
    pub fn transport(err: &io::Error) -> Self {
        ChannelError::TransportFailure {
            kind: err.kind(),
            message: err.to_string(),
        }
    }

    pub(crate) fn timed_out() -> Self {
        ChannelError::TransportFailure {
            kind: io::ErrorKind::TimedOut,
            message: "timed out waiting for transport capacity".to_string(),
        }
    }
}

impl From<ChannelError> for io::Error {
    fn from(err: ChannelError) -> io::Error {
        let kind = match &err {
            ChannelError::TransportFailure { kind, .. } => *kind,
            ChannelError::AlreadyClosed => io::ErrorKind::BrokenPipe,
            ChannelError::CapacityExceeded { .. } => io::ErrorKind::WouldBlock,
            ChannelError::ProtocolViolation(_) => io::ErrorKind::InvalidInput,
            ChannelError::ListenerFailure(_) => io::ErrorKind::Other,
        };
        io::Error::new(kind, err)
    }
}

pub type Result<T> = std::result::Result<T, ChannelError>;
