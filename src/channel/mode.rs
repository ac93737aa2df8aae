//! Write-discipline state machine.
//!
//! ```text
//!                 write()                 set_writability_listener()
//!   Blocking <────────────── Undecided ──────────────> NonBlocking
//!      │                         │                          │
//!      └──────── close() ────────┴───────── close() ────────┘
//!                                ▼
//!                              Closed
//! ```
//!
//! Blocking and NonBlocking never convert into each other. A channel
//! failure also ends in Closed.

use crate::error::ChannelError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Undecided,
    Blocking,
    NonBlocking,
    Closed,
}

#[derive(Debug)]
pub struct ModeGuard {
    mode: Mode,
}

impl ModeGuard {
    pub fn new() -> Self {
        Self {
            mode: Mode::Undecided,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn is_closed(&self) -> bool {
        self.mode == Mode::Closed
    }

    /// Resolves the discipline for a plain `write`. The first write on an
    /// undecided channel commits it to blocking mode.
    pub fn begin_write(&mut self) -> Result<Mode, ChannelError> {
        match self.mode {
            Mode::Undecided => {
                tracing::debug!("channel entering blocking mode");
                self.mode = Mode::Blocking;
                Ok(Mode::Blocking)
            }
            Mode::Closed => Err(ChannelError::AlreadyClosed),
            mode => Ok(mode),
        }
    }

    /// Demands the blocking discipline explicitly.
    pub fn begin_blocking_write(&mut self) -> Result<(), ChannelError> {
        match self.mode {
            Mode::NonBlocking => Err(ChannelError::ProtocolViolation(
                "blocking write attempted after a writability listener was registered",
            )),
            _ => self.begin_write().map(|_| ()),
        }
    }

    pub fn register_listener(&mut self) -> Result<(), ChannelError> {
        match self.mode {
            Mode::Undecided => {
                tracing::debug!("channel entering non-blocking mode");
                self.mode = Mode::NonBlocking;
                Ok(())
            }
            Mode::Blocking => Err(ChannelError::ProtocolViolation(
                "writability listener registered after blocking writes began",
            )),
            Mode::NonBlocking => Err(ChannelError::ProtocolViolation(
                "writability listener already registered",
            )),
            Mode::Closed => Err(ChannelError::AlreadyClosed),
        }
    }

    /// Moves to `Closed`. Returns `false` if it already was.
    pub fn close(&mut self) -> bool {
        let was_open = self.mode != Mode::Closed;
        self.mode = Mode::Closed;
        was_open
    }
}

impl Default for ModeGuard {
    fn default() -> Self {
        Self::new()
    }
}
