//! Non-blocking output channel for a response body.
//!
//! A [`Channel`] accepts body bytes from a producer and drains them into a
//! [`Transport`]. It runs in exactly one of two disciplines, chosen once:
//!
//! - **Blocking**: the first `write` without a listener. When the transport
//!   is full the calling thread parks until the transport reports
//!   writability again.
//! - **Non-blocking**: a [`WritabilityListener`] is registered before any
//!   write. Writes never park; the producer polls [`Channel::is_ready`] and
//!   resumes from [`WritabilityListener::on_write_possible`].
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use writegate::channel::Channel;
//! use writegate::config::ChannelConfig;
//! use writegate::transport::MemoryTransport;
//!
//! # fn main() -> Result<(), writegate::error::ChannelError> {
//! let transport = Arc::new(MemoryTransport::unbounded());
//! let channel = Channel::new(
//!     Arc::clone(&transport),
//!     Arc::new(|task: writegate::channel::Task| task()),
//!     &ChannelConfig::default(),
//! );
//!
//! channel.write(b"hello")?;
//! channel.finish()?;
//! assert_eq!(transport.sent(), b"hello");
//! # Ok(())
//! # }
//! ```

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex, MutexGuard};

use crate::config::ChannelConfig;
use crate::error::{ChannelError, Result};
use crate::transport::Transport;

pub mod buffer;
pub mod gate;
pub mod mode;
pub mod notifier;

use buffer::{Drain, OutputBuffer};
use gate::ReadinessGate;
use mode::{Mode, ModeGuard};
use notifier::Event;

pub use notifier::{Dispatch, Task, TokioDispatch, WritabilityListener};

impl<F> Dispatch for F
where
    F: Fn(Task) + Send + Sync + 'static,
{
    fn dispatch(&self, task: Task) {
        self(task)
    }
}

pub(crate) struct State {
    pub(crate) mode: ModeGuard,
    pub(crate) buffer: OutputBuffer,
    pub(crate) listener: Option<Arc<dyn WritabilityListener>>,
    pub(crate) error: Option<ChannelError>,
    /// A writability callback is registered with the transport.
    pub(crate) armed: bool,
    /// Close once the buffer drains.
    pub(crate) finishing: bool,
    pub(crate) events: VecDeque<Event>,
    pub(crate) pumping: bool,
}

impl State {
    fn ensure_open(&self) -> Result<()> {
        if self.mode.is_closed() || self.error.is_some() || self.finishing {
            return Err(ChannelError::AlreadyClosed);
        }
        Ok(())
    }

    /// Queues `event`; returns `true` when a pump must be scheduled.
    pub(crate) fn enqueue(&mut self, event: Event) -> bool {
        self.events.push_back(event);
        if self.pumping {
            false
        } else {
            self.pumping = true;
            true
        }
    }
}

pub(crate) struct Inner<T> {
    pub(crate) transport: T,
    pub(crate) dispatch: Arc<dyn Dispatch>,
    pub(crate) gate: ReadinessGate,
    pub(crate) state: Mutex<State>,
    pub(crate) writable: Condvar,
    write_timeout: Option<Duration>,
}

/// Outcome of a drain performed under the state lock. Follow-up work that
/// must run without the lock is carried back to the caller.
enum Drained {
    Complete,
    Blocked { arm: bool },
    Failed { error: ChannelError, pump: bool },
}

impl<T: Transport> Inner<T> {
    fn drain(&self, state: &mut State) -> Drained {
        match state.buffer.drain_to(&self.transport) {
            Ok(Drain::Complete) => Drained::Complete,
            Ok(Drain::Blocked) => {
                self.gate.mark_not_ready();
                let arm = !state.armed;
                state.armed = true;
                Drained::Blocked { arm }
            }
            Err(e) => {
                let error = ChannelError::transport(&e);
                let pump = self.fail(state, error.clone());
                Drained::Failed { error, pump }
            }
        }
    }

    /// Puts the channel into the terminal error state. Returns `true` when an
    /// `on_error` delivery needs a pump.
    pub(crate) fn fail(&self, state: &mut State, error: ChannelError) -> bool {
        if state.error.is_some() || state.mode.is_closed() {
            return false;
        }

        let mode = state.mode.mode();
        tracing::warn!(
            error = %error,
            mode = ?mode,
            discarded = state.buffer.len(),
            "output channel failed"
        );

        state.mode.close();
        state.error = Some(error.clone());
        state.buffer.clear();
        state.events.retain(|e| !matches!(e, Event::WritePossible));
        self.gate.mark_not_ready();
        self.writable.notify_all();
        self.transport.close();

        if mode == Mode::NonBlocking && state.listener.is_some() {
            state.enqueue(Event::Error(error))
        } else {
            false
        }
    }

    /// Terminal close bookkeeping, shared by `close` and a completed `finish`.
    pub(crate) fn shutdown(&self, state: &mut State) {
        if !state.mode.close() {
            return;
        }

        state.buffer.clear();
        state.finishing = false;
        state.events.retain(|e| matches!(e, Event::Error(_)));
        if state.events.is_empty() {
            state.listener = None;
        }
        self.gate.mark_not_ready();
        self.writable.notify_all();
        self.transport.close();
        tracing::debug!("output channel closed");
    }

    /// Parks until the transport reports writability, the channel fails, or
    /// the channel closes.
    fn wait_writable(self: &Arc<Self>, state: &mut MutexGuard<'_, State>, arm: bool) -> Result<()> {
        if arm {
            MutexGuard::unlocked(state, || self.arm());
        }
        if self.gate.is_ready() || state.error.is_some() || state.mode.is_closed() {
            return Ok(());
        }

        match self.write_timeout {
            Some(timeout) => {
                let timed_out = self.writable.wait_for(state, timeout).timed_out();
                if timed_out
                    && !self.gate.is_ready()
                    && state.error.is_none()
                    && !state.mode.is_closed()
                {
                    let error = ChannelError::timed_out();
                    self.fail(state, error.clone());
                    return Err(error);
                }
            }
            None => self.writable.wait(state),
        }
        Ok(())
    }

    fn write_blocking(self: &Arc<Self>, mut state: MutexGuard<'_, State>, mut bytes: &[u8]) -> Result<()> {
        loop {
            if let Some(error) = &state.error {
                return Err(error.clone());
            }
            if state.mode.is_closed() {
                return Err(ChannelError::AlreadyClosed);
            }

            let offered = state.buffer.offer(bytes);
            bytes = &bytes[offered..];

            let mut arm = false;
            if self.gate.is_ready() {
                match self.drain(&mut state) {
                    Drained::Complete => {}
                    Drained::Blocked { arm: a } => arm = a,
                    Drained::Failed { error, .. } => return Err(error),
                }
            }

            if bytes.is_empty() {
                drop(state);
                if arm {
                    self.arm();
                }
                return Ok(());
            }

            self.wait_writable(&mut state, arm)?;
        }
    }

    fn write_nonblocking(self: &Arc<Self>, mut state: MutexGuard<'_, State>, bytes: &[u8]) -> Result<()> {
        if !self.gate.is_ready() {
            return Err(ChannelError::ProtocolViolation(
                "non-blocking write attempted while channel is not ready",
            ));
        }

        state.buffer.offer_all(bytes)?;
        let drained = self.drain(&mut state);
        drop(state);
        self.follow_up(drained);
        Ok(())
    }

    fn follow_up(self: &Arc<Self>, drained: Drained) {
        match drained {
            Drained::Blocked { arm: true } => self.arm(),
            Drained::Failed { pump: true, .. } => self.schedule_pump(),
            _ => {}
        }
    }

    /// Drains until empty, parking between attempts.
    fn flush_blocking(self: &Arc<Self>, mut state: MutexGuard<'_, State>) -> Result<()> {
        loop {
            if let Some(error) = &state.error {
                return Err(error.clone());
            }
            if state.mode.is_closed() {
                return Err(ChannelError::AlreadyClosed);
            }
            if state.buffer.is_empty() {
                return Ok(());
            }

            let mut arm = false;
            if self.gate.is_ready() {
                match self.drain(&mut state) {
                    Drained::Complete => return Ok(()),
                    Drained::Blocked { arm: a } => arm = a,
                    Drained::Failed { error, .. } => return Err(error),
                }
            }
            self.wait_writable(&mut state, arm)?;
        }
    }
}

/// Per-response output channel. Cloning yields another handle to the same
/// channel, which is how a listener reaches back to write more.
pub struct Channel<T: Transport> {
    inner: Arc<Inner<T>>,
}

impl<T: Transport> Clone for Channel<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Transport> Channel<T> {
    pub fn new(transport: T, dispatch: Arc<dyn Dispatch>, config: &ChannelConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                transport,
                dispatch,
                gate: ReadinessGate::new(),
                state: Mutex::new(State {
                    mode: ModeGuard::new(),
                    buffer: OutputBuffer::new(config.buffer_capacity),
                    listener: None,
                    error: None,
                    armed: false,
                    finishing: false,
                    events: VecDeque::new(),
                    pumping: false,
                }),
                writable: Condvar::new(),
                write_timeout: config.write_timeout(),
            }),
        }
    }

    /// Writes `bytes` using the channel's discipline.
    ///
    /// On an undecided channel this commits to blocking mode. In blocking
    /// mode the call parks while the transport is full. In non-blocking mode
    /// the channel must be ready; the call never parks and may leave the
    /// channel not-ready for the next write.
    pub fn write(&self, bytes: &[u8]) -> Result<()> {
        let mut state = self.inner.state.lock();
        state.ensure_open()?;
        let mode = state.mode.begin_write()?;
        match mode {
            Mode::NonBlocking => self.inner.write_nonblocking(state, bytes),
            _ => self.inner.write_blocking(state, bytes),
        }
    }

    /// Writes `bytes` with the blocking discipline, rejecting the call if a
    /// listener has been registered.
    pub fn write_blocking(&self, bytes: &[u8]) -> Result<()> {
        let mut state = self.inner.state.lock();
        state.ensure_open()?;
        state.mode.begin_blocking_write()?;
        self.inner.write_blocking(state, bytes)
    }

    /// Whether the channel accepts more data right now. Lock-free.
    pub fn is_ready(&self) -> bool {
        self.inner.gate.is_ready()
    }

    /// Switches the channel to non-blocking mode. Only valid before any
    /// write, and only once.
    pub fn set_writability_listener(&self, listener: Arc<dyn WritabilityListener>) -> Result<()> {
        let mut state = self.inner.state.lock();
        state.ensure_open()?;
        state.mode.register_listener()?;
        state.listener = Some(listener);
        Ok(())
    }

    /// Pushes buffered bytes toward the transport.
    ///
    /// Blocking and undecided channels wait until the buffer is empty.
    /// Non-blocking channels make a single attempt and do nothing while not
    /// ready.
    pub fn flush(&self) -> Result<()> {
        let state = self.inner.state.lock();
        state.ensure_open()?;
        self.flush_locked(state)
    }

    fn flush_locked(&self, mut state: MutexGuard<'_, State>) -> Result<()> {
        if state.mode.mode() != Mode::NonBlocking {
            return self.inner.flush_blocking(state);
        }
        if !self.inner.gate.is_ready() || state.buffer.is_empty() {
            return Ok(());
        }
        let drained = self.inner.drain(&mut state);
        drop(state);
        self.inner.follow_up(drained);
        Ok(())
    }

    /// Completes the body.
    ///
    /// Blocking and undecided channels flush and close. A non-blocking
    /// channel closes at once if nothing is buffered; otherwise it stops
    /// accepting writes and closes itself when the buffer drains.
    pub fn finish(&self) -> Result<()> {
        let state = self.inner.state.lock();
        state.ensure_open()?;

        if state.mode.mode() != Mode::NonBlocking {
            self.flush_locked(state)?;
            self.close();
            return Ok(());
        }

        let mut state = state;
        if self.inner.gate.is_ready() && !state.buffer.is_empty() {
            match self.inner.drain(&mut state) {
                Drained::Failed { error, pump } => {
                    drop(state);
                    if pump {
                        self.inner.schedule_pump();
                    }
                    return Err(error);
                }
                Drained::Blocked { arm: true } => {
                    MutexGuard::unlocked(&mut state, || self.inner.arm());
                }
                _ => {}
            }
        }

        if state.buffer.is_empty() {
            self.inner.shutdown(&mut state);
        } else {
            tracing::debug!(pending = state.buffer.len(), "finish deferred until drained");
            state.finishing = true;
        }
        Ok(())
    }

    /// Closes the channel. Idempotent.
    ///
    /// Makes one non-blocking attempt to drain what is buffered, then
    /// discards the rest. A thread parked in a blocking write wakes with
    /// [`ChannelError::AlreadyClosed`]; pending `on_write_possible`
    /// deliveries are suppressed.
    pub fn close(&self) {
        let mut state = self.inner.state.lock();
        if state.mode.is_closed() {
            return;
        }
        if state.error.is_none() && self.inner.gate.is_ready() && !state.buffer.is_empty() {
            if let Err(e) = state.buffer.drain_to(&self.inner.transport) {
                tracing::debug!(error = %e, "final drain on close failed");
            }
        }
        self.inner.shutdown(&mut state);
    }

    pub fn mode(&self) -> Mode {
        self.inner.state.lock().mode.mode()
    }

    /// Bytes buffered but not yet accepted by the transport.
    pub fn buffered(&self) -> usize {
        self.inner.state.lock().buffer.len()
    }

    /// The error that terminated the channel, if any.
    pub fn error(&self) -> Option<ChannelError> {
        self.inner.state.lock().error.clone()
    }

    pub fn is_closed(&self) -> bool {
        let state = self.inner.state.lock();
        state.mode.is_closed() || state.error.is_some()
    }

    /// Queues `bytes` without fixing the channel's discipline. Used for the
    /// serialized response head and facade-generated bodies.
    ///
    /// Undecided and blocking channels stream the bytes through the buffer,
    /// parking while the transport is full. A non-blocking channel must take
    /// them in one piece.
    pub(crate) fn preface(&self, bytes: &[u8]) -> Result<()> {
        let mut state = self.inner.state.lock();
        state.ensure_open()?;
        match state.mode.mode() {
            Mode::NonBlocking if self.inner.gate.is_ready() => self.inner.write_nonblocking(state, bytes),
            Mode::NonBlocking => state.buffer.offer_all(bytes),
            _ => self.inner.write_blocking(state, bytes),
        }
    }

    pub fn buffer_capacity(&self) -> usize {
        self.inner.state.lock().buffer.capacity()
    }

    /// Replaces the output buffer with one of `capacity` bytes. Only allowed
    /// while nothing is buffered.
    pub fn set_buffer_capacity(&self, capacity: usize) -> Result<()> {
        let mut state = self.inner.state.lock();
        state.ensure_open()?;
        if capacity == 0 {
            return Err(ChannelError::ProtocolViolation("buffer capacity must be greater than zero"));
        }
        if !state.buffer.is_empty() {
            return Err(ChannelError::ProtocolViolation(
                "buffer resized while it still holds data",
            ));
        }
        state.buffer = OutputBuffer::new(capacity);
        Ok(())
    }

    /// Drops buffered bytes the transport has not taken yet. Returns how
    /// many were dropped.
    pub fn discard_buffered(&self) -> Result<usize> {
        let mut state = self.inner.state.lock();
        state.ensure_open()?;
        let dropped = state.buffer.len();
        state.buffer.clear();
        Ok(dropped)
    }

    /// Feeds a writability signal directly, as a transport adapter would.
    pub fn notify_writable(&self) {
        self.inner.on_transport_writable();
    }
}
