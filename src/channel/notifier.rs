//! Bridges transport writability to the channel's listener.
//!
//! A writability signal from the transport drains whatever is still buffered
//! and, once the buffer is empty, flips the readiness gate. In non-blocking
//! mode that transition queues one `WritePossible` event. Events are delivered
//! by a pump running on the [`Dispatch`] context, never on the thread that
//! produced the signal and never inside a producer's `write` call. At most one
//! pump runs per channel, so deliveries keep the order of the transitions that
//! caused them.

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use tokio::runtime::Handle;

use super::Inner;
use super::buffer::Drain;
use super::mode::Mode;
use crate::error::ChannelError;
use crate::transport::Transport;

/// Receives readiness and failure notifications for a non-blocking channel.
pub trait WritabilityListener: Send + Sync + 'static {
    /// The channel went from not-ready to ready. Returning an error is
    /// terminal for the channel.
    fn on_write_possible(&self) -> anyhow::Result<()>;

    /// The channel failed. Called at most once, and nothing follows it.
    fn on_error(&self, error: &ChannelError);
}

pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Execution context for listener callbacks.
pub trait Dispatch: Send + Sync + 'static {
    fn dispatch(&self, task: Task);
}

/// Runs listener callbacks on tokio's blocking pool.
#[derive(Clone)]
pub struct TokioDispatch {
    handle: Handle,
}

impl TokioDispatch {
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Uses the runtime the caller is currently running on.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    pub fn current() -> Self {
        Self::new(Handle::current())
    }
}

impl Dispatch for TokioDispatch {
    fn dispatch(&self, task: Task) {
        // The join handle is not needed; the task reports through the listener.
        drop(self.handle.spawn_blocking(task));
    }
}

#[derive(Debug, Clone)]
pub(crate) enum Event {
    WritePossible,
    Error(ChannelError),
}

impl<T: Transport> Inner<T> {
    /// Registers for the next writability signal from the transport.
    pub(crate) fn arm(self: &Arc<Self>) {
        let weak = Arc::downgrade(self);
        self.transport.on_writable(Arc::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.on_transport_writable();
            }
        }));
    }

    pub(crate) fn on_transport_writable(self: &Arc<Self>) {
        let mut state = self.state.lock();
        state.armed = false;

        if state.mode.is_closed() || state.error.is_some() {
            tracing::trace!("writable signal after close ignored");
            return;
        }
        if self.gate.is_ready() {
            tracing::trace!("duplicate writable signal ignored");
            return;
        }

        match state.buffer.drain_to(&self.transport) {
            Ok(Drain::Complete) => {}
            Ok(Drain::Blocked) => {
                let arm = !state.armed;
                state.armed = true;
                drop(state);
                if arm {
                    self.arm();
                }
                return;
            }
            Err(e) => {
                let pump = self.fail(&mut state, ChannelError::transport(&e));
                drop(state);
                if pump {
                    self.schedule_pump();
                }
                return;
            }
        }

        if state.finishing {
            self.shutdown(&mut state);
            return;
        }

        if !self.gate.mark_ready() {
            return;
        }
        self.writable.notify_all();
        tracing::trace!(mode = ?state.mode.mode(), "channel ready");

        let pump = state.mode.mode() == Mode::NonBlocking
            && state.listener.is_some()
            && state.enqueue(Event::WritePossible);
        drop(state);
        if pump {
            self.schedule_pump();
        }
    }

    pub(crate) fn schedule_pump(self: &Arc<Self>) {
        let inner = Arc::clone(self);
        self.dispatch.dispatch(Box::new(move || inner.pump()));
    }

    fn pump(self: &Arc<Self>) {
        loop {
            let (event, listener) = {
                let mut state = self.state.lock();
                let Some(event) = state.events.pop_front() else {
                    state.pumping = false;
                    return;
                };
                let Some(listener) = state.listener.clone() else {
                    continue;
                };
                if matches!(event, Event::WritePossible)
                    && (state.mode.is_closed() || state.error.is_some() || state.finishing)
                {
                    continue;
                }
                (event, listener)
            };

            match event {
                Event::WritePossible => {
                    let failure = match catch_unwind(AssertUnwindSafe(|| listener.on_write_possible())) {
                        Ok(Ok(())) => None,
                        Ok(Err(e)) => Some(format!("{e:#}")),
                        Err(panic) => Some(panic_message(panic.as_ref())),
                    };
                    if let Some(message) = failure {
                        let mut state = self.state.lock();
                        // Runs inside the pump, so the error event is picked
                        // up by this loop rather than a new pump.
                        self.fail(&mut state, ChannelError::ListenerFailure(message));
                    }
                }
                Event::Error(err) => {
                    listener.on_error(&err);
                    self.state.lock().listener = None;
                }
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "listener panicked".to_string()
    }
}
