//! Shared helpers for channel tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use parking_lot::Mutex;
use writegate::channel::{Channel, Dispatch, Task, WritabilityListener};
use writegate::config::ChannelConfig;
use writegate::error::ChannelError;
use writegate::transport::MemoryTransport;

/// Dispatch context that queues tasks until the test runs them.
#[derive(Clone, Default)]
pub struct ManualDispatch {
    queue: Arc<Mutex<VecDeque<Task>>>,
}

impl ManualDispatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dispatcher(&self) -> Arc<dyn Dispatch> {
        let queue = Arc::clone(&self.queue);
        Arc::new(move |task: Task| queue.lock().push_back(task))
    }

    pub fn pending(&self) -> usize {
        self.queue.lock().len()
    }

    /// Runs queued tasks, including ones queued while running, and returns
    /// how many ran.
    pub fn run_pending(&self) -> usize {
        let mut ran = 0;
        loop {
            let task = self.queue.lock().pop_front();
            match task {
                Some(task) => {
                    task();
                    ran += 1;
                }
                None => return ran,
            }
        }
    }
}

/// Listener that counts callbacks and can be told to fail.
#[derive(Default)]
pub struct RecordingListener {
    write_possible: AtomicUsize,
    errors: Mutex<Vec<ChannelError>>,
    fail: AtomicBool,
}

impl RecordingListener {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing() -> Arc<Self> {
        let listener = Self::default();
        listener.fail.store(true, Ordering::SeqCst);
        Arc::new(listener)
    }

    pub fn write_possible(&self) -> usize {
        self.write_possible.load(Ordering::SeqCst)
    }

    pub fn errors(&self) -> Vec<ChannelError> {
        self.errors.lock().clone()
    }
}

impl WritabilityListener for RecordingListener {
    fn on_write_possible(&self) -> anyhow::Result<()> {
        self.write_possible.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            anyhow::bail!("listener refused to write");
        }
        Ok(())
    }

    fn on_error(&self, error: &ChannelError) {
        self.errors.lock().push(error.clone());
    }
}

pub fn config(capacity: usize) -> ChannelConfig {
    ChannelConfig::default().with_buffer_capacity(capacity)
}

pub fn memory_channel(
    transport: &Arc<MemoryTransport>,
    dispatch: &ManualDispatch,
    capacity: usize,
) -> Channel<Arc<MemoryTransport>> {
    Channel::new(Arc::clone(transport), dispatch.dispatcher(), &config(capacity))
}

/// Deterministic test payload.
pub fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}
