use std::sync::atomic::{AtomicBool, Ordering};

/// Single source of truth for whether the channel accepts more data.
///
/// Reads are lock-free so any thread holding the channel may poll it.
/// Transitions are made by the channel while it holds its state lock; the
/// compare-exchange in [`ReadinessGate::mark_ready`] is what makes duplicate
/// writability signals harmless.
#[derive(Debug)]
pub struct ReadinessGate {
    ready: AtomicBool,
}

impl ReadinessGate {
    pub fn new() -> Self {
        Self {
            ready: AtomicBool::new(true),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    pub fn mark_not_ready(&self) {
        self.ready.store(false, Ordering::Release);
    }

    /// Flips the gate to ready. Returns `true` only if it was not ready before.
    pub fn mark_ready(&self) -> bool {
        self.ready
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

impl Default for ReadinessGate {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_ready() {
        assert!(ReadinessGate::new().is_ready());
    }

    #[test]
    fn mark_ready_reports_only_real_transitions() {
        let gate = ReadinessGate::new();
        assert!(!gate.mark_ready());

        gate.mark_not_ready();
        assert!(!gate.is_ready());
        assert!(gate.mark_ready());
        assert!(!gate.mark_ready());
        assert!(gate.is_ready());
    }
}
