//! Operator input shared between an input source and a display

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use contracts::OperatorKey;

/// Pending operator requests.
///
/// Set from any thread (Ctrl+C handler, tests); each request is observed by
/// exactly one [`take`](Self::take). Exit wins over start-saving.
#[derive(Debug, Clone, Default)]
pub struct InterruptSignal {
    inner: Arc<Pending>,
}

#[derive(Debug, Default)]
struct Pending {
    exit: AtomicBool,
    start_saving: AtomicBool,
}

impl InterruptSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_exit(&self) {
        self.inner.exit.store(true, Ordering::SeqCst);
    }

    pub fn request_saving(&self) {
        self.inner.start_saving.store(true, Ordering::SeqCst);
    }

    /// Whether an exit request is still waiting to be taken
    pub fn exit_pending(&self) -> bool {
        self.inner.exit.load(Ordering::SeqCst)
    }

    /// Consume the highest-priority pending request
    pub fn take(&self) -> Option<OperatorKey> {
        if self.inner.exit.swap(false, Ordering::SeqCst) {
            Some(OperatorKey::Exit)
        } else if self.inner.start_saving.swap(false, Ordering::SeqCst) {
            Some(OperatorKey::StartSaving)
        } else {
            None
        }
    }
}
