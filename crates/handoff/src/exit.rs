//! ExitFlag - the one piece of shared state besides the queues

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cooperative shutdown flag shared by every pipeline thread.
///
/// Raising it stops new work from starting; threads blocked in a queue are
/// woken separately by closing that queue.
#[derive(Debug, Clone, Default)]
pub struct ExitFlag(Arc<AtomicBool>);

impl ExitFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request shutdown. Returns `true` if this call raised it.
    pub fn raise(&self) -> bool {
        !self.0.swap(true, Ordering::SeqCst)
    }

    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raise_is_shared_and_sticky() {
        let flag = ExitFlag::new();
        let other = flag.clone();
        assert!(!other.is_raised());
        assert!(flag.raise());
        assert!(!flag.raise());
        assert!(other.is_raised());
    }
}
