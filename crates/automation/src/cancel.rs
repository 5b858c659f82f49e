use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cooperative cancellation for an evaluation pass.
///
/// Once cancelled, rules that have not started are not scheduled. Rules
/// already in flight (including their action execution) finish normally.
#[derive(Debug, Clone, Default)]
pub struct PassCancellation {
    cancelled: Arc<AtomicBool>,
}

impl PassCancellation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_state() {
        let token = PassCancellation::new();
        let other = token.clone();
        assert!(!other.is_cancelled());
        token.cancel();
        assert!(other.is_cancelled());
    }
}
