//! Shutdown coordination between the signal listener, the startup sequence
//! and the running engine.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

/// Shared shutdown state.
///
/// `initiated` is set as soon as a termination request arrives; the startup
/// sequence checks it between steps and the engine stops accepting work.
/// `complete` is set once the shutdown handler finished its cleanup.
#[derive(Debug, Clone)]
pub struct ShutdownState {
    shutdown_initiated: Arc<AtomicBool>,
    shutdown_complete: Arc<AtomicBool>,
}

impl ShutdownState {
    /// Creates a new shutdown state with both flags set to false.
    pub fn new() -> Self {
        Self {
            shutdown_initiated: Arc::new(AtomicBool::new(false)),
            shutdown_complete: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_shutdown_initiated(&self) -> bool {
        self.shutdown_initiated.load(Ordering::Acquire)
    }

    pub fn is_shutdown_complete(&self) -> bool {
        self.shutdown_complete.load(Ordering::Acquire)
    }

    /// Marks shutdown as initiated. Returns `true` for the first caller only.
    pub fn initiate_shutdown(&self) -> bool {
        let first = !self.shutdown_initiated.swap(true, Ordering::AcqRel);
        if first {
            info!("🛑 Shutdown initiated");
        }
        first
    }

    /// Marks shutdown as complete.
    pub fn complete_shutdown(&self) {
        self.shutdown_complete.store(true, Ordering::Release);
        info!("✅ Shutdown cleanup finished");
    }
}

impl Default for ShutdownState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_first_initiation_counts() {
        let state = ShutdownState::new();
        let shared = state.clone();

        assert!(!shared.is_shutdown_initiated());
        assert!(state.initiate_shutdown());
        assert!(!shared.initiate_shutdown());
        assert!(shared.is_shutdown_initiated());
        assert!(!shared.is_shutdown_complete());

        state.complete_shutdown();
        assert!(shared.is_shutdown_complete());
    }
}
