//! Two-stage cooperative cancellation.
//!
//! The first request asks long-running loops to finish up at their next safe
//! point. A second request escalates to a forced stop; whoever raised it is
//! expected to terminate the process.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// How far a cancellation request has escalated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelLevel {
    /// Stop at the next safe point and keep what was collected.
    Graceful,
    /// Stop now, unsaved work is lost.
    Forced,
}

/// Shared cancellation token checked at loop boundaries.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    requested: Arc<AtomicBool>,
}

impl CancelToken {
    /// Create a token with no pending request.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a cancellation request and report its level.
    pub fn cancel(&self) -> CancelLevel {
        if self.requested.swap(true, Ordering::SeqCst) {
            CancelLevel::Forced
        } else {
            CancelLevel::Graceful
        }
    }

    /// Whether any cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escalates_on_second_request() {
        let token = CancelToken::new();
        assert!(!token.is_cancelled());

        assert_eq!(token.cancel(), CancelLevel::Graceful);
        assert!(token.is_cancelled());

        assert_eq!(token.cancel(), CancelLevel::Forced);
        assert_eq!(token.cancel(), CancelLevel::Forced);
    }

    #[test]
    fn test_clones_share_state() {
        let token = CancelToken::new();
        let listener = token.clone();
        listener.cancel();
        assert!(token.is_cancelled());
    }
}
