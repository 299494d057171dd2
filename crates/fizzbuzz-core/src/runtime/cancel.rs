// crates/fizzbuzz-core/src/runtime/cancel.rs
// ============================================================================
// Module: FizzBuzz Cancellation
// Description: Cooperative cancellation flag with an optional deadline.
// Purpose: Let callers stop long encodes and skip store work they no longer need.
// Dependencies: std
// ============================================================================

//! ## Overview
//! A [`CancelToken`] is a shared stop flag plus an optional deadline. Clones
//! share the flag, so cancelling any clone cancels them all. Work checks the
//! token at safe points; nothing is interrupted mid-operation.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::time::Duration;
use std::time::Instant;

// ============================================================================
// SECTION: Cancel Token
// ============================================================================

/// Shared cancellation signal.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    /// Stop flag shared by every clone.
    stop: Arc<AtomicBool>,
    /// Instant after which the token reports cancellation.
    deadline: Option<Instant>,
}

impl CancelToken {
    /// Creates a token that is never cancelled unless [`CancelToken::cancel`] is called.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a token that expires after `timeout`.
    ///
    /// A timeout too large to represent as an [`Instant`] never expires.
    #[must_use]
    pub fn with_timeout(timeout: Duration) -> Self {
        Instant::now().checked_add(timeout).map_or_else(Self::new, Self::with_deadline)
    }

    /// Creates a token that expires at `deadline`.
    #[must_use]
    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            stop: Arc::new(AtomicBool::new(false)),
            deadline: Some(deadline),
        }
    }

    /// Returns a token sharing this stop flag that also expires after `timeout`.
    ///
    /// The earlier of the two deadlines applies. Cancelling the child cancels
    /// the parent and every other child.
    #[must_use]
    pub fn child_with_timeout(&self, timeout: Duration) -> Self {
        let child = Instant::now().checked_add(timeout);
        let deadline = match (self.deadline, child) {
            (Some(parent), Some(child)) => Some(parent.min(child)),
            (parent, child) => parent.or(child),
        };
        Self {
            stop: Arc::clone(&self.stop),
            deadline,
        }
    }

    /// Returns the time left before the deadline; `None` without a deadline.
    #[must_use]
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline.map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// Signals cancellation to every clone.
    pub fn cancel(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    /// Returns true once cancelled or past the deadline.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        if self.stop.load(Ordering::SeqCst) {
            return true;
        }
        self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use std::time::Duration;
    use std::time::Instant;

    use super::CancelToken;

    #[test]
    fn cancel_is_shared_between_clones() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn deadline_expires() {
        let token = CancelToken::with_deadline(Instant::now());
        assert!(token.is_cancelled());
        let token = CancelToken::with_timeout(Duration::from_secs(3600));
        assert!(!token.is_cancelled());
    }

    #[test]
    fn unrepresentable_timeout_never_expires() {
        let token = CancelToken::with_timeout(Duration::MAX);
        assert!(!token.is_cancelled());
        assert_eq!(token.remaining(), None);
        token.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn child_shares_stop_flag_and_keeps_its_own_deadline() {
        let parent = CancelToken::new();
        let expired = parent.child_with_timeout(Duration::ZERO);
        assert!(expired.is_cancelled());
        assert!(!parent.is_cancelled());

        let child = parent.child_with_timeout(Duration::from_secs(3600));
        assert!(!child.is_cancelled());
        assert!(child.remaining().is_some_and(|left| left <= Duration::from_secs(3600)));
        parent.cancel();
        assert!(child.is_cancelled());

        let bounded = CancelToken::with_deadline(Instant::now());
        assert!(bounded.child_with_timeout(Duration::MAX).is_cancelled());
    }
}
