// crates/fizzbuzz-store-sqlite/src/gate.rs
// ============================================================================
// Module: Checkpoint Drain Barrier
// Description: Per-store admission gate between increments and checkpoints.
// Purpose: Run WAL checkpoints only while no increment is in flight.
// Dependencies: std
// ============================================================================

//! ## Overview
//! Every increment passes through [`CheckpointGate::admit`]. Once the
//! configured number of increments has been admitted, the next caller becomes
//! the checkpoint owner: the gate is marked pending, new increments wait at the
//! gate, and the owner waits for in-flight increments to drain before it
//! checkpoints. Pending checkpoints block new admissions, so a steady stream
//! of increments cannot starve maintenance. The drain wait is bounded. An
//! automatic checkpoint restarts the interval whether it completes, times out
//! or fails, so a stuck checkpoint costs at most one attempt per interval.
//!
//! # Invariants
//! - `in_flight` counts admitted increments that have not yet left.
//! - At most one checkpoint owner exists at a time.
//! - No increment is admitted while `checkpoint_pending` is set.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Condvar;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::time::Duration;
use std::time::Instant;

use crate::store::SqliteStoreError;

// ============================================================================
// SECTION: Gate
// ============================================================================

/// Mutable gate state.
#[derive(Debug, Default)]
struct GateState {
    /// Admitted increments that have not left yet.
    in_flight: usize,
    /// A checkpoint owner exists.
    checkpoint_pending: bool,
    /// Increments admitted since the interval last restarted.
    since_checkpoint: u64,
}

/// Result of asking the gate for admission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Admission {
    /// Proceed with the increment; the caller is counted in flight.
    Proceed,
    /// The caller owns the next checkpoint and must drain, then call
    /// [`CheckpointGate::finish_checkpoint`].
    Checkpoint,
}

/// Drain barrier owned by one store instance.
#[derive(Debug)]
pub(crate) struct CheckpointGate {
    /// Shared state.
    state: Mutex<GateState>,
    /// Signalled when in-flight work drains or a checkpoint finishes.
    changed: Condvar,
    /// Increments between automatic checkpoints; zero disables them.
    interval: u64,
}

impl CheckpointGate {
    /// Creates a gate that requests a checkpoint every `interval` increments.
    pub(crate) fn new(interval: u64) -> Self {
        Self {
            state: Mutex::new(GateState::default()),
            changed: Condvar::new(),
            interval,
        }
    }

    /// Waits until no checkpoint is pending, then admits one increment.
    pub(crate) fn admit(&self) -> Result<Admission, SqliteStoreError> {
        let mut state = self.wait_not_pending()?;
        state.since_checkpoint = state.since_checkpoint.saturating_add(1);
        if self.interval > 0 && state.since_checkpoint > self.interval {
            state.checkpoint_pending = true;
            return Ok(Admission::Checkpoint);
        }
        state.in_flight = state.in_flight.saturating_add(1);
        Ok(Admission::Proceed)
    }

    /// Claims checkpoint ownership outside the increment path.
    pub(crate) fn claim_checkpoint(&self) -> Result<(), SqliteStoreError> {
        let mut state = self.wait_not_pending()?;
        state.checkpoint_pending = true;
        Ok(())
    }

    /// Waits for in-flight increments to drain; returns false on timeout.
    ///
    /// A timeout too large to represent as an [`Instant`] waits indefinitely.
    pub(crate) fn drain(&self, timeout: Duration) -> Result<bool, SqliteStoreError> {
        let deadline = Instant::now().checked_add(timeout);
        let mut state = self.lock()?;
        while state.in_flight > 0 {
            let Some(deadline) = deadline else {
                state = self.changed.wait(state).map_err(|_| poisoned())?;
                continue;
            };
            let now = Instant::now();
            if now >= deadline {
                return Ok(false);
            }
            let (guard, _) = self
                .changed
                .wait_timeout(state, deadline - now)
                .map_err(|_| poisoned())?;
            state = guard;
        }
        Ok(true)
    }

    /// Releases checkpoint ownership and wakes waiting increments.
    ///
    /// `restart_interval` resets the increment count toward the next automatic
    /// checkpoint. When `then_admit` is set the owner is admitted in flight in
    /// the same critical section so it can go on to apply its own increment.
    pub(crate) fn finish_checkpoint(
        &self,
        restart_interval: bool,
        then_admit: bool,
    ) -> Result<(), SqliteStoreError> {
        let mut state = self.lock()?;
        state.checkpoint_pending = false;
        if restart_interval {
            state.since_checkpoint = 0;
        }
        if then_admit {
            state.in_flight = state.in_flight.saturating_add(1);
        }
        drop(state);
        self.changed.notify_all();
        Ok(())
    }

    /// Marks one admitted increment as finished.
    pub(crate) fn leave(&self) {
        if let Ok(mut state) = self.state.lock() {
            state.in_flight = state.in_flight.saturating_sub(1);
            if state.in_flight == 0 {
                drop(state);
                self.changed.notify_all();
            }
        }
    }

    /// Locks the state, waiting while a checkpoint owner exists.
    fn wait_not_pending(&self) -> Result<MutexGuard<'_, GateState>, SqliteStoreError> {
        let mut state = self.lock()?;
        while state.checkpoint_pending {
            state = self.changed.wait(state).map_err(|_| poisoned())?;
        }
        Ok(state)
    }

    /// Locks the gate state.
    fn lock(&self) -> Result<MutexGuard<'_, GateState>, SqliteStoreError> {
        self.state.lock().map_err(|_| poisoned())
    }
}

/// Guard that leaves the gate when dropped.
pub(crate) struct InFlight<'a> {
    /// Gate the increment was admitted through.
    gate: &'a CheckpointGate,
}

impl<'a> InFlight<'a> {
    /// Wraps an admission that has already been counted in flight.
    pub(crate) const fn new(gate: &'a CheckpointGate) -> Self {
        Self {
            gate,
        }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.gate.leave();
    }
}

/// Returns the poisoned-lock error.
fn poisoned() -> SqliteStoreError {
    SqliteStoreError::Db("checkpoint gate mutex poisoned".to_string())
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::panic,
        clippy::unwrap_used,
        clippy::expect_used,
        reason = "Test-only assertions."
    )]

    use std::sync::Arc;
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    use super::Admission;
    use super::CheckpointGate;
    use super::InFlight;

    #[test]
    fn every_interval_plus_one_admission_owns_a_checkpoint() {
        let gate = CheckpointGate::new(3);
        for _ in 0 .. 3 {
            assert_eq!(gate.admit().unwrap(), Admission::Proceed);
            gate.leave();
        }
        assert_eq!(gate.admit().unwrap(), Admission::Checkpoint);
        assert!(gate.drain(Duration::from_millis(10)).unwrap());
        gate.finish_checkpoint(true, true).unwrap();
        gate.leave();
        assert_eq!(gate.admit().unwrap(), Admission::Proceed);
    }

    #[test]
    fn zero_interval_never_checkpoints() {
        let gate = CheckpointGate::new(0);
        for _ in 0 .. 100 {
            assert_eq!(gate.admit().unwrap(), Admission::Proceed);
            gate.leave();
        }
    }

    #[test]
    fn drain_times_out_while_work_is_in_flight() {
        let gate = CheckpointGate::new(1);
        assert_eq!(gate.admit().unwrap(), Admission::Proceed);
        let held = InFlight::new(&gate);
        assert_eq!(gate.admit().unwrap(), Admission::Checkpoint);
        assert!(!gate.drain(Duration::from_millis(20)).unwrap());
        drop(held);
        assert!(gate.drain(Duration::from_millis(20)).unwrap());
        gate.finish_checkpoint(false, false).unwrap();
        assert_eq!(gate.admit().unwrap(), Admission::Checkpoint);
    }

    #[test]
    fn pending_checkpoint_blocks_new_admissions() {
        let gate = Arc::new(CheckpointGate::new(0));
        gate.claim_checkpoint().unwrap();
        let (tx, rx) = mpsc::channel();
        let waiter = {
            let gate = Arc::clone(&gate);
            thread::spawn(move || {
                let admission = gate.admit().unwrap();
                tx.send(admission).unwrap();
                gate.leave();
            })
        };
        assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());
        gate.finish_checkpoint(true, false).unwrap();
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), Admission::Proceed);
        waiter.join().unwrap();
    }

    #[test]
    fn unbounded_drain_returns_once_work_leaves() {
        let gate = Arc::new(CheckpointGate::new(1));
        assert_eq!(gate.admit().unwrap(), Admission::Proceed);
        let leaver = {
            let gate = Arc::clone(&gate);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                gate.leave();
            })
        };
        assert!(gate.drain(Duration::MAX).unwrap());
        leaver.join().unwrap();
    }

    #[test]
    fn restarted_interval_defers_the_next_owner() {
        let gate = CheckpointGate::new(2);
        for _ in 0 .. 2 {
            assert_eq!(gate.admit().unwrap(), Admission::Proceed);
            gate.leave();
        }
        assert_eq!(gate.admit().unwrap(), Admission::Checkpoint);
        gate.finish_checkpoint(true, true).unwrap();
        gate.leave();
        for _ in 0 .. 2 {
            assert_eq!(gate.admit().unwrap(), Admission::Proceed);
            gate.leave();
        }
        assert_eq!(gate.admit().unwrap(), Admission::Checkpoint);
    }
}
