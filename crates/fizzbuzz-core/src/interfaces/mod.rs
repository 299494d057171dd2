// crates/fizzbuzz-core/src/interfaces/mod.rs
// ============================================================================
// Module: FizzBuzz Interfaces
// Description: Backend-agnostic statistics store interface.
// Purpose: Let callers record and query hits without knowing the backend.
// Dependencies: crate::core, crate::runtime::cancel, thiserror
// ============================================================================

//! ## Overview
//! [`StatsStore`] is the only way to mutate or read hit counts. Backends must
//! be safe to call from many threads at once and must never apply an
//! increment partially.

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;

use crate::core::Configuration;
use crate::core::MostFrequent;
use crate::runtime::cancel::CancelToken;

// ============================================================================
// SECTION: Stats Store
// ============================================================================

/// Statistics store errors.
#[derive(Debug, Error)]
pub enum StatsError {
    /// Store I/O error.
    #[error("stats store io error: {0}")]
    Io(String),
    /// Store data is corrupted or fails integrity checks.
    #[error("stats store corruption: {0}")]
    Corrupt(String),
    /// Store data version is incompatible.
    #[error("stats store version mismatch: {0}")]
    VersionMismatch(String),
    /// Store data or configuration is invalid.
    #[error("stats store invalid data: {0}")]
    Invalid(String),
    /// Store was closed and can no longer be used.
    #[error("stats store closed")]
    Closed,
    /// Operation was cancelled before it touched the store.
    #[error("stats store operation cancelled")]
    Cancelled,
    /// Store reported an error.
    #[error("stats store error: {0}")]
    Store(String),
}

/// Hit counter keyed by configuration.
pub trait StatsStore: Send + Sync {
    /// Records one hit for the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`StatsError`] when the hit cannot be recorded; the stored
    /// count is unchanged in that case.
    fn increment(&self, config: &Configuration) -> Result<(), StatsError>;

    /// Returns the configuration with the highest count, smallest on ties.
    ///
    /// # Errors
    ///
    /// Returns [`StatsError`] when the store cannot be read.
    fn most_frequent(&self) -> Result<MostFrequent, StatsError>;

    /// Records one hit unless the token is already cancelled.
    ///
    /// # Errors
    ///
    /// Returns [`StatsError::Cancelled`] when cancelled, otherwise as
    /// [`StatsStore::increment`].
    fn increment_with(&self, config: &Configuration, cancel: &CancelToken) -> Result<(), StatsError> {
        if cancel.is_cancelled() {
            return Err(StatsError::Cancelled);
        }
        self.increment(config)
    }

    /// Queries the most frequent configuration unless the token is cancelled.
    ///
    /// # Errors
    ///
    /// Returns [`StatsError::Cancelled`] when cancelled, otherwise as
    /// [`StatsStore::most_frequent`].
    fn most_frequent_with(&self, cancel: &CancelToken) -> Result<MostFrequent, StatsError> {
        if cancel.is_cancelled() {
            return Err(StatsError::Cancelled);
        }
        self.most_frequent()
    }
}
