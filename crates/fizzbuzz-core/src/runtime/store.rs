// crates/fizzbuzz-core/src/runtime/store.rs
// ============================================================================
// Module: FizzBuzz In-Memory Stats Store
// Description: Map-backed statistics store and shared store wrapper.
// Purpose: Provide a process-local store and a backend-agnostic handle.
// Dependencies: crate::core, crate::interfaces
// ============================================================================

//! ## Overview
//! [`MemoryStatsStore`] keeps hit counts in a `HashMap` behind a read/write
//! lock: increments take the write lock, queries take the read lock and scan
//! once. Counts are lost when the process exits.
//!
//! [`SharedStatsStore`] wraps any backend in a clonable `Arc` handle.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::RwLock;

use crate::core::Configuration;
use crate::core::MostFrequent;
use crate::interfaces::StatsError;
use crate::interfaces::StatsStore;
use crate::runtime::cancel::CancelToken;

// ============================================================================
// SECTION: In-Memory Store
// ============================================================================

/// In-memory statistics store.
#[derive(Debug, Default, Clone)]
pub struct MemoryStatsStore {
    /// Hit counts protected by a read/write lock.
    counts: Arc<RwLock<HashMap<Configuration, u64>>>,
}

impl MemoryStatsStore {
    /// Creates an empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of distinct configurations recorded.
    ///
    /// # Errors
    ///
    /// Returns [`StatsError::Store`] when the lock is poisoned.
    pub fn len(&self) -> Result<usize, StatsError> {
        let guard = self
            .counts
            .read()
            .map_err(|_| StatsError::Store("stats store lock poisoned".to_string()))?;
        Ok(guard.len())
    }

    /// Returns the count recorded for a single configuration.
    ///
    /// # Errors
    ///
    /// Returns [`StatsError::Store`] when the lock is poisoned.
    pub fn count_of(&self, config: &Configuration) -> Result<u64, StatsError> {
        let guard = self
            .counts
            .read()
            .map_err(|_| StatsError::Store("stats store lock poisoned".to_string()))?;
        Ok(guard.get(config).copied().unwrap_or(0))
    }
}

impl StatsStore for MemoryStatsStore {
    fn increment(&self, config: &Configuration) -> Result<(), StatsError> {
        let mut guard = self
            .counts
            .write()
            .map_err(|_| StatsError::Store("stats store lock poisoned".to_string()))?;
        if let Some(count) = guard.get_mut(config) {
            *count = count.saturating_add(1);
        } else {
            guard.insert(config.clone(), 1);
        }
        Ok(())
    }

    fn most_frequent(&self) -> Result<MostFrequent, StatsError> {
        let guard = self
            .counts
            .read()
            .map_err(|_| StatsError::Store("stats store lock poisoned".to_string()))?;
        let mut best = MostFrequent::empty();
        for (config, count) in guard.iter() {
            best.consider(*count, config);
        }
        Ok(best)
    }
}

// ============================================================================
// SECTION: Shared Store
// ============================================================================

/// Shared statistics store backed by an `Arc` trait object.
#[derive(Clone)]
pub struct SharedStatsStore {
    /// Inner store implementation.
    inner: Arc<dyn StatsStore>,
}

impl SharedStatsStore {
    /// Wraps a statistics store in a shared, clonable wrapper.
    #[must_use]
    pub fn from_store(store: impl StatsStore + 'static) -> Self {
        Self {
            inner: Arc::new(store),
        }
    }

    /// Wraps an existing shared store.
    #[must_use]
    pub const fn new(store: Arc<dyn StatsStore>) -> Self {
        Self {
            inner: store,
        }
    }
}

impl StatsStore for SharedStatsStore {
    fn increment(&self, config: &Configuration) -> Result<(), StatsError> {
        self.inner.increment(config)
    }

    fn most_frequent(&self) -> Result<MostFrequent, StatsError> {
        self.inner.most_frequent()
    }

    fn increment_with(&self, config: &Configuration, cancel: &CancelToken) -> Result<(), StatsError> {
        self.inner.increment_with(config, cancel)
    }

    fn most_frequent_with(&self, cancel: &CancelToken) -> Result<MostFrequent, StatsError> {
        self.inner.most_frequent_with(cancel)
    }
}
