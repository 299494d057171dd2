// crates/fizzbuzz-core/src/core/stats.rs
// ============================================================================
// Module: FizzBuzz Hit Statistics
// Description: Result type for most-frequent configuration queries.
// Purpose: Share the tie-break selection rule across every store backend.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! [`MostFrequent`] carries the highest hit count and the configuration that
//! owns it. When several configurations share the highest count, the smallest
//! one under the configuration ordering wins.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::configuration::Configuration;

// ============================================================================
// SECTION: Most Frequent
// ============================================================================

/// Highest hit count and its configuration.
///
/// # Invariants
/// - `config` is `None` exactly when `count` is zero.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MostFrequent {
    /// Number of recorded hits.
    pub count: u64,
    /// Winning configuration, absent when nothing has been recorded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<Configuration>,
}

impl MostFrequent {
    /// Returns the empty result.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            count: 0,
            config: None,
        }
    }

    /// Creates a result for a recorded configuration.
    #[must_use]
    pub const fn new(count: u64, config: Configuration) -> Self {
        Self {
            count,
            config: Some(config),
        }
    }

    /// Returns true when `(count, config)` beats the current best.
    #[must_use]
    pub fn is_beaten_by(&self, count: u64, config: &Configuration) -> bool {
        if count == 0 {
            return false;
        }
        match &self.config {
            None => true,
            Some(best) => count > self.count || (count == self.count && config < best),
        }
    }

    /// Replaces the current best when `(count, config)` beats it.
    pub fn consider(&mut self, count: u64, config: &Configuration) {
        if self.is_beaten_by(count, config) {
            self.count = count;
            self.config = Some(config.clone());
        }
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
