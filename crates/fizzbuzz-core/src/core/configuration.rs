// crates/fizzbuzz-core/src/core/configuration.rs
// ============================================================================
// Module: FizzBuzz Configuration
// Description: Five-field parameter set describing one FizzBuzz variant.
// Purpose: Provide the canonical, totally ordered configuration value type.
// Dependencies: serde, thiserror
// ============================================================================

//! ## Overview
//! A [`Configuration`] is the unit that is both encoded into a sequence and
//! counted by the statistics stores. Field declaration order defines the
//! tie-break ordering used by every store: `limit`, `divisor1`, `divisor2`,
//! `replacement1`, `replacement2`, each ascending. Strings compare as raw
//! UTF-8 bytes, which matches `SQLite` `BINARY` collation.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default inclusive upper bound.
pub const DEFAULT_LIMIT: i64 = 10;
/// Default first divisor.
pub const DEFAULT_DIVISOR1: i64 = 2;
/// Default second divisor.
pub const DEFAULT_DIVISOR2: i64 = 3;
/// Default replacement for multiples of the first divisor.
pub const DEFAULT_REPLACEMENT1: &str = "fizz";
/// Default replacement for multiples of the second divisor.
pub const DEFAULT_REPLACEMENT2: &str = "buzz";

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Parameter set for one FizzBuzz variant.
///
/// # Invariants
/// - Equality and hashing cover all five fields.
/// - `Ord` compares fields in declaration order (the tie-break ordering).
/// - Divisors are only checked by [`Configuration::validate`]; stores accept any value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Configuration {
    /// Inclusive upper bound; values below one produce an empty sequence.
    pub limit: i64,
    /// First divisor.
    #[serde(rename = "int1")]
    pub divisor1: i64,
    /// Second divisor.
    #[serde(rename = "int2")]
    pub divisor2: i64,
    /// Replacement for multiples of `divisor1`.
    #[serde(rename = "str1")]
    pub replacement1: String,
    /// Replacement for multiples of `divisor2`.
    #[serde(rename = "str2")]
    pub replacement2: String,
}

impl Configuration {
    /// Creates a configuration from its five fields.
    #[must_use]
    pub fn new(
        limit: i64,
        divisor1: i64,
        divisor2: i64,
        replacement1: impl Into<String>,
        replacement2: impl Into<String>,
    ) -> Self {
        Self {
            limit,
            divisor1,
            divisor2,
            replacement1: replacement1.into(),
            replacement2: replacement2.into(),
        }
    }

    /// Checks that both divisors are strictly positive.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidInputError`] naming the first non-positive divisor.
    pub const fn validate(&self) -> Result<(), InvalidInputError> {
        if self.divisor1 < 1 {
            return Err(InvalidInputError::new(ConfigField::Divisor1));
        }
        if self.divisor2 < 1 {
            return Err(InvalidInputError::new(ConfigField::Divisor2));
        }
        Ok(())
    }
}

impl Default for Configuration {
    fn default() -> Self {
        Self::new(
            DEFAULT_LIMIT,
            DEFAULT_DIVISOR1,
            DEFAULT_DIVISOR2,
            DEFAULT_REPLACEMENT1,
            DEFAULT_REPLACEMENT2,
        )
    }
}

/// Configuration field identifiers, named by their wire keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigField {
    /// `limit`.
    Limit,
    /// `int1`.
    Divisor1,
    /// `int2`.
    Divisor2,
    /// `str1`.
    Replacement1,
    /// `str2`.
    Replacement2,
}

impl ConfigField {
    /// Every field, in ordering-relation order.
    pub const ALL: [Self; 5] =
        [Self::Limit, Self::Divisor1, Self::Divisor2, Self::Replacement1, Self::Replacement2];

    /// Returns the wire key for the field.
    #[must_use]
    pub const fn wire_name(self) -> &'static str {
        match self {
            Self::Limit => "limit",
            Self::Divisor1 => "int1",
            Self::Divisor2 => "int2",
            Self::Replacement1 => "str1",
            Self::Replacement2 => "str2",
        }
    }

    /// Resolves a wire key to a field.
    #[must_use]
    pub fn from_wire_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|field| field.wire_name() == name)
    }
}

impl fmt::Display for ConfigField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// A divisor was zero or negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("{field} must be strictly positive")]
pub struct InvalidInputError {
    /// Offending field.
    pub field: ConfigField,
}

impl InvalidInputError {
    /// Creates an error for the given field.
    #[must_use]
    pub const fn new(field: ConfigField) -> Self {
        Self {
            field,
        }
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
