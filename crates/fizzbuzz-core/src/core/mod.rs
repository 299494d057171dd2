// crates/fizzbuzz-core/src/core/mod.rs
// ============================================================================
// Module: FizzBuzz Core Types
// Description: Canonical configuration and statistics value types.
// Purpose: Provide stable, serializable types shared by encoders and stores.
// Dependencies: serde, thiserror
// ============================================================================

//! ## Overview
//! Core types define the configuration value, its validation errors and the
//! most-frequent statistics result. These types are the canonical source of
//! truth for any derived API surface.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod configuration;
pub mod stats;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use configuration::ConfigField;
pub use configuration::Configuration;
pub use configuration::DEFAULT_DIVISOR1;
pub use configuration::DEFAULT_DIVISOR2;
pub use configuration::DEFAULT_LIMIT;
pub use configuration::DEFAULT_REPLACEMENT1;
pub use configuration::DEFAULT_REPLACEMENT2;
pub use configuration::InvalidInputError;
pub use stats::MostFrequent;
