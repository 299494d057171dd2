// crates/fizzbuzz-config/src/lib.rs
// ============================================================================
// Module: FizzBuzz Config Library
// Description: Configuration model, validation and store locators.
// Purpose: Single source of truth for fizzbuzz.toml semantics.
// Dependencies: fizzbuzz-store-sqlite, serde, toml
// ============================================================================

//! ## Overview
//! `fizzbuzz-config` defines the configuration model for the FizzBuzz
//! service. Files are parsed strictly: unknown keys, oversized files and
//! inconsistent store settings fail closed.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::*;
