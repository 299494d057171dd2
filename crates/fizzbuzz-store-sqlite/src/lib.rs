// crates/fizzbuzz-store-sqlite/src/lib.rs
// ============================================================================
// Module: FizzBuzz SQLite Store Library
// Description: Durable SQLite-backed StatsStore.
// Purpose: Persist hit counts across restarts with bounded WAL growth.
// Dependencies: fizzbuzz-core, rusqlite, serde, thiserror
// ============================================================================

//! ## Overview
//! `fizzbuzz-store-sqlite` provides [`SqliteStatsStore`], a durable
//! [`fizzbuzz_core::StatsStore`] that keeps one row per configuration and
//! checkpoints its write-ahead log itself behind a drain barrier.

// ============================================================================
// SECTION: Modules
// ============================================================================

mod gate;
pub mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use store::DEFAULT_BUSY_TIMEOUT_MS;
pub use store::DEFAULT_CHECKPOINT_DRAIN_TIMEOUT_MS;
pub use store::DEFAULT_CHECKPOINT_INTERVAL;
pub use store::DEFAULT_READ_POOL_SIZE;
pub use store::MAX_BUSY_TIMEOUT_MS;
pub use store::SqliteMaintenanceSnapshot;
pub use store::SqliteStatsStore;
pub use store::SqliteStoreConfig;
pub use store::SqliteStoreError;
pub use store::SqliteStoreMode;
pub use store::SqliteSyncMode;
pub use store::VOLATILE_PATH;
