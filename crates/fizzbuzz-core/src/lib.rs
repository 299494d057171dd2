// crates/fizzbuzz-core/src/lib.rs
// ============================================================================
// Module: FizzBuzz Core Library
// Description: Public API surface for the FizzBuzz core.
// Purpose: Expose configuration types, the encoder and the stats interface.
// Dependencies: crate::{core, interfaces, runtime}
// ============================================================================

//! ## Overview
//! FizzBuzz core encodes parameterized FizzBuzz sequences as streamed JSON and
//! tracks which configuration is requested most often. It is backend-agnostic:
//! durable storage plugs in through [`StatsStore`].

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod core;
pub mod interfaces;
pub mod runtime;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use crate::core::*;

pub use interfaces::StatsError;
pub use interfaces::StatsStore;
pub use runtime::CHUNK_BYTES;
pub use runtime::CancelToken;
pub use runtime::EncodeError;
pub use runtime::MemoryStatsStore;
pub use runtime::SequenceEncoder;
pub use runtime::SharedStatsStore;
pub use runtime::Token;
pub use runtime::Tokens;
pub use runtime::encode;
pub use runtime::write_sequence;
