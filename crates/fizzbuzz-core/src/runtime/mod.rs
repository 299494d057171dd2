// crates/fizzbuzz-core/src/runtime/mod.rs
// ============================================================================
// Module: FizzBuzz Runtime
// Description: Sequence encoder, cancellation and in-memory statistics.
// Purpose: Execute encodes and record hits behind the core interfaces.
// Dependencies: crate::{core, interfaces}
// ============================================================================

//! ## Overview
//! Runtime modules implement the streaming encoder, the cooperative cancel
//! token and the in-memory statistics backend. Every external surface calls
//! into the same encoder so output stays byte-identical.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod cancel;
pub mod encoder;
pub mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use cancel::CancelToken;
pub use encoder::CHUNK_BYTES;
pub use encoder::EncodeError;
pub use encoder::SequenceEncoder;
pub use encoder::Token;
pub use encoder::Tokens;
pub use encoder::encode;
pub use encoder::write_sequence;
pub use store::MemoryStatsStore;
pub use store::SharedStatsStore;
