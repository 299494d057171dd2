// crates/fizzbuzz-server/src/lib.rs
// ============================================================================
// Module: FizzBuzz Server Library
// Description: HTTP API over the FizzBuzz encoder and stats store.
// Purpose: Serve sequences and most-frequent stats as JSON.
// Dependencies: fizzbuzz-core, fizzbuzz-config, fizzbuzz-store-sqlite, axum, tokio
// ============================================================================

//! ## Overview
//! `fizzbuzz-server` exposes the FizzBuzz encoder and the stats store over
//! HTTP. Request parsing is strict: unknown, duplicated and malformed query
//! parameters are rejected before anything is recorded.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod handlers;
pub mod query;
pub mod request_log;
pub mod server;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use query::QueryError;
pub use query::parse_fizzbuzz_query;
pub use request_log::FileRequestLogSink;
pub use request_log::NoopRequestLogSink;
pub use request_log::RequestLogEvent;
pub use request_log::RequestLogParams;
pub use request_log::RequestLogSink;
pub use request_log::StderrRequestLogSink;
pub use server::BoundServer;
pub use server::FizzbuzzServer;
pub use server::ServerError;
