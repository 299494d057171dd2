// crates/fizzbuzz-server/src/request_log.rs
// ============================================================================
// Module: Request Logging
// Description: Structured request events and the sinks that record them.
// Purpose: Emit one JSON line per HTTP request without a logging framework.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! Every handled request produces a [`RequestLogEvent`]. Sinks decide where
//! the JSON line goes: stderr, an append-only file, or nowhere. The peer IP
//! honors the first `X-Forwarded-For` entry when it parses as an address.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::net::IpAddr;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use axum::http::HeaderMap;
use serde::Serialize;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Header consulted for the originating client address.
pub const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";

/// HTTP request log event payload.
#[derive(Debug, Clone, Serialize)]
pub struct RequestLogEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Client IP address.
    pub peer_ip: String,
    /// HTTP method.
    pub method: String,
    /// Request URI (path and query).
    pub uri: String,
    /// Response status code.
    pub status: u16,
    /// Time until the response head was ready (microseconds).
    pub duration_us: u128,
}

/// Parameters for constructing a [`RequestLogEvent`].
pub struct RequestLogParams {
    /// Client IP address.
    pub peer_ip: IpAddr,
    /// HTTP method.
    pub method: String,
    /// Request URI.
    pub uri: String,
    /// Response status code.
    pub status: u16,
    /// Handling duration.
    pub duration: Duration,
}

impl RequestLogEvent {
    /// Creates a new request event with a consistent timestamp.
    #[must_use]
    pub fn new(params: RequestLogParams) -> Self {
        let timestamp_ms =
            SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis();
        Self {
            event: "http_request",
            timestamp_ms,
            peer_ip: params.peer_ip.to_string(),
            method: params.method,
            uri: params.uri,
            status: params.status,
            duration_us: params.duration.as_micros(),
        }
    }
}

/// Resolves the client IP, preferring a valid first `X-Forwarded-For` entry.
#[must_use]
pub fn client_ip(headers: &HeaderMap, peer: IpAddr) -> IpAddr {
    headers
        .get(FORWARDED_FOR_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .and_then(|first| first.trim().parse().ok())
        .unwrap_or(peer)
}

// ============================================================================
// SECTION: Trait
// ============================================================================

/// Sink for request log events.
pub trait RequestLogSink: Send + Sync {
    /// Record a request event.
    fn record(&self, event: &RequestLogEvent);
}

/// Request log sink that writes JSON lines to stderr.
pub struct StderrRequestLogSink;

impl RequestLogSink for StderrRequestLogSink {
    fn record(&self, event: &RequestLogEvent) {
        if let Ok(payload) = serde_json::to_string(event) {
            let _ = writeln!(std::io::stderr(), "{payload}");
        }
    }
}

/// Request log sink that appends JSON lines to a file.
pub struct FileRequestLogSink {
    /// File handle used for append-only logging.
    file: Mutex<std::fs::File>,
}

impl FileRequestLogSink {
    /// Opens the request log file in append mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn new(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }
}

impl RequestLogSink for FileRequestLogSink {
    fn record(&self, event: &RequestLogEvent) {
        if let Ok(payload) = serde_json::to_string(event)
            && let Ok(mut file) = self.file.lock()
        {
            let _ = writeln!(file, "{payload}");
            let _ = file.flush();
        }
    }
}

/// No-op request log sink.
pub struct NoopRequestLogSink;

impl RequestLogSink for NoopRequestLogSink {
    fn record(&self, _event: &RequestLogEvent) {}
}

// ============================================================================
// SECTION: Tests
// ============================================================================
