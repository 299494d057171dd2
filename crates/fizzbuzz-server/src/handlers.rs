// crates/fizzbuzz-server/src/handlers.rs
// ============================================================================
// Module: HTTP Handlers
// Description: Routes, handlers and response helpers for the FizzBuzz API.
// Purpose: Validate requests, record hits and stream encoded sequences.
// Dependencies: fizzbuzz-core, axum, bytes, tokio, tokio-stream
// ============================================================================

//! ## Overview
//! | Route | Behavior |
//! |-------|----------|
//! | `/api/v2/fizzbuzz` | validate query, record the hit, stream the sequence |
//! | `/api/v2/fizzbuzz/stats` | most frequent configuration and its count |
//! | `/api/v2/ready` | empty 200 |
//!
//! Every route answers `GET` and `HEAD`; other methods get a JSON 405 and
//! unknown paths a JSON 404. Store calls and the encoder run on the blocking
//! pool. The encoder writes into a bounded channel that feeds the response
//! body, so a slow client applies backpressure and a disconnected client
//! surfaces as a broken pipe that stops encoding.
//!
//! Each sequence request gets a [`CancelToken`] that fires at the write
//! deadline or when the server starts shutting down. The store call and the
//! encoder both observe it, and a body cut short ends in a stream error so
//! the connection is aborted instead of completing a truncated document.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io;
use std::io::Write;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::task::Context;
use std::task::Poll;
use std::task::ready;
use std::time::Duration;
use std::time::Instant;

use axum::Router;
use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::extract::RawQuery;
use axum::extract::Request;
use axum::extract::State;
use axum::http::HeaderValue;
use axum::http::Method;
use axum::http::StatusCode;
use axum::http::header::ALLOW;
use axum::http::header::CONTENT_TYPE;
use axum::middleware;
use axum::middleware::Next;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::routing::MethodRouter;
use axum::routing::get;
use bytes::Bytes;
use fizzbuzz_core::CancelToken;
use fizzbuzz_core::MostFrequent;
use fizzbuzz_core::SequenceEncoder;
use fizzbuzz_core::SharedStatsStore;
use fizzbuzz_core::StatsError;
use fizzbuzz_core::StatsStore;
use serde::Serialize;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::sync::oneshot;
use tokio_stream::Stream;

use crate::query::parse_fizzbuzz_query;
use crate::request_log::RequestLogEvent;
use crate::request_log::RequestLogParams;
use crate::request_log::RequestLogSink;
use crate::request_log::client_ip;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Sequence route.
pub const FIZZBUZZ_PATH: &str = "/api/v2/fizzbuzz";
/// Stats route.
pub const STATS_PATH: &str = "/api/v2/fizzbuzz/stats";
/// Readiness route.
pub const READY_PATH: &str = "/api/v2/ready";
/// Content type for every JSON response.
pub const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";
/// Encoded chunks buffered between the encoder and the response body.
const STREAM_CHANNEL_CAPACITY: usize = 4;
/// Longest wait for channel capacity before the cancel token is checked again.
const SEND_POLL_INTERVAL: Duration = Duration::from_millis(100);
/// Allowed methods advertised on 405 responses.
const ALLOWED_METHODS: &str = "GET, HEAD";

// ============================================================================
// SECTION: State
// ============================================================================

/// Shared state for HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    /// Stats backend.
    pub store: SharedStatsStore,
    /// Request log sink; `None` disables request logging.
    pub request_log: Option<Arc<dyn RequestLogSink>>,
    /// Deadline for recording a hit and writing its sequence.
    pub write_timeout: Duration,
    /// Fired once when the server begins shutting down.
    pub shutdown: CancelToken,
}

/// Builds the API router.
pub fn router(state: Arc<AppState>) -> Router {
    let mut app = Router::new()
        .route(FIZZBUZZ_PATH, read_only(get(handle_fizzbuzz)))
        .route(STATS_PATH, read_only(get(handle_stats)))
        .route(READY_PATH, read_only(get(handle_ready)))
        .fallback(handle_not_found);
    if state.request_log.is_some() {
        app = app.layer(middleware::from_fn_with_state(Arc::clone(&state), log_requests));
    }
    app.with_state(state)
}

/// Answers every method a route does not serve with a JSON 405.
fn read_only(route: MethodRouter<Arc<AppState>>) -> MethodRouter<Arc<AppState>> {
    route.fallback(handle_method_not_allowed)
}

// ============================================================================
// SECTION: Handlers
// ============================================================================

/// Serves the sequence for the requested configuration.
async fn handle_fizzbuzz(
    State(state): State<Arc<AppState>>,
    method: Method,
    RawQuery(query): RawQuery,
) -> Response {
    let config = match parse_fizzbuzz_query(query.as_deref()) {
        Ok(config) => config,
        Err(err) => return json_error(StatusCode::BAD_REQUEST, &err.to_string()),
    };
    let encoder = match SequenceEncoder::new(&config) {
        Ok(encoder) => encoder,
        Err(err) => return json_error(StatusCode::BAD_REQUEST, &err.to_string()),
    };
    if method == Method::HEAD {
        return json_head();
    }
    let cancel = state.shutdown.child_with_timeout(state.write_timeout);
    let store = state.store.clone();
    let store_cancel = cancel.clone();
    match tokio::task::spawn_blocking(move || store.increment_with(&config, &store_cancel)).await {
        Ok(Ok(())) => {}
        Ok(Err(StatsError::Cancelled)) => {
            return json_error(StatusCode::SERVICE_UNAVAILABLE, "request cancelled");
        }
        Ok(Err(err)) => return json_error(StatusCode::INTERNAL_SERVER_ERROR, &err.to_string()),
        Err(_) => {
            return json_error(StatusCode::INTERNAL_SERVER_ERROR, "stats store task failed");
        }
    }
    stream_sequence(encoder, cancel)
}

/// Stats response payload.
#[derive(Debug, Serialize)]
struct StatsBody {
    /// Most frequent configuration.
    most_frequent: MostFrequent,
}

/// Serves the most frequent configuration.
async fn handle_stats(State(state): State<Arc<AppState>>, RawQuery(query): RawQuery) -> Response {
    if query.is_some_and(|query| !query.is_empty()) {
        return json_error(StatusCode::BAD_REQUEST, "this endpoint takes no parameters");
    }
    let store = state.store.clone();
    let most_frequent = match tokio::task::spawn_blocking(move || store.most_frequent()).await {
        Ok(Ok(most_frequent)) => most_frequent,
        Ok(Err(err)) => return json_error(StatusCode::INTERNAL_SERVER_ERROR, &err.to_string()),
        Err(_) => {
            return json_error(StatusCode::INTERNAL_SERVER_ERROR, "stats store task failed");
        }
    };
    json_body(StatusCode::OK, &StatsBody {
        most_frequent,
    })
}

/// Readiness check.
async fn handle_ready() -> StatusCode {
    StatusCode::OK
}

/// JSON 405 for unsupported methods.
async fn handle_method_not_allowed() -> Response {
    let mut response = json_error(StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed");
    response.headers_mut().insert(ALLOW, HeaderValue::from_static(ALLOWED_METHODS));
    response
}

/// JSON 404 for unknown paths.
async fn handle_not_found() -> Response {
    json_error(StatusCode::NOT_FOUND, "Not Found")
}

// ============================================================================
// SECTION: Middleware
// ============================================================================

/// Records one log event per request.
async fn log_requests(
    State(state): State<Arc<AppState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    request: Request,
    next: Next,
) -> Response {
    let started = Instant::now();
    let peer_ip = client_ip(request.headers(), peer.ip());
    let method = request.method().to_string();
    let uri = request.uri().to_string();
    let response = next.run(request).await;
    if let Some(sink) = &state.request_log {
        sink.record(&RequestLogEvent::new(RequestLogParams {
            peer_ip,
            method,
            uri,
            status: response.status().as_u16(),
            duration: started.elapsed(),
        }));
    }
    response
}

// ============================================================================
// SECTION: Streaming
// ============================================================================

/// `io::Write` adapter that forwards each write as one body chunk.
///
/// Waiting for channel capacity is bounded by the request's cancel token.
struct ChannelWriter {
    /// Sender feeding the response body.
    sender: mpsc::Sender<Bytes>,
    /// Runtime driving the channel from the blocking pool.
    runtime: Handle,
    /// Request deadline and shutdown signal.
    cancel: CancelToken,
}

impl Write for ChannelWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let chunk = Bytes::copy_from_slice(buf);
        loop {
            if self.cancel.is_cancelled() {
                return Err(io::Error::new(io::ErrorKind::TimedOut, "response deadline reached"));
            }
            let wait = self
                .cancel
                .remaining()
                .map_or(SEND_POLL_INTERVAL, |left| left.min(SEND_POLL_INTERVAL));
            match self.runtime.block_on(tokio::time::timeout(wait, self.sender.reserve())) {
                Ok(Ok(permit)) => {
                    permit.send(chunk);
                    return Ok(buf.len());
                }
                Ok(Err(_)) => {
                    return Err(io::Error::new(io::ErrorKind::BrokenPipe, "response body closed"));
                }
                Err(_) => {}
            }
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Response body fed by the encoder.
///
/// Ends cleanly only when the encoder reports success; any other outcome is
/// surfaced as a stream error after the buffered chunks.
struct SequenceBody {
    /// Encoded chunks.
    chunks: mpsc::Receiver<Bytes>,
    /// Encoder outcome; taken once the chunks run out.
    outcome: Option<oneshot::Receiver<Result<(), String>>>,
}

impl Stream for SequenceBody {
    type Item = Result<Bytes, io::Error>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if let Some(chunk) = ready!(self.chunks.poll_recv(cx)) {
            return Poll::Ready(Some(Ok(chunk)));
        }
        let Some(outcome) = self.outcome.as_mut() else {
            return Poll::Ready(None);
        };
        let outcome = ready!(Pin::new(outcome).poll(cx));
        self.outcome = None;
        match outcome {
            Ok(Ok(())) => Poll::Ready(None),
            Ok(Err(message)) => Poll::Ready(Some(Err(io::Error::other(message)))),
            Err(_) => Poll::Ready(Some(Err(io::Error::other("sequence encoder stopped")))),
        }
    }
}

/// Streams the encoder output as the response body until `cancel` fires.
fn stream_sequence(encoder: SequenceEncoder, cancel: CancelToken) -> Response {
    let (sender, chunks) = mpsc::channel(STREAM_CHANNEL_CAPACITY);
    let (done, outcome) = oneshot::channel();
    let runtime = Handle::current();
    tokio::task::spawn_blocking(move || {
        let mut writer = ChannelWriter {
            sender,
            runtime,
            cancel: cancel.clone(),
        };
        let result =
            encoder.write_to_with(&mut writer, &cancel).map(|_| ()).map_err(|err| err.to_string());
        drop(writer);
        let _ = done.send(result);
    });
    let body = SequenceBody {
        chunks,
        outcome: Some(outcome),
    };
    ([(CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE))], Body::from_stream(body))
        .into_response()
}

// ============================================================================
// SECTION: Responses
// ============================================================================

/// Error response payload.
#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    /// Human-readable error message.
    error: &'a str,
}

/// Builds a JSON error response.
fn json_error(status: StatusCode, message: &str) -> Response {
    json_body(status, &ErrorBody {
        error: message,
    })
}

/// Builds a JSON response terminated by a newline.
fn json_body<T: Serialize>(status: StatusCode, payload: &T) -> Response {
    let headers = [(CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE))];
    let Ok(mut bytes) = serde_json::to_vec(payload) else {
        return (StatusCode::INTERNAL_SERVER_ERROR, headers, "{\"error\":\"serialization failed\"}\n")
            .into_response();
    };
    bytes.push(b'\n');
    (status, headers, bytes).into_response()
}

/// Headers-only JSON response for `HEAD`.
fn json_head() -> Response {
    ([(CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE))], Body::empty()).into_response()
}
