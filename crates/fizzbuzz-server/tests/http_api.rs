// crates/fizzbuzz-server/tests/http_api.rs
// ============================================================================
// Module: HTTP API Tests
// Description: End-to-end tests against a bound FizzBuzz server.
// Purpose: Validate routing, query rejection, stats tie-breaks and streaming
//          bodies for every stats backend.
// ============================================================================

//! ## Overview
//! Each test binds a server on `127.0.0.1:0`, talks to it with `reqwest` and
//! shuts it down through the graceful shutdown future.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions and helpers are permitted."
)]

use std::io::Read;
use std::io::Write;
use std::net::TcpStream;
use std::path::Path;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use fizzbuzz_config::FizzbuzzConfig;
use fizzbuzz_config::StoreLocator;
use fizzbuzz_core::Configuration;
use fizzbuzz_core::MostFrequent;
use fizzbuzz_server::FizzbuzzServer;
use fizzbuzz_server::RequestLogEvent;
use fizzbuzz_server::RequestLogSink;
use fizzbuzz_server::ServerError;
use reqwest::Method;
use serde::Deserialize;
use tempfile::TempDir;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use url::form_urlencoded;

// ============================================================================
// SECTION: Helpers
// ============================================================================

struct TestServer {
    base: String,
    client: reqwest::Client,
    shutdown: Option<oneshot::Sender<()>>,
    join: JoinHandle<Result<(), ServerError>>,
}

impl TestServer {
    async fn start(config: FizzbuzzConfig) -> Self {
        Self::start_with(FizzbuzzServer::from_config(config).unwrap()).await
    }

    async fn start_with(server: FizzbuzzServer) -> Self {
        let bound = server.bind().await.unwrap();
        let base = format!("http://{}/api/v2/", bound.local_addr());
        let (shutdown, rx) = oneshot::channel::<()>();
        let join = tokio::spawn(bound.serve(async move {
            let _ = rx.await;
        }));
        Self {
            base,
            client: reqwest::Client::new(),
            shutdown: Some(shutdown),
            join,
        }
    }

    async fn request(&self, method: Method, path: &str) -> (u16, String, Vec<u8>) {
        let response =
            self.client.request(method, format!("{}{path}", self.base)).send().await.unwrap();
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let body = response.bytes().await.unwrap().to_vec();
        (status, content_type, body)
    }

    async fn assert_client_error(&self, method: Method, path: &str, expected: u16) {
        let (status, content_type, body) = self.request(method.clone(), path).await;
        assert_eq!(status, expected, "{method} {path}");
        assert_eq!(content_type, "application/json; charset=utf-8");
        assert_eq!(body.last(), Some(&b'\n'));
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        let message = value["error"].as_str().unwrap();
        assert!(!message.is_empty(), "{method} {path}");
    }

    async fn stats(&self) -> MostFrequent {
        let (status, _, body) = self.request(Method::GET, "fizzbuzz/stats").await;
        assert_eq!(status, 200);
        serde_json::from_slice::<StatsBody>(&body).unwrap().most_frequent
    }

    async fn fizzbuzz(&self, config: &Configuration) -> Vec<String> {
        let (status, content_type, body) =
            self.request(Method::GET, &format!("fizzbuzz?{}", encode_query(config))).await;
        assert_eq!(status, 200, "{config:?}");
        assert_eq!(content_type, "application/json; charset=utf-8");
        serde_json::from_slice(&body).unwrap()
    }

    async fn stop(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        self.join.await.unwrap().unwrap();
    }
}

#[derive(Deserialize)]
struct StatsBody {
    most_frequent: MostFrequent,
}

#[derive(Default)]
struct CaptureSink {
    events: Mutex<Vec<RequestLogEvent>>,
}

impl RequestLogSink for CaptureSink {
    fn record(&self, event: &RequestLogEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

fn encode_query(config: &Configuration) -> String {
    form_urlencoded::Serializer::new(String::new())
        .append_pair("int1", &config.divisor1.to_string())
        .append_pair("int2", &config.divisor2.to_string())
        .append_pair("limit", &config.limit.to_string())
        .append_pair("str1", &config.replacement1)
        .append_pair("str2", &config.replacement2)
        .finish()
}

fn base_config() -> FizzbuzzConfig {
    let mut config = FizzbuzzConfig::default();
    config.server.bind = "127.0.0.1:0".to_string();
    config.server.logging.enabled = false;
    config
}

fn config_with_locator(locator: StoreLocator) -> FizzbuzzConfig {
    let mut config = base_config();
    config.stats_store.apply_locator(locator);
    config
}

fn file_locator(dir: &Path) -> StoreLocator {
    StoreLocator::File(dir.join("nested").join("stats.db"))
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(ToString::to_string).collect()
}

// ============================================================================
// SECTION: Scenario
// ============================================================================

async fn tie_break_walkthrough(server: &TestServer) {
    assert_eq!(server.stats().await, MostFrequent::empty());

    let base = Configuration::new(13, 3, 4, "fizz", "buzz");
    server.fizzbuzz(&base).await;
    assert_eq!(server.stats().await, MostFrequent::new(1, base.clone()));

    let mut config = base.clone();
    config.limit += 1;
    server.fizzbuzz(&config).await;
    assert_eq!(server.stats().await, MostFrequent::new(1, base.clone()));
    config.divisor1 += 1;
    server.fizzbuzz(&config).await;
    assert_eq!(server.stats().await, MostFrequent::new(1, base.clone()));
    config.divisor2 += 1;
    server.fizzbuzz(&config).await;
    assert_eq!(server.stats().await, MostFrequent::new(1, base.clone()));

    let mut config = base.clone();
    config.limit -= 1;
    server.fizzbuzz(&config).await;
    assert_eq!(server.stats().await, MostFrequent::new(1, config.clone()));
    config.divisor1 -= 1;
    server.fizzbuzz(&config).await;
    assert_eq!(server.stats().await, MostFrequent::new(1, config.clone()));
    config.divisor2 -= 1;
    server.fizzbuzz(&config).await;
    assert_eq!(server.stats().await, MostFrequent::new(1, config.clone()));
    config.replacement1 = "a".to_string();
    server.fizzbuzz(&config).await;
    assert_eq!(server.stats().await, MostFrequent::new(1, config.clone()));
    config.replacement2 = "a".to_string();
    server.fizzbuzz(&config).await;
    assert_eq!(server.stats().await, MostFrequent::new(1, config.clone()));

    for _ in 0 .. 5 {
        server.fizzbuzz(&base).await;
    }
    assert_eq!(server.stats().await, MostFrequent::new(6, base));
}

async fn sequence_table(server: &TestServer) {
    let cases: Vec<(Configuration, Vec<String>)> = vec![
        (Configuration::new(-1, 1, 1, "", ""), strings(&[])),
        (Configuration::new(-1, 1, 1, "a", "a"), strings(&[])),
        (Configuration::new(0, 1, 1, "", "a"), strings(&[])),
        (Configuration::new(1, 1, 1, "", ""), strings(&[""])),
        (Configuration::new(1, 1, 1, "", "a"), strings(&["a"])),
        (Configuration::new(1, 1, 1, "a", ""), strings(&["a"])),
        (Configuration::new(1, 1, 1, "a", "b"), strings(&["ab"])),
        (Configuration::new(1, 2, 2, "", ""), strings(&["1"])),
        (Configuration::new(1, 1, 1, "\"", ""), strings(&["\""])),
        (Configuration::new(1, 1, 1, "👌🏻", ""), strings(&["👌🏻"])),
        (Configuration::new(2, 1, 2, "a", "b"), strings(&["a", "ab"])),
        (Configuration::new(2, 2, 3, "a", "b"), strings(&["1", "a"])),
        (Configuration::new(2, 3, 1, "a", "b"), strings(&["b", "b"])),
        (Configuration::new(3, 3, 3, "a", "b"), strings(&["1", "2", "ab"])),
        (Configuration::new(4, 3, 4, "a", "b"), strings(&["1", "2", "a", "b"])),
        (Configuration::new(6, 2, 3, "a", "b"), strings(&["1", "a", "b", "a", "5", "ab"])),
        (
            Configuration::new(13, 3, 4, "fizz", "buzz"),
            strings(&[
                "1", "2", "fizz", "buzz", "5", "fizz", "7", "buzz", "fizz", "10", "11", "fizzbuzz",
                "13",
            ]),
        ),
    ];
    for (config, expected) in cases {
        assert_eq!(server.fizzbuzz(&config).await, expected, "{config:?}");
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[tokio::test(flavor = "multi_thread")]
async fn rejects_unsupported_methods() {
    let server = TestServer::start(base_config()).await;
    let methods = [
        Method::POST,
        Method::PUT,
        Method::PATCH,
        Method::DELETE,
        Method::OPTIONS,
        Method::TRACE,
    ];
    for path in ["fizzbuzz", "fizzbuzz/stats", "ready"] {
        for method in &methods {
            server.assert_client_error(method.clone(), path, 405).await;
        }
    }
    let response = server
        .client
        .request(Method::POST, format!("{}fizzbuzz", server.base))
        .send()
        .await
        .unwrap();
    assert_eq!(response.headers().get("allow").unwrap(), "GET, HEAD");
    server.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn unknown_routes_are_json_404() {
    let server = TestServer::start(base_config()).await;
    server.assert_client_error(Method::GET, "nope", 404).await;
    server.assert_client_error(Method::GET, "fizzbuzz/stats/extra", 404).await;
    server.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn rejects_invalid_queries_without_recording() {
    let server = TestServer::start(base_config()).await;
    server.assert_client_error(Method::GET, "fizzbuzz/stats?unexpected_query", 400).await;
    let invalid = [
        "?unknown", "?limit=a", "?int1=a", "?int2=a", "?int1=0", "?int2=0", "?int1=-1",
        "?int2=-1", "?limit=", "?int1=", "?int2=", "?;", "?limit=1&limit=2",
    ];
    for query in invalid {
        server.assert_client_error(Method::GET, &format!("fizzbuzz{query}"), 400).await;
    }
    let (_, _, body) = server.request(Method::GET, "fizzbuzz?int1=0").await;
    assert_eq!(body, b"{\"error\":\"int1 must be strictly positive\"}\n");
    let (_, _, body) = server.request(Method::GET, "fizzbuzz?limit=a").await;
    let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert!(value["error"].as_str().unwrap().starts_with("parsing limit \"a\": "));
    assert_eq!(server.stats().await, MostFrequent::empty());
    server.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn defaults_and_byte_exact_bodies() {
    let server = TestServer::start(base_config()).await;
    let (status, content_type, body) = server.request(Method::GET, "fizzbuzz").await;
    assert_eq!(status, 200);
    assert_eq!(content_type, "application/json; charset=utf-8");
    assert_eq!(body, b"[\"1\",\"fizz\",\"buzz\",\"fizz\",\"5\",\"fizzbuzz\",\"7\",\"fizz\",\"buzz\",\"fizz\"]\n");
    let (_, _, body) = server.request(Method::GET, "fizzbuzz?limit=0").await;
    assert_eq!(body, b"[]\n");
    let (_, _, body) = server.request(Method::GET, "fizzbuzz?str1=&str2=").await;
    assert_eq!(body, b"[\"1\",\"\",\"\",\"\",\"5\",\"\",\"7\",\"\",\"\",\"\"]\n");

    let (_, _, body) = server.request(Method::GET, "fizzbuzz/stats").await;
    assert_eq!(
        body,
        b"{\"most_frequent\":{\"count\":1,\"config\":{\"limit\":0,\"int1\":2,\"int2\":3,\"str1\":\"fizz\",\"str2\":\"buzz\"}}}\n"
    );
    server.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn empty_stats_omit_config() {
    let server = TestServer::start(base_config()).await;
    let (status, _, body) = server.request(Method::GET, "fizzbuzz/stats").await;
    assert_eq!(status, 200);
    assert_eq!(body, b"{\"most_frequent\":{\"count\":0}}\n");
    server.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn ready_and_head_requests() {
    let server = TestServer::start(base_config()).await;
    let (status, _, body) = server.request(Method::GET, "ready").await;
    assert_eq!(status, 200);
    assert!(body.is_empty());
    let (status, _, _) = server.request(Method::HEAD, "ready").await;
    assert_eq!(status, 200);

    let (status, content_type, body) = server.request(Method::HEAD, "fizzbuzz?limit=5").await;
    assert_eq!(status, 200);
    assert_eq!(content_type, "application/json; charset=utf-8");
    assert!(body.is_empty());
    let (status, _, _) = server.request(Method::HEAD, "fizzbuzz?int1=0").await;
    assert_eq!(status, 400);
    assert_eq!(server.stats().await, MostFrequent::empty());
    server.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn memory_backend_walkthrough() {
    let server = TestServer::start(config_with_locator(StoreLocator::Memory)).await;
    tie_break_walkthrough(&server).await;
    sequence_table(&server).await;
    server.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn volatile_sqlite_backend_walkthrough() {
    let server = TestServer::start(config_with_locator(StoreLocator::Volatile)).await;
    tie_break_walkthrough(&server).await;
    sequence_table(&server).await;
    server.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn file_sqlite_backend_walkthrough_and_restart() {
    let temp = TempDir::new().unwrap();
    let server = TestServer::start(config_with_locator(file_locator(temp.path()))).await;
    tie_break_walkthrough(&server).await;
    server.stop().await;

    let base = Configuration::new(13, 3, 4, "fizz", "buzz");
    let server = TestServer::start(config_with_locator(file_locator(temp.path()))).await;
    assert_eq!(server.stats().await, MostFrequent::new(6, base.clone()));
    server.fizzbuzz(&base).await;
    assert_eq!(server.stats().await, MostFrequent::new(7, base));
    server.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn large_sequences_stream_completely() {
    let server = TestServer::start(base_config()).await;
    let config = Configuration::new(100_000, 3, 5, "fizz", "buzz");
    let values = server.fizzbuzz(&config).await;
    assert_eq!(values.len(), 100_000);
    assert_eq!(values[14], "fizzbuzz");
    assert_eq!(values[99_997], "99998");
    assert_eq!(values[99_998], "fizz");
    assert_eq!(values[99_999], "buzz");
    server.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn request_log_records_forwarded_peer() {
    let sink = Arc::new(CaptureSink::default());
    let server = FizzbuzzServer::from_config(base_config())
        .unwrap()
        .with_request_log(Some(Arc::clone(&sink) as Arc<dyn RequestLogSink>));
    let server = TestServer::start_with(server).await;
    let response = server
        .client
        .get(format!("{}fizzbuzz?limit=3", server.base))
        .header("X-Forwarded-For", "172.17.0.1, 10.0.0.1")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    response.bytes().await.unwrap();
    server.assert_client_error(Method::GET, "fizzbuzz?int2=0", 400).await;
    server.stop().await;

    let events = sink.events.lock().unwrap();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].event, "http_request");
    assert_eq!(events[0].peer_ip, "172.17.0.1");
    assert_eq!(events[0].method, "GET");
    assert_eq!(events[0].uri, "/api/v2/fizzbuzz?limit=3");
    assert_eq!(events[0].status, 200);
    assert_eq!(events[1].peer_ip, "127.0.0.1");
    assert_eq!(events[1].status, 400);
}

#[tokio::test(flavor = "multi_thread")]
async fn responses_past_the_write_deadline_are_aborted() {
    let mut config = base_config();
    config.server.write_timeout_ms = 200;
    let server = TestServer::start(config).await;
    let mut response = server
        .client
        .get(format!("{}fizzbuzz?limit={}", server.base, i64::MAX))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    let drained = tokio::time::timeout(Duration::from_secs(30), async {
        let mut received = 0_usize;
        loop {
            match response.chunk().await {
                Ok(Some(chunk)) => received += chunk.len(),
                Ok(None) => return (received, false),
                Err(_) => return (received, true),
            }
        }
    })
    .await
    .expect("body ends after the write deadline");
    let (received, aborted) = drained;
    assert!(received > 0);
    assert!(aborted, "a cut-short body must not end cleanly");

    let stats = server.stats().await;
    assert_eq!(stats.count, 1);
    assert_eq!(stats.config.map(|config| config.limit), Some(i64::MAX));
    server.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn shutdown_completes_while_a_client_stalls() {
    let mut config = base_config();
    config.server.write_timeout_ms = 500;
    let server = FizzbuzzServer::from_config(config).unwrap();
    let bound = server.bind().await.unwrap();
    let addr = bound.local_addr();
    let (shutdown, rx) = oneshot::channel::<()>();
    let join = tokio::spawn(bound.serve(async move {
        let _ = rx.await;
    }));

    let mut stream = TcpStream::connect(addr).unwrap();
    write!(
        stream,
        "GET /api/v2/fizzbuzz?limit={} HTTP/1.1\r\nHost: {addr}\r\n\r\n",
        i64::MAX
    )
    .unwrap();
    let mut head = [0_u8; 128];
    let read = stream.read(&mut head).unwrap();
    assert!(read > 0);
    assert!(head.starts_with(b"HTTP/1.1 200"));

    shutdown.send(()).unwrap();
    let finished = tokio::time::timeout(Duration::from_secs(5), join).await;
    let served = finished.expect("graceful shutdown finishes while the client stalls");
    served.unwrap().unwrap();
    drop(stream);
}

#[tokio::test(flavor = "multi_thread")]
async fn host_name_bind_resolves() {
    let mut config = base_config();
    config.server.bind = "localhost:0".to_string();
    let server = FizzbuzzServer::from_config(config).unwrap();
    let bound = server.bind().await.unwrap();
    assert!(bound.local_addr().ip().is_loopback());
    assert_ne!(bound.local_addr().port(), 0);

    let mut config = base_config();
    config.server.bind = "no-such-host.invalid:0".to_string();
    let server = FizzbuzzServer::from_config(config).unwrap();
    assert!(matches!(server.bind().await, Err(ServerError::Config(_))));
}

#[tokio::test(flavor = "multi_thread")]
async fn invalid_config_is_rejected_before_binding() {
    let mut config = base_config();
    config.server.bind = "not-an-address".to_string();
    assert!(matches!(FizzbuzzServer::from_config(config), Err(ServerError::Config(_))));

    let temp = TempDir::new().unwrap();
    let config = config_with_locator(StoreLocator::File(temp.path().to_path_buf()));
    assert!(matches!(FizzbuzzServer::from_config(config), Err(ServerError::Init(_))));
}
