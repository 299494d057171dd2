// crates/fizzbuzz-server/src/server.rs
// ============================================================================
// Module: FizzBuzz Server
// Description: Server construction, binding and graceful shutdown.
// Purpose: Wire configuration, stats store and request logging into axum.
// Dependencies: fizzbuzz-config, fizzbuzz-core, fizzbuzz-store-sqlite, axum, tokio
// ============================================================================

//! ## Overview
//! [`FizzbuzzServer::from_config`] validates configuration, opens the stats
//! store and picks a request log sink. [`FizzbuzzServer::bind`] resolves the
//! bind host and claims the listening socket so callers can learn the bound
//! address before serving; [`BoundServer::serve`] runs until the shutdown
//! future resolves, then closes the store.
//!
//! When shutdown begins, every in-flight request is cancelled and open
//! connections get at most the write timeout to finish before serving stops.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::future::Future;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use fizzbuzz_config::BindEndpoint;
use fizzbuzz_config::FizzbuzzConfig;
use fizzbuzz_config::RequestLogConfig;
use fizzbuzz_config::StatsStoreConfig;
use fizzbuzz_config::StatsStoreType;
use fizzbuzz_core::CancelToken;
use fizzbuzz_core::MemoryStatsStore;
use fizzbuzz_core::SharedStatsStore;
use fizzbuzz_store_sqlite::SqliteStatsStore;
use tokio::net::TcpListener;
use tokio::sync::oneshot;

use crate::handlers::AppState;
use crate::handlers::router;
use crate::request_log::FileRequestLogSink;
use crate::request_log::RequestLogSink;
use crate::request_log::StderrRequestLogSink;

// ============================================================================
// SECTION: Server
// ============================================================================

/// FizzBuzz HTTP server instance.
pub struct FizzbuzzServer {
    /// Server configuration.
    config: FizzbuzzConfig,
    /// Stats backend shared with handlers.
    store: SharedStatsStore,
    /// Durable store handle kept for shutdown.
    sqlite: Option<SqliteStatsStore>,
    /// Request log sink; `None` when logging is disabled.
    request_log: Option<Arc<dyn RequestLogSink>>,
    /// Cancels in-flight requests once shutdown begins.
    shutdown: CancelToken,
}

impl FizzbuzzServer {
    /// Builds a new server from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError`] when configuration is invalid or the store or
    /// request log cannot be opened.
    pub fn from_config(mut config: FizzbuzzConfig) -> Result<Self, ServerError> {
        config.validate().map_err(|err| ServerError::Config(err.to_string()))?;
        let (store, sqlite) = build_stats_store(&config.stats_store)?;
        let request_log = build_request_log(&config.server.logging)?;
        Ok(Self {
            config,
            store,
            sqlite,
            request_log,
            shutdown: CancelToken::new(),
        })
    }

    /// Replaces the request log sink.
    #[must_use]
    pub fn with_request_log(mut self, sink: Option<Arc<dyn RequestLogSink>>) -> Self {
        self.request_log = sink;
        self
    }

    /// Returns the stats backend.
    #[must_use]
    pub fn store(&self) -> SharedStatsStore {
        self.store.clone()
    }

    /// Returns the API router without binding a socket.
    #[must_use]
    pub fn router(&self) -> Router {
        router(Arc::new(AppState {
            store: self.store.clone(),
            request_log: self.request_log.clone(),
            write_timeout: self.write_timeout(),
            shutdown: self.shutdown.clone(),
        }))
    }

    /// Returns the per-response write deadline.
    fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.config.server.write_timeout_ms)
    }

    /// Resolves the configured host and binds the first address that accepts.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Config`] when the address is invalid or the host
    /// does not resolve, and [`ServerError::Transport`] when every resolved
    /// address fails to bind.
    pub async fn bind(self) -> Result<BoundServer, ServerError> {
        let endpoint =
            self.config.server.bind_endpoint().map_err(|err| ServerError::Config(err.to_string()))?;
        let listener = bind_listener(&endpoint).await?;
        let local_addr = listener
            .local_addr()
            .map_err(|err| ServerError::Transport(format!("http bind {endpoint} failed: {err}")))?;
        let write_timeout = self.write_timeout();
        Ok(BoundServer {
            app: self.router(),
            listener,
            local_addr,
            sqlite: self.sqlite,
            write_timeout,
            shutdown: self.shutdown,
        })
    }

    /// Binds and serves until `shutdown` resolves.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError`] when binding, serving or closing the store fails.
    pub async fn serve<F>(self, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.bind().await?.serve(shutdown).await
    }
}

/// Server with a bound listener, ready to serve.
pub struct BoundServer {
    /// API router.
    app: Router,
    /// Bound listener.
    listener: TcpListener,
    /// Address the listener is bound to.
    local_addr: SocketAddr,
    /// Durable store handle closed after shutdown.
    sqlite: Option<SqliteStatsStore>,
    /// Grace period for open connections after shutdown begins.
    write_timeout: Duration,
    /// Cancels in-flight requests once shutdown begins.
    shutdown: CancelToken,
}

impl BoundServer {
    /// Returns the bound address.
    #[must_use]
    pub const fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Serves requests until `shutdown` resolves, then closes the store.
    ///
    /// Shutdown cancels in-flight requests; connections still open after the
    /// write timeout are abandoned.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Transport`] when the server fails and
    /// [`ServerError::Init`] when the store fails to close.
    pub async fn serve<F>(self, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let cancel = self.shutdown;
        let (fired, fired_rx) = oneshot::channel();
        let signal = async move {
            shutdown.await;
            cancel.cancel();
            let _ = fired.send(());
        };
        let serving = axum::serve(
            self.listener,
            self.app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(signal)
        .into_future();
        let served = tokio::select! {
            result = serving => {
                result.map_err(|err| ServerError::Transport(format!("http server failed: {err}")))
            }
            () = drain_deadline(fired_rx, self.write_timeout) => Ok(()),
        };
        let closed = close_store(self.sqlite).await;
        served?;
        closed
    }
}

/// Resolves once `grace` has passed after shutdown fired; never otherwise.
async fn drain_deadline(fired: oneshot::Receiver<()>, grace: Duration) {
    if fired.await.is_ok() {
        tokio::time::sleep(grace).await;
    } else {
        std::future::pending::<()>().await;
    }
}

/// Resolves `endpoint` and binds the first address that accepts.
async fn bind_listener(endpoint: &BindEndpoint) -> Result<TcpListener, ServerError> {
    let addrs = tokio::net::lookup_host((endpoint.host.as_str(), endpoint.port))
        .await
        .map_err(|err| ServerError::Config(format!("cannot resolve bind host {endpoint}: {err}")))?;
    let mut last_error = None;
    for addr in addrs {
        match TcpListener::bind(addr).await {
            Ok(listener) => return Ok(listener),
            Err(err) => last_error = Some(format!("http bind {addr} failed: {err}")),
        }
    }
    Err(match last_error {
        Some(message) => ServerError::Transport(message),
        None => ServerError::Config(format!("bind host {endpoint} has no addresses")),
    })
}

// ============================================================================
// SECTION: Builders
// ============================================================================

/// Builds the stats store from configuration.
fn build_stats_store(
    config: &StatsStoreConfig,
) -> Result<(SharedStatsStore, Option<SqliteStatsStore>), ServerError> {
    match config.store_type {
        StatsStoreType::Memory => Ok((SharedStatsStore::from_store(MemoryStatsStore::new()), None)),
        StatsStoreType::Sqlite => {
            let sqlite_config = config.sqlite_config().ok_or_else(|| {
                ServerError::Config("sqlite stats_store requires path".to_string())
            })?;
            let store = SqliteStatsStore::open(sqlite_config)
                .map_err(|err| ServerError::Init(err.to_string()))?;
            Ok((SharedStatsStore::from_store(store.clone()), Some(store)))
        }
    }
}

/// Builds the request log sink from configuration.
fn build_request_log(
    config: &RequestLogConfig,
) -> Result<Option<Arc<dyn RequestLogSink>>, ServerError> {
    if !config.enabled {
        return Ok(None);
    }
    let sink: Arc<dyn RequestLogSink> = match &config.path {
        Some(path) => Arc::new(
            FileRequestLogSink::new(Path::new(path))
                .map_err(|err| ServerError::Init(format!("request log {path}: {err}")))?,
        ),
        None => Arc::new(StderrRequestLogSink),
    };
    Ok(Some(sink))
}

/// Closes the durable store off the async runtime.
async fn close_store(store: Option<SqliteStatsStore>) -> Result<(), ServerError> {
    let Some(store) = store else {
        return Ok(());
    };
    tokio::task::spawn_blocking(move || store.close())
        .await
        .map_err(|err| ServerError::Init(format!("stats store close task failed: {err}")))?
        .map_err(|err| ServerError::Init(err.to_string()))
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// FizzBuzz server errors.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),
    /// Initialization error.
    #[error("init error: {0}")]
    Init(String),
    /// Transport error.
    #[error("transport error: {0}")]
    Transport(String),
}
