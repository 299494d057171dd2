// crates/fizzbuzz-config/src/config.rs
// ============================================================================
// Module: FizzBuzz Configuration
// Description: Configuration loading and validation for the FizzBuzz service.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: fizzbuzz-store-sqlite, serde, toml
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and path limits.
//! When no path is given explicitly (neither argument nor environment) and the
//! default file does not exist, the built-in defaults apply.
//!
//! ```toml
//! [server]
//! bind = "localhost:8080"
//! write_timeout_ms = 10000
//!
//! [server.logging]
//! enabled = true
//!
//! [stats_store]
//! type = "sqlite"
//! path = "fizzbuzz.db"
//! ```

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::ffi::OsString;
use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::net::Ipv6Addr;
use std::net::SocketAddr;
use std::path::Path;
use std::path::PathBuf;

use fizzbuzz_store_sqlite::DEFAULT_BUSY_TIMEOUT_MS;
use fizzbuzz_store_sqlite::DEFAULT_CHECKPOINT_DRAIN_TIMEOUT_MS;
use fizzbuzz_store_sqlite::DEFAULT_CHECKPOINT_INTERVAL;
use fizzbuzz_store_sqlite::DEFAULT_READ_POOL_SIZE;
use fizzbuzz_store_sqlite::MAX_BUSY_TIMEOUT_MS;
use fizzbuzz_store_sqlite::SqliteStoreConfig;
use fizzbuzz_store_sqlite::SqliteStoreMode;
use fizzbuzz_store_sqlite::SqliteSyncMode;
use fizzbuzz_store_sqlite::VOLATILE_PATH;
use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "fizzbuzz.toml";
/// Environment variable used to override the config path.
pub const CONFIG_ENV_VAR: &str = "FIZZBUZZ_CONFIG";
/// Default bind address for the HTTP listener.
pub const DEFAULT_BIND: &str = "127.0.0.1:8080";
/// Locator that selects the in-memory store.
pub const MEMORY_LOCATOR: &str = "off";
/// Default response write deadline in milliseconds.
pub const DEFAULT_WRITE_TIMEOUT_MS: u64 = 10_000;
/// Directory under the user config directory holding the default database.
const DEFAULT_DATABASE_DIR: &str = "fizzbuzz";
/// Default database file name.
const DEFAULT_DATABASE_NAME: &str = "data.db";
/// Maximum length of a bind host name.
const MAX_HOST_LENGTH: usize = 253;
/// Maximum configuration file size in bytes.
const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
const MAX_TOTAL_PATH_LENGTH: usize = 4096;

// ============================================================================
// SECTION: Configuration Types
// ============================================================================

/// FizzBuzz service configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FizzbuzzConfig {
    /// HTTP server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Stats store configuration.
    #[serde(default)]
    pub stats_store: StatsStoreConfig,
    /// Whether the loaded file contained a `[stats_store]` table.
    #[serde(skip)]
    stats_store_configured: bool,
}

impl FizzbuzzConfig {
    /// Loads configuration from disk using the default resolution rules.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let (resolved, explicit) = resolve_path(path)?;
        validate_path(&resolved)?;
        let bytes = match fs::read(&resolved) {
            Ok(bytes) => bytes,
            Err(err) if !explicit && err.kind() == ErrorKind::NotFound => {
                let mut config = Self::default();
                config.validate()?;
                return Ok(config);
            }
            Err(err) => return Err(ConfigError::Io(err.to_string())),
        };
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        let table: toml::Table =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        let stats_store_configured = table.contains_key("stats_store");
        let mut config: Self =
            table.try_into().map_err(|err: toml::de::Error| ConfigError::Parse(err.to_string()))?;
        config.stats_store_configured = stats_store_configured;
        config.validate()?;
        Ok(config)
    }

    /// Returns true when the loaded file chose a stats store explicitly.
    #[must_use]
    pub const fn stats_store_configured(&self) -> bool {
        self.stats_store_configured
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&mut self) -> Result<(), ConfigError> {
        self.server.validate()?;
        self.stats_store.validate()?;
        Ok(())
    }
}

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// `host:port` the listener binds to; the host may be a name.
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Deadline for writing one response, and the shutdown grace period
    /// (milliseconds).
    #[serde(default = "default_write_timeout_ms")]
    pub write_timeout_ms: u64,
    /// Request logging configuration.
    #[serde(default)]
    pub logging: RequestLogConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            write_timeout_ms: default_write_timeout_ms(),
            logging: RequestLogConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Returns the bind address split into host and port.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the address is not `host:port`.
    pub fn bind_endpoint(&self) -> Result<BindEndpoint, ConfigError> {
        BindEndpoint::parse(&self.bind)
    }

    /// Validates server configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        self.bind_endpoint()?;
        if self.write_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "server write_timeout_ms must be greater than zero".to_string(),
            ));
        }
        self.logging.validate()
    }
}

// ============================================================================
// SECTION: Bind Endpoint
// ============================================================================

/// Listening host and port.
///
/// # Invariants
/// - `host` is an IP literal without brackets or a DNS name.
/// - Display brackets hosts containing `:` so the result parses again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindEndpoint {
    /// IP literal or host name.
    pub host: String,
    /// TCP port; zero picks an ephemeral port.
    pub port: u16,
}

impl BindEndpoint {
    /// Parses `host:port`, `[v6]:port` or a socket address literal.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the port is missing or the host
    /// is neither an IP literal nor a valid host name.
    pub fn parse(value: &str) -> Result<Self, ConfigError> {
        let bind = value.trim();
        if bind.is_empty() {
            return Err(ConfigError::Invalid("server requires bind address".to_string()));
        }
        if let Ok(addr) = bind.parse::<SocketAddr>() {
            return Ok(Self {
                host: addr.ip().to_string(),
                port: addr.port(),
            });
        }
        let invalid = || ConfigError::Invalid(format!("invalid bind address: {bind}"));
        let (host, port) = bind.rsplit_once(':').ok_or_else(invalid)?;
        let port = port.parse::<u16>().map_err(|_| invalid())?;
        let host = Self::normalize_host(host).ok_or_else(invalid)?;
        Ok(Self {
            host,
            port,
        })
    }

    /// Strips IPv6 brackets and checks host name syntax.
    #[must_use]
    pub fn normalize_host(host: &str) -> Option<String> {
        let host = host.trim();
        if let Some(inner) = host.strip_prefix('[').and_then(|rest| rest.strip_suffix(']')) {
            return inner.parse::<Ipv6Addr>().ok().map(|ip| ip.to_string());
        }
        if let Ok(ip) = host.parse::<std::net::IpAddr>() {
            return Some(ip.to_string());
        }
        is_host_name(host).then(|| host.to_ascii_lowercase())
    }
}

impl fmt::Display for BindEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

/// Returns true for a dot-separated DNS name of letters, digits and hyphens.
fn is_host_name(host: &str) -> bool {
    if host.is_empty() || host.len() > MAX_HOST_LENGTH {
        return false;
    }
    host.trim_end_matches('.').split('.').all(|label| {
        !label.is_empty()
            && label.len() <= 63
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label.bytes().all(|byte| byte.is_ascii_alphanumeric() || byte == b'-')
    })
}

/// Request logging configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RequestLogConfig {
    /// Emit one JSON line per request.
    #[serde(default = "default_logging_enabled")]
    pub enabled: bool,
    /// Optional request log path (JSON lines); stderr when absent.
    #[serde(default)]
    pub path: Option<String>,
}

impl Default for RequestLogConfig {
    fn default() -> Self {
        Self {
            enabled: default_logging_enabled(),
            path: None,
        }
    }
}

impl RequestLogConfig {
    /// Validates request logging configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(path) = &self.path {
            validate_path_string("server.logging.path", path)?;
        }
        Ok(())
    }
}

/// Stats store configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StatsStoreConfig {
    /// Store backend type.
    #[serde(rename = "type", default)]
    pub store_type: StatsStoreType,
    /// `SQLite` database path when using the sqlite backend.
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_store_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteStoreMode,
    /// `SQLite` synchronous mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
    /// Increments between WAL checkpoints; zero disables them.
    #[serde(default = "default_store_checkpoint_interval")]
    pub checkpoint_interval: u64,
    /// Maximum wait for in-flight increments before a checkpoint (milliseconds).
    #[serde(default = "default_store_checkpoint_drain_timeout_ms")]
    pub checkpoint_drain_timeout_ms: u64,
    /// Number of read-only connections.
    #[serde(default = "default_store_read_pool_size")]
    pub read_pool_size: usize,
}

impl Default for StatsStoreConfig {
    fn default() -> Self {
        Self {
            store_type: StatsStoreType::default(),
            path: None,
            busy_timeout_ms: default_store_busy_timeout_ms(),
            journal_mode: SqliteStoreMode::default(),
            sync_mode: SqliteSyncMode::default(),
            checkpoint_interval: default_store_checkpoint_interval(),
            checkpoint_drain_timeout_ms: default_store_checkpoint_drain_timeout_ms(),
            read_pool_size: default_store_read_pool_size(),
        }
    }
}

impl StatsStoreConfig {
    /// Points the store at the backend named by `locator`.
    pub fn apply_locator(&mut self, locator: StoreLocator) {
        match locator {
            StoreLocator::Memory => {
                self.store_type = StatsStoreType::Memory;
                self.path = None;
            }
            StoreLocator::Volatile => {
                self.store_type = StatsStoreType::Sqlite;
                self.path = Some(PathBuf::from(VOLATILE_PATH));
            }
            StoreLocator::File(path) => {
                self.store_type = StatsStoreType::Sqlite;
                self.path = Some(path);
            }
        }
    }

    /// Returns the `SQLite` store configuration for the sqlite backend.
    #[must_use]
    pub fn sqlite_config(&self) -> Option<SqliteStoreConfig> {
        if self.store_type != StatsStoreType::Sqlite {
            return None;
        }
        let path = self.path.clone()?;
        Some(SqliteStoreConfig {
            path,
            busy_timeout_ms: self.busy_timeout_ms,
            journal_mode: self.journal_mode,
            sync_mode: self.sync_mode,
            checkpoint_interval: self.checkpoint_interval,
            checkpoint_drain_timeout_ms: self.checkpoint_drain_timeout_ms,
            read_pool_size: self.read_pool_size,
        })
    }

    /// Validates stats store configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        match self.store_type {
            StatsStoreType::Memory => {
                if self.path.is_some() {
                    return Err(ConfigError::Invalid(
                        "memory stats_store must not set path".to_string(),
                    ));
                }
                Ok(())
            }
            StatsStoreType::Sqlite => {
                let path = self.path.as_ref().ok_or_else(|| {
                    ConfigError::Invalid("sqlite stats_store requires path".to_string())
                })?;
                validate_path_string("stats_store.path", &path.to_string_lossy())?;
                if self.busy_timeout_ms == 0 {
                    return Err(ConfigError::Invalid(
                        "stats_store busy_timeout_ms must be greater than zero".to_string(),
                    ));
                }
                if self.busy_timeout_ms > MAX_BUSY_TIMEOUT_MS {
                    return Err(ConfigError::Invalid(format!(
                        "stats_store busy_timeout_ms must be at most {MAX_BUSY_TIMEOUT_MS}"
                    )));
                }
                if self.checkpoint_drain_timeout_ms == 0 {
                    return Err(ConfigError::Invalid(
                        "stats_store checkpoint_drain_timeout_ms must be greater than zero"
                            .to_string(),
                    ));
                }
                if self.read_pool_size == 0 {
                    return Err(ConfigError::Invalid(
                        "stats_store read_pool_size must be greater than zero".to_string(),
                    ));
                }
                Ok(())
            }
        }
    }
}

/// Stats store backend type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StatsStoreType {
    /// Use the in-memory store.
    #[default]
    Memory,
    /// Use the `SQLite`-backed durable store.
    Sqlite,
}

// ============================================================================
// SECTION: Store Locator
// ============================================================================

/// Data-source locator accepted on the command line.
///
/// # Invariants
/// - `off` selects [`StoreLocator::Memory`].
/// - `:memory:` selects [`StoreLocator::Volatile`].
/// - Anything else is a database file path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreLocator {
    /// In-memory map store.
    Memory,
    /// `SQLite` database that lives only as long as the process.
    Volatile,
    /// `SQLite` database file.
    File(PathBuf),
}

impl StoreLocator {
    /// Parses a locator string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the locator is empty or the path
    /// exceeds length limits.
    pub fn parse(value: &str) -> Result<Self, ConfigError> {
        match value {
            MEMORY_LOCATOR => Ok(Self::Memory),
            VOLATILE_PATH => Ok(Self::Volatile),
            other => {
                validate_path_string("database locator", other)?;
                Ok(Self::File(PathBuf::from(other)))
            }
        }
    }
}

// ============================================================================
// SECTION: Defaults
// ============================================================================

/// Returns the default bind address.
fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}

/// Returns the default request logging toggle.
const fn default_logging_enabled() -> bool {
    true
}

/// Returns the default response write deadline.
const fn default_write_timeout_ms() -> u64 {
    DEFAULT_WRITE_TIMEOUT_MS
}

/// Returns the default store busy timeout.
const fn default_store_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

/// Returns the default checkpoint interval.
const fn default_store_checkpoint_interval() -> u64 {
    DEFAULT_CHECKPOINT_INTERVAL
}

/// Returns the default checkpoint drain timeout.
const fn default_store_checkpoint_drain_timeout_ms() -> u64 {
    DEFAULT_CHECKPOINT_DRAIN_TIMEOUT_MS
}

/// Returns the default read pool size.
const fn default_store_read_pool_size() -> usize {
    DEFAULT_READ_POOL_SIZE
}

// ============================================================================
// SECTION: Default Database
// ============================================================================

/// Returns `<user config dir>/fizzbuzz/data.db`.
///
/// # Errors
///
/// Returns [`ConfigError::Invalid`] when the user config directory cannot be
/// determined from the environment.
pub fn default_database_path() -> Result<PathBuf, ConfigError> {
    user_config_dir()
        .map(|dir| dir.join(DEFAULT_DATABASE_DIR).join(DEFAULT_DATABASE_NAME))
        .ok_or_else(|| {
            ConfigError::Invalid("user config directory is unknown; pass --db".to_string())
        })
}

/// Returns the per-user configuration directory for this platform.
#[cfg(windows)]
fn user_config_dir() -> Option<PathBuf> {
    non_empty(env::var_os("APPDATA")).map(PathBuf::from)
}

/// Returns the per-user configuration directory for this platform.
#[cfg(target_os = "macos")]
fn user_config_dir() -> Option<PathBuf> {
    non_empty(env::var_os("HOME"))
        .map(|home| PathBuf::from(home).join("Library").join("Application Support"))
}

/// Returns the per-user configuration directory for this platform.
#[cfg(not(any(windows, target_os = "macos")))]
fn user_config_dir() -> Option<PathBuf> {
    xdg_config_dir(env::var_os("XDG_CONFIG_HOME"), env::var_os("HOME"))
}

/// Resolves `$XDG_CONFIG_HOME`, falling back to `$HOME/.config`.
///
/// A relative `$XDG_CONFIG_HOME` yields no directory.
#[cfg(not(any(windows, target_os = "macos")))]
fn xdg_config_dir(xdg_config_home: Option<OsString>, home: Option<OsString>) -> Option<PathBuf> {
    if let Some(dir) = non_empty(xdg_config_home) {
        let dir = PathBuf::from(dir);
        return dir.is_absolute().then_some(dir);
    }
    non_empty(home).map(|home| PathBuf::from(home).join(".config"))
}

/// Drops empty environment values.
fn non_empty(value: Option<OsString>) -> Option<OsString> {
    value.filter(|value| !value.is_empty())
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration loading or validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves the config path and whether it was requested explicitly.
fn resolve_path(path: Option<&Path>) -> Result<(PathBuf, bool), ConfigError> {
    if let Some(path) = path {
        return Ok((path.to_path_buf(), true));
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok((PathBuf::from(env_path), true));
    }
    Ok((PathBuf::from(DEFAULT_CONFIG_NAME), false))
}

/// Validates the resolved path against length limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("config path component too long".to_string()));
        }
    }
    Ok(())
}

/// Validates a path string against length constraints.
fn validate_path_string(field: &str, value: &str) -> Result<(), ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if trimmed.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    for component in Path::new(trimmed).components() {
        let component_value = component.as_os_str().to_string_lossy();
        if component_value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid(format!("{field} path component too long")));
        }
    }
    Ok(())
}

// ============================================================================
// SECTION: Tests
// ============================================================================
