// crates/fizzbuzz-cli/src/main.rs
// ============================================================================
// Module: FizzBuzz CLI Entry Point
// Description: Command dispatcher for the FizzBuzz HTTP service.
// Purpose: Load configuration, apply flag overrides and run the server.
// Dependencies: clap, fizzbuzz-config, fizzbuzz-server, thiserror, tokio.
// ============================================================================

//! ## Overview
//! `fizzbuzz serve` loads `fizzbuzz.toml` (or the `--config`/`FIZZBUZZ_CONFIG`
//! override), applies command-line overrides, then serves until ctrl-c or
//! SIGTERM. Without `--db` or a `[stats_store]` table, hits persist in
//! `<user config dir>/fizzbuzz/data.db`. Lifecycle lines go to stderr; request
//! events go to the configured request log sink.

// ============================================================================
// SECTION: Modules
// ============================================================================


// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::ArgAction;
use clap::Args;
use clap::CommandFactory;
use clap::Parser;
use clap::Subcommand;
use fizzbuzz_config::BindEndpoint;
use fizzbuzz_config::ConfigError;
use fizzbuzz_config::FizzbuzzConfig;
use fizzbuzz_config::StoreLocator;
use fizzbuzz_config::default_database_path;
use fizzbuzz_server::FizzbuzzServer;
use fizzbuzz_server::ServerError;
use thiserror::Error;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "fizzbuzz", disable_help_subcommand = true, disable_version_flag = true)]
struct Cli {
    /// Print version information and exit.
    #[arg(long = "version", action = ArgAction::SetTrue, global = true)]
    show_version: bool,
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the FizzBuzz HTTP server.
    Serve(ServeCommand),
}

/// Configuration for the `serve` command.
#[derive(Args, Debug, Default)]
struct ServeCommand {
    /// Optional config file path (defaults to fizzbuzz.toml or env override).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Stats backend: `off` (memory), `:memory:` (volatile `SQLite`) or a database
    /// file; defaults to `<user config dir>/fizzbuzz/data.db`.
    #[arg(long, value_name = "LOCATOR")]
    db: Option<String>,
    /// Listening host name or IP, overriding the configured bind address.
    #[arg(long, value_name = "HOST")]
    host: Option<String>,
    /// Listening port, overriding the configured bind address.
    #[arg(long, value_name = "PORT")]
    port: Option<u16>,
    /// Enable or disable request logging.
    #[arg(long, value_name = "BOOL", action = ArgAction::Set)]
    logging: Option<bool>,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI error wrapper for user-facing messages.
#[derive(Debug, Error)]
#[error("{message}")]
struct CliError {
    /// Human-readable error message.
    message: String,
}

impl CliError {
    /// Constructs a new [`CliError`].
    const fn new(message: String) -> Self {
        Self {
            message,
        }
    }
}

/// CLI result alias for fallible operations.
type CliResult<T> = Result<T, CliError>;

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point returning an exit code.
#[tokio::main(flavor = "multi_thread")]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(err) => emit_error(&err.to_string()),
    }
}

/// Executes the CLI command dispatcher.
async fn run() -> CliResult<ExitCode> {
    let cli = Cli::parse();

    if cli.show_version {
        let version = env!("CARGO_PKG_VERSION");
        write_stdout_line(&format!("fizzbuzz {version}"))
            .map_err(|err| CliError::new(output_error("stdout", &err)))?;
        return Ok(ExitCode::SUCCESS);
    }

    let Some(command) = cli.command else {
        show_help()?;
        return Ok(ExitCode::SUCCESS);
    };

    match command {
        Commands::Serve(command) => command_serve(command).await,
    }
}

// ============================================================================
// SECTION: Serve Command
// ============================================================================

/// Executes the `serve` command.
async fn command_serve(command: ServeCommand) -> CliResult<ExitCode> {
    let mut config = FizzbuzzConfig::load(command.config.as_deref())
        .map_err(|err| CliError::new(format!("failed to load config: {err}")))?;
    apply_serve_overrides(&mut config, &command, default_database_path)?;
    if let Some(path) = database_file(&config) {
        emit_lifecycle(&format!("Using database file: {}", path.display()))?;
    }

    let server = tokio::task::spawn_blocking(move || FizzbuzzServer::from_config(config))
        .await
        .map_err(|err| CliError::new(format!("server init failed: init join failed: {err}")))?
        .map_err(|err| CliError::new(format!("server init failed: {err}")))?;
    let bound = server.bind().await.map_err(serve_error)?;
    emit_lifecycle(&format!("Listening on {}", bound.local_addr()))?;
    bound.serve(shutdown_signal()).await.map_err(serve_error)?;

    Ok(ExitCode::SUCCESS)
}

/// Applies command-line overrides on top of the loaded configuration.
///
/// Without `--db`, a configuration that does not choose a stats store gets
/// the file from `default_database`.
fn apply_serve_overrides(
    config: &mut FizzbuzzConfig,
    command: &ServeCommand,
    default_database: fn() -> Result<PathBuf, ConfigError>,
) -> CliResult<()> {
    let locator = match &command.db {
        Some(db) => Some(
            StoreLocator::parse(db)
                .map_err(|err| CliError::new(format!("invalid --db value: {err}")))?,
        ),
        None if config.stats_store_configured() => None,
        None => Some(StoreLocator::File(
            default_database()
                .map_err(|err| CliError::new(format!("default database unavailable: {err}")))?,
        )),
    };
    if let Some(locator) = locator {
        config.stats_store.apply_locator(locator);
    }
    if command.host.is_some() || command.port.is_some() {
        let current = config
            .server
            .bind_endpoint()
            .map_err(|err| CliError::new(format!("failed to load config: {err}")))?;
        config.server.bind = compose_bind(command.host.as_deref(), command.port, &current)?;
    }
    if let Some(enabled) = command.logging {
        config.server.logging.enabled = enabled;
    }
    Ok(())
}

/// Builds a bind address from host and port overrides.
///
/// IPv6 hosts are bracketed; missing parts come from `current`.
fn compose_bind(
    host: Option<&str>,
    port: Option<u16>,
    current: &BindEndpoint,
) -> CliResult<String> {
    let host = match host {
        Some(host) => BindEndpoint::normalize_host(host)
            .ok_or_else(|| CliError::new(format!("invalid --host value: {host}")))?,
        None => current.host.clone(),
    };
    let endpoint = BindEndpoint {
        host,
        port: port.unwrap_or(current.port),
    };
    Ok(endpoint.to_string())
}

/// Returns the database file path when the store is file-backed `SQLite`.
fn database_file(config: &FizzbuzzConfig) -> Option<PathBuf> {
    config
        .stats_store
        .sqlite_config()
        .filter(|sqlite| !sqlite.is_volatile())
        .map(|sqlite| sqlite.path)
}

/// Resolves when ctrl-c or SIGTERM arrives, then announces the shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
    let _ = write_stderr_line("Shutting down HTTP server");
}

/// Maps a server failure to a CLI error.
fn serve_error(err: ServerError) -> CliError {
    CliError::new(format!("server failed: {err}"))
}

// ============================================================================
// SECTION: Output Helpers
// ============================================================================

/// Renders top-level help.
fn show_help() -> CliResult<()> {
    let mut command = Cli::command();
    command.print_help().map_err(|err| CliError::new(output_error("stdout", &err)))?;
    write_stdout_line("").map_err(|err| CliError::new(output_error("stdout", &err)))?;
    Ok(())
}

/// Writes a lifecycle line to stderr.
fn emit_lifecycle(message: &str) -> CliResult<()> {
    write_stderr_line(message).map_err(|err| CliError::new(output_error("stderr", &err)))
}

/// Writes a single line to stdout.
fn write_stdout_line(message: &str) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    writeln!(&mut stdout, "{message}")
}

/// Writes a single line to stderr.
fn write_stderr_line(message: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}")
}

/// Formats an output error message.
fn output_error(stream: &str, error: &std::io::Error) -> String {
    format!("failed to write to {stream}: {error}")
}

/// Emits an error message and returns a failure exit code.
fn emit_error(message: &str) -> ExitCode {
    let _ = write_stderr_line(message);
    ExitCode::FAILURE
}
