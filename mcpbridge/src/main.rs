//! mcpbridge entry point.
//!
//! Reads JSON-RPC requests from stdin, forwards each to the remote server
//! over HTTP and writes the responses to stdout. Logs go to stderr.

use std::sync::Arc;

use clap::Parser;
use tokio::io::BufReader;
use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;

use mcpbridge::cli::BridgeArgs;
use mcpbridge::stdio::bridge::{run_bridge, setup_signal_handlers};
use mcpbridge_core::config::ConfigError;
use mcpbridge_core::transport::UpstreamClient;
use mcpbridge_core::{BridgeStats, SessionStore};

// ─────────────────────────────────────────────────────────────────────────────
// CLI Definitions
// ─────────────────────────────────────────────────────────────────────────────

/// Bridge a line-delimited JSON-RPC stdio client to an HTTP JSON-RPC server.
#[derive(Parser)]
#[command(name = "mcpbridge", version)]
struct Cli {
    #[command(flatten)]
    args: BridgeArgs,
}

// ─────────────────────────────────────────────────────────────────────────────
// Entry Point
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // Covers --help and --version as well as invalid arguments.
            let _ = e.print();
            std::process::exit(0);
        }
    };

    init_tracing(cli.args.verbose);
    let code = exit_code(tokio::spawn(run(cli.args)).await);

    // tokio's stdin reader can keep the runtime from shutting down; exit
    // explicitly once the bridge is done.
    std::process::exit(code);
}

/// Build the client, run the bridge and map the outcome to an exit code.
async fn run(args: BridgeArgs) -> i32 {
    let config = match args.upstream_config() {
        Ok(config) => config,
        Err(e) => return config_failure(&e),
    };

    let session = Arc::new(SessionStore::new());
    let stats = Arc::new(BridgeStats::new());
    let client = match UpstreamClient::new(config, session, Arc::clone(&stats)) {
        Ok(client) => client,
        Err(e) => return config_failure(&e),
    };

    tracing::info!(
        endpoint = %client.config().endpoint,
        timeout_ms = client.config().timeout.as_millis() as u64,
        max_retries = client.config().max_retries,
        profile = client.config().profile.as_str(),
        "mcpbridge started"
    );

    let shutdown = CancellationToken::new();
    setup_signal_handlers(shutdown.clone());

    let stdin = BufReader::new(tokio::io::stdin());
    match run_bridge(stdin, tokio::io::stdout(), Arc::new(client), stats, shutdown).await {
        Ok(_) => 0,
        Err(e) => {
            tracing::error!(error = %e, "bridge failed");
            eprintln!("mcpbridge: {e}");
            1
        }
    }
}

/// Exit code for the finished main task. A panic on the main path is an
/// unrecoverable fault like any other and exits 1.
fn exit_code(joined: Result<i32, JoinError>) -> i32 {
    match joined {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %e, "bridge task aborted");
            eprintln!("mcpbridge: {e}");
            1
        }
    }
}

/// Report a configuration problem. Bad user input exits 0; failing to build
/// the HTTP client is an internal fault.
fn config_failure(e: &ConfigError) -> i32 {
    tracing::error!(error = %e, "invalid configuration");
    eprintln!("mcpbridge: {e}");
    match e {
        ConfigError::ClientBuild { .. } => 1,
        ConfigError::InvalidUrl { .. }
        | ConfigError::UnsupportedScheme { .. }
        | ConfigError::InvalidEnvValue { .. } => 0,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tracing Init
// ─────────────────────────────────────────────────────────────────────────────

/// Initialise tracing subscriber with stderr output.
///
/// When `verbose` is true, sets filter to `debug`. Otherwise, respects
/// `RUST_LOG`, defaulting to `info`.
fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
