//! Command-line arguments for `mcpbridge`.
//!
//! Defined separately from `main.rs` so integration tests can parse them
//! directly. Every option except `--verbose` has an environment fallback.

use std::time::Duration;

use clap::{Args, ValueEnum};

use mcpbridge_core::config::{ConfigError, validate_endpoint};
use mcpbridge_core::profile::Profile;
use mcpbridge_core::transport::UpstreamConfig;

// ─────────────────────────────────────────────────────────────────────────────
// Bridge Args
// ─────────────────────────────────────────────────────────────────────────────

/// Arguments for the bridge.
#[derive(Args, Debug)]
pub struct BridgeArgs {
    /// Remote JSON-RPC endpoint (http or https).
    #[arg(value_name = "URL", env = "MCPBRIDGE_URL")]
    pub url: String,

    /// Deadline for one HTTP exchange, in milliseconds.
    #[arg(
        long,
        env = "MCPBRIDGE_TIMEOUT_MS",
        default_value_t = 30_000,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub timeout_ms: u64,

    /// TCP and TLS connect timeout, in milliseconds.
    #[arg(
        long,
        env = "MCPBRIDGE_CONNECT_TIMEOUT_MS",
        default_value_t = 5_000,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub connect_timeout_ms: u64,

    /// Retries after the first attempt for connection-level failures.
    #[arg(long, env = "MCPBRIDGE_MAX_RETRIES", default_value_t = 3)]
    pub max_retries: u32,

    /// Base retry delay in milliseconds; retry n waits n times this.
    #[arg(long, env = "MCPBRIDGE_RETRY_DELAY_MS", default_value_t = 1_000)]
    pub retry_delay_ms: u64,

    /// Configuration profile.
    #[arg(long, value_enum, env = "MCPBRIDGE_PROFILE", default_value = "production")]
    pub profile: CliProfile,

    /// API key sent as `X-API-Key` on every request.
    #[arg(long, env = "MCPBRIDGE_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Enable debug logging.
    #[arg(long)]
    pub verbose: bool,
}

impl BridgeArgs {
    /// Build the upstream client configuration.
    ///
    /// Validates the URL and applies the environment-only toggles.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for an invalid URL or an unparseable
    /// environment toggle.
    pub fn upstream_config(&self) -> Result<UpstreamConfig, ConfigError> {
        let endpoint = validate_endpoint(&self.url)?;

        UpstreamConfig {
            endpoint: endpoint.to_string(),
            timeout: Duration::from_millis(self.timeout_ms),
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
            max_retries: self.max_retries,
            retry_base_delay: Duration::from_millis(self.retry_delay_ms),
            profile: self.profile.clone().into(),
            api_key: self.api_key.clone().filter(|key| !key.is_empty()),
            ..UpstreamConfig::default()
        }
        .apply_env()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Value Enums (clap-compatible)
// ─────────────────────────────────────────────────────────────────────────────

/// CLI-level profile selection.
///
/// Maps 1:1 to `mcpbridge_core::profile::Profile`.
#[derive(Clone, Debug, ValueEnum)]
pub enum CliProfile {
    /// Insecure TLS settings are reported as warnings.
    Production,
    /// Insecure TLS settings are expected for local test servers.
    Development,
}

impl From<CliProfile> for Profile {
    fn from(p: CliProfile) -> Self {
        match p {
            CliProfile::Production => Profile::Production,
            CliProfile::Development => Profile::Development,
        }
    }
}
