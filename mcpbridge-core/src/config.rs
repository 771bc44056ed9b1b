//! Configuration errors and environment parsing helpers.
//!
//! Most settings arrive through command-line flags. A few toggles are
//! environment-only because they are deployment concerns rather than
//! per-invocation choices:
//!
//! - `MCPBRIDGE_INSECURE_TLS` (default: false): skip certificate validation
//! - `MCPBRIDGE_MAX_RESPONSE_BYTES` (default: 10 MiB): response body limit

use reqwest::Url;
use thiserror::Error;

/// Relax TLS certificate validation. Never the default.
pub const ENV_INSECURE_TLS: &str = "MCPBRIDGE_INSECURE_TLS";

/// Maximum accepted response body size in bytes.
pub const ENV_MAX_RESPONSE_BYTES: &str = "MCPBRIDGE_MAX_RESPONSE_BYTES";

/// Configuration loading and validation errors.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    /// The endpoint is not an absolute URL.
    #[error("invalid URL '{url}': {message}")]
    InvalidUrl { url: String, message: String },

    /// The endpoint uses a scheme other than http or https.
    #[error("unsupported URL scheme '{scheme}' in '{url}': expected http or https")]
    UnsupportedScheme { url: String, scheme: String },

    /// An environment variable holds a value that cannot be parsed.
    #[error("environment variable '{var}' has invalid value '{value}': expected {expected}")]
    InvalidEnvValue {
        var: String,
        value: String,
        expected: &'static str,
    },

    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client: {message}")]
    ClientBuild { message: String },
}

/// Parse and validate the remote endpoint URL.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidUrl`] when the value does not parse or has
/// no host, and [`ConfigError::UnsupportedScheme`] for anything other than
/// `http`/`https`.
pub fn validate_endpoint(raw: &str) -> Result<Url, ConfigError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::InvalidUrl {
            url: raw.to_string(),
            message: "URL is empty".to_string(),
        });
    }

    let url = Url::parse(trimmed).map_err(|e| ConfigError::InvalidUrl {
        url: raw.to_string(),
        message: e.to_string(),
    })?;

    match url.scheme() {
        "http" | "https" => {}
        other => {
            return Err(ConfigError::UnsupportedScheme {
                url: raw.to_string(),
                scheme: other.to_string(),
            });
        }
    }

    if url.host_str().is_none_or(str::is_empty) {
        return Err(ConfigError::InvalidUrl {
            url: raw.to_string(),
            message: "URL has no host".to_string(),
        });
    }

    Ok(url)
}

/// Read a boolean environment variable.
///
/// Accepts `1/0`, `true/false`, `yes/no`, `on/off` (case-insensitive).
/// Unset or empty yields `default`.
pub fn parse_bool_env(var: &str, default: bool) -> Result<bool, ConfigError> {
    match std::env::var(var) {
        Ok(value) => match value.trim().to_ascii_lowercase().as_str() {
            "" => Ok(default),
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::InvalidEnvValue {
                var: var.to_string(),
                value,
                expected: "a boolean (true/false)",
            }),
        },
        Err(_) => Ok(default),
    }
}

/// Read an unsigned integer environment variable.
///
/// Unset or empty yields `default`.
pub fn parse_usize_env(var: &str, default: usize) -> Result<usize, ConfigError> {
    match std::env::var(var) {
        Ok(value) if value.trim().is_empty() => Ok(default),
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidEnvValue {
                var: var.to_string(),
                value,
                expected: "a non-negative integer",
            }),
        Err(_) => Ok(default),
    }
}
