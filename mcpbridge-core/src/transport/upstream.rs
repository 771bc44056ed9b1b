//! Upstream JSON-RPC-over-HTTP client with retry and session tracking.
//!
//! Every JSON-RPC request the bridge dispatches becomes one `POST` to the
//! configured endpoint. The client never fails towards its caller: every
//! failure path is translated into a JSON-RPC error response carrying the
//! original request id.
//!
//! # Error Classification
//!
//! - Connection refused/reset/closed, DNS failure → retryable, `-32603` once
//!   the retry budget is spent
//! - Timeout of the whole exchange → terminal, `-32603` "Request timeout"
//! - TLS failures, unreadable or malformed bodies → terminal, `-32603`
//! - The remote server's own JSON-RPC errors → passed through verbatim
//!
//! The HTTP status code is not interpreted. A body that is a well-formed
//! JSON-RPC response is relayed whatever the status says.
//!
//! # Security
//!
//! - TLS certificate verification is enabled unless `MCPBRIDGE_INSECURE_TLS`
//!   is set, which is reported at startup
//! - TLS 1.2+ enforced by rustls
//! - The session token and API key are never logged

use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderValue};
use reqwest::{Client, Url};
use tracing::{debug, error, info, warn};

use crate::config::{
    ConfigError, ENV_INSECURE_TLS, ENV_MAX_RESPONSE_BYTES, parse_bool_env, parse_usize_env,
    validate_endpoint,
};
use crate::error::BridgeError;
use crate::jsonrpc::{JsonRpcRequest, JsonRpcResponse, fast_correlation_id};
use crate::profile::Profile;
use crate::session::{SESSION_HEADER, SessionStore};
use crate::stats::BridgeStats;

/// Header carrying the optional API key.
pub const API_KEY_HEADER: &str = "X-API-Key";

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default number of retries after the first attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default base delay; retry `n` sleeps `n * base`.
pub const DEFAULT_RETRY_BASE_DELAY: Duration = Duration::from_secs(1);

/// Default maximum response body size (10 MiB).
pub const DEFAULT_MAX_RESPONSE_SIZE: usize = 10 * 1024 * 1024;

/// Configuration for the upstream client.
#[derive(Clone)]
pub struct UpstreamConfig {
    /// Endpoint URL every request is posted to
    pub endpoint: String,
    /// Timeout for one whole HTTP exchange (connect, send, headers, body)
    pub timeout: Duration,
    /// Connection timeout (TCP + TLS handshake)
    pub connect_timeout: Duration,
    /// Retries after the first attempt, for connection-level failures only
    pub max_retries: u32,
    /// Base of the linear backoff between retries
    pub retry_base_delay: Duration,
    /// Maximum idle connections per host
    pub pool_max_idle_per_host: usize,
    /// Idle connection timeout
    pub pool_idle_timeout: Duration,
    /// Maximum response body size in bytes
    pub max_response_size: usize,
    /// Skip TLS certificate validation
    pub insecure_tls: bool,
    /// Deployment profile, controls how insecure settings are reported
    pub profile: Profile,
    /// Optional API key sent as `X-API-Key`
    pub api_key: Option<String>,
}

/// Redacts the API key.
impl std::fmt::Debug for UpstreamConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstreamConfig")
            .field("endpoint", &self.endpoint)
            .field("timeout", &self.timeout)
            .field("connect_timeout", &self.connect_timeout)
            .field("max_retries", &self.max_retries)
            .field("retry_base_delay", &self.retry_base_delay)
            .field("max_response_size", &self.max_response_size)
            .field("insecure_tls", &self.insecure_tls)
            .field("profile", &self.profile)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            timeout: DEFAULT_TIMEOUT,
            connect_timeout: Duration::from_secs(5),
            max_retries: DEFAULT_MAX_RETRIES,
            retry_base_delay: DEFAULT_RETRY_BASE_DELAY,
            pool_max_idle_per_host: 8,
            pool_idle_timeout: Duration::from_secs(90),
            max_response_size: DEFAULT_MAX_RESPONSE_SIZE,
            insecure_tls: false,
            profile: Profile::Production,
            api_key: None,
        }
    }
}

impl UpstreamConfig {
    /// Create a new config with the specified endpoint.
    ///
    /// Uses default values for all other settings.
    pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Default::default()
        }
    }

    /// Apply the environment-only toggles on top of this config.
    ///
    /// # Environment Variables
    ///
    /// - `MCPBRIDGE_INSECURE_TLS` (default: false): skip certificate checks
    /// - `MCPBRIDGE_MAX_RESPONSE_BYTES` (default: 10485760): body size limit
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidEnvValue` if a variable is set to a value
    /// that does not parse.
    pub fn apply_env(mut self) -> Result<Self, ConfigError> {
        self.insecure_tls = parse_bool_env(ENV_INSECURE_TLS, self.insecure_tls)?;
        self.max_response_size = parse_usize_env(ENV_MAX_RESPONSE_BYTES, self.max_response_size)?;
        Ok(self)
    }

    /// Report risky settings. Insecure TLS is a warning in production and an
    /// informational note in development.
    fn log_security_posture(&self) {
        if !self.insecure_tls {
            return;
        }
        match self.profile {
            Profile::Production => warn!(
                profile = self.profile.as_str(),
                "TLS certificate validation is DISABLED ({ENV_INSECURE_TLS}) in production profile"
            ),
            Profile::Development => info!(
                profile = self.profile.as_str(),
                "TLS certificate validation disabled for development"
            ),
        }
    }
}

/// Upstream JSON-RPC-over-HTTP client.
///
/// # Thread Safety
///
/// The client is `Clone` and can be shared across tasks. The underlying
/// reqwest client pools connections internally; the session store and
/// statistics are shared through `Arc`.
#[derive(Clone)]
pub struct UpstreamClient {
    client: Client,
    config: UpstreamConfig,
    endpoint: Url,
    session: Arc<SessionStore>,
    stats: Arc<BridgeStats>,
}

impl UpstreamClient {
    /// Create a new upstream client.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the endpoint is not a valid http(s) URL or the
    /// HTTP client cannot be built.
    pub fn new(
        config: UpstreamConfig,
        session: Arc<SessionStore>,
        stats: Arc<BridgeStats>,
    ) -> Result<Self, ConfigError> {
        let endpoint = validate_endpoint(&config.endpoint)?;

        let client = Client::builder()
            .user_agent(concat!("mcpbridge/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(config.connect_timeout)
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .pool_idle_timeout(config.pool_idle_timeout)
            .danger_accept_invalid_certs(config.insecure_tls)
            .tcp_nodelay(true)
            .tcp_keepalive(Duration::from_secs(60))
            .build()
            .map_err(|e| ConfigError::ClientBuild {
                message: e.to_string(),
            })?;

        config.log_security_posture();

        Ok(Self {
            client,
            config,
            endpoint,
            session,
            stats,
        })
    }

    /// The configuration this client was built with.
    pub fn config(&self) -> &UpstreamConfig {
        &self.config
    }

    /// Send one request and return the remote response or a translated error.
    ///
    /// Never fails: timeouts, exhausted retries and malformed bodies all come
    /// back as JSON-RPC error responses carrying `request.id`.
    ///
    /// # Arguments
    ///
    /// * `request` - The request to post; should carry a concrete id
    /// * `timeout` - Deadline for each HTTP exchange
    /// * `max_retries` - Retries after the first attempt for connection failures
    pub async fn send(
        &self,
        request: &JsonRpcRequest,
        timeout: Duration,
        max_retries: u32,
    ) -> JsonRpcResponse {
        let correlation_id = fast_correlation_id().to_string();
        self.stats.record_request_sent();

        match self
            .send_with_retry(request, timeout, max_retries, &correlation_id)
            .await
        {
            Ok(mut response) => {
                // Each dispatch owns its request, so its id is authoritative.
                if response.id != request.id {
                    debug!(
                        correlation_id = %correlation_id,
                        request_id = ?request.id,
                        upstream_id = ?response.id,
                        "Replacing upstream response id with request id"
                    );
                    response.id = request.id.clone();
                }
                response
            }
            Err(e) => {
                warn!(
                    correlation_id = %correlation_id,
                    method = %request.method,
                    error = %e,
                    error_type = e.error_type_name(),
                    "Upstream exchange failed"
                );
                self.stats.record_error();
                e.to_response(request.id.clone(), &correlation_id)
            }
        }
    }

    /// Retry loop around [`exchange_once`](Self::exchange_once).
    ///
    /// Retries connection-level failures only, with linear backoff
    /// (`base * n` before retry `n`). Timeouts, malformed bodies and remote
    /// JSON-RPC errors are returned on the first occurrence.
    async fn send_with_retry(
        &self,
        request: &JsonRpcRequest,
        timeout: Duration,
        max_retries: u32,
        correlation_id: &str,
    ) -> Result<JsonRpcResponse, BridgeError> {
        let body: Bytes = serde_json::to_vec(request)
            .map_err(|e| BridgeError::Internal {
                details: format!("failed to serialize request: {e}"),
            })?
            .into();

        let mut retry: u32 = 0;
        loop {
            let attempt = retry + 1;
            match self
                .exchange_once(request, body.clone(), timeout, attempt, correlation_id)
                .await
            {
                Ok(response) => return Ok(response),
                Err(e) if e.is_retryable() => {
                    if retry >= max_retries {
                        return Err(e.with_attempts(attempt));
                    }

                    retry += 1;
                    let backoff = self.config.retry_base_delay.saturating_mul(retry);
                    warn!(
                        attempt,
                        max_retries,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %e,
                        correlation_id = %correlation_id,
                        "Transport connection failure, retrying"
                    );
                    self.stats.record_retry();
                    tokio::time::sleep(backoff).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// One HTTP exchange under `timeout`, no retry.
    #[tracing::instrument(
        skip(self, request, body, timeout, correlation_id),
        fields(method = %request.method, correlation_id = %correlation_id)
    )]
    async fn exchange_once(
        &self,
        request: &JsonRpcRequest,
        body: Bytes,
        timeout: Duration,
        attempt: u32,
        correlation_id: &str,
    ) -> Result<JsonRpcResponse, BridgeError> {
        let started = Instant::now();
        let exchange = self.exchange(body, correlation_id);

        match tokio::time::timeout(timeout, exchange).await {
            Ok(result) => {
                debug!(
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    ok = result.is_ok(),
                    "Upstream exchange finished"
                );
                result
            }
            Err(_) => {
                warn!(
                    timeout_ms = timeout.as_millis() as u64,
                    "Upstream request timed out"
                );
                Err(BridgeError::Timeout {
                    timeout_ms: timeout.as_millis() as u64,
                })
            }
        }
    }

    async fn exchange(
        &self,
        body: Bytes,
        correlation_id: &str,
    ) -> Result<JsonRpcResponse, BridgeError> {
        let mut builder = self
            .client
            .post(self.endpoint.clone())
            .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .header(ACCEPT, HeaderValue::from_static("application/json"))
            .body(body);

        if let Some(token) = self.session.get() {
            builder = builder.header(SESSION_HEADER, token.as_str());
        }
        if let Some(ref key) = self.config.api_key {
            builder = builder.header(API_KEY_HEADER, key.as_str());
        }

        let response = builder
            .send()
            .await
            .map_err(|e| self.classify_error(e, correlation_id))?;

        let status = response.status();

        // The session header counts whatever the body turns out to be.
        if let Some(token) = response
            .headers()
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
        {
            self.session.set(token);
        }

        let body_bytes = self.read_body_limited(response, correlation_id).await?;
        let parsed: JsonRpcResponse = serde_json::from_slice(&body_bytes).map_err(|e| {
            error!(
                correlation_id = %correlation_id,
                status = %status,
                error = %e,
                body_size = body_bytes.len(),
                "Failed to parse upstream response"
            );
            BridgeError::InvalidResponse {
                details: format!("HTTP {status}: {e}"),
            }
        })?;

        parsed
            .validate()
            .map_err(|details| BridgeError::InvalidResponse {
                details: format!("HTTP {status}: {details}"),
            })?;

        self.stats.record_response_received();
        debug!(
            correlation_id = %correlation_id,
            status = %status,
            has_error = parsed.is_error(),
            "Received upstream response"
        );

        Ok(parsed)
    }

    /// Read the response body with a size limit.
    ///
    /// Checks the `Content-Length` header first (if present) for early rejection,
    /// then streams chunks up to `max_response_size`.
    async fn read_body_limited(
        &self,
        mut response: reqwest::Response,
        correlation_id: &str,
    ) -> Result<Bytes, BridgeError> {
        let max_size = self.config.max_response_size;

        if let Some(content_length) = response.content_length()
            && content_length as usize > max_size
        {
            warn!(
                correlation_id = %correlation_id,
                content_length = content_length,
                max_response_size = max_size,
                "Upstream response exceeds size limit (Content-Length)"
            );
            return Err(BridgeError::InvalidResponse {
                details: format!(
                    "response too large: {content_length} bytes exceeds {max_size} byte limit"
                ),
            });
        }

        let mut buf = Vec::with_capacity(
            response
                .content_length()
                .map(|cl| cl as usize)
                .unwrap_or(8192)
                .min(max_size),
        );

        while let Some(chunk) = response.chunk().await.map_err(|e| {
            error!(
                correlation_id = %correlation_id,
                error = %e,
                "Failed to read upstream response body chunk"
            );
            BridgeError::Transport {
                details: format!("failed to read response body: {e}"),
            }
        })? {
            if buf.len() + chunk.len() > max_size {
                warn!(
                    correlation_id = %correlation_id,
                    accumulated = buf.len(),
                    chunk_size = chunk.len(),
                    max_response_size = max_size,
                    "Upstream response exceeds size limit during streaming"
                );
                return Err(BridgeError::InvalidResponse {
                    details: format!(
                        "response too large: >={} bytes exceeds {max_size} byte limit",
                        buf.len() + chunk.len()
                    ),
                });
            }
            buf.extend_from_slice(&chunk);
        }

        Ok(buf.into())
    }

    /// Classify a reqwest send error.
    ///
    /// TLS handshake failures surface from the connector as `InvalidData` IO
    /// errors; they are terminal. Any other connect-phase failure, and a
    /// connection dropped before the response arrived, is retryable.
    fn classify_error(&self, error: reqwest::Error, correlation_id: &str) -> BridgeError {
        let reason = error_chain_message(&error);

        if is_tls_failure(&error) {
            error!(
                correlation_id = %correlation_id,
                url = %self.endpoint,
                error = %reason,
                "TLS failure talking to upstream"
            );
            BridgeError::Transport { details: reason }
        } else if error.is_connect() || error.is_request() {
            debug!(
                correlation_id = %correlation_id,
                url = %self.endpoint,
                error = %reason,
                "Connection-level failure talking to upstream"
            );
            BridgeError::ConnectionFailed {
                attempts: 1,
                reason,
            }
        } else if error.is_timeout() {
            BridgeError::Timeout {
                timeout_ms: self.config.connect_timeout.as_millis() as u64,
            }
        } else {
            error!(
                correlation_id = %correlation_id,
                error = %reason,
                "Upstream request failed"
            );
            BridgeError::Transport { details: reason }
        }
    }
}

/// Render an error with its source chain, `outer: inner: root`.
fn error_chain_message(error: &(dyn std::error::Error + 'static)) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    message
}

fn is_tls_failure(error: &(dyn std::error::Error + 'static)) -> bool {
    let mut source = error.source();
    while let Some(cause) = source {
        if let Some(io) = cause.downcast_ref::<std::io::Error>()
            && io.kind() == std::io::ErrorKind::InvalidData
        {
            return true;
        }
        source = cause.source();
    }
    false
}

/// Trait for the upstream client (enables mocking in tests).
///
/// The bridge loop only needs "request in, response out"; tests substitute
/// scripted forwarders to control latency and outcomes.
#[async_trait::async_trait]
pub trait UpstreamForwarder: Send + Sync {
    /// Forward a single request. Never fails; errors are JSON-RPC responses.
    async fn forward(&self, request: &JsonRpcRequest) -> JsonRpcResponse;
}

#[async_trait::async_trait]
impl UpstreamForwarder for UpstreamClient {
    async fn forward(&self, request: &JsonRpcRequest) -> JsonRpcResponse {
        self.send(request, self.config.timeout, self.config.max_retries)
            .await
    }
}
