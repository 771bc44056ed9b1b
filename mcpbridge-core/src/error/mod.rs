//! Error handling for mcpbridge.
//!
//! Every failure the bridge can produce, from a malformed input line to an
//! exhausted retry budget, is a [`BridgeError`] variant. This is the only
//! place where failure kinds are mapped to JSON-RPC error codes and messages,
//! so the stdio side and the HTTP side always agree on the wire format.
//!
//! ## Module Organization
//!
//! - `jsonrpc` - JSON-RPC 2.0 error object structures
//! - `BridgeError` - failure kinds and their JSON-RPC translation

pub mod jsonrpc;

use jsonrpc::{ErrorData, JsonRpcError};
use thiserror::Error;

use crate::jsonrpc::{JsonRpcId, JsonRpcResponse};

/// Standard JSON-RPC 2.0 error codes used by the bridge.
pub mod codes {
    /// Invalid JSON was received.
    pub const PARSE_ERROR: i32 = -32700;
    /// The JSON sent is not a valid request object.
    pub const INVALID_REQUEST: i32 = -32600;
    /// Internal JSON-RPC error. Used for every transport-level failure.
    pub const INTERNAL_ERROR: i32 = -32603;
}

/// All error types that can occur while bridging a request.
///
/// Each variant maps to a JSON-RPC error code via [`to_jsonrpc_code`] and
/// renders its wire `message` through its `Display` impl.
///
/// [`to_jsonrpc_code`]: BridgeError::to_jsonrpc_code
#[derive(Debug, Error, Clone, PartialEq)]
pub enum BridgeError {
    // Framing errors (input side)
    /// The input line is not valid JSON.
    #[error("Parse error: {details}")]
    ParseError {
        /// Description of the parse error
        details: String,
    },

    /// The input line is JSON but not a valid JSON-RPC 2.0 request.
    #[error("Invalid request: {details}")]
    InvalidRequest {
        /// Description of what makes the request invalid
        details: String,
    },

    // Transport errors (HTTP side)
    /// The HTTP exchange did not complete within the request timeout.
    #[error("Request timeout")]
    Timeout {
        /// The timeout that elapsed, in milliseconds
        timeout_ms: u64,
    },

    /// Could not reach the remote server, retries exhausted.
    #[error("Connection failed after {attempts} attempt(s): {reason}")]
    ConnectionFailed {
        /// Number of attempts made
        attempts: u32,
        /// Message of the last failure
        reason: String,
    },

    /// The remote server answered with a body that is not a JSON-RPC response.
    #[error("Invalid response from server: {details}")]
    InvalidResponse {
        /// Description of what was wrong with the body
        details: String,
    },

    /// Non-retryable transport failure (TLS, protocol violation, body read).
    #[error("Transport error: {details}")]
    Transport {
        /// Description of the failure
        details: String,
    },

    /// Unexpected failure inside the bridge itself.
    #[error("Internal error: {details}")]
    Internal {
        /// Description of the failure
        details: String,
    },
}

impl BridgeError {
    /// Convert this error to a JSON-RPC error code.
    pub fn to_jsonrpc_code(&self) -> i32 {
        match self {
            Self::ParseError { .. } => codes::PARSE_ERROR,
            Self::InvalidRequest { .. } => codes::INVALID_REQUEST,
            Self::Timeout { .. }
            | Self::ConnectionFailed { .. }
            | Self::InvalidResponse { .. }
            | Self::Transport { .. }
            | Self::Internal { .. } => codes::INTERNAL_ERROR,
        }
    }

    /// Returns the error type name for logging and `data.error_type`.
    pub fn error_type_name(&self) -> &'static str {
        match self {
            Self::ParseError { .. } => "parse_error",
            Self::InvalidRequest { .. } => "invalid_request",
            Self::Timeout { .. } => "timeout",
            Self::ConnectionFailed { .. } => "connection_failed",
            Self::InvalidResponse { .. } => "invalid_response",
            Self::Transport { .. } => "transport_error",
            Self::Internal { .. } => "internal_error",
        }
    }

    /// Whether another attempt at the same exchange could succeed.
    ///
    /// Only connection-level failures qualify. A timeout is terminal: the
    /// remote server may still be executing the request.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ConnectionFailed { .. })
    }

    /// Stamp the number of attempts made onto a connection failure.
    /// Other kinds are returned unchanged.
    pub fn with_attempts(self, attempts: u32) -> Self {
        match self {
            Self::ConnectionFailed { reason, .. } => Self::ConnectionFailed { attempts, reason },
            other => other,
        }
    }

    fn details(&self) -> Option<String> {
        match self {
            Self::ParseError { details }
            | Self::InvalidRequest { details }
            | Self::InvalidResponse { details }
            | Self::Transport { details }
            | Self::Internal { details } => Some(details.clone()),
            Self::ConnectionFailed { reason, .. } => Some(reason.clone()),
            Self::Timeout { timeout_ms } => Some(format!("no response within {timeout_ms}ms")),
        }
    }

    fn attempts(&self) -> Option<u32> {
        match self {
            Self::ConnectionFailed { attempts, .. } => Some(*attempts),
            _ => None,
        }
    }

    /// Convert to a JSON-RPC error object.
    ///
    /// # Arguments
    ///
    /// * `correlation_id` - Correlation id of the dispatch, echoed in `data`
    pub fn to_jsonrpc_error(&self, correlation_id: &str) -> JsonRpcError {
        let data = ErrorData {
            correlation_id: correlation_id.to_string(),
            error_type: self.error_type_name().to_string(),
            details: self.details(),
            attempts: self.attempts(),
        };
        JsonRpcError {
            code: self.to_jsonrpc_code(),
            message: self.to_string(),
            data: serde_json::to_value(data).ok(),
        }
    }

    /// Build a complete JSON-RPC error response for this failure.
    ///
    /// # Arguments
    ///
    /// * `id` - The request id to echo back. `None` serializes as `"id": null`
    ///   and is used when the request id could not be determined.
    /// * `correlation_id` - Correlation id of the dispatch
    pub fn to_response(&self, id: Option<JsonRpcId>, correlation_id: &str) -> JsonRpcResponse {
        JsonRpcResponse::error(id, self.to_jsonrpc_error(correlation_id))
    }
}
