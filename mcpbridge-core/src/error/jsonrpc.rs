//! JSON-RPC 2.0 error object structures.
//!
//! The wire shape of the `error` member of a JSON-RPC response, plus the
//! structured `data` payload the bridge attaches to errors it generates.
//! Errors relayed from the remote server are deserialized into the same type
//! and passed through unchanged, so `data` accepts arbitrary JSON.

use serde::{Deserialize, Serialize};

/// JSON-RPC 2.0 error object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
    /// Error code (standard JSON-RPC code or server-defined)
    pub code: i32,

    /// Human-readable error message
    pub message: String,

    /// Additional error data (optional, arbitrary JSON for remote errors)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl JsonRpcError {
    /// Decode `data` as bridge-generated [`ErrorData`], if it has that shape.
    pub fn bridge_data(&self) -> Option<ErrorData> {
        self.data
            .as_ref()
            .and_then(|d| serde_json::from_value(d.clone()).ok())
    }
}

/// Structured context attached to bridge-generated errors.
///
/// All fields are safe for client consumption: no tokens, no request params.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ErrorData {
    /// Correlation id for finding this dispatch in the bridge's logs
    pub correlation_id: String,

    /// Machine-readable error type name
    pub error_type: String,

    /// Type-specific error details
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,

    /// Number of HTTP attempts made before giving up (transport failures only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attempts: Option<u32>,
}
