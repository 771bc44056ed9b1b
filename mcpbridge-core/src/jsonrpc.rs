//! JSON-RPC 2.0 types and validation.
//!
//! # JSON-RPC 2.0 Compliance
//!
//! - Requests have `jsonrpc: "2.0"`, a non-empty `method`, optional `params`
//! - A request without `id` (or with `"id": null`) cannot be correlated; the
//!   bridge assigns one before dispatch
//! - `id` type (string or integer) MUST be preserved in responses
//! - Responses carry exactly one of `result` or `error`
//!
//! # Security Note
//!
//! This module validates untrusted input. Size limits are enforced before
//! parsing by the line reader.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::borrow::Cow;
use std::fmt;
use std::sync::LazyLock;
use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

use crate::error::jsonrpc::JsonRpcError;

/// JSON-RPC 2.0 version constant.
pub const JSONRPC_VERSION: &str = "2.0";

// ============================================================================
// Fast Correlation ID Generator
// ============================================================================

/// Startup prefix derived from a single Uuid::new_v4() call.
static CORRELATION_PREFIX: LazyLock<u64> = LazyLock::new(|| {
    let seed = Uuid::new_v4().as_u128();
    (seed >> 64) as u64
});

/// Monotonically increasing counter for the lower 64 bits.
static CORRELATION_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Generate a correlation id for one dispatch.
///
/// Combines a process-unique prefix (from a single Uuid::new_v4() at startup)
/// with a monotonically increasing counter, so ids are unique within a run
/// without paying for a CSPRNG call per line. Version 4 and RFC 4122 variant
/// bits are set.
pub fn fast_correlation_id() -> Uuid {
    let prefix = *CORRELATION_PREFIX;
    let counter = CORRELATION_COUNTER.fetch_add(1, Ordering::Relaxed);
    let mut combined = ((prefix as u128) << 64) | (counter as u128);
    combined = (combined & !(0xF_u128 << 76)) | (0x4_u128 << 76);
    combined = (combined & !(0x3_u128 << 62)) | (0x2_u128 << 62);
    Uuid::from_u128(combined)
}

// ============================================================================
// Request ID
// ============================================================================

/// JSON-RPC 2.0 request ID.
///
/// The exact type is preserved: if the client sends `"id": 1`, the bridge
/// responds with `"id": 1`, never `"id": "1"`.
///
/// # Variants
///
/// - `Number(i64)` - Integer ID (e.g., `"id": 1`)
/// - `Unsigned(u64)` - Integer ID above `i64::MAX`
/// - `String(String)` - String ID (e.g., `"id": "abc-123"`)
/// - `Null` - Explicit null ID (e.g., `"id": null`)
///
/// An explicit `null` is distinct from a missing `id` field. Missing ids are
/// represented as `Option::None` on the request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum JsonRpcId {
    /// Integer ID (e.g., `"id": 1`)
    Number(i64),
    /// Integer ID too large for `i64` (e.g., `"id": 18446744073709551615`)
    Unsigned(u64),
    /// String ID (e.g., `"id": "abc-123"`)
    String(String),
    /// Explicit null ID
    Null,
}

impl JsonRpcId {
    /// Parse an id from a JSON value.
    ///
    /// Returns `None` for floats, booleans, arrays and objects.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => Self::from_number(n),
            Value::String(s) => Some(JsonRpcId::String(s.clone())),
            Value::Null => Some(JsonRpcId::Null),
            _ => None,
        }
    }

    fn from_number(n: &serde_json::Number) -> Option<Self> {
        n.as_i64()
            .map(JsonRpcId::Number)
            .or_else(|| n.as_u64().map(JsonRpcId::Unsigned))
    }
}

impl fmt::Display for JsonRpcId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JsonRpcId::Number(n) => write!(f, "{n}"),
            JsonRpcId::Unsigned(n) => write!(f, "{n}"),
            JsonRpcId::String(s) => write!(f, "{s}"),
            JsonRpcId::Null => write!(f, "null"),
        }
    }
}

impl From<i64> for JsonRpcId {
    fn from(n: i64) -> Self {
        JsonRpcId::Number(n)
    }
}

impl From<&str> for JsonRpcId {
    fn from(s: &str) -> Self {
        JsonRpcId::String(s.to_string())
    }
}

impl Serialize for JsonRpcId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            JsonRpcId::Number(n) => serializer.serialize_i64(*n),
            JsonRpcId::Unsigned(n) => serializer.serialize_u64(*n),
            JsonRpcId::String(s) => serializer.serialize_str(s),
            JsonRpcId::Null => serializer.serialize_none(),
        }
    }
}

impl<'de> Deserialize<'de> for JsonRpcId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        match value {
            Value::Number(n) => Self::from_number(&n).ok_or_else(|| {
                serde::de::Error::custom("JSON-RPC ID must be integer, not float")
            }),
            Value::String(s) => Ok(JsonRpcId::String(s)),
            Value::Null => Ok(JsonRpcId::Null),
            _ => Err(serde::de::Error::custom(
                "JSON-RPC ID must be string, integer, or null",
            )),
        }
    }
}

/// Deserialize a field that may be present with a `null` value.
///
/// Plain `Option<Value>` collapses `"result": null` into `None`, which would
/// make a valid null result indistinguishable from a missing one.
fn deserialize_present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

// ============================================================================
// Request
// ============================================================================

/// Why a JSON value is not a valid JSON-RPC 2.0 request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestValidationError {
    /// Top-level value is a scalar, not an object.
    NotAnObject,
    /// `jsonrpc` field is absent.
    MissingVersion,
    /// `jsonrpc` field is present but not `"2.0"`.
    UnsupportedVersion(String),
    /// `method` is absent, not a string, or empty.
    MissingMethod,
    /// `id` is present but not a string, integer, or null.
    InvalidId,
}

/// Validated JSON-RPC 2.0 request.
///
/// Serialized as-is into the body of the outbound HTTP call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JsonRpcRequest {
    /// Always "2.0"
    pub jsonrpc: Cow<'static, str>,
    /// Request ID (None until the bridge assigns one to a notification)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<JsonRpcId>,
    /// Method name
    pub method: String,
    /// Method parameters, forwarded untouched
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    /// Create a request with the given id, method and params.
    pub fn new(id: impl Into<JsonRpcId>, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: Cow::Borrowed(JSONRPC_VERSION),
            id: Some(id.into()),
            method: method.into(),
            params,
        }
    }

    /// Validate a parsed JSON value as a JSON-RPC 2.0 request.
    ///
    /// Takes ownership so `params` can be moved out without cloning.
    pub fn from_value(value: Value) -> Result<Self, RequestValidationError> {
        let Value::Object(mut obj) = value else {
            return Err(RequestValidationError::NotAnObject);
        };

        match obj.get("jsonrpc") {
            None => return Err(RequestValidationError::MissingVersion),
            Some(Value::String(v)) if v == JSONRPC_VERSION => {}
            Some(Value::String(v)) => {
                return Err(RequestValidationError::UnsupportedVersion(v.clone()));
            }
            Some(other) => {
                return Err(RequestValidationError::UnsupportedVersion(other.to_string()));
            }
        }

        let method = match obj.remove("method") {
            Some(Value::String(m)) if !m.is_empty() => m,
            _ => return Err(RequestValidationError::MissingMethod),
        };

        let id = match obj.get("id") {
            None => None,
            Some(v) => Some(JsonRpcId::from_value(v).ok_or(RequestValidationError::InvalidId)?),
        };

        Ok(Self {
            jsonrpc: Cow::Borrowed(JSONRPC_VERSION),
            id,
            method,
            params: obj.remove("params"),
        })
    }

    /// True when the request carries no id a reply could be matched on:
    /// the field is absent or explicitly `null`.
    #[inline]
    pub fn needs_assigned_id(&self) -> bool {
        matches!(self.id, None | Some(JsonRpcId::Null))
    }
}

/// Best-effort id extraction from a value that failed request validation.
///
/// Used to correlate invalid-request errors when the client did send a
/// usable id. Returns `None` when no usable id is present.
pub fn extract_id(value: &Value) -> Option<JsonRpcId> {
    value
        .get("id")
        .and_then(JsonRpcId::from_value)
        .filter(|id| *id != JsonRpcId::Null)
}

// ============================================================================
// Response
// ============================================================================

/// JSON-RPC 2.0 response.
///
/// # ID Serialization
///
/// The `id` field always serializes: `None` becomes `"id": null`, which is
/// what JSON-RPC 2.0 requires when the request id could not be determined.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    /// Always "2.0"
    pub jsonrpc: Cow<'static, str>,
    /// Request ID, always serialized
    #[serde(default)]
    pub id: Option<JsonRpcId>,
    /// Result (mutually exclusive with error)
    #[serde(
        default,
        deserialize_with = "deserialize_present",
        skip_serializing_if = "Option::is_none"
    )]
    pub result: Option<Value>,
    /// Error (mutually exclusive with result)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    /// Create a success response.
    pub fn success(id: Option<JsonRpcId>, result: Value) -> Self {
        Self {
            jsonrpc: Cow::Borrowed(JSONRPC_VERSION),
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Create an error response.
    ///
    /// Pass `None` for `id` if the request id could not be determined; it
    /// serializes as `"id": null`.
    pub fn error(id: Option<JsonRpcId>, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: Cow::Borrowed(JSONRPC_VERSION),
            id,
            result: None,
            error: Some(error),
        }
    }

    /// Returns true if this is an error response.
    #[inline]
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Check the envelope invariants of a response received from a peer.
    ///
    /// # Errors
    ///
    /// Returns a description of the violation when `jsonrpc` is not `"2.0"`
    /// or when the response does not carry exactly one of `result`/`error`.
    pub fn validate(&self) -> Result<(), String> {
        if self.jsonrpc != JSONRPC_VERSION {
            return Err(format!("unsupported jsonrpc version '{}'", self.jsonrpc));
        }
        match (&self.result, &self.error) {
            (Some(_), None) | (None, Some(_)) => Ok(()),
            (Some(_), Some(_)) => Err("response has both result and error".to_string()),
            (None, None) => Err("response has neither result nor error".to_string()),
        }
    }
}
