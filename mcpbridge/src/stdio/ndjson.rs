//! NDJSON line codec for the stdio transport.
//!
//! Pure functions only: no async I/O, no read loops. The bridge loop reads
//! raw line bytes, calls [`parse_request`] on each one and writes whatever
//! [`encode_response`] returns.

use mcpbridge_core::error::codes;
use mcpbridge_core::jsonrpc::{JsonRpcId, JsonRpcRequest, JsonRpcResponse, extract_id};

use crate::error::FramingError;

/// Maximum NDJSON message size (10 MB).
///
/// Lines exceeding this limit are rejected before JSON parsing to prevent
/// allocation of oversized `serde_json::Value` trees from crafted input.
pub const MAX_MESSAGE_BYTES: usize = 10 * 1024 * 1024;

/// Written when a response cannot be serialized. Keeps the one-reply-per-line
/// contract even in that case.
const ENCODE_FAILURE_LINE: &str =
    "{\"jsonrpc\":\"2.0\",\"id\":null,\"error\":{\"code\":-32603,\"message\":\"Internal error: failed to encode response\"}}\n";

/// A line that could not be turned into a request.
#[derive(Debug)]
pub struct RejectedLine {
    /// The id to echo in the error response, when the line carried a usable one.
    pub id: Option<JsonRpcId>,
    /// Why the line was rejected.
    pub error: FramingError,
}

impl RejectedLine {
    fn without_id(error: FramingError) -> Self {
        Self { id: None, error }
    }
}

/// True for lines containing only whitespace. These are skipped silently.
pub fn is_blank(raw: &[u8]) -> bool {
    raw.iter().all(u8::is_ascii_whitespace)
}

/// Decode a single NDJSON line into a validated [`JsonRpcRequest`].
///
/// Performs size validation, UTF-8 decoding, JSON parsing, batch rejection
/// and JSON-RPC envelope validation in sequence.
///
/// # Arguments
///
/// * `raw` - The line bytes, with or without the trailing newline.
///
/// # Errors
///
/// Returns a [`RejectedLine`] for:
/// - Oversized messages (`MessageTooLarge`), checked before JSON parsing
/// - Non UTF-8 bytes (`InvalidUtf8`)
/// - Invalid JSON (`MalformedJson`)
/// - JSON arrays (`UnsupportedBatch`)
/// - Envelope violations (`NotAnObject`, `MissingVersion`,
///   `UnsupportedVersion`, `MissingMethod`, `InvalidId`)
///
/// Envelope violations carry the line's id when it has a usable one so the
/// client can correlate the error.
pub fn parse_request(raw: &[u8]) -> Result<JsonRpcRequest, RejectedLine> {
    let raw = raw.strip_suffix(b"\n").unwrap_or(raw);
    if raw.len() > MAX_MESSAGE_BYTES {
        return Err(RejectedLine::without_id(FramingError::MessageTooLarge {
            max_bytes: MAX_MESSAGE_BYTES,
        }));
    }

    let line = std::str::from_utf8(raw).map_err(|e| {
        RejectedLine::without_id(FramingError::InvalidUtf8 {
            reason: e.to_string(),
        })
    })?;

    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Err(RejectedLine::without_id(FramingError::MalformedJson {
            reason: "empty message".to_string(),
        }));
    }

    let value: serde_json::Value = serde_json::from_str(trimmed).map_err(|e| {
        RejectedLine::without_id(FramingError::MalformedJson {
            reason: e.to_string(),
        })
    })?;

    if value.is_array() {
        return Err(RejectedLine::without_id(FramingError::UnsupportedBatch));
    }

    // Only needed on the error path, but from_value consumes the value.
    let id = extract_id(&value);
    JsonRpcRequest::from_value(value).map_err(|e| RejectedLine {
        id,
        error: e.into(),
    })
}

/// Encode a response as one NDJSON line, including the trailing newline.
///
/// `serde_json` escapes control characters inside strings, so the output
/// never contains an embedded newline.
pub fn encode_response(response: &JsonRpcResponse) -> String {
    match serde_json::to_string(response) {
        Ok(mut line) => {
            line.push('\n');
            line
        }
        Err(e) => {
            tracing::error!(
                error = %e,
                code = codes::INTERNAL_ERROR,
                "failed to serialize response"
            );
            ENCODE_FAILURE_LINE.to_string()
        }
    }
}
