//! Error types for the stdio side of the bridge.
//!
//! `FramingError` covers NDJSON line failures: size limits, invalid UTF-8,
//! malformed JSON and JSON-RPC envelope validation. Every variant except
//! `Io` becomes an error response line; `Io` means the input stream itself
//! is broken.
//!
//! `StdioError` covers faults that end the bridge loop and make the process
//! exit non-zero.

use mcpbridge_core::BridgeError;
use mcpbridge_core::jsonrpc::RequestValidationError;

/// Errors that can occur when reading and decoding one NDJSON line.
#[derive(Debug, thiserror::Error)]
pub enum FramingError {
    /// A single NDJSON line exceeds the configured maximum size.
    ///
    /// Checked before JSON parsing to prevent allocation of oversized values.
    #[error("Message exceeds maximum size of {max_bytes} bytes")]
    MessageTooLarge {
        /// The configured maximum message size in bytes.
        max_bytes: usize,
    },

    /// The line bytes are not valid UTF-8.
    #[error("Line is not valid UTF-8: {reason}")]
    InvalidUtf8 {
        /// Decoder error description.
        reason: String,
    },

    /// The line is not valid JSON.
    #[error("Malformed JSON: {reason}")]
    MalformedJson {
        /// Human-readable description of the parse failure.
        reason: String,
    },

    /// The message is a JSON array, indicating a JSON-RPC batch request.
    #[error("JSON-RPC batch requests (arrays) are not supported")]
    UnsupportedBatch,

    /// The message is a JSON scalar rather than an object.
    #[error("Message must be a JSON object")]
    NotAnObject,

    /// The `jsonrpc` field is absent from the JSON object.
    #[error("Missing required jsonrpc field")]
    MissingVersion,

    /// The `jsonrpc` field is present but not `"2.0"`.
    #[error("Unsupported JSON-RPC version: {version}")]
    UnsupportedVersion {
        /// The version found in the message.
        version: String,
    },

    /// The `method` field is absent, not a string, or empty.
    #[error("Missing or empty method field")]
    MissingMethod,

    /// The `id` field is not a string, integer, or null.
    #[error("Invalid id field: must be a string, integer, or null")]
    InvalidId,

    /// An underlying IO error occurred while reading from stdin.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl FramingError {
    /// Label for log fields.
    pub fn error_type(&self) -> &'static str {
        match self {
            FramingError::MessageTooLarge { .. } => "message_too_large",
            FramingError::InvalidUtf8 { .. } => "invalid_utf8",
            FramingError::MalformedJson { .. } => "malformed_json",
            FramingError::UnsupportedBatch => "unsupported_batch",
            FramingError::NotAnObject => "not_an_object",
            FramingError::MissingVersion => "missing_version",
            FramingError::UnsupportedVersion { .. } => "unsupported_version",
            FramingError::MissingMethod => "missing_method",
            FramingError::InvalidId => "invalid_id",
            FramingError::Io(_) => "io_error",
        }
    }
}

impl From<RequestValidationError> for FramingError {
    fn from(e: RequestValidationError) -> Self {
        match e {
            RequestValidationError::NotAnObject => FramingError::NotAnObject,
            RequestValidationError::MissingVersion => FramingError::MissingVersion,
            RequestValidationError::UnsupportedVersion(version) => {
                FramingError::UnsupportedVersion { version }
            }
            RequestValidationError::MissingMethod => FramingError::MissingMethod,
            RequestValidationError::InvalidId => FramingError::InvalidId,
        }
    }
}

/// Lines that cannot be parsed are parse errors (-32700); lines that parse
/// but are not valid requests are invalid requests (-32600).
impl From<&FramingError> for BridgeError {
    fn from(e: &FramingError) -> Self {
        match e {
            FramingError::MessageTooLarge { .. }
            | FramingError::InvalidUtf8 { .. }
            | FramingError::MalformedJson { .. } => BridgeError::ParseError {
                details: e.to_string(),
            },
            FramingError::UnsupportedBatch
            | FramingError::NotAnObject
            | FramingError::MissingVersion
            | FramingError::UnsupportedVersion { .. }
            | FramingError::MissingMethod
            | FramingError::InvalidId => BridgeError::InvalidRequest {
                details: e.to_string(),
            },
            FramingError::Io(_) => BridgeError::Internal {
                details: e.to_string(),
            },
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Bridge Loop Errors
// ─────────────────────────────────────────────────────────────────────────────

/// Unrecoverable bridge loop failures. Any of these exits the process with
/// status 1.
#[derive(Debug, thiserror::Error)]
pub enum StdioError {
    /// Reading from the input stream failed.
    #[error("failed to read input stream: {0}")]
    Input(std::io::Error),

    /// Writing to the output stream failed; the client is gone.
    #[error("failed to write output stream: {0}")]
    Output(std::io::Error),

    /// A dispatch task panicked, so its request will never get a reply.
    #[error("dispatch task panicked: {reason}")]
    DispatchPanicked {
        /// Panic payload or join error description.
        reason: String,
    },
}
