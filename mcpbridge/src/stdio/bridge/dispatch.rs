//! Per-line handling: decode, correlate, forward, reply.

use std::sync::Arc;

use tokio::io::AsyncWrite;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use mcpbridge_core::jsonrpc::fast_correlation_id;
use mcpbridge_core::transport::UpstreamForwarder;
use mcpbridge_core::{BridgeError, BridgeStats, JsonRpcId, JsonRpcRequest};

use crate::error::FramingError;
use crate::stdio::ndjson::{encode_response, is_blank, parse_request};

use super::helpers::{assign_request_id, write_line};

/// What the loop should do with one input line.
#[derive(Debug)]
pub(super) enum Decoded {
    /// Whitespace only. Produces no output.
    Blank,
    /// A valid request, carrying an id.
    Request(JsonRpcRequest),
    /// The line was rejected; holds the error response line to write.
    Rejected(String),
}

/// Decode one raw line and make sure the request is correlatable.
pub(super) fn decode_line(raw: &[u8], stats: &BridgeStats) -> Decoded {
    if is_blank(raw) {
        return Decoded::Blank;
    }
    stats.record_line();

    match parse_request(raw) {
        Ok(mut request) => {
            if request.needs_assigned_id() {
                let id = assign_request_id();
                tracing::debug!(method = %request.method, %id, "assigned id to uncorrelatable request");
                request.id = Some(id);
            }
            Decoded::Request(request)
        }
        Err(rejected) => Decoded::Rejected(rejection_line(&rejected.error, rejected.id, stats)),
    }
}

/// Build the error response line for a framing failure.
///
/// `id` is `None` when the line had no usable id; it serializes as `null`.
pub(super) fn rejection_line(
    error: &FramingError,
    id: Option<JsonRpcId>,
    stats: &BridgeStats,
) -> String {
    let correlation_id = fast_correlation_id().to_string();
    let bridge_error = BridgeError::from(error);
    tracing::warn!(
        correlation_id = %correlation_id,
        error_type = error.error_type(),
        code = bridge_error.to_jsonrpc_code(),
        error = %error,
        "rejected input line"
    );
    stats.record_error();
    encode_response(&bridge_error.to_response(id, &correlation_id))
}

/// Forward one request and write its response line.
///
/// `fault` is cancelled if the task ends without writing its line, whether
/// through a write error or a panic, so the loop can stop reading at once.
///
/// # Errors
///
/// Only a failed write to the output stream is an error. Upstream failures
/// come back from the forwarder as JSON-RPC error responses.
#[tracing::instrument(skip_all, fields(method = %request.method, id = ?request.id))]
pub(super) async fn dispatch<W: AsyncWrite + Unpin>(
    request: JsonRpcRequest,
    forwarder: Arc<dyn UpstreamForwarder>,
    writer: Arc<Mutex<W>>,
    fault: CancellationToken,
) -> Result<(), std::io::Error> {
    let guard = fault.drop_guard();

    let response = forwarder.forward(&request).await;
    tracing::debug!(is_error = response.is_error(), "dispatch complete");

    let line = encode_response(&response);
    write_line(&writer, line.as_bytes()).await?;

    guard.disarm();
    Ok(())
}
