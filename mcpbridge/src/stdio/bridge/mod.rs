//! Stdio ↔ HTTP bridge loop.
//!
//! [`run_bridge`] reads NDJSON requests from an input stream, hands each one
//! to an [`UpstreamForwarder`] on its own task and writes every response back
//! as one line on the output stream. Lines are independent: a slow exchange
//! never holds up the next line, so responses may come back out of order.
//!
//! Intake stops on end of input, when the shutdown token is cancelled, or as
//! soon as a dispatch fails to write its response. In-flight dispatches are
//! always allowed to finish (each is bounded by the upstream request timeout)
//! before the loop returns.

mod dispatch;
mod helpers;
mod shutdown;

use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncWrite};
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use mcpbridge_core::transport::UpstreamForwarder;
use mcpbridge_core::{BridgeStats, StatsSnapshot};

use crate::error::{FramingError, StdioError};
use crate::stdio::ndjson::MAX_MESSAGE_BYTES;

use dispatch::{Decoded, decode_line, dispatch, rejection_line};
use helpers::{bounded_read_line, write_line};
use shutdown::{check_dispatch, drain_in_flight};

pub use shutdown::setup_signal_handlers;

type DispatchSet = JoinSet<Result<(), std::io::Error>>;

/// Run the bridge until end of input or shutdown.
///
/// # Arguments
///
/// * `reader` - Line-delimited JSON-RPC requests
/// * `writer` - Destination for response lines; shared by all dispatch tasks
/// * `forwarder` - Performs the remote exchange for each request
/// * `stats` - Counters updated while running; also held by the forwarder
/// * `shutdown` - Cancelling this stops intake
///
/// # Returns
///
/// Final statistics once intake has stopped and every in-flight request has
/// been answered.
///
/// # Errors
///
/// Returns [`StdioError`] when the input stream fails, the output stream
/// fails, or a dispatch task panics. In-flight requests are still drained
/// before returning.
pub async fn run_bridge<R, W>(
    mut reader: R,
    writer: W,
    forwarder: Arc<dyn UpstreamForwarder>,
    stats: Arc<BridgeStats>,
    shutdown: CancellationToken,
) -> Result<StatsSnapshot, StdioError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let writer = Arc::new(Mutex::new(writer));
    let dispatch_fault = CancellationToken::new();
    let mut in_flight = DispatchSet::new();
    let mut raw_buf = Vec::new();
    let mut fault = None;

    loop {
        if let Err(e) = reap_finished(&mut in_flight) {
            fault = Some(e);
            break;
        }

        raw_buf.clear();

        let read = tokio::select! {
            biased;
            _ = shutdown.cancelled() => {
                info!("shutdown requested, no longer accepting input");
                break;
            }
            // The fault itself is collected by the drain below.
            _ = dispatch_fault.cancelled() => {
                error!("dispatch failed, no longer accepting input");
                break;
            }
            result = bounded_read_line(&mut reader, &mut raw_buf, MAX_MESSAGE_BYTES) => result,
        };

        let decoded = match read {
            Ok(0) => {
                info!("input closed, no longer accepting input");
                break;
            }
            Ok(_) => decode_line(&raw_buf, &stats),
            Err(FramingError::Io(e)) => {
                error!(error = %e, "failed to read input stream");
                fault = Some(StdioError::Input(e));
                break;
            }
            Err(e) => {
                stats.record_line();
                Decoded::Rejected(rejection_line(&e, None, &stats))
            }
        };

        match decoded {
            Decoded::Blank => {}
            Decoded::Rejected(line) => {
                if let Err(e) = write_line(&writer, line.as_bytes()).await {
                    error!(error = %e, "failed to write output stream");
                    fault = Some(StdioError::Output(e));
                    break;
                }
            }
            Decoded::Request(request) => {
                in_flight.spawn(dispatch(
                    request,
                    Arc::clone(&forwarder),
                    Arc::clone(&writer),
                    dispatch_fault.clone(),
                ));
            }
        }
    }

    let drained = drain_in_flight(&mut in_flight).await;

    let snapshot = stats.snapshot();
    info!(
        lines_read = snapshot.lines_read,
        requests_sent = snapshot.requests_sent,
        responses_received = snapshot.responses_received,
        retries = snapshot.retries,
        errors = snapshot.errors,
        "bridge stopped"
    );

    match fault.or(drained.err()) {
        Some(e) => Err(e),
        None => Ok(snapshot),
    }
}

/// Collect dispatches that already finished without waiting on the rest.
fn reap_finished(in_flight: &mut DispatchSet) -> Result<(), StdioError> {
    while let Some(joined) = in_flight.try_join_next() {
        check_dispatch(joined).inspect_err(|e| error!(error = %e, "dispatch failed"))?;
    }
    Ok(())
}
