//! Termination signals and draining of in-flight dispatches.

use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::error::StdioError;

/// Cancel `shutdown` on SIGINT (Ctrl+C) or, on Unix, SIGTERM.
///
/// Must be called from within a tokio runtime.
pub fn setup_signal_handlers(shutdown: CancellationToken) {
    let shutdown_sigint = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received SIGINT (Ctrl+C), initiating graceful shutdown");
                shutdown_sigint.cancel();
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGINT");
            }
        }
    });

    #[cfg(unix)]
    {
        let shutdown_sigterm = shutdown;
        tokio::spawn(async move {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    sigterm.recv().await;
                    info!("Received SIGTERM, initiating graceful shutdown");
                    shutdown_sigterm.cancel();
                }
                Err(e) => {
                    error!(error = %e, "Failed to listen for SIGTERM");
                }
            }
        });
    }
}

/// Turn a finished dispatch task into a loop outcome.
pub(super) fn check_dispatch(
    joined: Result<Result<(), std::io::Error>, JoinError>,
) -> Result<(), StdioError> {
    match joined {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(StdioError::Output(e)),
        Err(e) => Err(StdioError::DispatchPanicked {
            reason: e.to_string(),
        }),
    }
}

/// Wait for every in-flight dispatch to finish.
///
/// Dispatches are bounded by their own request timeout, so this terminates.
/// Returns the first fatal outcome, after all tasks have completed.
pub(super) async fn drain_in_flight(
    in_flight: &mut JoinSet<Result<(), std::io::Error>>,
) -> Result<(), StdioError> {
    if !in_flight.is_empty() {
        info!(in_flight = in_flight.len(), "waiting for in-flight requests");
    }

    let mut first_fault = None;
    while let Some(joined) = in_flight.join_next().await {
        if let Err(e) = check_dispatch(joined) {
            error!(error = %e, "dispatch failed during drain");
            first_fault.get_or_insert(e);
        }
    }
    first_fault.map_or(Ok(()), Err)
}
