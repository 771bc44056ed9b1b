//! Process-wide bridge counters.
//!
//! Updated by the bridge loop and the transport client, read once at
//! shutdown. Plain atomics: the counters are independent, so no snapshot
//! consistency across fields is promised.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters from process start to exit.
#[derive(Debug, Default)]
pub struct BridgeStats {
    lines_read: AtomicU64,
    requests_sent: AtomicU64,
    responses_received: AtomicU64,
    retries: AtomicU64,
    errors: AtomicU64,
}

impl BridgeStats {
    /// Create a zeroed set of counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// A non-blank input line was read.
    pub fn record_line(&self) {
        self.lines_read.fetch_add(1, Ordering::Relaxed);
    }

    /// A request was handed to the transport for dispatch.
    pub fn record_request_sent(&self) {
        self.requests_sent.fetch_add(1, Ordering::Relaxed);
    }

    /// A well-formed JSON-RPC response came back from the remote server.
    pub fn record_response_received(&self) {
        self.responses_received.fetch_add(1, Ordering::Relaxed);
    }

    /// A failed attempt is about to be retried.
    pub fn record_retry(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }

    /// The bridge produced an error envelope of its own.
    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Read all counters.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            lines_read: self.lines_read.load(Ordering::Relaxed),
            requests_sent: self.requests_sent.load(Ordering::Relaxed),
            responses_received: self.responses_received.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`BridgeStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    pub lines_read: u64,
    pub requests_sent: u64,
    pub responses_received: u64,
    pub retries: u64,
    pub errors: u64,
}
