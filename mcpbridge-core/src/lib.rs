//! mcpbridge core: transport-agnostic pieces of the stdio ↔ HTTP bridge.
//!
//! This library provides the JSON-RPC 2.0 types, the error translator, the
//! session store, process statistics, configuration helpers and the upstream
//! HTTP client used by the `mcpbridge` binary.

pub mod config;
pub mod error;
pub mod jsonrpc;
pub mod profile;
pub mod session;
pub mod stats;
pub mod transport;

pub use error::BridgeError;
pub use jsonrpc::{JsonRpcId, JsonRpcRequest, JsonRpcResponse};
pub use session::SessionStore;
pub use stats::{BridgeStats, StatsSnapshot};
