//! HTTP side of the bridge.
//!
//! [`UpstreamClient`] posts one JSON-RPC request per HTTP call, applies the
//! timeout and retry policy, and keeps the session token current.
//! [`UpstreamForwarder`] is the seam the stdio loop depends on.

pub mod upstream;

pub use upstream::{UpstreamClient, UpstreamConfig, UpstreamForwarder};
