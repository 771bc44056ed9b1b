//! mcpbridge: line-delimited JSON-RPC on stdio, bridged to an HTTP server.

pub mod cli;
pub mod error;
pub mod stdio;
