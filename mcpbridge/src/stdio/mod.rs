//! Stdio side of the bridge: the NDJSON codec and the bridge loop.

pub mod bridge;
pub mod ndjson;
