#![no_main]

//! Fuzz target for the NDJSON request codec.
//!
//! # Goal
//! Verify that decoding arbitrary input lines does not cause:
//! - Panics in the parser or the error translator
//! - Error responses that span more than one line
//! - Error codes outside the framing range (-32700 / -32600)

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use mcpbridge::stdio::ndjson::{encode_response, parse_request};
use mcpbridge_core::{BridgeError, JsonRpcResponse};

/// Fuzz input for NDJSON testing
#[derive(Arbitrary, Debug)]
struct FuzzNdjsonInput {
    /// Raw bytes to parse
    raw_bytes: Vec<u8>,
    /// Structured input for valid-ish JSON-RPC
    structured: Option<StructuredRequest>,
}

/// Structured input that generates valid-ish JSON-RPC requests
#[derive(Arbitrary, Debug)]
struct StructuredRequest {
    /// JSON-RPC version (should be "2.0" but fuzz it)
    version: FuzzVersion,
    /// Request ID
    id: FuzzId,
    /// Method name
    method: Vec<u8>,
    /// Params content
    params: Option<Vec<(Vec<u8>, Vec<u8>)>>,
}

#[derive(Arbitrary, Debug)]
enum FuzzVersion {
    Correct,   // "2.0"
    Wrong(u8), // "1.0", "3.0", etc.
    Missing,   // no jsonrpc field
    NonString, // number
}

#[derive(Arbitrary, Debug)]
enum FuzzId {
    Integer(i64),
    String(Vec<u8>),
    Null,
    Missing,    // notification
    Float(f64), // invalid
    Object,     // invalid
}

fuzz_target!(|input: FuzzNdjsonInput| {
    check_line(&input.raw_bytes);
    if let Some(structured) = input.structured {
        check_line(build_json_from_structured(&structured).as_bytes());
    }
});

/// Decode one line and encode whatever reply the bridge would write.
fn check_line(raw: &[u8]) {
    let response = match parse_request(raw) {
        Ok(request) => {
            assert!(!request.method.is_empty());
            JsonRpcResponse::success(request.id, serde_json::Value::Null)
        }
        Err(rejected) => {
            let error = BridgeError::from(&rejected.error);
            let code = error.to_jsonrpc_code();
            assert!(code == -32700 || code == -32600, "unexpected code {code}");
            error.to_response(rejected.id, "fuzz")
        }
    };

    let line = encode_response(&response);
    assert_eq!(line.matches('\n').count(), 1);
}

/// Build JSON string from structured input
fn build_json_from_structured(input: &StructuredRequest) -> String {
    let mut parts = Vec::new();

    match &input.version {
        FuzzVersion::Correct => parts.push(r#""jsonrpc":"2.0""#.to_string()),
        FuzzVersion::Wrong(v) => parts.push(format!(r#""jsonrpc":"{}.0""#, v % 10)),
        FuzzVersion::Missing => {}
        FuzzVersion::NonString => parts.push(r#""jsonrpc":2.0"#.to_string()),
    }

    match &input.id {
        FuzzId::Integer(n) => parts.push(format!(r#""id":{}"#, n)),
        FuzzId::String(s) => {
            let s = String::from_utf8_lossy(s);
            parts.push(format!(r#""id":"{}""#, escape_json_string(&s)));
        }
        FuzzId::Null => parts.push(r#""id":null"#.to_string()),
        FuzzId::Missing => {}
        FuzzId::Float(f) => {
            if f.is_finite() {
                parts.push(format!(r#""id":{}"#, f))
            }
        }
        FuzzId::Object => parts.push(r#""id":{}"#.to_string()),
    }

    let method = String::from_utf8_lossy(&input.method);
    let method: String = method.chars().take(256).collect();
    parts.push(format!(r#""method":"{}""#, escape_json_string(&method)));

    if let Some(entries) = &input.params {
        let pairs: Vec<String> = entries
            .iter()
            .take(20)
            .map(|(k, v)| {
                let key: String = String::from_utf8_lossy(k).chars().take(64).collect();
                let value: String = String::from_utf8_lossy(v).chars().take(256).collect();
                format!(
                    r#""{}":"{}""#,
                    escape_json_string(&key),
                    escape_json_string(&value)
                )
            })
            .collect();
        parts.push(format!(r#""params":{{{}}}"#, pairs.join(",")));
    }

    format!("{{{}}}", parts.join(","))
}

/// Escape a string for JSON embedding
fn escape_json_string(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
        .replace('\r', "\\r")
        .replace('\t', "\\t")
}
