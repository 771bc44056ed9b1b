//! Property-based tests for the NDJSON codec.
//!
//! Uses `proptest` to generate JSON-RPC 2.0 requests and arbitrary junk, and
//! checks that ids survive decoding and that every line yields exactly one
//! well-formed response line.

use mcpbridge::stdio::ndjson::{encode_response, parse_request};
use mcpbridge_core::{BridgeError, JsonRpcId, JsonRpcResponse};
use proptest::prelude::*;
use serde_json::{Value, json};

// ─────────────────────────────────────────────────────────────────────────────
// Strategies
// ─────────────────────────────────────────────────────────────────────────────

/// Generate a JSON-RPC 2.0 numeric (full i64 and u64 range) or string id
/// as JSON text.
fn arb_jsonrpc_id() -> impl Strategy<Value = String> {
    prop_oneof![
        any::<i64>().prop_map(|n| n.to_string()),
        (i64::MAX as u64 + 1..=u64::MAX).prop_map(|n| n.to_string()),
        "[a-zA-Z0-9_-]{0,32}".prop_map(|s| format!("\"{}\"", s)),
    ]
}

/// Generate a valid JSON-RPC method name.
fn arb_method() -> impl Strategy<Value = String> {
    "[a-zA-Z][a-zA-Z0-9_/]{0,30}"
}

/// Generate a valid JSON-RPC 2.0 request line with an id.
fn arb_jsonrpc_request() -> impl Strategy<Value = (String, String)> {
    (arb_jsonrpc_id(), arb_method()).prop_map(|(id, method)| {
        let line = format!(
            r#"{{"jsonrpc":"2.0","id":{},"method":"{}","params":{{}}}}"#,
            id, method
        );
        (id, line)
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Properties
// ─────────────────────────────────────────────────────────────────────────────

proptest! {
    #[test]
    fn parsed_id_matches_input(case in arb_jsonrpc_request()) {
        let (id_text, line) = case;
        let request = parse_request(line.as_bytes()).unwrap();
        let id = request.id.unwrap();
        prop_assert!(id != JsonRpcId::Null);
        prop_assert_eq!(serde_json::to_string(&id).unwrap(), id_text);
    }

    #[test]
    fn response_line_echoes_id_with_same_type(case in arb_jsonrpc_request()) {
        let (id_text, line) = case;
        let request = parse_request(line.as_bytes()).unwrap();
        let response = JsonRpcResponse::success(request.id.clone(), json!({"ok": true}));

        let encoded = encode_response(&response);
        prop_assert!(encoded.ends_with('\n'));
        prop_assert_eq!(encoded.matches('\n').count(), 1);

        let parsed: Value = serde_json::from_str(encoded.trim_end()).unwrap();
        let expected: Value = serde_json::from_str(&id_text).unwrap();
        prop_assert_eq!(&parsed["id"], &expected);
    }

    #[test]
    fn arbitrary_bytes_never_panic(raw in proptest::collection::vec(any::<u8>(), 0..512)) {
        match parse_request(&raw) {
            Ok(request) => prop_assert!(!request.method.is_empty()),
            Err(rejected) => {
                let code = BridgeError::from(&rejected.error).to_jsonrpc_code();
                prop_assert!(code == -32700 || code == -32600);
                let line = encode_response(&BridgeError::from(&rejected.error).to_response(rejected.id, "prop"));
                prop_assert_eq!(line.matches('\n').count(), 1);
            }
        }
    }
}
