//! End-to-end bridge tests against a mock HTTP JSON-RPC server.
//!
//! Drives `run_bridge` through in-memory pipes with a real `UpstreamClient`,
//! so NDJSON framing, HTTP forwarding, session handling and error
//! translation are exercised together.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, Lines};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

use mcpbridge::error::StdioError;
use mcpbridge::stdio::bridge::run_bridge;
use mcpbridge_core::session::SESSION_HEADER;
use mcpbridge_core::transport::{UpstreamClient, UpstreamConfig};
use mcpbridge_core::{BridgeStats, SessionStore, StatsSnapshot};

// ─────────────────────────────────────────────────────────────────────────────
// Test Harness
// ─────────────────────────────────────────────────────────────────────────────

/// Echo the request id back in a success response.
struct EchoId;

impl Respond for EchoId {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let body: Value = serde_json::from_slice(&request.body).unwrap();
        ResponseTemplate::new(200)
            .insert_header(SESSION_HEADER, "abc123")
            .set_body_json(json!({
                "jsonrpc": "2.0",
                "id": body["id"],
                "result": {"method": body["method"]}
            }))
    }
}

/// A running bridge with the client ends of its stdio pipes.
struct Harness {
    stdin: DuplexStream,
    stdout: Lines<BufReader<DuplexStream>>,
    shutdown: CancellationToken,
    task: JoinHandle<Result<StatsSnapshot, StdioError>>,
}

impl Harness {
    fn start(config: UpstreamConfig) -> Self {
        let stats = Arc::new(BridgeStats::new());
        let client =
            UpstreamClient::new(config, Arc::new(SessionStore::new()), Arc::clone(&stats)).unwrap();

        let (stdin, bridge_in) = tokio::io::duplex(1 << 16);
        let (bridge_out, stdout) = tokio::io::duplex(1 << 16);
        let shutdown = CancellationToken::new();
        let task = tokio::spawn(run_bridge(
            BufReader::new(bridge_in),
            bridge_out,
            Arc::new(client),
            stats,
            shutdown.clone(),
        ));

        Self {
            stdin,
            stdout: BufReader::new(stdout).lines(),
            shutdown,
            task,
        }
    }

    async fn send(&mut self, line: &str) {
        self.stdin.write_all(line.as_bytes()).await.unwrap();
        self.stdin.write_all(b"\n").await.unwrap();
    }

    async fn recv(&mut self) -> Value {
        let line = tokio::time::timeout(Duration::from_secs(10), self.stdout.next_line())
            .await
            .expect("no response within 10s")
            .unwrap()
            .expect("bridge closed stdout");
        serde_json::from_str(&line).unwrap()
    }

    /// Close stdin and wait for the bridge to drain and stop.
    async fn finish(self) -> StatsSnapshot {
        drop(self.stdin);
        self.shutdown.cancel();
        self.task.await.unwrap().unwrap()
    }
}

fn config_for(endpoint: String) -> UpstreamConfig {
    UpstreamConfig {
        timeout: Duration::from_secs(5),
        retry_base_delay: Duration::from_millis(10),
        ..UpstreamConfig::with_endpoint(endpoint)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_round_trip_and_session_propagation() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/mcp"))
        .and(header("content-type", "application/json"))
        .respond_with(EchoId)
        .expect(2)
        .mount(&server)
        .await;

    let mut bridge = Harness::start(config_for(format!("{}/mcp", server.uri())));

    bridge
        .send(r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{}}"#)
        .await;
    let first = bridge.recv().await;
    assert_eq!(first["id"], json!(1));
    assert_eq!(first["result"]["method"], "initialize");

    bridge
        .send(r#"{"jsonrpc":"2.0","id":"two","method":"tools/list"}"#)
        .await;
    let second = bridge.recv().await;
    assert_eq!(second["id"], json!("two"));

    let snapshot = bridge.finish().await;
    assert_eq!(snapshot.requests_sent, 2);
    assert_eq!(snapshot.responses_received, 2);

    let requests = server.received_requests().await.unwrap();
    assert!(requests[0].headers.get(SESSION_HEADER).is_none());
    assert_eq!(
        requests[1].headers.get(SESSION_HEADER).unwrap().to_str().unwrap(),
        "abc123"
    );
}

#[tokio::test]
async fn test_notification_gets_assigned_id_upstream() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(EchoId)
        .mount(&server)
        .await;

    let mut bridge = Harness::start(config_for(server.uri()));
    bridge
        .send(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#)
        .await;
    let response = bridge.recv().await;
    bridge.finish().await;

    let requests = server.received_requests().await.unwrap();
    let sent: Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert!(sent["id"].is_i64());
    assert_eq!(response["id"], sent["id"]);
}

#[tokio::test]
async fn test_remote_error_passed_through() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "jsonrpc": "2.0",
            "id": 3,
            "error": {"code": -32601, "message": "Method not found"}
        })))
        .mount(&server)
        .await;

    let mut bridge = Harness::start(config_for(server.uri()));
    bridge
        .send(r#"{"jsonrpc":"2.0","id":3,"method":"nope"}"#)
        .await;
    let response = bridge.recv().await;
    bridge.finish().await;

    assert_eq!(response["id"], json!(3));
    assert_eq!(response["error"]["code"], -32601);
    assert_eq!(response["error"]["message"], "Method not found");
}

#[tokio::test]
async fn test_malformed_line_never_reaches_server() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(EchoId)
        .expect(0)
        .mount(&server)
        .await;

    let mut bridge = Harness::start(config_for(server.uri()));
    bridge.send("not json").await;
    let response = bridge.recv().await;
    bridge.send(r#"{"jsonrpc":"2.0","id":1}"#).await;
    let missing_method = bridge.recv().await;
    bridge.finish().await;

    assert!(response["id"].is_null());
    assert_eq!(response["error"]["code"], -32700);
    assert_eq!(missing_method["id"], json!(1));
    assert_eq!(missing_method["error"]["code"], -32600);
}

#[tokio::test]
async fn test_timeout_becomes_internal_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_secs(2))
                .set_body_json(json!({"jsonrpc": "2.0", "id": 1, "result": {}})),
        )
        .mount(&server)
        .await;

    let config = UpstreamConfig {
        timeout: Duration::from_millis(200),
        ..config_for(server.uri())
    };
    let mut bridge = Harness::start(config);
    bridge
        .send(r#"{"jsonrpc":"2.0","id":1,"method":"slow"}"#)
        .await;
    let response = bridge.recv().await;
    let snapshot = bridge.finish().await;

    assert_eq!(response["id"], json!(1));
    assert_eq!(response["error"]["code"], -32603);
    assert!(
        response["error"]["message"]
            .as_str()
            .unwrap()
            .to_lowercase()
            .contains("timeout")
    );
    assert_eq!(snapshot.errors, 1);
}

#[tokio::test]
async fn test_unreachable_server_exhausts_retries() {
    // Bind then drop to get a port nothing listens on.
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let config = UpstreamConfig {
        max_retries: 2,
        ..config_for(format!("http://{addr}/mcp"))
    };
    let mut bridge = Harness::start(config);
    bridge
        .send(r#"{"jsonrpc":"2.0","id":"x","method":"ping"}"#)
        .await;
    let response = bridge.recv().await;
    let snapshot = bridge.finish().await;

    assert_eq!(response["id"], json!("x"));
    assert_eq!(response["error"]["code"], -32603);
    assert_eq!(response["error"]["data"]["error_type"], "connection_failed");
    assert_eq!(response["error"]["data"]["attempts"], 3);
    assert_eq!(snapshot.retries, 2);
}
