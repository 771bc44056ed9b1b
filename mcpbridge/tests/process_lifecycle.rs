//! Process-level tests for the `mcpbridge` binary: exit codes, end of input
//! and graceful shutdown on SIGTERM.

use std::process::Stdio;
use std::time::Duration;

use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Spawn the bridge binary with piped stdio.
fn spawn_bridge(args: &[&str]) -> Child {
    Command::new(env!("CARGO_BIN_EXE_mcpbridge"))
        .args(args)
        .env_remove("MCPBRIDGE_URL")
        .env("RUST_LOG", "info")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()
        .expect("failed to spawn mcpbridge")
}

async fn wait_exit(child: &mut Child) -> i32 {
    let status = tokio::time::timeout(Duration::from_secs(10), child.wait())
        .await
        .expect("mcpbridge did not exit within 10s")
        .unwrap();
    status.code().expect("mcpbridge was killed by a signal")
}

#[tokio::test]
async fn test_invalid_url_exits_zero_with_diagnostic() {
    let output = Command::new(env!("CARGO_BIN_EXE_mcpbridge"))
        .arg("ftp://example.com/mcp")
        .env_remove("MCPBRIDGE_URL")
        .stdin(Stdio::null())
        .output()
        .await
        .unwrap();

    assert_eq!(output.status.code(), Some(0));
    assert!(output.stdout.is_empty(), "nothing may reach the protocol channel");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("unsupported URL scheme"), "stderr: {stderr}");
}

#[tokio::test]
async fn test_missing_url_exits_zero() {
    let output = Command::new(env!("CARGO_BIN_EXE_mcpbridge"))
        .env_remove("MCPBRIDGE_URL")
        .stdin(Stdio::null())
        .output()
        .await
        .unwrap();

    assert_eq!(output.status.code(), Some(0));
    assert!(output.stdout.is_empty());
    assert!(!output.stderr.is_empty());
}

#[tokio::test]
async fn test_end_of_input_drains_and_exits_zero() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_millis(200))
                .set_body_json(json!({"jsonrpc": "2.0", "id": 1, "result": {"ok": true}})),
        )
        .mount(&server)
        .await;

    let uri = server.uri();
    let mut child = spawn_bridge(&[uri.as_str()]);
    let mut stdin = child.stdin.take().unwrap();
    stdin
        .write_all(b"{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"ping\"}\n")
        .await
        .unwrap();
    drop(stdin);

    let mut stdout = BufReader::new(child.stdout.take().unwrap()).lines();
    let line = stdout.next_line().await.unwrap().expect("no response line");
    let response: Value = serde_json::from_str(&line).unwrap();
    assert_eq!(response["id"], json!(1));
    assert_eq!(response["result"]["ok"], true);

    assert_eq!(wait_exit(&mut child).await, 0);
}

#[cfg(unix)]
#[tokio::test]
async fn test_sigterm_waits_for_in_flight_exchange() {
    use nix::sys::signal::{Signal, kill};
    use nix::unistd::Pid;

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_millis(500))
                .set_body_json(json!({"jsonrpc": "2.0", "id": 7, "result": "done"})),
        )
        .mount(&server)
        .await;

    let uri = server.uri();
    let mut child = spawn_bridge(&[uri.as_str()]);
    let mut stdin = child.stdin.take().unwrap();
    stdin
        .write_all(b"{\"jsonrpc\":\"2.0\",\"id\":7,\"method\":\"slow\"}\n")
        .await
        .unwrap();

    // Wait until the exchange is in flight.
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    while server.received_requests().await.unwrap_or_default().is_empty() {
        assert!(tokio::time::Instant::now() < deadline, "request never reached the server");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let pid = Pid::from_raw(child.id().unwrap() as i32);
    kill(pid, Signal::SIGTERM).unwrap();

    let mut stdout = BufReader::new(child.stdout.take().unwrap()).lines();
    let line = stdout
        .next_line()
        .await
        .unwrap()
        .expect("in-flight response was dropped on shutdown");
    let response: Value = serde_json::from_str(&line).unwrap();
    assert_eq!(response["id"], json!(7));
    assert_eq!(response["result"], "done");

    assert_eq!(wait_exit(&mut child).await, 0);
    drop(stdin);
}
