//! MCP server integration tests
//!
//! Drives `McpServer::serve` over an in-memory line stream, the same way a
//! client would over stdio.

use a3s_bridge::provider::memory::{MemoryBackend, Readiness};
use a3s_bridge::{Dispatcher, InitGate, McpServer, ResponseCache};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

fn server(backend: MemoryBackend) -> McpServer {
    let backend = Arc::new(backend);
    let gate = Arc::new(InitGate::new(backend.clone(), Duration::from_millis(300)));
    let dispatcher = Dispatcher::new(backend, Arc::new(ResponseCache::new()), gate);
    McpServer::new(Arc::new(dispatcher))
}

/// Feed newline-separated messages and collect one JSON value per output line
async fn exchange(server: &McpServer, messages: &[Value]) -> Vec<Value> {
    let input: String = messages.iter().map(|m| format!("{}\n", m)).collect();
    let mut output: Vec<u8> = Vec::new();

    server.serve(input.as_bytes(), &mut output).await.unwrap();

    String::from_utf8(output)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

fn request(id: u64, method: &str, params: Value) -> Value {
    json!({ "jsonrpc": "2.0", "id": id, "method": method, "params": params })
}

// ─── Handshake ───────────────────────────────────────────────────

#[tokio::test]
async fn test_initialize_then_list_tools() {
    let server = server(MemoryBackend::feature_flags_demo());
    let responses = exchange(
        &server,
        &[
            request(1, "initialize", json!({ "protocolVersion": "2025-03-26" })),
            json!({ "jsonrpc": "2.0", "method": "notifications/initialized" }),
            request(2, "tools/list", json!({})),
        ],
    )
    .await;

    // The notification produces no line
    assert_eq!(responses.len(), 2);

    let init = &responses[0];
    assert_eq!(init["id"], 1);
    assert_eq!(init["result"]["protocolVersion"], "2025-03-26");
    assert!(init["result"]["capabilities"]["tools"].is_object());
    assert!(init["result"]["capabilities"].get("prompts").is_none());

    let tools = responses[1]["result"]["tools"].as_array().unwrap();
    let names: Vec<&str> = tools.iter().map(|t| t["name"].as_str().unwrap()).collect();
    assert_eq!(
        names,
        ["evaluate-flag", "get-flag", "list-flags", "get-segment", "list-segments"]
    );
    assert_eq!(tools[0]["inputSchema"]["type"], "object");
}

#[tokio::test]
async fn test_blank_lines_are_skipped() {
    let server = server(MemoryBackend::feature_flags_demo());
    let mut output: Vec<u8> = Vec::new();
    let input = format!("\n   \n{}\n\n", request(7, "ping", Value::Null));

    server.serve(input.as_bytes(), &mut output).await.unwrap();

    let text = String::from_utf8(output).unwrap();
    assert_eq!(text.lines().count(), 1);
    let response: Value = serde_json::from_str(text.trim()).unwrap();
    assert_eq!(response["id"], 7);
}

#[tokio::test]
async fn test_ping_over_mock_stream() {
    let server = server(MemoryBackend::feature_flags_demo());
    let reader = tokio::io::BufReader::new(
        tokio_test::io::Builder::new()
            .read(b"{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"ping\"}\n")
            .build(),
    );
    let writer = tokio_test::io::Builder::new()
        .write(b"{\"jsonrpc\":\"2.0\",\"id\":1,\"result\":{}}\n")
        .build();

    server.serve(reader, writer).await.unwrap();
}

// ─── Tool calls ──────────────────────────────────────────────────

#[tokio::test]
async fn test_tool_call_success_and_error_in_order() {
    let server = server(MemoryBackend::feature_flags_demo());
    let responses = exchange(
        &server,
        &[
            request(
                1,
                "tools/call",
                json!({ "name": "get-flag", "arguments": { "flag_key": "checkout-v2" } }),
            ),
            request(
                2,
                "tools/call",
                json!({ "name": "get-flag", "arguments": { "flag_key": "nope" } }),
            ),
            request(3, "tools/call", json!({ "name": "get-flag" })),
        ],
    )
    .await;

    assert_eq!(responses.len(), 3);

    let ok = &responses[0];
    assert_eq!(ok["id"], 1);
    assert_eq!(ok["result"]["content"][0]["type"], "text");
    assert!(ok.get("error").is_none());
    assert!(ok["result"].get("isError").is_none());
    assert!(ok["result"]["content"][0]["text"]
        .as_str()
        .unwrap()
        .contains("checkout-v2"));

    let not_found = &responses[1];
    assert_eq!(not_found["id"], 2);
    assert!(not_found.get("result").is_none());
    assert_eq!(not_found["error"]["code"], 404);
    assert_eq!(not_found["error"]["data"]["kind"], "NotFoundError");

    let missing = &responses[2];
    assert_eq!(missing["error"]["code"], -32602);
    assert!(missing["error"]["message"]
        .as_str()
        .unwrap()
        .contains("flag_key"));
}

#[tokio::test]
async fn test_unknown_method_and_garbage() {
    let server = server(MemoryBackend::feature_flags_demo());
    let mut output: Vec<u8> = Vec::new();
    let input = format!("{}\nnot json\n", request(1, "resources/list", json!({})));

    server.serve(input.as_bytes(), &mut output).await.unwrap();

    let responses: Vec<Value> = String::from_utf8(output)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(responses[0]["error"]["code"], -32601);
    assert_eq!(responses[1]["error"]["code"], -32700);
    assert!(responses[1]["id"].is_null());
}

#[tokio::test(start_paused = true)]
async fn test_unready_backend_reports_init_timeout() {
    let server = server(MemoryBackend::feature_flags_demo().with_readiness(Readiness::Never));
    let responses = exchange(
        &server,
        &[request(1, "tools/call", json!({ "name": "list-flags", "arguments": {} }))],
    )
    .await;

    assert_eq!(responses[0]["error"]["data"]["kind"], "InitTimeoutError");
}

// ─── Prompts ─────────────────────────────────────────────────────

#[tokio::test]
async fn test_issue_prompt() {
    let server = server(MemoryBackend::issue_tracking_demo());
    let responses = exchange(
        &server,
        &[
            request(1, "initialize", json!({})),
            request(2, "prompts/list", json!({})),
            request(
                3,
                "prompts/get",
                json!({
                    "name": "sentry-issue",
                    "arguments": { "issue_id_or_url": "https://acme.sentry.io/issues/12345/" }
                }),
            ),
        ],
    )
    .await;

    assert_eq!(responses[0]["result"]["protocolVersion"], "2024-11-05");
    assert!(responses[0]["result"]["capabilities"]["prompts"].is_object());

    let prompts = responses[1]["result"]["prompts"].as_array().unwrap();
    assert_eq!(prompts.len(), 1);
    assert_eq!(prompts[0]["name"], "sentry-issue");

    let prompt = &responses[2]["result"];
    assert_eq!(
        prompt["description"],
        "Sentry Issue: ZeroDivisionError: division by zero"
    );
    assert_eq!(prompt["messages"][0]["role"], "user");
    let text = prompt["messages"][0]["content"]["text"].as_str().unwrap();
    assert!(text.contains("Stacktrace:"));
    assert!(text.contains("app/math.py:42 in divide"));
}

#[tokio::test]
async fn test_issue_prompt_rejects_bad_identifier() {
    let server = server(MemoryBackend::issue_tracking_demo());
    let responses = exchange(
        &server,
        &[request(
            1,
            "prompts/get",
            json!({ "name": "sentry-issue", "arguments": { "issue_id_or_url": "not-an-id" } }),
        )],
    )
    .await;

    assert_eq!(responses[0]["error"]["data"]["kind"], "ValidationError");
}
