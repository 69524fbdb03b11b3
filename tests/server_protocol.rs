//! Protocol session over in-memory streams
//!
//! Drives the server the way an agent would: one JSON-RPC message per line.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use databricks_mcp::client::MockWorkspace;
use databricks_mcp::server::{JsonRpcResponse, McpServer};
use databricks_mcp::tools::{ToolContext, ToolRegistry, ToolSettings};
use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

fn server(mock: Arc<MockWorkspace>) -> Arc<McpServer> {
    let mut settings = ToolSettings::default();
    settings.poll.interval = Duration::from_millis(10);
    settings.default_warehouse_id = Some("wh-test".to_string());
    let registry = ToolRegistry::standard(ToolContext::with_client(mock, settings));
    Arc::new(McpServer::new(registry))
}

/// Write all lines, close input, and collect responses keyed by id
async fn session(server: Arc<McpServer>, lines: &[String]) -> HashMap<String, JsonRpcResponse> {
    let (client, server_io) = tokio::io::duplex(256 * 1024);
    let (server_read, server_write) = tokio::io::split(server_io);
    let task = tokio::spawn(server.serve(BufReader::new(server_read), server_write));

    let (client_read, mut client_write) = tokio::io::split(client);
    for line in lines {
        client_write.write_all(line.as_bytes()).await.unwrap();
        client_write.write_all(b"\n").await.unwrap();
    }
    client_write.shutdown().await.unwrap();

    let mut responses = HashMap::new();
    let mut reader = BufReader::new(client_read).lines();
    while let Some(line) = reader.next_line().await.unwrap() {
        let resp: JsonRpcResponse = serde_json::from_str(&line).unwrap();
        responses.insert(resp.id.to_string(), resp);
    }
    task.await.unwrap().unwrap();
    responses
}

fn call(id: u64, name: &str, arguments: Value) -> String {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": "tools/call",
        "params": { "name": name, "arguments": arguments }
    })
    .to_string()
}

fn tool_body(resp: &JsonRpcResponse) -> (bool, Value) {
    let result = resp.result.as_ref().expect("tools/call result");
    let text = result["content"][0]["text"].as_str().unwrap();
    (result["isError"].as_bool().unwrap(), serde_json::from_str(text).unwrap())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_full_session() {
    let mock = Arc::new(MockWorkspace::sample().with_pending_polls(1));
    let lines = vec![
        json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "initialize",
            "params": { "protocolVersion": "2024-11-05" }
        })
        .to_string(),
        json!({ "jsonrpc": "2.0", "method": "notifications/initialized" }).to_string(),
        json!({ "jsonrpc": "2.0", "id": 2, "method": "tools/list" }).to_string(),
        call(3, "execute_statement", json!({
            "statement": "SELECT * FROM main.default.orders WHERE id = :id",
            "parameters": { "id": "7" }
        })),
        call(4, "get_table_info", json!({ "table_name": "main.default.missing" })),
        json!({ "jsonrpc": "2.0", "id": 5, "method": "prompts/list" }).to_string(),
        "this is not json".to_string(),
    ];

    let responses = session(server(mock.clone()), &lines).await;
    // six requests answered, the notification is not
    assert_eq!(responses.len(), 6);

    let init = responses["1"].result.as_ref().unwrap();
    assert_eq!(init["protocolVersion"], "2024-11-05");
    assert_eq!(init["serverInfo"]["name"], "databricks-mcp");

    let tools = responses["2"].result.as_ref().unwrap()["tools"].as_array().unwrap().len();
    assert_eq!(tools, 30);

    let (is_error, body) = tool_body(&responses["3"]);
    assert!(!is_error, "{}", body);
    assert_eq!(body["state"], "SUCCEEDED");
    let submitted = mock.submitted_statements();
    assert_eq!(submitted.len(), 1);
    assert_eq!(submitted[0].warehouse_id, "wh-test");
    assert_eq!(submitted[0].parameters[0].name, "id");

    let (is_error, body) = tool_body(&responses["4"]);
    assert!(is_error);
    assert_eq!(body["kind"], "remote_validation");

    assert_eq!(responses["5"].error.as_ref().unwrap().code, -32601);
    assert_eq!(responses["null"].error.as_ref().unwrap().code, -32700);
}

#[tokio::test]
async fn test_session_on_current_thread_runtime() {
    let mock = Arc::new(MockWorkspace::sample());
    let lines: Vec<String> = (1..=5)
        .map(|id| call(id, "list_files", json!({ "path": "/FileStore" })))
        .collect();

    let responses = session(server(mock.clone()), &lines).await;
    assert_eq!(responses.len(), 5);
    for resp in responses.values() {
        let (is_error, body) = tool_body(resp);
        assert!(!is_error, "{}", body);
        assert_eq!(body["count"], 1);
    }
    assert_eq!(mock.call_count(), 5);
}

#[tokio::test]
async fn test_empty_input_ends_cleanly() {
    let responses = session(server(Arc::new(MockWorkspace::empty())), &[]).await;
    assert!(responses.is_empty());
}
