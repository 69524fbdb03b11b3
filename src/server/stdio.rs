//! Line-oriented tool server
//!
//! Reads one JSON-RPC message per line, handles each on its own task and
//! funnels responses through a single writer task. Tool calls run on the
//! blocking pool, so a slow warehouse query never stalls the read loop.

use std::sync::Arc;

use futures::StreamExt;
use futures::stream::FuturesUnordered;
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;

use super::protocol::{
    JSONRPC_VERSION, JsonRpcRequest, JsonRpcResponse, Methods, RpcError, ToolCallParams, initialize_result,
    tool_call_result, tools_list_result,
};
use crate::error::{DatabricksMcpError, Result};
use crate::tools::ToolRegistry;

/// Tool protocol server over a pair of byte streams
pub struct McpServer {
    registry: Arc<ToolRegistry>,
    name: String,
    version: String,
}

impl McpServer {
    pub fn new(registry: ToolRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
            name: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// Override the name/version reported by `initialize`
    pub fn with_info(mut self, name: impl Into<String>, version: impl Into<String>) -> Self {
        self.name = name.into();
        self.version = version.into();
        self
    }

    /// Serve on the process's stdin/stdout until stdin closes
    pub async fn run_stdio(self: Arc<Self>) -> Result<()> {
        log::info!("Serving {} tools on stdio", self.registry.len());
        self.serve(BufReader::new(tokio::io::stdin()), tokio::io::stdout()).await
    }

    /// Serve until `reader` hits EOF; in-flight calls are drained before returning
    pub async fn serve<R, W>(self: Arc<Self>, reader: R, writer: W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel::<JsonRpcResponse>();
        let writer_task = tokio::spawn(write_responses(writer, rx));

        let mut in_flight = FuturesUnordered::new();
        let mut lines = reader.lines();

        loop {
            tokio::select! {
                line = lines.next_line() => {
                    let Some(line) = line? else { break };
                    if line.trim().is_empty() {
                        continue;
                    }
                    let server = Arc::clone(&self);
                    let tx = tx.clone();
                    in_flight.push(tokio::spawn(async move {
                        if let Some(response) = server.handle_line(&line).await {
                            // Receiver only goes away if the writer failed
                            let _ = tx.send(response);
                        }
                    }));
                }
                Some(joined) = in_flight.next(), if !in_flight.is_empty() => {
                    if let Err(e) = joined {
                        log::error!("Request task failed: {}", e);
                    }
                }
            }
        }

        log::debug!("Input closed, draining {} in-flight requests", in_flight.len());
        while let Some(joined) = in_flight.next().await {
            if let Err(e) = joined {
                log::error!("Request task failed: {}", e);
            }
        }

        drop(tx);
        writer_task
            .await
            .map_err(|e| DatabricksMcpError::Io(std::io::Error::other(e)))??;
        log::info!("Tool server stopped");
        Ok(())
    }

    /// Handle one raw line; `None` for notifications
    pub async fn handle_line(&self, line: &str) -> Option<JsonRpcResponse> {
        let value: Value = match serde_json::from_str(line) {
            Ok(value) => value,
            Err(e) => {
                log::warn!("Unparseable message: {}", e);
                return Some(JsonRpcResponse::error(
                    Value::Null,
                    RpcError::parse_error(format!("Parse error: {}", e)),
                ));
            }
        };

        let id = value.get("id").cloned().unwrap_or(Value::Null);
        match serde_json::from_value::<JsonRpcRequest>(value) {
            Ok(request) => self.handle_request(request).await,
            Err(e) => Some(JsonRpcResponse::error(
                id,
                RpcError::invalid_request(format!("Invalid request: {}", e)),
            )),
        }
    }

    /// Handle a parsed request; `None` for notifications
    pub async fn handle_request(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        let Some(id) = request.id else {
            tracing::debug!(method = %request.method, "notification received");
            return None;
        };

        if request.jsonrpc != JSONRPC_VERSION {
            return Some(JsonRpcResponse::error(
                id,
                RpcError::invalid_request(format!("Unsupported jsonrpc version: {}", request.jsonrpc)),
            ));
        }

        tracing::debug!(method = %request.method, id = %id, "request received");
        let response = match request.method.as_str() {
            Methods::INITIALIZE => JsonRpcResponse::success(id, initialize_result(&self.name, &self.version)),
            Methods::PING => JsonRpcResponse::success(id, Value::Object(Default::default())),
            Methods::TOOLS_LIST => JsonRpcResponse::success(id, tools_list_result(&self.registry.definitions())),
            Methods::TOOLS_CALL => self.call_tool(id, request.params).await,
            other => JsonRpcResponse::error(id, RpcError::method_not_found(other)),
        };
        Some(response)
    }

    async fn call_tool(&self, id: Value, params: Option<Value>) -> JsonRpcResponse {
        let params = match serde_json::from_value::<ToolCallParams>(params.unwrap_or(Value::Null)) {
            Ok(params) => params,
            Err(e) => {
                return JsonRpcResponse::error(id, RpcError::invalid_params(format!("Invalid tool params: {}", e)));
            }
        };
        if !self.registry.has_tool(&params.name) {
            return JsonRpcResponse::error(
                id,
                RpcError::invalid_params(format!("Unknown tool: {}", params.name)),
            );
        }

        let registry = Arc::clone(&self.registry);
        let ToolCallParams { name, arguments } = params;
        match tokio::task::spawn_blocking(move || registry.invoke(&name, arguments)).await {
            Ok(output) => JsonRpcResponse::success(id, tool_call_result(&output)),
            Err(e) => {
                log::error!("Tool task failed: {}", e);
                JsonRpcResponse::error(id, RpcError::internal_error(format!("Tool task failed: {}", e)))
            }
        }
    }
}

impl std::fmt::Debug for McpServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("McpServer")
            .field("name", &self.name)
            .field("version", &self.version)
            .field("tools", &self.registry.len())
            .finish()
    }
}

/// Single writer: one JSON document per line, flushed per response
async fn write_responses<W>(mut writer: W, mut rx: mpsc::UnboundedReceiver<JsonRpcResponse>) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(response) = rx.recv().await {
        let mut line = serde_json::to_vec(&response)?;
        line.push(b'\n');
        writer.write_all(&line).await?;
        writer.flush().await?;
    }
    writer.shutdown().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MockWorkspace;
    use crate::tools::{ToolContext, ToolSettings};
    use serde_json::json;

    fn server() -> McpServer {
        let ctx = ToolContext::with_client(Arc::new(MockWorkspace::sample()), ToolSettings::default());
        McpServer::new(ToolRegistry::standard(ctx)).with_info("test-server", "0.0.1")
    }

    fn request(id: i64, method: &str, params: Value) -> String {
        serde_json::to_string(&JsonRpcRequest::new(id, method, params)).unwrap()
    }

    #[tokio::test]
    async fn test_initialize() {
        let resp = server()
            .handle_line(&request(1, Methods::INITIALIZE, json!({})))
            .await
            .unwrap();
        let result = resp.result.unwrap();
        assert_eq!(result["serverInfo"]["name"], "test-server");
        assert_eq!(result["protocolVersion"], "2024-11-05");
    }

    #[tokio::test]
    async fn test_ping() {
        let resp = server().handle_line(&request(2, Methods::PING, json!({}))).await.unwrap();
        assert_eq!(resp.id, json!(2));
        assert_eq!(resp.result, Some(json!({})));
    }

    #[tokio::test]
    async fn test_tools_list() {
        let resp = server().handle_line(&request(3, Methods::TOOLS_LIST, json!({}))).await.unwrap();
        let tools = resp.result.unwrap()["tools"].as_array().unwrap().clone();
        assert_eq!(tools.len(), 30);
        assert!(tools.iter().all(|t| t["inputSchema"].is_object()));
    }

    #[tokio::test]
    async fn test_notification_gets_no_response() {
        let line = r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#;
        assert!(server().handle_line(line).await.is_none());
    }

    #[tokio::test]
    async fn test_parse_error() {
        let resp = server().handle_line("{not json").await.unwrap();
        assert_eq!(resp.id, Value::Null);
        assert_eq!(resp.error.unwrap().code, -32700);
    }

    #[tokio::test]
    async fn test_invalid_request_keeps_id() {
        let resp = server().handle_line(r#"{"jsonrpc":"2.0","id":9}"#).await.unwrap();
        assert_eq!(resp.id, json!(9));
        assert_eq!(resp.error.unwrap().code, -32600);

        let resp = server()
            .handle_line(r#"{"jsonrpc":"1.0","id":10,"method":"ping"}"#)
            .await
            .unwrap();
        assert_eq!(resp.error.unwrap().code, -32600);
    }

    #[tokio::test]
    async fn test_unknown_method() {
        let resp = server().handle_line(&request(4, "resources/list", json!({}))).await.unwrap();
        let err = resp.error.unwrap();
        assert_eq!(err.code, -32601);
        assert!(err.message.contains("resources/list"));
    }

    #[tokio::test]
    async fn test_tools_call_bad_params() {
        let resp = server()
            .handle_line(&request(5, Methods::TOOLS_CALL, json!({ "arguments": {} })))
            .await
            .unwrap();
        assert_eq!(resp.error.unwrap().code, -32602);

        let resp = server()
            .handle_line(&request(6, Methods::TOOLS_CALL, json!({ "name": "nope" })))
            .await
            .unwrap();
        assert_eq!(resp.error.unwrap().code, -32602);
    }

    #[tokio::test]
    async fn test_tools_call_on_current_thread_runtime() {
        let resp = server()
            .handle_line(&request(7, Methods::TOOLS_CALL, json!({ "name": "list_catalogs" })))
            .await
            .unwrap();
        let result = resp.result.unwrap();
        assert_eq!(result["isError"], false);
        let text = result["content"][0]["text"].as_str().unwrap();
        assert_eq!(serde_json::from_str::<Value>(text).unwrap()["count"], 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_tools_call_tool_error_is_result() {
        let resp = server()
            .handle_line(&request(
                8,
                Methods::TOOLS_CALL,
                json!({ "name": "execute_query", "arguments": { "query": "DROP TABLE t", "warehouse_id": "w" } }),
            ))
            .await
            .unwrap();
        assert!(resp.is_success());
        let result = resp.result.unwrap();
        assert_eq!(result["isError"], true);
        assert!(result["content"][0]["text"].as_str().unwrap().contains("query_rejected"));
    }

    #[tokio::test]
    async fn test_serve_over_duplex() {
        let (client, server_io) = tokio::io::duplex(64 * 1024);
        let (server_read, server_write) = tokio::io::split(server_io);
        let server = Arc::new(server());
        let task = tokio::spawn(server.serve(BufReader::new(server_read), server_write));

        let (client_read, mut client_write) = tokio::io::split(client);
        let input = [
            request(1, Methods::INITIALIZE, json!({})),
            r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#.to_string(),
            request(2, Methods::TOOLS_LIST, json!({})),
            request(3, Methods::TOOLS_CALL, json!({ "name": "list_clusters" })),
        ]
        .join("\n");
        client_write.write_all(input.as_bytes()).await.unwrap();
        client_write.write_all(b"\n").await.unwrap();
        client_write.shutdown().await.unwrap();

        let mut ids = Vec::new();
        let mut lines = BufReader::new(client_read).lines();
        while let Some(line) = lines.next_line().await.unwrap() {
            let resp: JsonRpcResponse = serde_json::from_str(&line).unwrap();
            assert!(resp.is_success(), "{}", line);
            ids.push(resp.id.as_i64().unwrap());
        }
        ids.sort();
        assert_eq!(ids, vec![1, 2, 3]);

        task.await.unwrap().unwrap();
    }
}
