//! Tool protocol server
//!
//! JSON-RPC 2.0 over newline-delimited stdio: `initialize`, `ping`,
//! `tools/list` and `tools/call`.

pub mod protocol;
mod stdio;

pub use protocol::{ErrorCode, JsonRpcRequest, JsonRpcResponse, Methods, PROTOCOL_VERSION, RpcError};
pub use stdio::McpServer;
