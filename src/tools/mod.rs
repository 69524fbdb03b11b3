//! Tools exposed to the agent
//!
//! Each tool turns JSON arguments into one or more workspace operations.
//! Tools are synchronous: every remote call goes through the dispatcher on
//! the `ToolContext`, so a tool can be invoked from any thread, runtime or not.

mod args;
mod catalog;
mod clusters;
mod context;
mod files;
mod jobs;
mod notebooks;
mod query;
mod registry;

pub use context::{ToolContext, ToolSettings};
pub use registry::ToolRegistry;

pub use catalog::{GetTableInfoTool, ListCatalogsTool, ListSchemasTool, ListTablesTool, SearchTablesTool};
pub use clusters::{
    CreateClusterTool, GetClusterTool, ListClustersTool, ResizeClusterTool, RestartClusterTool, StartClusterTool,
    TerminateClusterTool,
};
pub use files::{DeleteFileTool, GetFileInfoTool, ListFilesTool, PutFileTool, ReadFileTool};
pub use jobs::{CreateJobTool, DeleteJobTool, GetJobTool, ListJobsTool, RunJobTool, UpdateJobTool};
pub use notebooks::{DeleteNotebookTool, ExportNotebookTool, GetNotebookTool, ImportNotebookTool, ListNotebooksTool};
pub use query::{ExecuteQueryTool, ExecuteStatementTool};

use serde::Serialize;
use serde_json::{Value, json};

use crate::error::{DatabricksMcpError, Result};

/// A tool the agent can call
pub trait Tool: Send + Sync {
    /// Tool name (matches the protocol's tool name)
    fn name(&self) -> &'static str;

    /// Human-readable description
    fn description(&self) -> &'static str;

    /// JSON Schema for input parameters
    fn input_schema(&self) -> Value;

    /// Run the tool to completion, blocking the calling thread
    fn call(&self, input: Value, ctx: &ToolContext) -> Result<Value>;
}

/// Text handed back to the agent
#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutput {
    pub text: String,
    pub is_error: bool,
}

impl ToolOutput {
    pub fn success(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_error: false,
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_error: true,
        }
    }

    /// Pretty-printed JSON success payload
    pub fn from_value(value: &Value) -> Self {
        match serde_json::to_string_pretty(value) {
            Ok(text) => Self::success(text),
            Err(e) => Self::from_error(&e.into()),
        }
    }

    /// `{"status": "error", "error": ..., "kind": ...}`
    pub fn from_error(err: &DatabricksMcpError) -> Self {
        let payload = json!({
            "status": "error",
            "error": err.to_string(),
            "kind": err.kind(),
        });
        Self::error(serde_json::to_string_pretty(&payload).unwrap_or_else(|_| payload.to_string()))
    }
}

/// Tool definition as advertised to the agent
#[derive(Debug, Clone, Serialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}
