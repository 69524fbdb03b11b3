//! Tool registry - manages tool registration and invocation

use std::collections::BTreeMap;
use std::time::Instant;

use serde_json::Value;

use super::*;

/// Name-keyed set of tools plus the context they run with
pub struct ToolRegistry {
    tools: BTreeMap<&'static str, Box<dyn Tool>>,
    ctx: ToolContext,
}

impl ToolRegistry {
    /// Create a registry with every workspace tool
    pub fn standard(ctx: ToolContext) -> Self {
        let mut registry = Self::new(ctx);

        // Catalog browsing
        registry.add_tool(Box::new(ListCatalogsTool));
        registry.add_tool(Box::new(ListSchemasTool));
        registry.add_tool(Box::new(ListTablesTool));
        registry.add_tool(Box::new(GetTableInfoTool));
        registry.add_tool(Box::new(SearchTablesTool));

        // SQL
        registry.add_tool(Box::new(ExecuteQueryTool));
        registry.add_tool(Box::new(ExecuteStatementTool));

        // Clusters
        registry.add_tool(Box::new(ListClustersTool));
        registry.add_tool(Box::new(GetClusterTool));
        registry.add_tool(Box::new(CreateClusterTool));
        registry.add_tool(Box::new(StartClusterTool));
        registry.add_tool(Box::new(TerminateClusterTool));
        registry.add_tool(Box::new(RestartClusterTool));
        registry.add_tool(Box::new(ResizeClusterTool));

        // Jobs
        registry.add_tool(Box::new(ListJobsTool));
        registry.add_tool(Box::new(GetJobTool));
        registry.add_tool(Box::new(CreateJobTool));
        registry.add_tool(Box::new(RunJobTool));
        registry.add_tool(Box::new(UpdateJobTool));
        registry.add_tool(Box::new(DeleteJobTool));

        // Notebooks
        registry.add_tool(Box::new(ListNotebooksTool));
        registry.add_tool(Box::new(GetNotebookTool));
        registry.add_tool(Box::new(ExportNotebookTool));
        registry.add_tool(Box::new(ImportNotebookTool));
        registry.add_tool(Box::new(DeleteNotebookTool));

        // DBFS
        registry.add_tool(Box::new(ListFilesTool));
        registry.add_tool(Box::new(GetFileInfoTool));
        registry.add_tool(Box::new(ReadFileTool));
        registry.add_tool(Box::new(PutFileTool));
        registry.add_tool(Box::new(DeleteFileTool));

        registry
    }

    /// Create an empty registry (for custom tool sets)
    pub fn new(ctx: ToolContext) -> Self {
        Self {
            tools: BTreeMap::new(),
            ctx,
        }
    }

    /// Add a tool, replacing any tool with the same name
    pub fn add_tool(&mut self, tool: Box<dyn Tool>) {
        self.tools.insert(tool.name(), tool);
    }

    /// Tool definitions, sorted by name
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools
            .values()
            .map(|t| ToolDefinition {
                name: t.name().to_string(),
                description: t.description().to_string(),
                input_schema: t.input_schema(),
            })
            .collect()
    }

    /// Invoke a tool by name. Blocks until the tool finishes; every failure
    /// is folded into an error payload rather than returned.
    pub fn invoke(&self, name: &str, input: Value) -> ToolOutput {
        let Some(tool) = self.tools.get(name) else {
            log::warn!("Unknown tool requested: {}", name);
            return ToolOutput::from_error(&DatabricksMcpError::Tool(format!("Unknown tool: {}", name)));
        };

        let started = Instant::now();
        let result = tool.call(input, &self.ctx);
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match result {
            Ok(value) => {
                tracing::info!(tool = name, elapsed_ms, "tool call succeeded");
                ToolOutput::from_value(&value)
            }
            Err(e) => {
                tracing::warn!(tool = name, elapsed_ms, kind = e.kind(), error = %e, "tool call failed");
                ToolOutput::from_error(&e)
            }
        }
    }

    /// Check if a tool exists
    pub fn has_tool(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Tool names, sorted
    pub fn names(&self) -> Vec<&'static str> {
        self.tools.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry").field("tools", &self.names()).finish()
    }
}
