//! SQL execution tools

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::{Value, json};

use super::args::{non_empty, object_schema, parse};
use super::{Tool, ToolContext};
use crate::client::{StatementParameter, StatementRequest, StatementResponse, run_statement};
use crate::error::{DatabricksMcpError, Result};
use crate::sql::add_limit_if_needed;

fn validate(ctx: &ToolContext, statement: &str) -> Result<()> {
    match &ctx.settings().validator {
        Some(validator) => validator
            .check(statement)
            .map_err(DatabricksMcpError::QueryRejected),
        None => Ok(()),
    }
}

fn warehouse(ctx: &ToolContext, requested: Option<String>) -> Result<String> {
    requested
        .filter(|w| !w.trim().is_empty())
        .or_else(|| ctx.settings().default_warehouse_id.clone())
        .ok_or_else(|| {
            DatabricksMcpError::InvalidInput(
                "warehouse_id is required (no DATABRICKS_SQL_WAREHOUSE_ID configured)".to_string(),
            )
        })
}

/// Run a statement to completion and fail on any non-success terminal state
fn execute(ctx: &ToolContext, request: StatementRequest) -> Result<StatementResponse> {
    let policy = ctx.settings().poll;
    let response = ctx.remote(move |api| async move { run_statement(api.as_ref(), &request, policy).await })?;
    response.into_succeeded()
}

fn result_payload(response: &StatementResponse) -> Value {
    json!({
        "status": "success",
        "statement_id": response.statement_id,
        "state": response.state().as_str(),
        "row_count": response.row_count(),
        "columns": response.column_names(),
        "data": response.rows(),
    })
}

#[derive(Debug, Deserialize)]
struct ExecuteQueryArgs {
    query: String,
    #[serde(default)]
    warehouse_id: Option<String>,
    #[serde(default)]
    limit: Option<u64>,
}

/// Run a validated read-only query with a row limit
pub struct ExecuteQueryTool;

impl Tool for ExecuteQueryTool {
    fn name(&self) -> &'static str {
        "execute_query"
    }

    fn description(&self) -> &'static str {
        "Execute a read-only SQL query on a SQL warehouse. SELECT queries without a LIMIT get one added."
    }

    fn input_schema(&self) -> Value {
        object_schema(
            json!({
                "query": { "type": "string", "description": "SQL query to execute" },
                "warehouse_id": { "type": "string", "description": "SQL warehouse ID (defaults to the configured warehouse)" },
                "limit": { "type": "integer", "minimum": 1, "description": "Row limit added to SELECT queries without one (default 100)" }
            }),
            &["query"],
        )
    }

    fn call(&self, input: Value, ctx: &ToolContext) -> Result<Value> {
        let args: ExecuteQueryArgs = parse(input)?;
        let query = non_empty("query", &args.query)?;
        validate(ctx, query)?;

        let settings = ctx.settings();
        let limit = args
            .limit
            .unwrap_or(settings.default_row_limit as u64)
            .min(settings.max_results as u64)
            .max(1);
        let processed = add_limit_if_needed(query, limit);
        let warehouse_id = warehouse(ctx, args.warehouse_id)?;

        let request =
            StatementRequest::new(warehouse_id, processed.clone()).with_wait_timeout(settings.statement_wait_secs);
        let response = execute(ctx, request)?;

        let mut payload = result_payload(&response);
        payload["query_executed"] = json!(processed);
        Ok(payload)
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ParameterArgs {
    Named(BTreeMap<String, Value>),
    Listed(Vec<StatementParameter>),
}

impl ParameterArgs {
    fn into_parameters(self) -> Vec<StatementParameter> {
        match self {
            Self::Listed(list) => list,
            Self::Named(map) => map
                .into_iter()
                .map(|(name, value)| StatementParameter {
                    name,
                    value: match value {
                        Value::Null => None,
                        Value::String(s) => Some(s),
                        other => Some(other.to_string()),
                    },
                    param_type: None,
                })
                .collect(),
        }
    }
}

fn default_wait_timeout() -> u64 {
    30
}

#[derive(Debug, Deserialize)]
struct ExecuteStatementArgs {
    statement: String,
    #[serde(default)]
    warehouse_id: Option<String>,
    #[serde(default)]
    catalog: Option<String>,
    #[serde(default)]
    schema: Option<String>,
    #[serde(default)]
    parameters: Option<ParameterArgs>,
    #[serde(default = "default_wait_timeout")]
    wait_timeout: u64,
    #[serde(default)]
    row_limit: Option<u64>,
}

/// Run a validated statement with catalog/schema context and parameters
pub struct ExecuteStatementTool;

impl Tool for ExecuteStatementTool {
    fn name(&self) -> &'static str {
        "execute_statement"
    }

    fn description(&self) -> &'static str {
        "Execute a SQL statement with catalog/schema context, named parameters (:name markers) and a wait timeout."
    }

    fn input_schema(&self) -> Value {
        object_schema(
            json!({
                "statement": { "type": "string", "description": "SQL statement" },
                "warehouse_id": { "type": "string", "description": "SQL warehouse ID (defaults to the configured warehouse)" },
                "catalog": { "type": "string", "description": "Default catalog for unqualified names" },
                "schema": { "type": "string", "description": "Default schema for unqualified names" },
                "parameters": {
                    "description": "Named parameters, as {name: value} or [{name, value, type}]",
                    "oneOf": [
                        { "type": "object" },
                        { "type": "array", "items": { "type": "object" } }
                    ]
                },
                "wait_timeout": { "type": "integer", "description": "Seconds to wait synchronously (5-50, default 30)" },
                "row_limit": { "type": "integer", "minimum": 1, "description": "Maximum rows to return" }
            }),
            &["statement"],
        )
    }

    fn call(&self, input: Value, ctx: &ToolContext) -> Result<Value> {
        let args: ExecuteStatementArgs = parse(input)?;
        let statement = non_empty("statement", &args.statement)?;
        validate(ctx, statement)?;
        let warehouse_id = warehouse(ctx, args.warehouse_id)?;
        let row_limit = args
            .row_limit
            .map(|l| l.min(ctx.settings().max_results as u64).max(1));

        let request = StatementRequest::new(warehouse_id, statement)
            .with_wait_timeout(args.wait_timeout)
            .with_catalog(args.catalog)
            .with_schema(args.schema)
            .with_parameters(args.parameters.map(ParameterArgs::into_parameters).unwrap_or_default())
            .with_row_limit(row_limit);
        let response = execute(ctx, request)?;

        Ok(result_payload(&response))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MockWorkspace;
    use crate::tools::ToolSettings;
    use std::sync::Arc;

    fn settings() -> ToolSettings {
        ToolSettings {
            default_warehouse_id: Some("wh-default".to_string()),
            ..ToolSettings::default()
        }
    }

    fn ctx_with(mock: Arc<MockWorkspace>, settings: ToolSettings) -> ToolContext {
        ToolContext::with_client(mock, settings)
    }

    #[test]
    fn test_execute_query_adds_limit() {
        let mock = Arc::new(MockWorkspace::sample());
        let ctx = ctx_with(mock.clone(), settings());

        let out = ExecuteQueryTool
            .call(json!({ "query": "SELECT * FROM main.default.customers", "limit": 2 }), &ctx)
            .unwrap();
        assert_eq!(out["status"], "success");
        assert_eq!(out["row_count"], 2);
        assert_eq!(out["columns"], json!(["id", "name"]));
        assert_eq!(out["query_executed"], "SELECT * FROM main.default.customers LIMIT 2");

        let submitted = mock.submitted_statements();
        assert_eq!(submitted[0].warehouse_id, "wh-default");
        assert_eq!(submitted[0].wait_timeout, "30s");
    }

    #[test]
    fn test_execute_query_default_limit_and_cap() {
        let mock = Arc::new(MockWorkspace::sample());
        let ctx = ctx_with(mock.clone(), settings());

        ExecuteQueryTool.call(json!({ "query": "SELECT 1" }), &ctx).unwrap();
        ExecuteQueryTool
            .call(json!({ "query": "SELECT 2", "limit": 999999 }), &ctx)
            .unwrap();

        let submitted = mock.submitted_statements();
        assert_eq!(submitted[0].statement, "SELECT 1 LIMIT 100");
        assert_eq!(submitted[1].statement, "SELECT 2 LIMIT 1000");
    }

    #[test]
    fn test_zero_row_caps_fall_back_to_one() {
        let mock = Arc::new(MockWorkspace::sample());
        let ctx = ctx_with(
            mock.clone(),
            ToolSettings {
                max_results: 0,
                ..settings()
            },
        );

        ExecuteQueryTool.call(json!({ "query": "SELECT 1", "limit": 0 }), &ctx).unwrap();
        ExecuteStatementTool
            .call(json!({ "statement": "SELECT 2", "row_limit": 0 }), &ctx)
            .unwrap();

        let submitted = mock.submitted_statements();
        assert_eq!(submitted[0].statement, "SELECT 1 LIMIT 1");
        assert_eq!(submitted[1].row_limit, Some(1));
    }

    #[test]
    fn test_execute_query_rejects_writes_without_remote_call() {
        let mock = Arc::new(MockWorkspace::sample());
        let ctx = ctx_with(mock.clone(), settings());

        let err = ExecuteQueryTool
            .call(json!({ "query": "DROP TABLE main.default.customers" }), &ctx)
            .unwrap_err();
        assert_eq!(err.kind(), "query_rejected");
        assert_eq!(mock.call_count(), 0);
    }

    #[test]
    fn test_execute_query_requires_warehouse() {
        let ctx = ctx_with(Arc::new(MockWorkspace::sample()), ToolSettings::default());
        let err = ExecuteQueryTool.call(json!({ "query": "SELECT 1" }), &ctx).unwrap_err();
        assert_eq!(err.kind(), "invalid_input");
        assert!(err.to_string().contains("warehouse_id"));
    }

    #[test]
    fn test_execute_query_remote_failure_passes_through() {
        let mock = Arc::new(MockWorkspace::sample());
        let mut settings = settings();
        settings.validator = None;
        let ctx = ctx_with(mock, settings);

        let err = ExecuteQueryTool.call(json!({ "query": "SELEC oops" }), &ctx).unwrap_err();
        match err {
            DatabricksMcpError::RemoteValidation { error_code, message } => {
                assert_eq!(error_code, "BAD_REQUEST");
                assert!(message.contains("PARSE_SYNTAX_ERROR"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_execute_statement_with_parameters() {
        let mock = Arc::new(MockWorkspace::sample());
        let ctx = ctx_with(mock.clone(), settings());

        let out = ExecuteStatementTool
            .call(
                json!({
                    "statement": "SELECT * FROM customers WHERE id = :id",
                    "warehouse_id": "wh-explicit",
                    "catalog": "main",
                    "schema": "default",
                    "parameters": { "id": 1 },
                    "wait_timeout": 120
                }),
                &ctx,
            )
            .unwrap();
        assert_eq!(out["status"], "success");
        assert_eq!(out["state"], "SUCCEEDED");

        let request = &mock.submitted_statements()[0];
        assert_eq!(request.warehouse_id, "wh-explicit");
        assert_eq!(request.catalog.as_deref(), Some("main"));
        assert_eq!(request.wait_timeout, "50s");
        assert_eq!(request.parameters[0].name, "id");
        assert_eq!(request.parameters[0].value.as_deref(), Some("1"));
    }

    #[test]
    fn test_execute_statement_listed_parameters() {
        let mock = Arc::new(MockWorkspace::sample());
        let ctx = ctx_with(mock.clone(), settings());

        ExecuteStatementTool
            .call(
                json!({
                    "statement": "SELECT :d",
                    "parameters": [{ "name": "d", "value": "2024-01-01", "type": "DATE" }]
                }),
                &ctx,
            )
            .unwrap();
        let request = &mock.submitted_statements()[0];
        assert_eq!(request.parameters[0].param_type.as_deref(), Some("DATE"));
    }

    #[test]
    fn test_execute_statement_validated() {
        let ctx = ctx_with(Arc::new(MockWorkspace::sample()), settings());
        let err = ExecuteStatementTool
            .call(json!({ "statement": "DELETE FROM t" }), &ctx)
            .unwrap_err();
        assert_eq!(err.kind(), "query_rejected");
    }

    #[test]
    fn test_execute_query_polls_pending_statement() {
        let mock = Arc::new(MockWorkspace::sample().with_pending_polls(2));
        let mut settings = settings();
        settings.poll.interval = std::time::Duration::from_millis(5);
        let ctx = ctx_with(mock.clone(), settings);

        let out = ExecuteQueryTool.call(json!({ "query": "SELECT 1" }), &ctx).unwrap();
        assert_eq!(out["status"], "success");
        assert_eq!(mock.statement_polls(), 2);
    }
}
