//! Wire types for the workspace REST API
//!
//! Only the fields the tools surface are modelled; everything else the
//! API returns is ignored on deserialization.

use std::collections::BTreeMap;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{DatabricksMcpError, Result};

/// Statement wait window accepted by the remote (seconds)
pub const MIN_WAIT_TIMEOUT_SECS: u64 = 5;
pub const MAX_WAIT_TIMEOUT_SECS: u64 = 50;

// ---------------------------------------------------------------------------
// Unity Catalog
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogInfo {
    pub name: String,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub metastore_id: Option<String>,
    #[serde(default)]
    pub owner: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaInfo {
    pub name: String,
    pub catalog_name: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub owner: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    #[serde(default)]
    pub type_name: Option<String>,
    #[serde(default)]
    pub type_text: Option<String>,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub nullable: Option<bool>,
    #[serde(default)]
    pub position: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableInfo {
    pub name: String,
    pub catalog_name: String,
    pub schema_name: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub table_type: Option<String>,
    #[serde(default)]
    pub data_source_format: Option<String>,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub storage_location: Option<String>,
    #[serde(default)]
    pub columns: Vec<ColumnInfo>,
}

impl TableInfo {
    /// `catalog.schema.table`, falling back to assembling it from parts
    pub fn qualified_name(&self) -> String {
        self.full_name
            .clone()
            .unwrap_or_else(|| format!("{}.{}.{}", self.catalog_name, self.schema_name, self.name))
    }
}

// ---------------------------------------------------------------------------
// SQL statement execution
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatementState {
    Pending,
    Running,
    Succeeded,
    Failed,
    Canceled,
    Closed,
}

impl StatementState {
    /// Still executing remotely
    pub fn is_in_progress(&self) -> bool {
        matches!(self, Self::Pending | Self::Running)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Running => "RUNNING",
            Self::Succeeded => "SUCCEEDED",
            Self::Failed => "FAILED",
            Self::Canceled => "CANCELED",
            Self::Closed => "CLOSED",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatementParameter {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub param_type: Option<String>,
}

/// Body of `POST /api/2.0/sql/statements`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatementRequest {
    pub warehouse_id: String,
    pub statement: String,
    pub wait_timeout: String,
    pub on_wait_timeout: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub catalog: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<StatementParameter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row_limit: Option<u64>,
}

impl StatementRequest {
    pub fn new(warehouse_id: impl Into<String>, statement: impl Into<String>) -> Self {
        Self {
            warehouse_id: warehouse_id.into(),
            statement: statement.into(),
            wait_timeout: format!("{}s", 30),
            on_wait_timeout: "CONTINUE".to_string(),
            catalog: None,
            schema: None,
            parameters: Vec::new(),
            row_limit: None,
        }
    }

    /// Set the synchronous wait window; 0 means fully async, anything else
    /// is clamped to what the remote accepts.
    pub fn with_wait_timeout(mut self, secs: u64) -> Self {
        let secs = if secs == 0 {
            0
        } else {
            secs.clamp(MIN_WAIT_TIMEOUT_SECS, MAX_WAIT_TIMEOUT_SECS)
        };
        self.wait_timeout = format!("{}s", secs);
        self
    }

    pub fn with_catalog(mut self, catalog: Option<String>) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn with_schema(mut self, schema: Option<String>) -> Self {
        self.schema = schema;
        self
    }

    pub fn with_parameters(mut self, parameters: Vec<StatementParameter>) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn with_row_limit(mut self, limit: Option<u64>) -> Self {
        self.row_limit = limit;
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceError {
    #[serde(default)]
    pub error_code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatementStatus {
    pub state: StatementState,
    #[serde(default)]
    pub error: Option<ServiceError>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultColumn {
    pub name: String,
    #[serde(default)]
    pub type_name: Option<String>,
    #[serde(default)]
    pub position: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultSchema {
    #[serde(default)]
    pub columns: Vec<ResultColumn>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultManifest {
    #[serde(default)]
    pub schema: Option<ResultSchema>,
    #[serde(default)]
    pub total_row_count: Option<u64>,
    #[serde(default)]
    pub truncated: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatementResult {
    #[serde(default)]
    pub data_array: Vec<Vec<Option<String>>>,
    #[serde(default)]
    pub row_count: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatementResponse {
    pub statement_id: String,
    pub status: StatementStatus,
    #[serde(default)]
    pub manifest: Option<ResultManifest>,
    #[serde(default)]
    pub result: Option<StatementResult>,
}

impl StatementResponse {
    pub fn state(&self) -> StatementState {
        self.status.state
    }

    /// Succeeded statements pass through; anything else terminal becomes
    /// a remote validation error carrying the remote's code and message.
    pub fn into_succeeded(self) -> Result<Self> {
        match self.status.state {
            StatementState::Succeeded => Ok(self),
            state => {
                let error = self.status.error.unwrap_or_default();
                Err(DatabricksMcpError::RemoteValidation {
                    error_code: error.error_code.unwrap_or_else(|| state.as_str().to_string()),
                    message: error
                        .message
                        .unwrap_or_else(|| {
                            format!("Statement {} ended in state {}", self.statement_id, state.as_str())
                        }),
                })
            }
        }
    }

    pub fn rows(&self) -> &[Vec<Option<String>>] {
        self.result.as_ref().map(|r| r.data_array.as_slice()).unwrap_or(&[])
    }

    pub fn row_count(&self) -> u64 {
        self.result
            .as_ref()
            .and_then(|r| r.row_count)
            .or_else(|| self.manifest.as_ref().and_then(|m| m.total_row_count))
            .unwrap_or(self.rows().len() as u64)
    }

    pub fn column_names(&self) -> Vec<String> {
        self.manifest
            .as_ref()
            .and_then(|m| m.schema.as_ref())
            .map(|s| s.columns.iter().map(|c| c.name.clone()).collect())
            .unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// Clusters
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoScale {
    pub min_workers: u32,
    pub max_workers: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterInfo {
    pub cluster_id: String,
    #[serde(default)]
    pub cluster_name: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub state_message: Option<String>,
    #[serde(default)]
    pub spark_version: Option<String>,
    #[serde(default)]
    pub node_type_id: Option<String>,
    #[serde(default)]
    pub driver_node_type_id: Option<String>,
    #[serde(default)]
    pub num_workers: Option<u32>,
    #[serde(default)]
    pub autoscale: Option<AutoScale>,
    #[serde(default)]
    pub autotermination_minutes: Option<u32>,
    #[serde(default)]
    pub creator_user_name: Option<String>,
    #[serde(default)]
    pub driver: Option<Value>,
    #[serde(default)]
    pub executors: Vec<Value>,
}

/// Worker sizing for create/resize
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClusterSize {
    Fixed(u32),
    Autoscale(AutoScale),
}

impl ClusterSize {
    /// Build from optional tool arguments: a fixed count wins, otherwise
    /// both autoscale bounds must be present together.
    pub fn from_parts(num_workers: Option<u32>, min: Option<u32>, max: Option<u32>) -> Result<Option<Self>> {
        match (num_workers, min, max) {
            (Some(n), _, _) => Ok(Some(Self::Fixed(n))),
            (None, Some(min_workers), Some(max_workers)) => {
                if min_workers > max_workers {
                    return Err(DatabricksMcpError::InvalidInput(format!(
                        "autoscale_min_workers ({}) exceeds autoscale_max_workers ({})",
                        min_workers, max_workers
                    )));
                }
                Ok(Some(Self::Autoscale(AutoScale { min_workers, max_workers })))
            }
            (None, None, None) => Ok(None),
            _ => Err(DatabricksMcpError::InvalidInput(
                "autoscale_min_workers and autoscale_max_workers must be given together".to_string(),
            )),
        }
    }

    /// Fields merged into create/resize request bodies
    pub fn to_fields(&self) -> Value {
        match self {
            Self::Fixed(n) => serde_json::json!({ "num_workers": n }),
            Self::Autoscale(a) => serde_json::json!({ "autoscale": a }),
        }
    }
}

/// Body of `POST /api/2.0/clusters/create`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterSpec {
    pub cluster_name: String,
    pub spark_version: String,
    pub node_type_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_workers: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub autoscale: Option<AutoScale>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub autotermination_minutes: Option<u32>,
}

impl ClusterSpec {
    pub fn new(
        cluster_name: impl Into<String>,
        spark_version: impl Into<String>,
        node_type_id: impl Into<String>,
    ) -> Self {
        Self {
            cluster_name: cluster_name.into(),
            spark_version: spark_version.into(),
            node_type_id: node_type_id.into(),
            num_workers: None,
            autoscale: None,
            autotermination_minutes: None,
        }
    }

    pub fn with_size(mut self, size: Option<ClusterSize>) -> Self {
        match size {
            Some(ClusterSize::Fixed(n)) => self.num_workers = Some(n),
            Some(ClusterSize::Autoscale(a)) => self.autoscale = Some(a),
            None => {}
        }
        self
    }

    pub fn with_autotermination(mut self, minutes: Option<u32>) -> Self {
        self.autotermination_minutes = minutes;
        self
    }
}

// ---------------------------------------------------------------------------
// Jobs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub job_id: i64,
    #[serde(default)]
    pub settings: Option<Value>,
    #[serde(default)]
    pub created_time: Option<i64>,
    #[serde(default)]
    pub creator_user_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobList {
    #[serde(default)]
    pub jobs: Vec<Job>,
    #[serde(default)]
    pub has_more: bool,
}

/// Overrides for `POST /api/2.1/jobs/run-now`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunParameters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jar_params: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notebook_params: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub python_params: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spark_submit_params: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunNowResponse {
    pub run_id: i64,
    #[serde(default)]
    pub number_in_job: Option<i64>,
}

// ---------------------------------------------------------------------------
// Workspace objects (notebooks)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectInfo {
    pub path: String,
    #[serde(default)]
    pub object_type: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub object_id: Option<i64>,
    #[serde(default)]
    pub created_at: Option<i64>,
    #[serde(default)]
    pub modified_at: Option<i64>,
    #[serde(default)]
    pub size: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExportFormat {
    #[default]
    Source,
    Html,
    Jupyter,
    Dbc,
    RMarkdown,
    Auto,
}

impl ExportFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Source => "SOURCE",
            Self::Html => "HTML",
            Self::Jupyter => "JUPYTER",
            Self::Dbc => "DBC",
            Self::RMarkdown => "R_MARKDOWN",
            Self::Auto => "AUTO",
        }
    }

    /// DBC archives are binary; everything else exports as text
    pub fn is_textual(&self) -> bool {
        !matches!(self, Self::Dbc)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotebookLanguage {
    Python,
    Sql,
    Scala,
    R,
}

/// Exported notebook; `content` is base64 as sent by the remote
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportedNotebook {
    pub content: String,
    #[serde(default)]
    pub file_type: Option<String>,
}

impl ExportedNotebook {
    pub fn decoded(&self) -> Result<Vec<u8>> {
        BASE64
            .decode(self.content.as_bytes())
            .map_err(|e| DatabricksMcpError::RemoteApi {
                status: 200,
                message: format!("Export content is not valid base64: {}", e),
            })
    }
}

/// Notebook import; `content` is raw text, encoded by the client
#[derive(Debug, Clone, PartialEq)]
pub struct NotebookImport {
    pub path: String,
    pub format: ExportFormat,
    pub language: Option<NotebookLanguage>,
    pub content: String,
    pub overwrite: bool,
}

// ---------------------------------------------------------------------------
// DBFS
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileInfo {
    pub path: String,
    #[serde(default)]
    pub is_dir: bool,
    #[serde(default)]
    pub file_size: i64,
    #[serde(default)]
    pub modification_time: Option<i64>,
}

/// A decoded block read from DBFS
#[derive(Debug, Clone, PartialEq)]
pub struct FileChunk {
    pub bytes_read: u64,
    pub data: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_wait_timeout_clamped() {
        assert_eq!(StatementRequest::new("w", "SELECT 1").with_wait_timeout(1).wait_timeout, "5s");
        assert_eq!(StatementRequest::new("w", "SELECT 1").with_wait_timeout(300).wait_timeout, "50s");
        assert_eq!(StatementRequest::new("w", "SELECT 1").with_wait_timeout(20).wait_timeout, "20s");
        assert_eq!(StatementRequest::new("w", "SELECT 1").with_wait_timeout(0).wait_timeout, "0s");
    }

    #[test]
    fn test_statement_request_skips_empty_fields() {
        let body = serde_json::to_value(StatementRequest::new("abc123", "SELECT 1")).unwrap();
        assert_eq!(body["warehouse_id"], "abc123");
        assert_eq!(body["on_wait_timeout"], "CONTINUE");
        assert!(body.get("catalog").is_none());
        assert!(body.get("parameters").is_none());
        assert!(body.get("row_limit").is_none());
    }

    #[test]
    fn test_statement_response_success_accessors() {
        let resp: StatementResponse = serde_json::from_value(json!({
            "statement_id": "01ef-aa",
            "status": { "state": "SUCCEEDED" },
            "manifest": {
                "schema": { "columns": [ { "name": "id", "type_name": "INT" }, { "name": "name" } ] },
                "total_row_count": 2
            },
            "result": { "data_array": [["1", "a"], ["2", null]] }
        }))
        .unwrap();

        assert_eq!(resp.state(), StatementState::Succeeded);
        assert_eq!(resp.row_count(), 2);
        assert_eq!(resp.column_names(), vec!["id", "name"]);
        assert_eq!(resp.rows()[1][1], None);
        assert!(resp.into_succeeded().is_ok());
    }

    #[test]
    fn test_statement_failed_becomes_remote_validation() {
        let resp: StatementResponse = serde_json::from_value(json!({
            "statement_id": "01ef-bb",
            "status": {
                "state": "FAILED",
                "error": { "error_code": "BAD_REQUEST", "message": "[PARSE_SYNTAX_ERROR] Syntax error" }
            }
        }))
        .unwrap();

        match resp.into_succeeded() {
            Err(DatabricksMcpError::RemoteValidation { error_code, message }) => {
                assert_eq!(error_code, "BAD_REQUEST");
                assert!(message.contains("PARSE_SYNTAX_ERROR"));
            }
            other => panic!("expected remote validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_statement_canceled_without_error_body() {
        let resp: StatementResponse = serde_json::from_value(json!({
            "statement_id": "01ef-cc",
            "status": { "state": "CANCELED" }
        }))
        .unwrap();
        let err = resp.into_succeeded().unwrap_err();
        assert!(err.to_string().contains("CANCELED"));
    }

    #[test]
    fn test_state_in_progress() {
        assert!(StatementState::Pending.is_in_progress());
        assert!(StatementState::Running.is_in_progress());
        assert!(!StatementState::Succeeded.is_in_progress());
        assert!(!StatementState::Failed.is_in_progress());
    }

    #[test]
    fn test_cluster_size_from_parts() {
        assert_eq!(ClusterSize::from_parts(Some(2), Some(1), Some(4)).unwrap(), Some(ClusterSize::Fixed(2)));
        assert_eq!(
            ClusterSize::from_parts(None, Some(1), Some(4)).unwrap(),
            Some(ClusterSize::Autoscale(AutoScale { min_workers: 1, max_workers: 4 }))
        );
        assert_eq!(ClusterSize::from_parts(None, None, None).unwrap(), None);
        assert!(ClusterSize::from_parts(None, Some(1), None).is_err());
        assert!(ClusterSize::from_parts(None, Some(5), Some(2)).is_err());
    }

    #[test]
    fn test_cluster_spec_serialization() {
        let spec = ClusterSpec::new("etl", "14.3.x-scala2.12", "i3.xlarge")
            .with_size(Some(ClusterSize::Autoscale(AutoScale { min_workers: 1, max_workers: 3 })))
            .with_autotermination(Some(30));
        let body = serde_json::to_value(&spec).unwrap();
        assert_eq!(body["autoscale"]["max_workers"], 3);
        assert_eq!(body["autotermination_minutes"], 30);
        assert!(body.get("num_workers").is_none());
    }

    #[test]
    fn test_run_parameters_skip_none() {
        let params = RunParameters {
            python_params: Some(vec!["--date".into(), "2024-01-01".into()]),
            ..Default::default()
        };
        let body = serde_json::to_value(&params).unwrap();
        assert_eq!(body, json!({ "python_params": ["--date", "2024-01-01"] }));
    }

    #[test]
    fn test_export_format_serialization() {
        assert_eq!(serde_json::to_value(ExportFormat::RMarkdown).unwrap(), "R_MARKDOWN");
        let fmt: ExportFormat = serde_json::from_value(json!("JUPYTER")).unwrap();
        assert_eq!(fmt, ExportFormat::Jupyter);
        assert!(!ExportFormat::Dbc.is_textual());
    }

    #[test]
    fn test_exported_notebook_decoding() {
        let nb = ExportedNotebook {
            content: BASE64.encode("print('hi')"),
            file_type: Some("py".into()),
        };
        assert_eq!(nb.decoded().unwrap(), b"print('hi')");

        let bad = ExportedNotebook { content: "!!!".into(), file_type: None };
        assert!(bad.decoded().is_err());
    }

    #[test]
    fn test_table_qualified_name() {
        let mut table: TableInfo = serde_json::from_value(json!({
            "name": "trips", "catalog_name": "samples", "schema_name": "nyctaxi"
        }))
        .unwrap();
        assert_eq!(table.qualified_name(), "samples.nyctaxi.trips");
        table.full_name = Some("x.y.z".into());
        assert_eq!(table.qualified_name(), "x.y.z");
    }
}
