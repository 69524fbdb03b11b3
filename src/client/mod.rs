//! Workspace client facade
//!
//! `WorkspaceApi` is the async surface every tool talks to. The production
//! implementation is [`RestClient`]; [`MockWorkspace`] backs tests and the
//! `--mock` serve mode.

mod handle;
mod mock;
mod rest;
mod statement;
pub mod types;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;

pub use handle::ClientHandle;
pub use mock::MockWorkspace;
pub use rest::RestClient;
pub use statement::{PollPolicy, run_statement};
pub use types::*;

/// Asynchronous operations against a Databricks workspace
#[async_trait]
pub trait WorkspaceApi: Send + Sync {
    // Unity Catalog
    async fn list_catalogs(&self) -> Result<Vec<CatalogInfo>>;
    async fn list_schemas(&self, catalog: &str) -> Result<Vec<SchemaInfo>>;
    async fn list_tables(&self, catalog: &str, schema: &str) -> Result<Vec<TableInfo>>;
    async fn get_table(&self, full_name: &str) -> Result<TableInfo>;

    // SQL statements
    async fn execute_statement(&self, request: &StatementRequest) -> Result<StatementResponse>;
    async fn get_statement(&self, statement_id: &str) -> Result<StatementResponse>;
    async fn cancel_statement(&self, statement_id: &str) -> Result<()>;

    // Clusters
    async fn list_clusters(&self) -> Result<Vec<ClusterInfo>>;
    async fn get_cluster(&self, cluster_id: &str) -> Result<ClusterInfo>;
    /// Returns the new cluster id
    async fn create_cluster(&self, spec: &ClusterSpec) -> Result<String>;
    async fn start_cluster(&self, cluster_id: &str) -> Result<()>;
    async fn terminate_cluster(&self, cluster_id: &str) -> Result<()>;
    async fn restart_cluster(&self, cluster_id: &str) -> Result<()>;
    async fn resize_cluster(&self, cluster_id: &str, size: &ClusterSize) -> Result<()>;

    // Jobs
    async fn list_jobs(&self, limit: u32, offset: u32, expand_tasks: bool) -> Result<JobList>;
    async fn get_job(&self, job_id: i64) -> Result<Job>;
    /// Returns the new job id
    async fn create_job(&self, settings: &Value) -> Result<i64>;
    async fn run_job(&self, job_id: i64, params: &RunParameters) -> Result<RunNowResponse>;
    async fn update_job(&self, job_id: i64, new_settings: &Value) -> Result<()>;
    async fn delete_job(&self, job_id: i64) -> Result<()>;

    // Workspace objects
    async fn list_workspace(&self, path: &str) -> Result<Vec<ObjectInfo>>;
    async fn get_workspace_status(&self, path: &str) -> Result<ObjectInfo>;
    async fn export_notebook(&self, path: &str, format: ExportFormat) -> Result<ExportedNotebook>;
    async fn import_notebook(&self, request: &NotebookImport) -> Result<()>;
    async fn delete_workspace_object(&self, path: &str, recursive: bool) -> Result<()>;

    // DBFS
    async fn list_files(&self, path: &str) -> Result<Vec<FileInfo>>;
    async fn get_file_status(&self, path: &str) -> Result<FileInfo>;
    async fn read_file(&self, path: &str, offset: u64, length: u64) -> Result<FileChunk>;
    async fn put_file(&self, path: &str, contents: &[u8], overwrite: bool) -> Result<()>;
    async fn delete_file(&self, path: &str, recursive: bool) -> Result<()>;
}
