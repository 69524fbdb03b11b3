//! In-memory workspace for tests and offline runs

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde_json::{Value, json};

use super::WorkspaceApi;
use super::types::*;
use crate::error::{DatabricksMcpError, Result};

/// Leading keywords the mock accepts as parseable SQL
const KNOWN_STATEMENTS: &[&str] = &[
    "SELECT", "WITH", "SHOW", "DESCRIBE", "DESC", "EXPLAIN", "INSERT", "UPDATE", "DELETE", "CREATE", "DROP",
    "ALTER", "MERGE", "USE",
];

type FailureFn = Box<dyn Fn(&str) -> Option<DatabricksMcpError> + Send + Sync>;

struct MockObject {
    info: ObjectInfo,
    content: Option<String>,
}

struct MockFile {
    is_dir: bool,
    data: Vec<u8>,
}

struct PendingStatement {
    remaining: u32,
    response: StatementResponse,
}

#[derive(Default)]
struct MockState {
    catalogs: Vec<CatalogInfo>,
    schemas: BTreeMap<String, Vec<SchemaInfo>>,
    tables: BTreeMap<(String, String), Vec<TableInfo>>,
    clusters: BTreeMap<String, ClusterInfo>,
    jobs: BTreeMap<i64, Job>,
    job_runs: Vec<(i64, RunParameters)>,
    objects: BTreeMap<String, MockObject>,
    files: BTreeMap<String, MockFile>,
    statements: Vec<StatementRequest>,
    pending: HashMap<String, PendingStatement>,
    cancelled: Vec<String>,
    result_columns: Vec<String>,
    result_rows: Vec<Vec<Option<String>>>,
    next_id: i64,
}

impl MockState {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// Workspace double with canned data.
///
/// Every operation bumps the call counter and consults the injected failure
/// before touching state.
pub struct MockWorkspace {
    state: Mutex<MockState>,
    failure: Mutex<Option<FailureFn>>,
    pending_polls: u32,
    calls: AtomicUsize,
    statement_polls: AtomicUsize,
}

impl Default for MockWorkspace {
    fn default() -> Self {
        Self::empty()
    }
}

fn missing(what: &str, id: &str) -> DatabricksMcpError {
    DatabricksMcpError::RemoteValidation {
        error_code: "RESOURCE_DOES_NOT_EXIST".to_string(),
        message: format!("{} '{}' does not exist", what, id),
    }
}

fn already_exists(path: &str) -> DatabricksMcpError {
    DatabricksMcpError::RemoteValidation {
        error_code: "RESOURCE_ALREADY_EXISTS".to_string(),
        message: format!("'{}' already exists", path),
    }
}

fn parent_of(path: &str) -> &str {
    match path.trim_end_matches('/').rsplit_once('/') {
        Some(("", _)) | None => "/",
        Some((parent, _)) => parent,
    }
}

/// Directory form of a listing path: "/" stays, trailing slashes go
fn as_dir(path: &str) -> &str {
    match path.trim_end_matches('/') {
        "" => "/",
        trimmed => trimmed,
    }
}

fn is_descendant(candidate: &str, root: &str) -> bool {
    let root = root.trim_end_matches('/');
    candidate == root || candidate.starts_with(&format!("{}/", root))
}

fn column(name: &str, type_name: &str, position: u32) -> ColumnInfo {
    ColumnInfo {
        name: name.to_string(),
        type_name: Some(type_name.to_string()),
        type_text: Some(type_name.to_lowercase()),
        comment: None,
        nullable: Some(true),
        position: Some(position),
    }
}

fn table(catalog: &str, schema: &str, name: &str, columns: Vec<ColumnInfo>) -> TableInfo {
    TableInfo {
        name: name.to_string(),
        catalog_name: catalog.to_string(),
        schema_name: schema.to_string(),
        full_name: Some(format!("{}.{}.{}", catalog, schema, name)),
        table_type: Some("MANAGED".to_string()),
        data_source_format: Some("DELTA".to_string()),
        comment: None,
        storage_location: None,
        columns,
    }
}

/// Trailing `LIMIT n` of a statement, if any
fn trailing_limit(statement: &str) -> Option<usize> {
    let upper = statement.trim().trim_end_matches(';').to_uppercase();
    let idx = upper.rfind("LIMIT ")?;
    upper[idx + 6..].trim().parse().ok()
}

impl MockWorkspace {
    /// A workspace with nothing in it
    pub fn empty() -> Self {
        Self {
            state: Mutex::new(MockState {
                result_columns: vec!["id".to_string(), "name".to_string()],
                result_rows: vec![
                    vec![Some("1".into()), Some("alpha".into())],
                    vec![Some("2".into()), Some("beta".into())],
                    vec![Some("3".into()), Some("gamma".into())],
                ],
                ..Default::default()
            }),
            failure: Mutex::new(None),
            pending_polls: 0,
            calls: AtomicUsize::new(0),
            statement_polls: AtomicUsize::new(0),
        }
    }

    /// A small workspace with catalogs, a cluster, a job, a notebook and files
    pub fn sample() -> Self {
        let mock = Self::empty();
        {
            let mut s = mock.lock();

            s.catalogs = vec![
                CatalogInfo {
                    name: "main".into(),
                    comment: Some("Main catalog".into()),
                    metastore_id: Some("mock-metastore".into()),
                    owner: Some("admins".into()),
                },
                CatalogInfo {
                    name: "samples".into(),
                    comment: Some("Sample datasets".into()),
                    metastore_id: Some("mock-metastore".into()),
                    owner: None,
                },
            ];

            for (catalog, schema) in [("main", "default"), ("main", "sales"), ("samples", "nyctaxi")] {
                s.schemas.entry(catalog.to_string()).or_default().push(SchemaInfo {
                    name: schema.to_string(),
                    catalog_name: catalog.to_string(),
                    full_name: Some(format!("{}.{}", catalog, schema)),
                    comment: None,
                    owner: None,
                });
            }

            s.tables.insert(
                ("main".into(), "default".into()),
                vec![
                    table(
                        "main",
                        "default",
                        "customers",
                        vec![column("id", "BIGINT", 0), column("name", "STRING", 1), column("email", "STRING", 2)],
                    ),
                    table(
                        "main",
                        "default",
                        "orders",
                        vec![
                            column("order_id", "BIGINT", 0),
                            column("customer_id", "BIGINT", 1),
                            column("amount", "DECIMAL", 2),
                        ],
                    ),
                ],
            );
            s.tables.insert(
                ("main".into(), "sales".into()),
                vec![table(
                    "main",
                    "sales",
                    "daily_revenue",
                    vec![column("day", "DATE", 0), column("revenue", "DOUBLE", 1)],
                )],
            );
            s.tables.insert(
                ("samples".into(), "nyctaxi".into()),
                vec![table(
                    "samples",
                    "nyctaxi",
                    "trips",
                    vec![
                        column("tpep_pickup_datetime", "TIMESTAMP", 0),
                        column("trip_distance", "DOUBLE", 1),
                        column("fare_amount", "DOUBLE", 2),
                    ],
                )],
            );

            s.clusters.insert(
                "0101-120000-abcd1234".into(),
                ClusterInfo {
                    cluster_id: "0101-120000-abcd1234".into(),
                    cluster_name: Some("shared-analytics".into()),
                    state: Some("RUNNING".into()),
                    state_message: None,
                    spark_version: Some("14.3.x-scala2.12".into()),
                    node_type_id: Some("i3.xlarge".into()),
                    driver_node_type_id: Some("i3.xlarge".into()),
                    num_workers: Some(2),
                    autoscale: None,
                    autotermination_minutes: Some(60),
                    creator_user_name: Some("analyst@example.com".into()),
                    driver: None,
                    executors: Vec::new(),
                },
            );

            s.jobs.insert(
                101,
                Job {
                    job_id: 101,
                    settings: Some(json!({
                        "name": "nightly-etl",
                        "tasks": [{
                            "task_key": "ingest",
                            "notebook_task": { "notebook_path": "/Users/analyst@example.com/exploration" }
                        }]
                    })),
                    created_time: Some(1_704_067_200_000),
                    creator_user_name: Some("analyst@example.com".into()),
                },
            );
            s.next_id = 1000;

            for dir in ["/Users", "/Users/analyst@example.com"] {
                s.objects.insert(
                    dir.to_string(),
                    MockObject {
                        info: ObjectInfo {
                            path: dir.to_string(),
                            object_type: Some("DIRECTORY".into()),
                            language: None,
                            object_id: None,
                            created_at: None,
                            modified_at: None,
                            size: None,
                        },
                        content: None,
                    },
                );
            }
            s.objects.insert(
                "/Users/analyst@example.com/exploration".into(),
                MockObject {
                    info: ObjectInfo {
                        path: "/Users/analyst@example.com/exploration".into(),
                        object_type: Some("NOTEBOOK".into()),
                        language: Some("PYTHON".into()),
                        object_id: Some(42),
                        created_at: Some(1_704_067_200_000),
                        modified_at: Some(1_704_153_600_000),
                        size: None,
                    },
                    content: Some("# Databricks notebook source\nprint('hello')\n".into()),
                },
            );

            s.files.insert("/FileStore".into(), MockFile { is_dir: true, data: Vec::new() });
            s.files.insert("/tmp".into(), MockFile { is_dir: true, data: Vec::new() });
            s.files.insert(
                "/FileStore/readme.txt".into(),
                MockFile {
                    is_dir: false,
                    data: b"sample data lives here\n".to_vec(),
                },
            );
        }
        mock
    }

    /// Statements report PENDING for this many polls before succeeding
    pub fn with_pending_polls(mut self, polls: u32) -> Self {
        self.pending_polls = polls;
        self
    }

    /// Rows returned by successful statements
    pub fn with_query_result(self, columns: &[&str], rows: Vec<Vec<Option<String>>>) -> Self {
        {
            let mut s = self.lock();
            s.result_columns = columns.iter().map(|c| c.to_string()).collect();
            s.result_rows = rows;
        }
        self
    }

    /// Fail every operation with the error `f` builds
    pub fn with_failure<F>(self, f: F) -> Self
    where
        F: Fn() -> DatabricksMcpError + Send + Sync + 'static,
    {
        self.set_failure(move |_| Some(f()));
        self
    }

    /// Install a failure hook; it sees the operation name and may decline
    pub fn set_failure<F>(&self, f: F)
    where
        F: Fn(&str) -> Option<DatabricksMcpError> + Send + Sync + 'static,
    {
        *self.failure.lock().unwrap_or_else(PoisonError::into_inner) = Some(Box::new(f));
    }

    pub fn clear_failure(&self) {
        *self.failure.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// Total operations invoked
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// `get_statement` calls made while statements were pending
    pub fn statement_polls(&self) -> usize {
        self.statement_polls.load(Ordering::SeqCst)
    }

    /// Statement requests submitted, oldest first
    pub fn submitted_statements(&self) -> Vec<StatementRequest> {
        self.lock().statements.clone()
    }

    pub fn cancelled_statements(&self) -> Vec<String> {
        self.lock().cancelled.clone()
    }

    pub fn job_runs(&self) -> Vec<(i64, RunParameters)> {
        self.lock().job_runs.clone()
    }

    pub fn file_contents(&self, path: &str) -> Option<Vec<u8>> {
        self.lock().files.get(path).filter(|f| !f.is_dir).map(|f| f.data.clone())
    }

    pub fn notebook_source(&self, path: &str) -> Option<String> {
        self.lock().objects.get(path).and_then(|o| o.content.clone())
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, op: &str) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let failure = self.failure.lock().unwrap_or_else(PoisonError::into_inner);
        match failure.as_ref().and_then(|f| f(op)) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn succeeded(&self, statement_id: &str, statement: &str, row_limit: Option<u64>) -> StatementResponse {
        let s = self.lock();
        let mut rows = s.result_rows.clone();
        if let Some(limit) = trailing_limit(statement) {
            rows.truncate(limit);
        }
        if let Some(limit) = row_limit {
            rows.truncate(limit as usize);
        }
        let columns = s
            .result_columns
            .iter()
            .enumerate()
            .map(|(i, name)| ResultColumn {
                name: name.clone(),
                type_name: Some("STRING".into()),
                position: Some(i as u32),
            })
            .collect();

        StatementResponse {
            statement_id: statement_id.to_string(),
            status: StatementStatus {
                state: StatementState::Succeeded,
                error: None,
            },
            manifest: Some(ResultManifest {
                schema: Some(ResultSchema { columns }),
                total_row_count: Some(rows.len() as u64),
                truncated: Some(false),
            }),
            result: Some(StatementResult {
                row_count: Some(rows.len() as u64),
                data_array: rows,
            }),
        }
    }

    fn cluster_mut<'a>(state: &'a mut MockState, cluster_id: &str) -> Result<&'a mut ClusterInfo> {
        state.clusters.get_mut(cluster_id).ok_or_else(|| missing("Cluster", cluster_id))
    }
}

#[async_trait]
impl WorkspaceApi for MockWorkspace {
    async fn list_catalogs(&self) -> Result<Vec<CatalogInfo>> {
        self.record("list_catalogs")?;
        Ok(self.lock().catalogs.clone())
    }

    async fn list_schemas(&self, catalog: &str) -> Result<Vec<SchemaInfo>> {
        self.record("list_schemas")?;
        self.lock()
            .schemas
            .get(catalog)
            .cloned()
            .ok_or_else(|| missing("Catalog", catalog))
    }

    async fn list_tables(&self, catalog: &str, schema: &str) -> Result<Vec<TableInfo>> {
        self.record("list_tables")?;
        let s = self.lock();
        if !s.schemas.get(catalog).is_some_and(|v| v.iter().any(|x| x.name == schema)) {
            return Err(missing("Schema", &format!("{}.{}", catalog, schema)));
        }
        Ok(s.tables
            .get(&(catalog.to_string(), schema.to_string()))
            .cloned()
            .unwrap_or_default())
    }

    async fn get_table(&self, full_name: &str) -> Result<TableInfo> {
        self.record("get_table")?;
        self.lock()
            .tables
            .values()
            .flatten()
            .find(|t| t.qualified_name() == full_name)
            .cloned()
            .ok_or_else(|| DatabricksMcpError::RemoteValidation {
                error_code: "TABLE_DOES_NOT_EXIST".to_string(),
                message: format!("Table '{}' does not exist", full_name),
            })
    }

    async fn execute_statement(&self, request: &StatementRequest) -> Result<StatementResponse> {
        self.record("execute_statement")?;
        let statement_id = {
            let mut s = self.lock();
            s.statements.push(request.clone());
            format!("mock-stmt-{}", s.next_id())
        };

        let keyword = request
            .statement
            .split_whitespace()
            .next()
            .unwrap_or("")
            .to_uppercase();
        if !KNOWN_STATEMENTS.contains(&keyword.as_str()) {
            return Ok(StatementResponse {
                statement_id,
                status: StatementStatus {
                    state: StatementState::Failed,
                    error: Some(ServiceError {
                        error_code: Some("BAD_REQUEST".into()),
                        message: Some(format!("[PARSE_SYNTAX_ERROR] Syntax error at or near '{}'", keyword)),
                    }),
                },
                manifest: None,
                result: None,
            });
        }

        let done = self.succeeded(&statement_id, &request.statement, request.row_limit);
        if self.pending_polls == 0 {
            return Ok(done);
        }

        let pending = StatementResponse {
            statement_id: statement_id.clone(),
            status: StatementStatus {
                state: StatementState::Pending,
                error: None,
            },
            manifest: None,
            result: None,
        };
        self.lock().pending.insert(
            statement_id,
            PendingStatement {
                remaining: self.pending_polls,
                response: done,
            },
        );
        Ok(pending)
    }

    async fn get_statement(&self, statement_id: &str) -> Result<StatementResponse> {
        self.record("get_statement")?;
        let mut s = self.lock();
        let Some(entry) = s.pending.get_mut(statement_id) else {
            return Err(missing("Statement", statement_id));
        };
        self.statement_polls.fetch_add(1, Ordering::SeqCst);
        entry.remaining = entry.remaining.saturating_sub(1);
        if entry.remaining == 0 {
            let done = entry.response.clone();
            s.pending.remove(statement_id);
            return Ok(done);
        }
        Ok(StatementResponse {
            statement_id: statement_id.to_string(),
            status: StatementStatus {
                state: StatementState::Running,
                error: None,
            },
            manifest: None,
            result: None,
        })
    }

    async fn cancel_statement(&self, statement_id: &str) -> Result<()> {
        self.record("cancel_statement")?;
        let mut s = self.lock();
        s.pending.remove(statement_id);
        s.cancelled.push(statement_id.to_string());
        Ok(())
    }

    async fn list_clusters(&self) -> Result<Vec<ClusterInfo>> {
        self.record("list_clusters")?;
        Ok(self.lock().clusters.values().cloned().collect())
    }

    async fn get_cluster(&self, cluster_id: &str) -> Result<ClusterInfo> {
        self.record("get_cluster")?;
        self.lock()
            .clusters
            .get(cluster_id)
            .cloned()
            .ok_or_else(|| missing("Cluster", cluster_id))
    }

    async fn create_cluster(&self, spec: &ClusterSpec) -> Result<String> {
        self.record("create_cluster")?;
        let mut s = self.lock();
        let cluster_id = format!("mock-cluster-{}", s.next_id());
        s.clusters.insert(
            cluster_id.clone(),
            ClusterInfo {
                cluster_id: cluster_id.clone(),
                cluster_name: Some(spec.cluster_name.clone()),
                state: Some("PENDING".into()),
                state_message: None,
                spark_version: Some(spec.spark_version.clone()),
                node_type_id: Some(spec.node_type_id.clone()),
                driver_node_type_id: Some(spec.node_type_id.clone()),
                num_workers: spec.num_workers,
                autoscale: spec.autoscale,
                autotermination_minutes: spec.autotermination_minutes,
                creator_user_name: None,
                driver: None,
                executors: Vec::new(),
            },
        );
        Ok(cluster_id)
    }

    async fn start_cluster(&self, cluster_id: &str) -> Result<()> {
        self.record("start_cluster")?;
        let mut s = self.lock();
        Self::cluster_mut(&mut s, cluster_id)?.state = Some("RUNNING".into());
        Ok(())
    }

    async fn terminate_cluster(&self, cluster_id: &str) -> Result<()> {
        self.record("terminate_cluster")?;
        let mut s = self.lock();
        Self::cluster_mut(&mut s, cluster_id)?.state = Some("TERMINATED".into());
        Ok(())
    }

    async fn restart_cluster(&self, cluster_id: &str) -> Result<()> {
        self.record("restart_cluster")?;
        let mut s = self.lock();
        let cluster = Self::cluster_mut(&mut s, cluster_id)?;
        if cluster.state.as_deref() != Some("RUNNING") {
            return Err(DatabricksMcpError::RemoteValidation {
                error_code: "INVALID_STATE".to_string(),
                message: format!("Cluster {} is not running", cluster_id),
            });
        }
        cluster.state = Some("RESTARTING".into());
        Ok(())
    }

    async fn resize_cluster(&self, cluster_id: &str, size: &ClusterSize) -> Result<()> {
        self.record("resize_cluster")?;
        let mut s = self.lock();
        let cluster = Self::cluster_mut(&mut s, cluster_id)?;
        match size {
            ClusterSize::Fixed(n) => {
                cluster.num_workers = Some(*n);
                cluster.autoscale = None;
            }
            ClusterSize::Autoscale(a) => {
                cluster.autoscale = Some(*a);
                cluster.num_workers = None;
            }
        }
        Ok(())
    }

    async fn list_jobs(&self, limit: u32, offset: u32, expand_tasks: bool) -> Result<JobList> {
        self.record("list_jobs")?;
        let s = self.lock();
        let total = s.jobs.len();
        let jobs: Vec<Job> = s
            .jobs
            .values()
            .skip(offset as usize)
            .take(limit as usize)
            .cloned()
            .map(|mut job| {
                if !expand_tasks {
                    if let Some(Value::Object(settings)) = job.settings.as_mut() {
                        settings.remove("tasks");
                    }
                }
                job
            })
            .collect();
        Ok(JobList {
            has_more: (offset as usize + jobs.len()) < total,
            jobs,
        })
    }

    async fn get_job(&self, job_id: i64) -> Result<Job> {
        self.record("get_job")?;
        self.lock()
            .jobs
            .get(&job_id)
            .cloned()
            .ok_or_else(|| missing("Job", &job_id.to_string()))
    }

    async fn create_job(&self, settings: &Value) -> Result<i64> {
        self.record("create_job")?;
        let mut s = self.lock();
        let job_id = s.next_id();
        s.jobs.insert(
            job_id,
            Job {
                job_id,
                settings: Some(settings.clone()),
                created_time: Some(1_704_067_200_000),
                creator_user_name: Some("mock@example.com".into()),
            },
        );
        Ok(job_id)
    }

    async fn run_job(&self, job_id: i64, params: &RunParameters) -> Result<RunNowResponse> {
        self.record("run_job")?;
        let mut s = self.lock();
        if !s.jobs.contains_key(&job_id) {
            return Err(missing("Job", &job_id.to_string()));
        }
        s.job_runs.push((job_id, params.clone()));
        let run_id = s.next_id();
        Ok(RunNowResponse {
            run_id,
            number_in_job: Some(s.job_runs.len() as i64),
        })
    }

    async fn update_job(&self, job_id: i64, new_settings: &Value) -> Result<()> {
        self.record("update_job")?;
        let mut s = self.lock();
        let job = s.jobs.get_mut(&job_id).ok_or_else(|| missing("Job", &job_id.to_string()))?;
        let settings = job.settings.get_or_insert_with(|| json!({}));
        if let (Value::Object(current), Value::Object(updates)) = (settings, new_settings) {
            for (key, value) in updates {
                current.insert(key.clone(), value.clone());
            }
        }
        Ok(())
    }

    async fn delete_job(&self, job_id: i64) -> Result<()> {
        self.record("delete_job")?;
        self.lock()
            .jobs
            .remove(&job_id)
            .map(|_| ())
            .ok_or_else(|| missing("Job", &job_id.to_string()))
    }

    async fn list_workspace(&self, path: &str) -> Result<Vec<ObjectInfo>> {
        self.record("list_workspace")?;
        let s = self.lock();
        if path != "/" && !s.objects.contains_key(path) {
            return Err(missing("Path", path));
        }
        Ok(s.objects
            .iter()
            .filter(|(p, _)| parent_of(p) == as_dir(path))
            .map(|(_, o)| o.info.clone())
            .collect())
    }

    async fn get_workspace_status(&self, path: &str) -> Result<ObjectInfo> {
        self.record("get_workspace_status")?;
        self.lock()
            .objects
            .get(path)
            .map(|o| o.info.clone())
            .ok_or_else(|| missing("Path", path))
    }

    async fn export_notebook(&self, path: &str, format: ExportFormat) -> Result<ExportedNotebook> {
        self.record("export_notebook")?;
        let s = self.lock();
        let object = s.objects.get(path).ok_or_else(|| missing("Path", path))?;
        let content = object.content.as_ref().ok_or_else(|| DatabricksMcpError::RemoteValidation {
            error_code: "BAD_REQUEST".to_string(),
            message: format!("'{}' is not a notebook", path),
        })?;
        let file_type = match (format, object.info.language.as_deref()) {
            (ExportFormat::Html, _) => "html",
            (ExportFormat::Jupyter, _) => "ipynb",
            (ExportFormat::Dbc, _) => "dbc",
            (ExportFormat::RMarkdown, _) => "Rmd",
            (_, Some("SQL")) => "sql",
            (_, Some("SCALA")) => "scala",
            (_, Some("R")) => "r",
            _ => "py",
        };
        Ok(ExportedNotebook {
            content: BASE64.encode(content.as_bytes()),
            file_type: Some(file_type.to_string()),
        })
    }

    async fn import_notebook(&self, request: &NotebookImport) -> Result<()> {
        self.record("import_notebook")?;
        let mut s = self.lock();
        if s.objects.contains_key(&request.path) && !request.overwrite {
            return Err(already_exists(&request.path));
        }
        let object_id = s.next_id();
        let language = request
            .language
            .and_then(|l| serde_json::to_value(l).ok())
            .and_then(|v| v.as_str().map(str::to_string));
        s.objects.insert(
            request.path.clone(),
            MockObject {
                info: ObjectInfo {
                    path: request.path.clone(),
                    object_type: Some("NOTEBOOK".into()),
                    language,
                    object_id: Some(object_id),
                    created_at: None,
                    modified_at: None,
                    size: Some(request.content.len() as i64),
                },
                content: Some(request.content.clone()),
            },
        );
        Ok(())
    }

    async fn delete_workspace_object(&self, path: &str, recursive: bool) -> Result<()> {
        self.record("delete_workspace_object")?;
        let mut s = self.lock();
        if !s.objects.contains_key(path) {
            return Err(missing("Path", path));
        }
        let has_children = s.objects.keys().any(|p| p != path && is_descendant(p, path));
        if has_children && !recursive {
            return Err(DatabricksMcpError::RemoteValidation {
                error_code: "DIRECTORY_NOT_EMPTY".to_string(),
                message: format!("Folder '{}' is not empty", path),
            });
        }
        s.objects.retain(|p, _| !is_descendant(p, path));
        Ok(())
    }

    async fn list_files(&self, path: &str) -> Result<Vec<FileInfo>> {
        self.record("list_files")?;
        let s = self.lock();
        let info = |p: &str, f: &MockFile| FileInfo {
            path: p.to_string(),
            is_dir: f.is_dir,
            file_size: f.data.len() as i64,
            modification_time: Some(1_704_067_200_000),
        };

        match s.files.get(path) {
            Some(f) if !f.is_dir => return Ok(vec![info(path, f)]),
            None if path != "/" => return Err(missing("Path", path)),
            _ => {}
        }
        Ok(s.files
            .iter()
            .filter(|(p, _)| parent_of(p) == as_dir(path))
            .map(|(p, f)| info(p, f))
            .collect())
    }

    async fn get_file_status(&self, path: &str) -> Result<FileInfo> {
        self.record("get_file_status")?;
        self.lock()
            .files
            .get(path)
            .map(|f| FileInfo {
                path: path.to_string(),
                is_dir: f.is_dir,
                file_size: f.data.len() as i64,
                modification_time: Some(1_704_067_200_000),
            })
            .ok_or_else(|| missing("Path", path))
    }

    async fn read_file(&self, path: &str, offset: u64, length: u64) -> Result<FileChunk> {
        self.record("read_file")?;
        let s = self.lock();
        let file = s.files.get(path).ok_or_else(|| missing("Path", path))?;
        if file.is_dir {
            return Err(DatabricksMcpError::RemoteValidation {
                error_code: "NOT_A_FILE".to_string(),
                message: format!("'{}' is a directory", path),
            });
        }
        let start = (offset as usize).min(file.data.len());
        let end = start.saturating_add(length as usize).min(file.data.len());
        let data = file.data[start..end].to_vec();
        Ok(FileChunk {
            bytes_read: data.len() as u64,
            data,
        })
    }

    async fn put_file(&self, path: &str, contents: &[u8], overwrite: bool) -> Result<()> {
        self.record("put_file")?;
        let mut s = self.lock();
        if s.files.contains_key(path) && !overwrite {
            return Err(already_exists(path));
        }
        s.files.insert(
            path.to_string(),
            MockFile {
                is_dir: false,
                data: contents.to_vec(),
            },
        );
        Ok(())
    }

    async fn delete_file(&self, path: &str, recursive: bool) -> Result<()> {
        self.record("delete_file")?;
        let mut s = self.lock();
        let Some(file) = s.files.get(path) else {
            return Err(missing("Path", path));
        };
        if file.is_dir && !recursive && s.files.keys().any(|p| p != path && is_descendant(p, path)) {
            return Err(DatabricksMcpError::RemoteValidation {
                error_code: "IO_ERROR".to_string(),
                message: format!("Directory '{}' is not empty", path),
            });
        }
        s.files.retain(|p, _| !is_descendant(p, path));
        Ok(())
    }
}

impl std::fmt::Debug for MockWorkspace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockWorkspace")
            .field("calls", &self.call_count())
            .field("pending_polls", &self.pending_polls)
            .finish()
    }
}
