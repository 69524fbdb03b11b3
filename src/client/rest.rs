//! REST implementation of the workspace client

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use log::debug;
use reqwest::{Client, Method, RequestBuilder, Url};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use super::WorkspaceApi;
use super::types::*;
use crate::config::DatabricksConfig;
use crate::error::{DatabricksMcpError, Result};

const UNITY_CATALOG: &str = "api/2.1/unity-catalog";
const SQL_STATEMENTS: &str = "api/2.0/sql/statements";
const CLUSTERS: &str = "api/2.0/clusters";
const JOBS: &str = "api/2.1/jobs";
const WORKSPACE: &str = "api/2.0/workspace";
const DBFS: &str = "api/2.0/dbfs";

/// Error body shape shared by all workspace endpoints
#[derive(Debug, Default, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    error_code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Map a non-success response to a typed error
fn error_from_status(status: u16, body: &str) -> DatabricksMcpError {
    let parsed = serde_json::from_str::<ApiErrorBody>(body).ok();
    let message = parsed
        .as_ref()
        .and_then(|b| b.message.clone())
        .unwrap_or_else(|| body.trim().to_string());

    match status {
        401 | 403 => DatabricksMcpError::Auth { status, message },
        400 | 404 => match parsed.and_then(|b| b.error_code) {
            Some(error_code) => DatabricksMcpError::RemoteValidation { error_code, message },
            // No structured body: the endpoint itself is missing
            None if status == 404 => DatabricksMcpError::NotFound(message),
            None => DatabricksMcpError::RemoteValidation {
                error_code: "BAD_REQUEST".to_string(),
                message,
            },
        },
        _ => DatabricksMcpError::RemoteApi { status, message },
    }
}

/// Workspace client over the platform REST API
pub struct RestClient {
    client: Client,
    base: Url,
    token: String,
}

impl RestClient {
    /// Create a client for `host` authenticating with a personal access token
    pub fn new(host: &str, token: impl Into<String>, timeout: Duration) -> Result<Self> {
        let mut base = Url::parse(host)
            .map_err(|e| DatabricksMcpError::Config(format!("Invalid host '{}': {}", host, e)))?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        // Every dispatch drives this client from a fresh runtime, so pooled
        // connections would outlive the reactor they were registered with.
        let client = Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(0)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| DatabricksMcpError::Transport(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base,
            token: token.into(),
        })
    }

    /// Create a client from validated connection settings
    pub fn from_config(config: &DatabricksConfig) -> Result<Self> {
        config.validate()?;
        Self::new(
            &config.host,
            config.token.clone(),
            Duration::from_millis(config.request_timeout_ms),
        )
    }

    /// Resolve an endpoint, appending `segments` as escaped path segments
    fn endpoint(&self, path: &str, segments: &[&str]) -> Result<Url> {
        let mut url = self
            .base
            .join(path)
            .map_err(|e| DatabricksMcpError::Config(format!("Invalid endpoint '{}': {}", path, e)))?;
        if !segments.is_empty() {
            url.path_segments_mut()
                .map_err(|_| DatabricksMcpError::Config(format!("Host cannot carry a path: {}", self.base)))?
                .extend(segments);
        }
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.client.request(method, url).bearer_auth(&self.token)
    }

    /// Send a request and decode the JSON body. Empty bodies decode as `{}`.
    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = request.send().await?;
        let status = response.status();
        let url = response.url().path().to_string();
        let body = response.text().await?;

        if !status.is_success() {
            debug!("{} -> {}: {}", url, status, body);
            return Err(error_from_status(status.as_u16(), &body));
        }

        let body = if body.trim().is_empty() { "{}" } else { body.as_str() };
        serde_json::from_str(body).map_err(|e| DatabricksMcpError::RemoteApi {
            status: status.as_u16(),
            message: format!("Failed to parse response from {}: {}", url, e),
        })
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T> {
        let url = self.endpoint(path, &[])?;
        self.send(self.request(Method::GET, url).query(query)).await
    }

    async fn post<T: DeserializeOwned>(&self, path: &str, body: &Value) -> Result<T> {
        let url = self.endpoint(path, &[])?;
        self.send(self.request(Method::POST, url).json(body)).await
    }

    /// POST where only success matters
    async fn post_empty(&self, path: &str, body: &Value) -> Result<()> {
        self.post::<Value>(path, body).await.map(|_| ())
    }

    /// Collect every page of a unity-catalog list endpoint
    async fn list_paged<T: DeserializeOwned>(
        &self,
        path: &str,
        field: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<T>> {
        let mut items = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut params = query.to_vec();
            if let Some(token) = page_token.take() {
                params.push(("page_token", token));
            }
            let mut page: Value = self.get(path, &params).await?;

            if let Some(values) = page.get_mut(field).map(Value::take) {
                let batch: Vec<T> = serde_json::from_value(values)?;
                items.extend(batch);
            }

            match page.get("next_page_token").and_then(Value::as_str) {
                Some(token) if !token.is_empty() => page_token = Some(token.to_string()),
                _ => break,
            }
        }

        Ok(items)
    }
}

#[derive(Deserialize)]
struct ClusterList {
    #[serde(default)]
    clusters: Vec<ClusterInfo>,
}

#[derive(Deserialize)]
struct CreatedCluster {
    cluster_id: String,
}

#[derive(Deserialize)]
struct CreatedJob {
    job_id: i64,
}

#[derive(Deserialize)]
struct ObjectList {
    #[serde(default)]
    objects: Vec<ObjectInfo>,
}

#[derive(Deserialize)]
struct FileList {
    #[serde(default)]
    files: Vec<FileInfo>,
}

#[derive(Deserialize)]
struct ReadBlock {
    #[serde(default)]
    bytes_read: u64,
    #[serde(default)]
    data: String,
}

#[async_trait]
impl WorkspaceApi for RestClient {
    async fn list_catalogs(&self) -> Result<Vec<CatalogInfo>> {
        self.list_paged(&format!("{}/catalogs", UNITY_CATALOG), "catalogs", &[])
            .await
    }

    async fn list_schemas(&self, catalog: &str) -> Result<Vec<SchemaInfo>> {
        self.list_paged(
            &format!("{}/schemas", UNITY_CATALOG),
            "schemas",
            &[("catalog_name", catalog.to_string())],
        )
        .await
    }

    async fn list_tables(&self, catalog: &str, schema: &str) -> Result<Vec<TableInfo>> {
        self.list_paged(
            &format!("{}/tables", UNITY_CATALOG),
            "tables",
            &[
                ("catalog_name", catalog.to_string()),
                ("schema_name", schema.to_string()),
            ],
        )
        .await
    }

    async fn get_table(&self, full_name: &str) -> Result<TableInfo> {
        let url = self.endpoint(&format!("{}/tables", UNITY_CATALOG), &[full_name])?;
        self.send(self.request(Method::GET, url)).await
    }

    async fn execute_statement(&self, request: &StatementRequest) -> Result<StatementResponse> {
        let url = self.endpoint(SQL_STATEMENTS, &[])?;
        self.send(self.request(Method::POST, url).json(request)).await
    }

    async fn get_statement(&self, statement_id: &str) -> Result<StatementResponse> {
        let url = self.endpoint(SQL_STATEMENTS, &[statement_id])?;
        self.send(self.request(Method::GET, url)).await
    }

    async fn cancel_statement(&self, statement_id: &str) -> Result<()> {
        let url = self.endpoint(SQL_STATEMENTS, &[statement_id, "cancel"])?;
        self.send::<Value>(self.request(Method::POST, url)).await.map(|_| ())
    }

    async fn list_clusters(&self) -> Result<Vec<ClusterInfo>> {
        let list: ClusterList = self.get(&format!("{}/list", CLUSTERS), &[]).await?;
        Ok(list.clusters)
    }

    async fn get_cluster(&self, cluster_id: &str) -> Result<ClusterInfo> {
        self.get(&format!("{}/get", CLUSTERS), &[("cluster_id", cluster_id.to_string())])
            .await
    }

    async fn create_cluster(&self, spec: &ClusterSpec) -> Result<String> {
        let created: CreatedCluster = self
            .post(&format!("{}/create", CLUSTERS), &serde_json::to_value(spec)?)
            .await?;
        Ok(created.cluster_id)
    }

    async fn start_cluster(&self, cluster_id: &str) -> Result<()> {
        self.post_empty(&format!("{}/start", CLUSTERS), &json!({ "cluster_id": cluster_id }))
            .await
    }

    async fn terminate_cluster(&self, cluster_id: &str) -> Result<()> {
        // "delete" terminates; permanent deletion is a different endpoint
        self.post_empty(&format!("{}/delete", CLUSTERS), &json!({ "cluster_id": cluster_id }))
            .await
    }

    async fn restart_cluster(&self, cluster_id: &str) -> Result<()> {
        self.post_empty(&format!("{}/restart", CLUSTERS), &json!({ "cluster_id": cluster_id }))
            .await
    }

    async fn resize_cluster(&self, cluster_id: &str, size: &ClusterSize) -> Result<()> {
        let mut body = size.to_fields();
        body["cluster_id"] = json!(cluster_id);
        self.post_empty(&format!("{}/resize", CLUSTERS), &body).await
    }

    async fn list_jobs(&self, limit: u32, offset: u32, expand_tasks: bool) -> Result<JobList> {
        self.get(
            &format!("{}/list", JOBS),
            &[
                ("limit", limit.to_string()),
                ("offset", offset.to_string()),
                ("expand_tasks", expand_tasks.to_string()),
            ],
        )
        .await
    }

    async fn get_job(&self, job_id: i64) -> Result<Job> {
        self.get(&format!("{}/get", JOBS), &[("job_id", job_id.to_string())])
            .await
    }

    async fn create_job(&self, settings: &Value) -> Result<i64> {
        let created: CreatedJob = self.post(&format!("{}/create", JOBS), settings).await?;
        Ok(created.job_id)
    }

    async fn run_job(&self, job_id: i64, params: &RunParameters) -> Result<RunNowResponse> {
        let mut body = serde_json::to_value(params)?;
        body["job_id"] = json!(job_id);
        self.post(&format!("{}/run-now", JOBS), &body).await
    }

    async fn update_job(&self, job_id: i64, new_settings: &Value) -> Result<()> {
        self.post_empty(
            &format!("{}/update", JOBS),
            &json!({ "job_id": job_id, "new_settings": new_settings }),
        )
        .await
    }

    async fn delete_job(&self, job_id: i64) -> Result<()> {
        self.post_empty(&format!("{}/delete", JOBS), &json!({ "job_id": job_id }))
            .await
    }

    async fn list_workspace(&self, path: &str) -> Result<Vec<ObjectInfo>> {
        let list: ObjectList = self
            .get(&format!("{}/list", WORKSPACE), &[("path", path.to_string())])
            .await?;
        Ok(list.objects)
    }

    async fn get_workspace_status(&self, path: &str) -> Result<ObjectInfo> {
        self.get(&format!("{}/get-status", WORKSPACE), &[("path", path.to_string())])
            .await
    }

    async fn export_notebook(&self, path: &str, format: ExportFormat) -> Result<ExportedNotebook> {
        self.get(
            &format!("{}/export", WORKSPACE),
            &[("path", path.to_string()), ("format", format.as_str().to_string())],
        )
        .await
    }

    async fn import_notebook(&self, request: &NotebookImport) -> Result<()> {
        let mut body = json!({
            "path": request.path,
            "format": request.format,
            "content": BASE64.encode(request.content.as_bytes()),
            "overwrite": request.overwrite,
        });
        if let Some(language) = request.language {
            body["language"] = json!(language);
        }
        self.post_empty(&format!("{}/import", WORKSPACE), &body).await
    }

    async fn delete_workspace_object(&self, path: &str, recursive: bool) -> Result<()> {
        self.post_empty(
            &format!("{}/delete", WORKSPACE),
            &json!({ "path": path, "recursive": recursive }),
        )
        .await
    }

    async fn list_files(&self, path: &str) -> Result<Vec<FileInfo>> {
        let list: FileList = self
            .get(&format!("{}/list", DBFS), &[("path", path.to_string())])
            .await?;
        Ok(list.files)
    }

    async fn get_file_status(&self, path: &str) -> Result<FileInfo> {
        self.get(&format!("{}/get-status", DBFS), &[("path", path.to_string())])
            .await
    }

    async fn read_file(&self, path: &str, offset: u64, length: u64) -> Result<FileChunk> {
        let block: ReadBlock = self
            .get(
                &format!("{}/read", DBFS),
                &[
                    ("path", path.to_string()),
                    ("offset", offset.to_string()),
                    ("length", length.to_string()),
                ],
            )
            .await?;
        let data = BASE64
            .decode(block.data.as_bytes())
            .map_err(|e| DatabricksMcpError::RemoteApi {
                status: 200,
                message: format!("DBFS read returned invalid base64: {}", e),
            })?;
        Ok(FileChunk {
            bytes_read: block.bytes_read,
            data,
        })
    }

    async fn put_file(&self, path: &str, contents: &[u8], overwrite: bool) -> Result<()> {
        self.post_empty(
            &format!("{}/put", DBFS),
            &json!({
                "path": path,
                "contents": BASE64.encode(contents),
                "overwrite": overwrite,
            }),
        )
        .await
    }

    async fn delete_file(&self, path: &str, recursive: bool) -> Result<()> {
        self.post_empty(
            &format!("{}/delete", DBFS),
            &json!({ "path": path, "recursive": recursive }),
        )
        .await
    }
}

impl std::fmt::Debug for RestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestClient")
            .field("host", &self.base.as_str())
            .field("token", &"***")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(host: &str) -> RestClient {
        RestClient::new(host, "dapi-test", Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_invalid_host_is_config_error() {
        let err = RestClient::new("not a url", "t", Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, DatabricksMcpError::Config(_)));
    }

    #[test]
    fn test_endpoint_joins_host() {
        let c = client("https://adb-123.azuredatabricks.net");
        let url = c.endpoint("api/2.0/clusters/list", &[]).unwrap();
        assert_eq!(url.as_str(), "https://adb-123.azuredatabricks.net/api/2.0/clusters/list");
    }

    #[test]
    fn test_endpoint_keeps_host_prefix() {
        let c = client("https://proxy.internal/databricks");
        let url = c.endpoint(SQL_STATEMENTS, &["01ef", "cancel"]).unwrap();
        assert_eq!(
            url.as_str(),
            "https://proxy.internal/databricks/api/2.0/sql/statements/01ef/cancel"
        );
    }

    #[test]
    fn test_endpoint_escapes_segments() {
        let c = client("https://example.cloud.databricks.com/");
        let url = c
            .endpoint(&format!("{}/tables", UNITY_CATALOG), &["main.default.my table"])
            .unwrap();
        assert!(url.as_str().ends_with("/tables/main.default.my%20table"));
    }

    #[test]
    fn test_status_mapping_auth() {
        let err = error_from_status(403, r#"{"error_code":"PERMISSION_DENIED","message":"Invalid access token"}"#);
        match err {
            DatabricksMcpError::Auth { status, message } => {
                assert_eq!(status, 403);
                assert_eq!(message, "Invalid access token");
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(error_from_status(401, "").kind(), "authentication");
    }

    #[test]
    fn test_status_mapping_validation() {
        let err = error_from_status(
            404,
            r#"{"error_code":"TABLE_DOES_NOT_EXIST","message":"Table 'main.x.y' does not exist"}"#,
        );
        assert!(matches!(
            err,
            DatabricksMcpError::RemoteValidation { ref error_code, .. } if error_code == "TABLE_DOES_NOT_EXIST"
        ));

        let err = error_from_status(400, "bad");
        assert_eq!(err.kind(), "remote_validation");
    }

    #[test]
    fn test_status_mapping_unstructured_404() {
        let err = error_from_status(404, "<html>Not Found</html>");
        assert!(matches!(err, DatabricksMcpError::NotFound(_)));
    }

    #[test]
    fn test_status_mapping_other() {
        let err = error_from_status(503, r#"{"error_code":"TEMPORARILY_UNAVAILABLE","message":"try later"}"#);
        assert!(matches!(err, DatabricksMcpError::RemoteApi { status: 503, .. }));
        assert!(err.to_string().contains("try later"));
    }

    #[test]
    fn test_debug_hides_token() {
        let c = client("https://example.cloud.databricks.com");
        let debug = format!("{:?}", c);
        assert!(debug.contains("example.cloud.databricks.com"));
        assert!(!debug.contains("dapi-test"));
    }

    #[test]
    fn test_unreachable_host_is_transport_error() {
        let c = RestClient::new("http://127.0.0.1:1", "t", Duration::from_secs(2)).unwrap();
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let err = rt.block_on(c.list_clusters()).unwrap_err();
        assert!(matches!(
            err,
            DatabricksMcpError::Transport(_) | DatabricksMcpError::Timeout(_)
        ));
    }
}
