//! Job tools

use std::collections::BTreeMap;

use chrono::DateTime;
use serde::Deserialize;
use serde_json::{Value, json};

use super::args::{object_schema, parse};
use super::{Tool, ToolContext};
use crate::client::{Job, RunParameters};
use crate::error::{DatabricksMcpError, Result};

/// Jobs API caps a page at this many entries
const MAX_PAGE_SIZE: u32 = 100;

/// Epoch milliseconds as RFC 3339
fn format_millis(ms: Option<i64>) -> Option<String> {
    ms.and_then(DateTime::from_timestamp_millis).map(|t| t.to_rfc3339())
}

fn job_payload(job: &Job) -> Value {
    json!({
        "job_id": job.job_id,
        "name": job.settings.as_ref().and_then(|s| s.get("name")).cloned(),
        "settings": job.settings,
        "created_time": job.created_time,
        "created_at": format_millis(job.created_time),
        "creator_user_name": job.creator_user_name,
    })
}

fn require_settings_object(field: &str, value: &Value) -> Result<()> {
    match value {
        Value::Object(map) if !map.is_empty() => Ok(()),
        _ => Err(DatabricksMcpError::InvalidInput(format!(
            "{} must be a non-empty JSON object",
            field
        ))),
    }
}

fn default_limit() -> u32 {
    25
}

#[derive(Debug, Deserialize)]
struct ListJobsArgs {
    #[serde(default = "default_limit")]
    limit: u32,
    #[serde(default)]
    offset: u32,
    #[serde(default)]
    expand_tasks: bool,
}

/// List jobs with paging
pub struct ListJobsTool;

impl Tool for ListJobsTool {
    fn name(&self) -> &'static str {
        "list_jobs"
    }

    fn description(&self) -> &'static str {
        "List jobs in the workspace. Supports limit/offset paging; expand_tasks includes task definitions."
    }

    fn input_schema(&self) -> Value {
        object_schema(
            json!({
                "limit": { "type": "integer", "minimum": 1, "maximum": MAX_PAGE_SIZE, "description": "Jobs per page (default 25)" },
                "offset": { "type": "integer", "minimum": 0, "description": "Jobs to skip (default 0)" },
                "expand_tasks": { "type": "boolean", "description": "Include task and cluster details" }
            }),
            &[],
        )
    }

    fn call(&self, input: Value, ctx: &ToolContext) -> Result<Value> {
        let args: ListJobsArgs = parse(input)?;
        let limit = args.limit.clamp(1, MAX_PAGE_SIZE);
        let (offset, expand) = (args.offset, args.expand_tasks);

        let page = ctx.remote(move |api| async move { api.list_jobs(limit, offset, expand).await })?;
        let jobs: Vec<Value> = page.jobs.iter().map(job_payload).collect();
        Ok(json!({
            "status": "success",
            "jobs": jobs,
            "count": jobs.len(),
            "offset": offset,
            "has_more": page.has_more,
        }))
    }
}

#[derive(Debug, Deserialize)]
struct JobIdArgs {
    job_id: i64,
}

fn job_id_schema() -> Value {
    object_schema(
        json!({ "job_id": { "type": "integer", "description": "Job ID" } }),
        &["job_id"],
    )
}

/// Get one job
pub struct GetJobTool;

impl Tool for GetJobTool {
    fn name(&self) -> &'static str {
        "get_job"
    }

    fn description(&self) -> &'static str {
        "Get the settings and metadata of a job."
    }

    fn input_schema(&self) -> Value {
        job_id_schema()
    }

    fn call(&self, input: Value, ctx: &ToolContext) -> Result<Value> {
        let JobIdArgs { job_id } = parse(input)?;
        let job = ctx.remote(move |api| async move { api.get_job(job_id).await })?;
        Ok(json!({ "status": "success", "job": job_payload(&job) }))
    }
}

#[derive(Debug, Deserialize)]
struct CreateJobArgs {
    settings: Value,
}

/// Create a job from a settings object
pub struct CreateJobTool;

impl Tool for CreateJobTool {
    fn name(&self) -> &'static str {
        "create_job"
    }

    fn description(&self) -> &'static str {
        "Create a job. settings follows the Jobs API create payload (name, tasks, schedule, ...)."
    }

    fn input_schema(&self) -> Value {
        object_schema(
            json!({ "settings": { "type": "object", "description": "Job settings" } }),
            &["settings"],
        )
    }

    fn call(&self, input: Value, ctx: &ToolContext) -> Result<Value> {
        let CreateJobArgs { settings } = parse(input)?;
        require_settings_object("settings", &settings)?;

        let job_id = ctx.remote(move |api| async move { api.create_job(&settings).await })?;
        Ok(json!({ "status": "success", "job_id": job_id, "message": "Job created" }))
    }
}

#[derive(Debug, Deserialize)]
struct RunJobArgs {
    job_id: i64,
    #[serde(default)]
    jar_params: Option<Vec<String>>,
    #[serde(default)]
    notebook_params: Option<BTreeMap<String, String>>,
    #[serde(default)]
    python_params: Option<Vec<String>>,
    #[serde(default)]
    spark_submit_params: Option<Vec<String>>,
}

/// Trigger a job run
pub struct RunJobTool;

impl Tool for RunJobTool {
    fn name(&self) -> &'static str {
        "run_job"
    }

    fn description(&self) -> &'static str {
        "Trigger a run of a job, optionally overriding jar, notebook, python or spark-submit parameters."
    }

    fn input_schema(&self) -> Value {
        object_schema(
            json!({
                "job_id": { "type": "integer", "description": "Job ID" },
                "jar_params": { "type": "array", "items": { "type": "string" } },
                "notebook_params": { "type": "object", "additionalProperties": { "type": "string" } },
                "python_params": { "type": "array", "items": { "type": "string" } },
                "spark_submit_params": { "type": "array", "items": { "type": "string" } }
            }),
            &["job_id"],
        )
    }

    fn call(&self, input: Value, ctx: &ToolContext) -> Result<Value> {
        let args: RunJobArgs = parse(input)?;
        let job_id = args.job_id;
        let params = RunParameters {
            jar_params: args.jar_params,
            notebook_params: args.notebook_params,
            python_params: args.python_params,
            spark_submit_params: args.spark_submit_params,
        };

        let run = ctx.remote(move |api| async move { api.run_job(job_id, &params).await })?;
        Ok(json!({
            "status": "success",
            "job_id": job_id,
            "run_id": run.run_id,
            "number_in_job": run.number_in_job,
            "message": "Job run initiated",
        }))
    }
}

#[derive(Debug, Deserialize)]
struct UpdateJobArgs {
    job_id: i64,
    new_settings: Value,
}

/// Partially update a job's settings
pub struct UpdateJobTool;

impl Tool for UpdateJobTool {
    fn name(&self) -> &'static str {
        "update_job"
    }

    fn description(&self) -> &'static str {
        "Update a job. Top-level fields in new_settings replace the existing ones; other fields are left alone."
    }

    fn input_schema(&self) -> Value {
        object_schema(
            json!({
                "job_id": { "type": "integer", "description": "Job ID" },
                "new_settings": { "type": "object", "description": "Fields to replace" }
            }),
            &["job_id", "new_settings"],
        )
    }

    fn call(&self, input: Value, ctx: &ToolContext) -> Result<Value> {
        let UpdateJobArgs { job_id, new_settings } = parse(input)?;
        require_settings_object("new_settings", &new_settings)?;

        ctx.remote(move |api| async move { api.update_job(job_id, &new_settings).await })?;
        Ok(json!({ "status": "success", "job_id": job_id, "message": "Job updated" }))
    }
}

/// Delete a job
pub struct DeleteJobTool;

impl Tool for DeleteJobTool {
    fn name(&self) -> &'static str {
        "delete_job"
    }

    fn description(&self) -> &'static str {
        "Delete a job. Active runs are cancelled."
    }

    fn input_schema(&self) -> Value {
        job_id_schema()
    }

    fn call(&self, input: Value, ctx: &ToolContext) -> Result<Value> {
        let JobIdArgs { job_id } = parse(input)?;
        ctx.remote(move |api| async move { api.delete_job(job_id).await })?;
        Ok(json!({ "status": "success", "job_id": job_id, "message": "Job deleted" }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MockWorkspace;
    use crate::tools::ToolSettings;
    use std::sync::Arc;

    fn ctx(mock: &Arc<MockWorkspace>) -> ToolContext {
        ToolContext::with_client(mock.clone(), ToolSettings::default())
    }

    #[test]
    fn test_format_millis() {
        assert_eq!(
            format_millis(Some(1_704_067_200_000)).as_deref(),
            Some("2024-01-01T00:00:00+00:00")
        );
        assert_eq!(format_millis(None), None);
    }

    #[test]
    fn test_list_jobs_defaults() {
        let mock = Arc::new(MockWorkspace::sample());
        let out = ListJobsTool.call(json!({}), &ctx(&mock)).unwrap();
        assert_eq!(out["count"], 1);
        assert_eq!(out["jobs"][0]["name"], "nightly-etl");
        assert_eq!(out["jobs"][0]["created_at"], "2024-01-01T00:00:00+00:00");
        assert!(out["jobs"][0]["settings"].get("tasks").is_none());
        assert_eq!(out["has_more"], false);
    }

    #[test]
    fn test_list_jobs_expand_tasks() {
        let mock = Arc::new(MockWorkspace::sample());
        let out = ListJobsTool.call(json!({ "expand_tasks": true }), &ctx(&mock)).unwrap();
        assert!(out["jobs"][0]["settings"]["tasks"].is_array());
    }

    #[test]
    fn test_get_job() {
        let mock = Arc::new(MockWorkspace::sample());
        let out = GetJobTool.call(json!({ "job_id": 101 }), &ctx(&mock)).unwrap();
        assert_eq!(out["job"]["creator_user_name"], "analyst@example.com");

        let err = GetJobTool.call(json!({ "job_id": "101" }), &ctx(&mock)).unwrap_err();
        assert_eq!(err.kind(), "invalid_input");
    }

    #[test]
    fn test_create_update_delete_job() {
        let mock = Arc::new(MockWorkspace::sample());
        let ctx = ctx(&mock);

        let out = CreateJobTool
            .call(json!({ "settings": { "name": "adhoc", "max_concurrent_runs": 1 } }), &ctx)
            .unwrap();
        let job_id = out["job_id"].as_i64().unwrap();

        UpdateJobTool
            .call(json!({ "job_id": job_id, "new_settings": { "name": "adhoc-v2" } }), &ctx)
            .unwrap();
        let out = GetJobTool.call(json!({ "job_id": job_id }), &ctx).unwrap();
        assert_eq!(out["job"]["name"], "adhoc-v2");
        assert_eq!(out["job"]["settings"]["max_concurrent_runs"], 1);

        DeleteJobTool.call(json!({ "job_id": job_id }), &ctx).unwrap();
        assert!(GetJobTool.call(json!({ "job_id": job_id }), &ctx).is_err());
    }

    #[test]
    fn test_create_job_requires_object() {
        let mock = Arc::new(MockWorkspace::sample());
        let err = CreateJobTool.call(json!({ "settings": {} }), &ctx(&mock)).unwrap_err();
        assert_eq!(err.kind(), "invalid_input");
        assert_eq!(mock.call_count(), 0);
    }

    #[test]
    fn test_run_job_with_params() {
        let mock = Arc::new(MockWorkspace::sample());
        let out = RunJobTool
            .call(
                json!({ "job_id": 101, "notebook_params": { "date": "2024-01-01" } }),
                &ctx(&mock),
            )
            .unwrap();
        assert_eq!(out["message"], "Job run initiated");
        assert!(out["run_id"].is_i64());

        let runs = mock.job_runs();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].0, 101);
        let params = runs[0].1.notebook_params.as_ref().unwrap();
        assert_eq!(params["date"], "2024-01-01");
        assert!(runs[0].1.jar_params.is_none());
    }
}
