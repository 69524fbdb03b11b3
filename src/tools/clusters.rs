//! Cluster management tools

use serde::Deserialize;
use serde_json::{Value, json};

use super::args::{non_empty, object_schema, parse};
use super::{Tool, ToolContext};
use crate::client::{ClusterInfo, ClusterSize, ClusterSpec};
use crate::error::{DatabricksMcpError, Result};

fn cluster_summary(cluster: &ClusterInfo) -> Value {
    json!({
        "cluster_id": cluster.cluster_id,
        "cluster_name": cluster.cluster_name,
        "state": cluster.state,
        "node_type_id": cluster.node_type_id,
        "num_workers": cluster.num_workers,
        "autoscale": cluster.autoscale,
        "spark_version": cluster.spark_version,
    })
}

fn cluster_id_schema() -> Value {
    object_schema(
        json!({ "cluster_id": { "type": "string", "description": "Cluster ID" } }),
        &["cluster_id"],
    )
}

#[derive(Debug, Deserialize)]
struct ClusterIdArgs {
    cluster_id: String,
}

/// List all clusters
pub struct ListClustersTool;

impl Tool for ListClustersTool {
    fn name(&self) -> &'static str {
        "list_clusters"
    }

    fn description(&self) -> &'static str {
        "List all clusters in the workspace with their state and size."
    }

    fn input_schema(&self) -> Value {
        object_schema(json!({}), &[])
    }

    fn call(&self, _input: Value, ctx: &ToolContext) -> Result<Value> {
        let clusters = ctx.remote(|api| async move { api.list_clusters().await })?;
        let items: Vec<Value> = clusters.iter().map(cluster_summary).collect();
        Ok(json!({ "status": "success", "clusters": items, "count": items.len() }))
    }
}

/// Get one cluster's full details
pub struct GetClusterTool;

impl Tool for GetClusterTool {
    fn name(&self) -> &'static str {
        "get_cluster"
    }

    fn description(&self) -> &'static str {
        "Get detailed information about a specific cluster."
    }

    fn input_schema(&self) -> Value {
        cluster_id_schema()
    }

    fn call(&self, input: Value, ctx: &ToolContext) -> Result<Value> {
        let args: ClusterIdArgs = parse(input)?;
        let cluster_id = non_empty("cluster_id", &args.cluster_id)?.to_string();
        let cluster = ctx.remote(move |api| async move { api.get_cluster(&cluster_id).await })?;
        Ok(json!({ "status": "success", "cluster": cluster }))
    }
}

#[derive(Debug, Deserialize)]
struct CreateClusterArgs {
    cluster_name: String,
    spark_version: String,
    node_type_id: String,
    #[serde(default)]
    num_workers: Option<u32>,
    #[serde(default)]
    autoscale_min_workers: Option<u32>,
    #[serde(default)]
    autoscale_max_workers: Option<u32>,
    #[serde(default, alias = "autotermination_minutes")]
    auto_termination_minutes: Option<u32>,
}

/// Create a cluster with fixed or autoscaled workers
pub struct CreateClusterTool;

impl Tool for CreateClusterTool {
    fn name(&self) -> &'static str {
        "create_cluster"
    }

    fn description(&self) -> &'static str {
        "Create a new cluster. Give num_workers for a fixed size, or autoscale_min_workers and autoscale_max_workers together."
    }

    fn input_schema(&self) -> Value {
        object_schema(
            json!({
                "cluster_name": { "type": "string", "description": "Cluster name" },
                "spark_version": { "type": "string", "description": "Runtime version, e.g. 14.3.x-scala2.12" },
                "node_type_id": { "type": "string", "description": "Node type, e.g. i3.xlarge" },
                "num_workers": { "type": "integer", "minimum": 0, "description": "Fixed number of workers" },
                "autoscale_min_workers": { "type": "integer", "minimum": 0, "description": "Autoscale lower bound" },
                "autoscale_max_workers": { "type": "integer", "minimum": 1, "description": "Autoscale upper bound" },
                "auto_termination_minutes": { "type": "integer", "minimum": 0, "description": "Idle minutes before automatic termination" }
            }),
            &["cluster_name", "spark_version", "node_type_id"],
        )
    }

    fn call(&self, input: Value, ctx: &ToolContext) -> Result<Value> {
        let args: CreateClusterArgs = parse(input)?;
        let size = ClusterSize::from_parts(args.num_workers, args.autoscale_min_workers, args.autoscale_max_workers)?;
        let spec = ClusterSpec::new(
            non_empty("cluster_name", &args.cluster_name)?,
            non_empty("spark_version", &args.spark_version)?,
            non_empty("node_type_id", &args.node_type_id)?,
        )
        .with_size(size)
        .with_autotermination(args.auto_termination_minutes);

        let cluster_name = spec.cluster_name.clone();
        let cluster_id = ctx.remote(move |api| async move { api.create_cluster(&spec).await })?;
        Ok(json!({
            "status": "success",
            "cluster_id": cluster_id,
            "cluster_name": cluster_name,
            "message": "Cluster creation initiated",
        }))
    }
}

/// Start, terminate and restart share everything but the remote call
#[derive(Debug, Clone, Copy)]
enum Lifecycle {
    Start,
    Terminate,
    Restart,
}

impl Lifecycle {
    fn call(self, input: Value, ctx: &ToolContext) -> Result<Value> {
        let args: ClusterIdArgs = parse(input)?;
        let cluster_id = non_empty("cluster_id", &args.cluster_id)?.to_string();
        {
            let cluster_id = cluster_id.clone();
            ctx.remote(move |api| async move {
                match self {
                    Self::Start => api.start_cluster(&cluster_id).await,
                    Self::Terminate => api.terminate_cluster(&cluster_id).await,
                    Self::Restart => api.restart_cluster(&cluster_id).await,
                }
            })?;
        }
        let message = match self {
            Self::Start => "Cluster start initiated",
            Self::Terminate => "Cluster termination initiated",
            Self::Restart => "Cluster restart initiated",
        };
        Ok(json!({ "status": "success", "cluster_id": cluster_id, "message": message }))
    }
}

/// Start a terminated cluster
pub struct StartClusterTool;

impl Tool for StartClusterTool {
    fn name(&self) -> &'static str {
        "start_cluster"
    }

    fn description(&self) -> &'static str {
        "Start a terminated cluster."
    }

    fn input_schema(&self) -> Value {
        cluster_id_schema()
    }

    fn call(&self, input: Value, ctx: &ToolContext) -> Result<Value> {
        Lifecycle::Start.call(input, ctx)
    }
}

/// Terminate a running cluster
pub struct TerminateClusterTool;

impl Tool for TerminateClusterTool {
    fn name(&self) -> &'static str {
        "terminate_cluster"
    }

    fn description(&self) -> &'static str {
        "Terminate a cluster. Its configuration is kept and it can be started again."
    }

    fn input_schema(&self) -> Value {
        cluster_id_schema()
    }

    fn call(&self, input: Value, ctx: &ToolContext) -> Result<Value> {
        Lifecycle::Terminate.call(input, ctx)
    }
}

/// Restart a running cluster
pub struct RestartClusterTool;

impl Tool for RestartClusterTool {
    fn name(&self) -> &'static str {
        "restart_cluster"
    }

    fn description(&self) -> &'static str {
        "Restart a running cluster."
    }

    fn input_schema(&self) -> Value {
        cluster_id_schema()
    }

    fn call(&self, input: Value, ctx: &ToolContext) -> Result<Value> {
        Lifecycle::Restart.call(input, ctx)
    }
}

#[derive(Debug, Deserialize)]
struct ResizeClusterArgs {
    cluster_id: String,
    #[serde(default)]
    num_workers: Option<u32>,
    #[serde(default)]
    autoscale_min_workers: Option<u32>,
    #[serde(default)]
    autoscale_max_workers: Option<u32>,
}

/// Change a cluster's worker count or autoscale bounds
pub struct ResizeClusterTool;

impl Tool for ResizeClusterTool {
    fn name(&self) -> &'static str {
        "resize_cluster"
    }

    fn description(&self) -> &'static str {
        "Resize a running cluster to a fixed number of workers or new autoscale bounds."
    }

    fn input_schema(&self) -> Value {
        object_schema(
            json!({
                "cluster_id": { "type": "string", "description": "Cluster ID" },
                "num_workers": { "type": "integer", "minimum": 0, "description": "New fixed number of workers" },
                "autoscale_min_workers": { "type": "integer", "minimum": 0, "description": "New autoscale lower bound" },
                "autoscale_max_workers": { "type": "integer", "minimum": 1, "description": "New autoscale upper bound" }
            }),
            &["cluster_id"],
        )
    }

    fn call(&self, input: Value, ctx: &ToolContext) -> Result<Value> {
        let args: ResizeClusterArgs = parse(input)?;
        let cluster_id = non_empty("cluster_id", &args.cluster_id)?.to_string();
        let size = ClusterSize::from_parts(args.num_workers, args.autoscale_min_workers, args.autoscale_max_workers)?
            .ok_or_else(|| {
                DatabricksMcpError::InvalidInput(
                    "num_workers or autoscale_min_workers/autoscale_max_workers is required".to_string(),
                )
            })?;

        {
            let cluster_id = cluster_id.clone();
            ctx.remote(move |api| async move { api.resize_cluster(&cluster_id, &size).await })?;
        }
        Ok(json!({
            "status": "success",
            "cluster_id": cluster_id,
            "size": size.to_fields(),
            "message": "Cluster resize initiated",
        }))
    }
}
