//! Unity Catalog browsing tools

use regex::RegexBuilder;
use serde::Deserialize;
use serde_json::{Value, json};

use super::args::{non_empty, object_schema, parse};
use super::{Tool, ToolContext, ToolSettings};
use crate::client::TableInfo;
use crate::error::{DatabricksMcpError, Result};

/// Expand `table`, `schema.table` or `catalog.schema.table`; missing parts
/// come from `scope`, then from the configured defaults
fn resolve_table_name(name: &str, scope: &ScopeArgs, settings: &ToolSettings) -> Result<String> {
    let name = non_empty("table_name", name)?;
    let parts: Vec<&str> = name.split('.').map(str::trim).collect();
    if parts.iter().any(|p| p.is_empty()) {
        return Err(DatabricksMcpError::InvalidInput(format!("Malformed table name '{}'", name)));
    }
    match parts.as_slice() {
        [table] => Ok(format!("{}.{}.{}", scope.catalog(settings)?, scope.schema(settings)?, table)),
        [schema, table] => Ok(format!("{}.{}.{}", scope.catalog(settings)?, schema, table)),
        [catalog, schema, table] => Ok(format!("{}.{}.{}", catalog, schema, table)),
        _ => Err(DatabricksMcpError::InvalidInput(format!(
            "Table name '{}' has more than three parts",
            name
        ))),
    }
}

fn table_summary(table: &TableInfo) -> Value {
    json!({
        "name": table.name,
        "full_name": table.qualified_name(),
        "catalog": table.catalog_name,
        "schema": table.schema_name,
        "type": table.table_type,
        "comment": table.comment,
    })
}

#[derive(Debug, Default, Deserialize)]
struct ScopeArgs {
    #[serde(default, alias = "catalog")]
    catalog_name: Option<String>,
    #[serde(default, alias = "schema")]
    schema_name: Option<String>,
}

impl ScopeArgs {
    fn catalog(&self, settings: &ToolSettings) -> Result<String> {
        pick("catalog_name", self.catalog_name.as_deref(), &settings.default_catalog)
    }

    fn schema(&self, settings: &ToolSettings) -> Result<String> {
        pick("schema_name", self.schema_name.as_deref(), &settings.default_schema)
    }
}

fn pick(field: &str, given: Option<&str>, default: &str) -> Result<String> {
    match given.map(str::trim).filter(|v| !v.is_empty()) {
        Some(value) => Ok(value.to_string()),
        None if default.trim().is_empty() => Err(DatabricksMcpError::InvalidInput(format!(
            "{} is required: no default is configured",
            field
        ))),
        None => Ok(default.trim().to_string()),
    }
}

/// List all catalogs in the workspace
pub struct ListCatalogsTool;

impl Tool for ListCatalogsTool {
    fn name(&self) -> &'static str {
        "list_catalogs"
    }

    fn description(&self) -> &'static str {
        "List all Unity Catalog catalogs in the Databricks workspace."
    }

    fn input_schema(&self) -> Value {
        object_schema(json!({}), &[])
    }

    fn call(&self, _input: Value, ctx: &ToolContext) -> Result<Value> {
        let catalogs = ctx.remote(|api| async move { api.list_catalogs().await })?;
        let items: Vec<Value> = catalogs
            .iter()
            .map(|c| json!({ "name": c.name, "comment": c.comment, "owner": c.owner }))
            .collect();
        Ok(json!({ "catalogs": items, "count": items.len() }))
    }
}

/// List schemas in a catalog
pub struct ListSchemasTool;

impl Tool for ListSchemasTool {
    fn name(&self) -> &'static str {
        "list_schemas"
    }

    fn description(&self) -> &'static str {
        "List schemas in a catalog. Uses the default catalog when catalog_name is omitted."
    }

    fn input_schema(&self) -> Value {
        object_schema(
            json!({
                "catalog_name": { "type": "string", "description": "Catalog to list schemas from" }
            }),
            &[],
        )
    }

    fn call(&self, input: Value, ctx: &ToolContext) -> Result<Value> {
        let args: ScopeArgs = parse(input)?;
        let catalog = args.catalog(ctx.settings())?;

        let schemas = {
            let catalog = catalog.clone();
            ctx.remote(move |api| async move { api.list_schemas(&catalog).await })?
        };
        let items: Vec<Value> = schemas
            .iter()
            .map(|s| {
                json!({
                    "name": s.name,
                    "full_name": s.full_name.clone().unwrap_or_else(|| format!("{}.{}", s.catalog_name, s.name)),
                    "comment": s.comment,
                })
            })
            .collect();
        Ok(json!({ "catalog": catalog, "schemas": items, "count": items.len() }))
    }
}

/// List tables in a schema
pub struct ListTablesTool;

impl Tool for ListTablesTool {
    fn name(&self) -> &'static str {
        "list_tables"
    }

    fn description(&self) -> &'static str {
        "List tables in a schema. Uses the default catalog and schema when omitted."
    }

    fn input_schema(&self) -> Value {
        object_schema(
            json!({
                "catalog_name": { "type": "string", "description": "Catalog name" },
                "schema_name": { "type": "string", "description": "Schema name" }
            }),
            &[],
        )
    }

    fn call(&self, input: Value, ctx: &ToolContext) -> Result<Value> {
        let args: ScopeArgs = parse(input)?;
        let catalog = args.catalog(ctx.settings())?;
        let schema = args.schema(ctx.settings())?;

        let tables = {
            let (catalog, schema) = (catalog.clone(), schema.clone());
            ctx.remote(move |api| async move { api.list_tables(&catalog, &schema).await })?
        };
        let items: Vec<Value> = tables.iter().map(table_summary).collect();
        Ok(json!({ "catalog": catalog, "schema": schema, "tables": items, "count": items.len() }))
    }
}

#[derive(Debug, Deserialize)]
struct TableArgs {
    table_name: String,
    #[serde(flatten)]
    scope: ScopeArgs,
}

/// Describe a table and its columns
pub struct GetTableInfoTool;

impl Tool for GetTableInfoTool {
    fn name(&self) -> &'static str {
        "get_table_info"
    }

    fn description(&self) -> &'static str {
        "Get detailed information about a table, including its columns. Accepts table, schema.table or catalog.schema.table; unqualified names use catalog_name and schema_name, then the defaults."
    }

    fn input_schema(&self) -> Value {
        object_schema(
            json!({
                "table_name": { "type": "string", "description": "Table name, optionally qualified" },
                "catalog_name": { "type": "string", "description": "Catalog for an unqualified table name (default catalog if omitted)" },
                "schema_name": { "type": "string", "description": "Schema for an unqualified table name (default schema if omitted)" }
            }),
            &["table_name"],
        )
    }

    fn call(&self, input: Value, ctx: &ToolContext) -> Result<Value> {
        let args: TableArgs = parse(input)?;
        let full_name = resolve_table_name(&args.table_name, &args.scope, ctx.settings())?;

        let table = ctx.remote(move |api| async move { api.get_table(&full_name).await })?;
        let columns: Vec<Value> = table
            .columns
            .iter()
            .map(|c| {
                json!({
                    "name": c.name,
                    "type": c.type_text.clone().or_else(|| c.type_name.clone()),
                    "nullable": c.nullable,
                    "comment": c.comment,
                })
            })
            .collect();

        Ok(json!({
            "name": table.name,
            "full_name": table.qualified_name(),
            "catalog": table.catalog_name,
            "schema": table.schema_name,
            "table_type": table.table_type,
            "data_source_format": table.data_source_format,
            "comment": table.comment,
            "storage_location": table.storage_location,
            "columns": columns,
            "column_count": columns.len(),
        }))
    }
}

#[derive(Debug, Deserialize)]
struct SearchArgs {
    pattern: String,
    #[serde(flatten)]
    scope: ScopeArgs,
}

/// Regex search over table names in a schema
pub struct SearchTablesTool;

impl Tool for SearchTablesTool {
    fn name(&self) -> &'static str {
        "search_tables"
    }

    fn description(&self) -> &'static str {
        "Search for tables whose names match a case-insensitive regular expression within a catalog and schema."
    }

    fn input_schema(&self) -> Value {
        object_schema(
            json!({
                "pattern": { "type": "string", "description": "Regular expression matched against table names" },
                "catalog_name": { "type": "string", "description": "Catalog name (default catalog if omitted)" },
                "schema_name": { "type": "string", "description": "Schema name (default schema if omitted)" }
            }),
            &["pattern"],
        )
    }

    fn call(&self, input: Value, ctx: &ToolContext) -> Result<Value> {
        let args: SearchArgs = parse(input)?;
        let matcher = RegexBuilder::new(&args.pattern)
            .case_insensitive(true)
            .build()
            .map_err(|e| DatabricksMcpError::InvalidInput(format!("Invalid pattern '{}': {}", args.pattern, e)))?;
        let catalog = args.scope.catalog(ctx.settings())?;
        let schema = args.scope.schema(ctx.settings())?;

        let tables = {
            let (catalog, schema) = (catalog.clone(), schema.clone());
            ctx.remote(move |api| async move { api.list_tables(&catalog, &schema).await })?
        };
        let matches: Vec<Value> = tables
            .iter()
            .filter(|t| matcher.is_match(&t.name))
            .map(table_summary)
            .collect();

        Ok(json!({
            "pattern": args.pattern,
            "catalog": catalog,
            "schema": schema,
            "matches": matches,
            "match_count": matches.len(),
            "total_tables_searched": tables.len(),
        }))
    }
}
