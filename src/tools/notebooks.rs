//! Workspace notebook tools

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use super::args::{non_empty, object_schema, parse};
use super::{Tool, ToolContext};
use crate::client::{ExportFormat, NotebookImport, NotebookLanguage};
use crate::error::{DatabricksMcpError, Result};

/// Parse an upper-case API enum, accepting any casing from the caller
fn parse_enum<T: DeserializeOwned>(field: &str, raw: &str) -> Result<T> {
    serde_json::from_value(Value::String(raw.trim().to_ascii_uppercase()))
        .map_err(|_| DatabricksMcpError::InvalidInput(format!("Unsupported {}: {}", field, raw)))
}

fn path_schema(description: &str) -> Value {
    object_schema(
        json!({ "path": { "type": "string", "description": description } }),
        &["path"],
    )
}

#[derive(Debug, Deserialize)]
struct PathArgs {
    path: String,
}

#[derive(Debug, Deserialize)]
struct ListArgs {
    #[serde(default = "root")]
    path: String,
}

fn root() -> String {
    "/".to_string()
}

/// List notebooks and folders under a workspace path
pub struct ListNotebooksTool;

impl Tool for ListNotebooksTool {
    fn name(&self) -> &'static str {
        "list_notebooks"
    }

    fn description(&self) -> &'static str {
        "List notebooks, files and folders directly under a workspace path (default: /)."
    }

    fn input_schema(&self) -> Value {
        object_schema(
            json!({ "path": { "type": "string", "description": "Workspace folder (default /)" } }),
            &[],
        )
    }

    fn call(&self, input: Value, ctx: &ToolContext) -> Result<Value> {
        let args: ListArgs = parse(input)?;
        let path = non_empty("path", &args.path)?.to_string();

        let objects = ctx.remote({
            let path = path.clone();
            move |api| async move { api.list_workspace(&path).await }
        })?;
        Ok(json!({
            "status": "success",
            "path": path,
            "objects": objects,
            "count": objects.len(),
        }))
    }
}

/// Status of a single workspace object
pub struct GetNotebookTool;

impl Tool for GetNotebookTool {
    fn name(&self) -> &'static str {
        "get_notebook"
    }

    fn description(&self) -> &'static str {
        "Get the type, language and timestamps of a notebook or workspace object."
    }

    fn input_schema(&self) -> Value {
        path_schema("Workspace path of the notebook")
    }

    fn call(&self, input: Value, ctx: &ToolContext) -> Result<Value> {
        let args: PathArgs = parse(input)?;
        let path = non_empty("path", &args.path)?.to_string();
        let info = ctx.remote(move |api| async move { api.get_workspace_status(&path).await })?;
        Ok(json!({ "status": "success", "notebook": info }))
    }
}

#[derive(Debug, Deserialize)]
struct ExportArgs {
    path: String,
    #[serde(default)]
    format: Option<String>,
}

/// Export notebook content
pub struct ExportNotebookTool;

impl Tool for ExportNotebookTool {
    fn name(&self) -> &'static str {
        "export_notebook"
    }

    fn description(&self) -> &'static str {
        "Export a notebook. Text formats are returned as UTF-8; DBC archives and other binary content come back base64 encoded."
    }

    fn input_schema(&self) -> Value {
        object_schema(
            json!({
                "path": { "type": "string", "description": "Workspace path of the notebook" },
                "format": {
                    "type": "string",
                    "enum": ["SOURCE", "HTML", "JUPYTER", "DBC", "R_MARKDOWN", "AUTO"],
                    "description": "Export format (default SOURCE)"
                }
            }),
            &["path"],
        )
    }

    fn call(&self, input: Value, ctx: &ToolContext) -> Result<Value> {
        let args: ExportArgs = parse(input)?;
        let path = non_empty("path", &args.path)?.to_string();
        let format: ExportFormat = match args.format.as_deref() {
            Some(raw) => parse_enum("format", raw)?,
            None => ExportFormat::default(),
        };

        let exported = ctx.remote({
            let path = path.clone();
            move |api| async move { api.export_notebook(&path, format).await }
        })?;

        let text = if format.is_textual() {
            String::from_utf8(exported.decoded()?).ok()
        } else {
            None
        };
        let (content, encoding) = match text {
            Some(text) => (text, "utf-8"),
            None => (exported.content.clone(), "base64"),
        };

        Ok(json!({
            "status": "success",
            "path": path,
            "format": format.as_str(),
            "file_type": exported.file_type,
            "encoding": encoding,
            "content": content,
        }))
    }
}

#[derive(Debug, Deserialize)]
struct ImportArgs {
    path: String,
    content: String,
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    format: Option<String>,
    #[serde(default)]
    overwrite: bool,
}

/// Create or replace a notebook
pub struct ImportNotebookTool;

impl Tool for ImportNotebookTool {
    fn name(&self) -> &'static str {
        "import_notebook"
    }

    fn description(&self) -> &'static str {
        "Import notebook content into the workspace. SOURCE imports need a language (PYTHON, SQL, SCALA, R)."
    }

    fn input_schema(&self) -> Value {
        object_schema(
            json!({
                "path": { "type": "string", "description": "Destination workspace path" },
                "content": { "type": "string", "description": "Notebook source text" },
                "language": { "type": "string", "enum": ["PYTHON", "SQL", "SCALA", "R"] },
                "format": {
                    "type": "string",
                    "enum": ["SOURCE", "HTML", "JUPYTER", "DBC", "R_MARKDOWN", "AUTO"],
                    "description": "Content format (default SOURCE)"
                },
                "overwrite": { "type": "boolean", "description": "Replace an existing notebook" }
            }),
            &["path", "content"],
        )
    }

    fn call(&self, input: Value, ctx: &ToolContext) -> Result<Value> {
        let args: ImportArgs = parse(input)?;
        let path = non_empty("path", &args.path)?.to_string();
        let format: ExportFormat = match args.format.as_deref() {
            Some(raw) => parse_enum("format", raw)?,
            None => ExportFormat::default(),
        };
        let language: Option<NotebookLanguage> = args
            .language
            .as_deref()
            .map(|raw| parse_enum("language", raw))
            .transpose()?;
        if format == ExportFormat::Source && language.is_none() {
            return Err(DatabricksMcpError::InvalidInput(
                "language is required when importing SOURCE content".to_string(),
            ));
        }

        let request = NotebookImport {
            path: path.clone(),
            format,
            language,
            content: args.content,
            overwrite: args.overwrite,
        };
        ctx.remote(move |api| async move { api.import_notebook(&request).await })?;

        Ok(json!({
            "status": "success",
            "path": path,
            "message": "Notebook imported",
        }))
    }
}

#[derive(Debug, Deserialize)]
struct DeleteArgs {
    path: String,
    #[serde(default)]
    recursive: bool,
}

/// Delete a notebook or folder
pub struct DeleteNotebookTool;

impl Tool for DeleteNotebookTool {
    fn name(&self) -> &'static str {
        "delete_notebook"
    }

    fn description(&self) -> &'static str {
        "Delete a notebook or folder. Non-empty folders need recursive=true."
    }

    fn input_schema(&self) -> Value {
        object_schema(
            json!({
                "path": { "type": "string", "description": "Workspace path" },
                "recursive": { "type": "boolean", "description": "Delete folder contents too" }
            }),
            &["path"],
        )
    }

    fn call(&self, input: Value, ctx: &ToolContext) -> Result<Value> {
        let args: DeleteArgs = parse(input)?;
        let path = non_empty("path", &args.path)?.to_string();
        let recursive = args.recursive;

        ctx.remote({
            let path = path.clone();
            move |api| async move { api.delete_workspace_object(&path, recursive).await }
        })?;
        Ok(json!({ "status": "success", "path": path, "message": "Deleted" }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MockWorkspace;
    use crate::tools::ToolSettings;
    use std::sync::Arc;

    const NOTEBOOK: &str = "/Users/analyst@example.com/exploration";

    fn ctx(mock: &Arc<MockWorkspace>) -> ToolContext {
        ToolContext::with_client(mock.clone(), ToolSettings::default())
    }

    #[test]
    fn test_parse_enum_any_case() {
        let fmt: ExportFormat = parse_enum("format", "jupyter").unwrap();
        assert_eq!(fmt, ExportFormat::Jupyter);
        let lang: NotebookLanguage = parse_enum("language", " sql ").unwrap();
        assert_eq!(lang, NotebookLanguage::Sql);
        let err = parse_enum::<ExportFormat>("format", "pdf").unwrap_err();
        assert!(err.to_string().contains("Unsupported format: pdf"));
    }

    #[test]
    fn test_list_notebooks() {
        let mock = Arc::new(MockWorkspace::sample());
        let out = ListNotebooksTool
            .call(json!({ "path": "/Users/analyst@example.com" }), &ctx(&mock))
            .unwrap();
        assert_eq!(out["count"], 1);
        assert_eq!(out["objects"][0]["path"], NOTEBOOK);
        assert_eq!(out["objects"][0]["object_type"], "NOTEBOOK");

        let out = ListNotebooksTool.call(json!({}), &ctx(&mock)).unwrap();
        assert_eq!(out["path"], "/");
        assert_eq!(out["objects"][0]["path"], "/Users");
    }

    #[test]
    fn test_get_notebook() {
        let mock = Arc::new(MockWorkspace::sample());
        let out = GetNotebookTool.call(json!({ "path": NOTEBOOK }), &ctx(&mock)).unwrap();
        assert_eq!(out["notebook"]["language"], "PYTHON");

        let err = GetNotebookTool.call(json!({ "path": "/nope" }), &ctx(&mock)).unwrap_err();
        assert_eq!(err.kind(), "remote_validation");
    }

    #[test]
    fn test_export_source_is_text() {
        let mock = Arc::new(MockWorkspace::sample());
        let out = ExportNotebookTool.call(json!({ "path": NOTEBOOK }), &ctx(&mock)).unwrap();
        assert_eq!(out["format"], "SOURCE");
        assert_eq!(out["encoding"], "utf-8");
        assert_eq!(out["file_type"], "py");
        assert_eq!(out["content"], mock.notebook_source(NOTEBOOK).unwrap());
    }

    #[test]
    fn test_export_dbc_stays_base64() {
        let mock = Arc::new(MockWorkspace::sample());
        let out = ExportNotebookTool
            .call(json!({ "path": NOTEBOOK, "format": "DBC" }), &ctx(&mock))
            .unwrap();
        assert_eq!(out["encoding"], "base64");
        let decoded = BASE64.decode(out["content"].as_str().unwrap()).unwrap();
        assert_eq!(decoded, mock.notebook_source(NOTEBOOK).unwrap().into_bytes());
    }

    #[test]
    fn test_import_requires_language_for_source() {
        let mock = Arc::new(MockWorkspace::sample());
        let err = ImportNotebookTool
            .call(json!({ "path": "/Users/new", "content": "SELECT 1" }), &ctx(&mock))
            .unwrap_err();
        assert_eq!(err.kind(), "invalid_input");
        assert_eq!(mock.call_count(), 0);
    }

    #[test]
    fn test_import_then_export() {
        let mock = Arc::new(MockWorkspace::sample());
        let ctx = ctx(&mock);
        ImportNotebookTool
            .call(
                json!({ "path": "/Users/report", "content": "SELECT 1", "language": "sql" }),
                &ctx,
            )
            .unwrap();
        assert_eq!(mock.notebook_source("/Users/report").as_deref(), Some("SELECT 1"));

        let out = ExportNotebookTool.call(json!({ "path": "/Users/report" }), &ctx).unwrap();
        assert_eq!(out["content"], "SELECT 1");
        assert_eq!(out["file_type"], "sql");
    }

    #[test]
    fn test_import_existing_needs_overwrite() {
        let mock = Arc::new(MockWorkspace::sample());
        let ctx = ctx(&mock);
        let input = json!({ "path": NOTEBOOK, "content": "print(2)", "language": "PYTHON" });
        let err = ImportNotebookTool.call(input.clone(), &ctx).unwrap_err();
        assert_eq!(err.kind(), "remote_validation");

        let mut input = input;
        input["overwrite"] = json!(true);
        ImportNotebookTool.call(input, &ctx).unwrap();
        assert_eq!(mock.notebook_source(NOTEBOOK).as_deref(), Some("print(2)"));
    }

    #[test]
    fn test_delete_folder_needs_recursive() {
        let mock = Arc::new(MockWorkspace::sample());
        let ctx = ctx(&mock);
        let folder = "/Users/analyst@example.com";
        assert!(DeleteNotebookTool.call(json!({ "path": folder }), &ctx).is_err());

        DeleteNotebookTool
            .call(json!({ "path": folder, "recursive": true }), &ctx)
            .unwrap();
        assert!(mock.notebook_source(NOTEBOOK).is_none());
    }
}
