//! DBFS file tools

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::Deserialize;
use serde_json::{Value, json};

use super::args::{non_empty, object_schema, parse};
use super::{Tool, ToolContext};
use crate::error::{DatabricksMcpError, Result};

/// DBFS read and put calls move at most 1 MiB per request
pub const MAX_BLOCK_BYTES: u64 = 1024 * 1024;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
enum Encoding {
    #[default]
    #[serde(rename = "utf-8", alias = "utf8", alias = "text")]
    Utf8,
    #[serde(rename = "base64")]
    Base64,
}

impl Encoding {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Utf8 => "utf-8",
            Self::Base64 => "base64",
        }
    }
}

/// Text when the bytes are UTF-8, base64 otherwise
fn render(data: Vec<u8>) -> (String, Encoding) {
    match String::from_utf8(data) {
        Ok(text) => (text, Encoding::Utf8),
        Err(e) => (BASE64.encode(e.into_bytes()), Encoding::Base64),
    }
}

fn root() -> String {
    "/".to_string()
}

#[derive(Debug, Deserialize)]
struct ListArgs {
    #[serde(default = "root")]
    path: String,
}

/// List a DBFS directory
pub struct ListFilesTool;

impl Tool for ListFilesTool {
    fn name(&self) -> &'static str {
        "list_files"
    }

    fn description(&self) -> &'static str {
        "List files and directories in a DBFS path (default: /)."
    }

    fn input_schema(&self) -> Value {
        object_schema(
            json!({ "path": { "type": "string", "description": "DBFS directory (default /)" } }),
            &[],
        )
    }

    fn call(&self, input: Value, ctx: &ToolContext) -> Result<Value> {
        let args: ListArgs = parse(input)?;
        let path = non_empty("path", &args.path)?.to_string();

        let files = ctx.remote({
            let path = path.clone();
            move |api| async move { api.list_files(&path).await }
        })?;
        Ok(json!({
            "status": "success",
            "path": path,
            "files": files,
            "count": files.len(),
        }))
    }
}

#[derive(Debug, Deserialize)]
struct PathArgs {
    path: String,
}

/// Status of a single DBFS path
pub struct GetFileInfoTool;

impl Tool for GetFileInfoTool {
    fn name(&self) -> &'static str {
        "get_file_info"
    }

    fn description(&self) -> &'static str {
        "Get size, type and modification time of a DBFS file or directory."
    }

    fn input_schema(&self) -> Value {
        object_schema(
            json!({ "path": { "type": "string", "description": "DBFS path" } }),
            &["path"],
        )
    }

    fn call(&self, input: Value, ctx: &ToolContext) -> Result<Value> {
        let args: PathArgs = parse(input)?;
        let path = non_empty("path", &args.path)?.to_string();
        let info = ctx.remote(move |api| async move { api.get_file_status(&path).await })?;
        Ok(json!({ "status": "success", "file": info }))
    }
}

#[derive(Debug, Deserialize)]
struct ReadArgs {
    path: String,
    #[serde(default)]
    offset: u64,
    #[serde(default)]
    length: Option<u64>,
}

/// Read a block of a DBFS file
pub struct ReadFileTool;

impl Tool for ReadFileTool {
    fn name(&self) -> &'static str {
        "read_file"
    }

    fn description(&self) -> &'static str {
        "Read up to 1 MiB of a DBFS file starting at offset. UTF-8 content is returned as text, anything else as base64."
    }

    fn input_schema(&self) -> Value {
        object_schema(
            json!({
                "path": { "type": "string", "description": "DBFS file path" },
                "offset": { "type": "integer", "minimum": 0, "description": "Byte offset (default 0)" },
                "length": { "type": "integer", "minimum": 1, "maximum": MAX_BLOCK_BYTES, "description": "Bytes to read (default and max 1 MiB)" }
            }),
            &["path"],
        )
    }

    fn call(&self, input: Value, ctx: &ToolContext) -> Result<Value> {
        let args: ReadArgs = parse(input)?;
        let path = non_empty("path", &args.path)?.to_string();
        let offset = args.offset;
        let length = match args.length {
            Some(0) => return Err(DatabricksMcpError::InvalidInput("length must be positive".to_string())),
            Some(n) => n.min(MAX_BLOCK_BYTES),
            None => MAX_BLOCK_BYTES,
        };

        let chunk = ctx.remote({
            let path = path.clone();
            move |api| async move { api.read_file(&path, offset, length).await }
        })?;
        let bytes_read = chunk.bytes_read;
        let (content, encoding) = render(chunk.data);

        Ok(json!({
            "status": "success",
            "path": path,
            "offset": offset,
            "bytes_read": bytes_read,
            "encoding": encoding.as_str(),
            "content": content,
        }))
    }
}

#[derive(Debug, Deserialize)]
struct PutArgs {
    path: String,
    content: String,
    #[serde(default)]
    encoding: Encoding,
    #[serde(default)]
    overwrite: bool,
}

/// Write a small file to DBFS
pub struct PutFileTool;

impl Tool for PutFileTool {
    fn name(&self) -> &'static str {
        "put_file"
    }

    fn description(&self) -> &'static str {
        "Write a file to DBFS (at most 1 MiB). Content is UTF-8 text unless encoding is base64."
    }

    fn input_schema(&self) -> Value {
        object_schema(
            json!({
                "path": { "type": "string", "description": "DBFS file path" },
                "content": { "type": "string", "description": "File content" },
                "encoding": { "type": "string", "enum": ["utf-8", "base64"], "description": "Content encoding (default utf-8)" },
                "overwrite": { "type": "boolean", "description": "Replace an existing file" }
            }),
            &["path", "content"],
        )
    }

    fn call(&self, input: Value, ctx: &ToolContext) -> Result<Value> {
        let args: PutArgs = parse(input)?;
        let path = non_empty("path", &args.path)?.to_string();
        let data = match args.encoding {
            Encoding::Utf8 => args.content.into_bytes(),
            Encoding::Base64 => BASE64
                .decode(args.content.trim().as_bytes())
                .map_err(|e| DatabricksMcpError::InvalidInput(format!("content is not valid base64: {}", e)))?,
        };
        if data.len() as u64 > MAX_BLOCK_BYTES {
            return Err(DatabricksMcpError::InvalidInput(format!(
                "content is {} bytes; put_file accepts at most {}",
                data.len(),
                MAX_BLOCK_BYTES
            )));
        }

        let size = data.len();
        let overwrite = args.overwrite;
        ctx.remote({
            let path = path.clone();
            move |api| async move { api.put_file(&path, &data, overwrite).await }
        })?;
        Ok(json!({
            "status": "success",
            "path": path,
            "bytes_written": size,
            "message": "File written",
        }))
    }
}

#[derive(Debug, Deserialize)]
struct DeleteArgs {
    path: String,
    #[serde(default)]
    recursive: bool,
}

/// Delete a DBFS file or directory
pub struct DeleteFileTool;

impl Tool for DeleteFileTool {
    fn name(&self) -> &'static str {
        "delete_file"
    }

    fn description(&self) -> &'static str {
        "Delete a DBFS file or directory. Non-empty directories need recursive=true."
    }

    fn input_schema(&self) -> Value {
        object_schema(
            json!({
                "path": { "type": "string", "description": "DBFS path" },
                "recursive": { "type": "boolean", "description": "Delete directory contents too" }
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
            move |api| async move { api.delete_file(&path, recursive).await }
        })?;
        Ok(json!({ "status": "success", "path": path, "message": "Deleted" }))
    }
}
