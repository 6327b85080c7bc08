use async_trait::async_trait;
use serde_json::{json, Value};
use std::path::{Component, Path, PathBuf};
use tracing::debug;
use uranus_core::{Error, Result};

use crate::{safe_truncate, str_param, ParamSpec, Tool, ToolContext, ToolSchema, Trigger};

/// Scratch key for the most recently read or written file.
pub const LAST_FILE_KEY: &str = "last_file";

const OPERATIONS: &[&str] = &["read", "write", "append", "list", "exists", "delete"];
const MAX_READ_BYTES: usize = 100_000;

/// Resolve `raw` against the workspace and refuse anything that escapes it.
///
/// Works lexically so paths that do not exist yet can be checked, then
/// canonicalizes the nearest existing ancestor to catch symlinks pointing
/// outside the sandbox.
pub fn sandboxed_path(workspace: &Path, raw: &str) -> Result<PathBuf> {
    let joined = if Path::new(raw).is_absolute() {
        PathBuf::from(raw)
    } else {
        workspace.join(raw)
    };

    let mut normalized = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::ParentDir => {
                if !normalized.pop() {
                    return Err(escape_error(raw));
                }
            }
            Component::CurDir => {}
            other => normalized.push(other.as_os_str()),
        }
    }
    if !normalized.starts_with(workspace) {
        return Err(escape_error(raw));
    }

    // Resolve the deepest part of the path that exists so a symlinked
    // directory cannot carry a new file outside the sandbox.
    let existing = normalized
        .ancestors()
        .find(|p| p.exists())
        .unwrap_or(workspace);
    if let Ok(real) = existing.canonicalize() {
        let root = workspace
            .canonicalize()
            .unwrap_or_else(|_| workspace.to_path_buf());
        if !real.starts_with(&root) {
            return Err(escape_error(raw));
        }
    }
    Ok(normalized)
}

fn escape_error(raw: &str) -> Error {
    Error::PermissionDenied(format!("Access denied: '{}' is outside the workspace", raw))
}

fn relative(workspace: &Path, path: &Path) -> String {
    path.strip_prefix(workspace)
        .unwrap_or(path)
        .display()
        .to_string()
}

pub struct FileOpsTool;

#[async_trait]
impl Tool for FileOpsTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "file_operations",
            description: "Perform file operations like reading writing appending listing checking and deleting files in the workspace",
            parameters: vec![
                ParamSpec::string("operation")
                    .required()
                    .choices(OPERATIONS)
                    .describe("The operation to perform"),
                ParamSpec::string("path")
                    .default_value(json!("."))
                    .describe("File or directory path, relative to the workspace"),
                ParamSpec::string("content")
                    .greedy()
                    .describe("Content to write or append"),
                ParamSpec::boolean("recursive")
                    .default_value(json!(false))
                    .describe("Recurse for list and delete"),
            ],
            triggers: vec![
                Trigger::new("list files").preset("operation", json!("list")),
                Trigger::new("list directory").preset("operation", json!("list")),
                Trigger::new("read file").preset("operation", json!("read")),
                Trigger::new("create file").preset("operation", json!("write")),
                Trigger::new("make file").preset("operation", json!("write")),
                Trigger::new("make a file").preset("operation", json!("write")),
                Trigger::new("append to file").preset("operation", json!("append")),
                Trigger::new("delete file").preset("operation", json!("delete")),
                Trigger::new("files"),
                Trigger::new("file"),
            ],
        }
    }

    fn validate(&self, params: &Value) -> Result<()> {
        let operation = str_param(params, "operation")?;
        if operation == "append" && params.get("content").and_then(|v| v.as_str()).is_none() {
            return Err(Error::Validation(
                "Content is required for append".to_string(),
            ));
        }
        Ok(())
    }

    async fn execute(&self, ctx: ToolContext, params: Value) -> Result<Value> {
        let operation = str_param(&params, "operation")?;
        let raw_path = params.get("path").and_then(|v| v.as_str()).unwrap_or(".");
        let content = params.get("content").and_then(|v| v.as_str());
        let recursive = params
            .get("recursive")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);

        tokio::fs::create_dir_all(&ctx.workspace).await?;
        let path = sandboxed_path(&ctx.workspace, raw_path)?;
        let shown = relative(&ctx.workspace, &path);
        debug!(operation, path = %shown, "File operation");

        match operation {
            "read" => {
                if !path.is_file() {
                    return Err(Error::NotFound(format!("File not found: {}", shown)));
                }
                let bytes = tokio::fs::read(&path).await?;
                let text = String::from_utf8(bytes).map_err(|_| {
                    Error::ToolInvocation(format!("Cannot read binary file: {}", shown))
                })?;
                let truncated = text.len() > MAX_READ_BYTES;
                Ok(json!({
                    "path": shown,
                    "content": safe_truncate(&text, MAX_READ_BYTES),
                    "truncated": truncated,
                    "scratch": { LAST_FILE_KEY: shown },
                }))
            }
            "write" | "append" => {
                if path.is_dir() {
                    return Err(Error::Validation(format!("{} is a directory", shown)));
                }
                let content = match content {
                    Some(c) => c,
                    // a bare "create file x" makes an empty file but never clobbers one
                    None if !path.exists() => "",
                    None => {
                        return Err(Error::Validation(format!(
                            "Content is required to overwrite {}",
                            shown
                        )))
                    }
                };
                if let Some(parent) = path.parent() {
                    tokio::fs::create_dir_all(parent).await?;
                }
                if operation == "append" {
                    use tokio::io::AsyncWriteExt;
                    let mut file = tokio::fs::OpenOptions::new()
                        .create(true)
                        .append(true)
                        .open(&path)
                        .await?;
                    file.write_all(content.as_bytes()).await?;
                    file.flush().await?;
                } else {
                    tokio::fs::write(&path, content).await?;
                }
                Ok(json!({
                    "path": shown,
                    "bytes_written": content.len(),
                    "scratch": { LAST_FILE_KEY: shown },
                }))
            }
            "list" => {
                if !path.is_dir() {
                    return Err(Error::NotFound(format!("Directory not found: {}", shown)));
                }
                let entries = list_entries(&ctx.workspace, &path, recursive).await?;
                Ok(json!({ "path": shown, "entries": entries }))
            }
            "exists" => {
                let kind = if path.is_file() {
                    Some("file")
                } else if path.is_dir() {
                    Some("directory")
                } else {
                    None
                };
                Ok(json!({ "path": shown, "exists": kind.is_some(), "type": kind }))
            }
            "delete" => {
                if path == ctx.workspace {
                    return Err(Error::PermissionDenied(
                        "Refusing to delete the workspace root".to_string(),
                    ));
                }
                if path.is_file() {
                    tokio::fs::remove_file(&path).await?;
                    Ok(json!({ "path": shown, "deleted": "file" }))
                } else if path.is_dir() {
                    if !recursive {
                        return Err(Error::Validation(format!(
                            "Cannot delete directory without recursive=true: {}",
                            shown
                        )));
                    }
                    tokio::fs::remove_dir_all(&path).await?;
                    Ok(json!({ "path": shown, "deleted": "directory" }))
                } else {
                    Err(Error::NotFound(format!("Path not found: {}", shown)))
                }
            }
            other => Err(Error::Validation(format!("Unknown operation: {}", other))),
        }
    }
}

async fn list_entries(workspace: &Path, root: &Path, recursive: bool) -> Result<Vec<Value>> {
    let mut entries = Vec::new();
    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        let mut read_dir = tokio::fs::read_dir(&dir).await?;
        while let Some(entry) = read_dir.next_entry().await? {
            let meta = entry.metadata().await?;
            let path = entry.path();
            if meta.is_dir() && recursive {
                pending.push(path.clone());
            }
            entries.push(json!({
                "path": relative(workspace, &path),
                "type": if meta.is_dir() { "directory" } else { "file" },
                "size": if meta.is_file() { Some(meta.len()) } else { None },
            }));
        }
    }
    entries.sort_by(|a, b| a["path"].as_str().cmp(&b["path"].as_str()));
    Ok(entries)
}
