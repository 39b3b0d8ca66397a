//! Built-in local tools working on a workspace directory

use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use serde_json::{json, Value};

use super::local::LocalTool;
use crate::types::ToolArguments;

const DEFAULT_MAX_LINES: u64 = 100;
/// Files larger than this are not read
const MAX_READ_BYTES: u64 = 1024 * 1024;

/// A directory that the file tools may not leave
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The process working directory
    pub fn current_dir() -> std::io::Result<Self> {
        Ok(Self::new(std::env::current_dir()?))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve `path` against the root, refusing anything that escapes it
    pub fn resolve(&self, path: &str) -> Result<PathBuf, String> {
        let candidate = Path::new(path);
        let joined = if candidate.is_absolute() {
            candidate.to_path_buf()
        } else {
            self.root.join(candidate)
        };

        let mut normalized = PathBuf::new();
        for component in joined.components() {
            match component {
                Component::ParentDir => {
                    if !normalized.pop() {
                        return Err(format!("path escapes the workspace: {}", path));
                    }
                }
                Component::CurDir => {}
                other => normalized.push(other.as_os_str()),
            }
        }

        if normalized.starts_with(&self.root) {
            Ok(normalized)
        } else {
            Err(format!("path escapes the workspace: {}", path))
        }
    }
}

/// `list_files`, `read_file_content`, `write_file_content` and `get_system_info`
pub fn builtin_tools(workspace: Workspace) -> Vec<LocalTool> {
    let workspace = Arc::new(workspace);
    vec![
        list_files(Arc::clone(&workspace)),
        read_file_content(Arc::clone(&workspace)),
        write_file_content(Arc::clone(&workspace)),
        get_system_info(workspace),
    ]
}

fn str_arg<'a>(args: &'a ToolArguments, key: &str) -> Result<&'a str, String> {
    args.get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| format!("missing string argument '{}'", key))
}

fn list_files(workspace: Arc<Workspace>) -> LocalTool {
    LocalTool::blocking(
        "list_files",
        "List the files and directories in a workspace directory",
        move |args| {
            let directory = args.get("directory").and_then(Value::as_str).unwrap_or(".");
            let include_hidden = args
                .get("include_hidden")
                .and_then(Value::as_bool)
                .unwrap_or(false);

            let path = workspace.resolve(directory)?;
            if !path.is_dir() {
                return Err(format!("not a directory: {}", directory));
            }

            let mut directories = Vec::new();
            let mut files = Vec::new();
            let entries = fs::read_dir(&path).map_err(|e| format!("cannot list {}: {}", directory, e))?;
            for entry in entries.flatten() {
                let name = entry.file_name().to_string_lossy().into_owned();
                if !include_hidden && name.starts_with('.') {
                    continue;
                }
                match entry.metadata() {
                    Ok(meta) if meta.is_dir() => directories.push(name),
                    Ok(meta) => files.push(json!({ "name": name, "size": meta.len() })),
                    Err(_) => files.push(json!({ "name": name, "size": null })),
                }
            }
            directories.sort();
            files.sort_by(|a, b| a["name"].as_str().cmp(&b["name"].as_str()));

            Ok(json!({
                "directory": path.display().to_string(),
                "directories": directories,
                "files": files,
            }))
        },
    )
    .with_parameters(json!({
        "type": "object",
        "properties": {
            "directory": { "type": "string", "description": "Directory to list", "default": "." },
            "include_hidden": { "type": "boolean", "description": "Include dotfiles", "default": false }
        }
    }))
}

fn read_file_content(workspace: Arc<Workspace>) -> LocalTool {
    LocalTool::blocking(
        "read_file_content",
        "Read a text file from the workspace, numbering its lines",
        move |args| {
            let file_path = str_arg(&args, "file_path")?;
            let max_lines = args
                .get("max_lines")
                .and_then(Value::as_u64)
                .unwrap_or(DEFAULT_MAX_LINES);

            let path = workspace.resolve(file_path)?;
            if !path.is_file() {
                return Err(format!("not a file: {}", file_path));
            }
            let size = fs::metadata(&path).map_err(|e| e.to_string())?.len();
            if size > MAX_READ_BYTES {
                return Err(format!("file too large ({} bytes, limit {})", size, MAX_READ_BYTES));
            }

            let file = fs::File::open(&path).map_err(|e| format!("cannot open {}: {}", file_path, e))?;
            let mut lines = Vec::new();
            let mut truncated = false;
            let mut reader = BufReader::new(file);
            let mut buf = Vec::new();
            loop {
                buf.clear();
                let read = reader.read_until(b'\n', &mut buf).map_err(|e| e.to_string())?;
                if read == 0 {
                    break;
                }
                if lines.len() as u64 >= max_lines {
                    truncated = true;
                    break;
                }
                let line = String::from_utf8_lossy(&buf);
                lines.push(format!("{:4}| {}", lines.len() + 1, line.trim_end()));
            }

            Ok(json!({
                "path": path.display().to_string(),
                "size": size,
                "lines": lines.len(),
                "truncated": truncated,
                "content": lines.join("\n"),
            }))
        },
    )
    .with_parameters(json!({
        "type": "object",
        "properties": {
            "file_path": { "type": "string", "description": "File to read" },
            "max_lines": { "type": "integer", "description": "Maximum lines to return", "default": DEFAULT_MAX_LINES }
        },
        "required": ["file_path"]
    }))
}

fn write_file_content(workspace: Arc<Workspace>) -> LocalTool {
    LocalTool::blocking(
        "write_file_content",
        "Write or append text to a file in the workspace",
        move |args| {
            let file_path = str_arg(&args, "file_path")?;
            let content = str_arg(&args, "content")?;
            let append = args.get("append").and_then(Value::as_bool).unwrap_or(false);

            let path = workspace.resolve(file_path)?;
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).map_err(|e| e.to_string())?;
            }
            let mut file = OpenOptions::new()
                .create(true)
                .write(true)
                .append(append)
                .truncate(!append)
                .open(&path)
                .map_err(|e| format!("cannot open {}: {}", file_path, e))?;
            file.write_all(content.as_bytes()).map_err(|e| e.to_string())?;

            let size = fs::metadata(&path).map(|m| m.len()).unwrap_or_default();
            Ok(json!({
                "path": path.display().to_string(),
                "size": size,
                "appended": append,
            }))
        },
    )
    .with_parameters(json!({
        "type": "object",
        "properties": {
            "file_path": { "type": "string", "description": "File to write" },
            "content": { "type": "string", "description": "Text to write" },
            "append": { "type": "boolean", "description": "Append instead of overwriting", "default": false }
        },
        "required": ["file_path", "content"]
    }))
}

fn get_system_info(workspace: Arc<Workspace>) -> LocalTool {
    LocalTool::blocking(
        "get_system_info",
        "Describe the host system and workspace",
        move |_| {
            let user = std::env::var("USER")
                .or_else(|_| std::env::var("USERNAME"))
                .unwrap_or_else(|_| "unknown".to_string());
            Ok(json!({
                "os": std::env::consts::OS,
                "family": std::env::consts::FAMILY,
                "arch": std::env::consts::ARCH,
                "workspace": workspace.root().display().to_string(),
                "user": user,
                "toolbridge": env!("CARGO_PKG_VERSION"),
            }))
        },
    )
}
