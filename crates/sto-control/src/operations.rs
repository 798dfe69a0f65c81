// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Built-in components: `fs`, `subprocess` and the internal `core`

use crate::dispatch::{parse_params, Component, Components, DispatchError, OpContext, Operation};
use crate::registry::RegistryError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sto_proto::FileKind;
use sto_tree::TreeBuilder;
use tracing::{debug, info};

/// Every component `stoctl` ships with
pub fn builtin_components() -> Result<Components, RegistryError> {
    let mut components = Components::new();

    components.register(
        Component::new("fs", false)
            .with_op("readdir", ReadDir)?
            .with_op("readfile", ReadFile)?
            .with_op("writefile", WriteFile)?
            .with_op("readlink", ReadLink)?
            .with_op("stat", Stat)?
            .with_op("tree", Tree)?,
    )?;
    components.register(Component::new("subprocess", false).with_op("run", Run)?)?;
    components.register(Component::new("core", true).with_op("ping", Ping)?)?;

    Ok(components)
}

fn to_value<T: Serialize>(value: T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

#[derive(Deserialize)]
struct PathParams {
    path: String,
}

#[derive(Serialize)]
struct EntryOut {
    name: String,
    mode: u32,
    #[serde(rename = "type")]
    kind: FileKind,
}

struct ReadDir;

#[async_trait]
impl Operation for ReadDir {
    fn description(&self) -> &'static str {
        "list a remote directory"
    }

    async fn run(&self, ctx: &OpContext, params: Value) -> Result<Value, DispatchError> {
        let PathParams { path } = parse_params("fs.readdir", params)?;
        let entries: Vec<EntryOut> = ctx
            .client()?
            .read_dir(&path)
            .await?
            .into_iter()
            .map(|dirent| EntryOut {
                kind: FileKind::from_mode(dirent.mode),
                name: dirent.name,
                mode: dirent.mode,
            })
            .collect();
        Ok(to_value(entries))
    }
}

#[derive(Deserialize)]
struct ReadFileParams {
    path: String,
    /// 0 reads the whole file
    #[serde(default)]
    size: u32,
}

struct ReadFile;

#[async_trait]
impl Operation for ReadFile {
    fn description(&self) -> &'static str {
        "read a remote file"
    }

    async fn run(&self, ctx: &OpContext, params: Value) -> Result<Value, DispatchError> {
        let ReadFileParams { path, size } = parse_params("fs.readfile", params)?;
        let content = ctx.client()?.read_file(&path, size).await?;
        Ok(json!({ "content": String::from_utf8_lossy(&content) }))
    }
}

#[derive(Deserialize)]
struct WriteFileParams {
    path: String,
    content: String,
}

struct WriteFile;

#[async_trait]
impl Operation for WriteFile {
    fn description(&self) -> &'static str {
        "replace the content of a remote file"
    }

    async fn run(&self, ctx: &OpContext, params: Value) -> Result<Value, DispatchError> {
        let WriteFileParams { path, content } = parse_params("fs.writefile", params)?;
        let returncode = ctx.client()?.write_file(&path, content.as_bytes()).await?;
        info!(operation = "writefile", path = %path, bytes = content.len(), "remote file written");
        Ok(json!({ "returncode": returncode }))
    }
}

struct ReadLink;

#[async_trait]
impl Operation for ReadLink {
    fn description(&self) -> &'static str {
        "read a remote symlink target"
    }

    async fn run(&self, ctx: &OpContext, params: Value) -> Result<Value, DispatchError> {
        let PathParams { path } = parse_params("fs.readlink", params)?;
        let target = ctx.client()?.read_link(&path).await?;
        Ok(json!({ "target": String::from_utf8_lossy(&target) }))
    }
}

struct Stat;

#[async_trait]
impl Operation for Stat {
    fn description(&self) -> &'static str {
        "stat a remote path"
    }

    async fn run(&self, ctx: &OpContext, params: Value) -> Result<Value, DispatchError> {
        let PathParams { path } = parse_params("fs.stat", params)?;
        let stat = ctx.client()?.stat(&path).await?;
        Ok(to_value(stat))
    }
}

/// Unset fields fall back to the configured tree defaults
#[derive(Deserialize)]
struct TreeOpParams {
    path: String,
    depth: Option<usize>,
    only_dirs: Option<bool>,
    exclude: Option<Vec<String>>,
    stat_root: Option<bool>,
}

struct Tree;

#[async_trait]
impl Operation for Tree {
    fn description(&self) -> &'static str {
        "resolve a remote directory tree"
    }

    async fn run(&self, ctx: &OpContext, params: Value) -> Result<Value, DispatchError> {
        let request: TreeOpParams = parse_params("fs.tree", params)?;
        let mut tree_params = ctx.tree_params();
        if let Some(depth) = request.depth {
            tree_params.depth = depth;
        }
        if let Some(only_dirs) = request.only_dirs {
            tree_params.only_dirs = only_dirs;
        }
        if let Some(exclude) = request.exclude {
            tree_params.exclude = exclude;
        }
        if let Some(stat_root) = request.stat_root {
            tree_params.stat_root = stat_root;
        }

        let client = ctx.client()?;
        let tree = TreeBuilder::new(client, tree_params).resolve(&request.path).await;
        let stats = tree.stats();
        debug!(operation = "tree", path = %request.path, ?stats, "tree finished");

        let root = tree.into_result()?;
        Ok(root.to_json())
    }
}

#[derive(Deserialize)]
struct RunParams {
    cmd: Vec<String>,
    #[serde(default = "default_capture")]
    capture_output: bool,
}

fn default_capture() -> bool {
    true
}

struct Run;

#[async_trait]
impl Operation for Run {
    fn description(&self) -> &'static str {
        "run a command on the server"
    }

    async fn run(&self, ctx: &OpContext, params: Value) -> Result<Value, DispatchError> {
        let RunParams {
            cmd,
            capture_output,
        } = parse_params("subprocess.run", params)?;
        let output = ctx.client()?.run_subprocess(&cmd, capture_output).await?;
        Ok(to_value(output))
    }
}

/// Reports local settings without touching the server
struct Ping;

#[async_trait]
impl Operation for Ping {
    fn description(&self) -> &'static str {
        "report control settings"
    }

    async fn run(&self, ctx: &OpContext, _params: Value) -> Result<Value, DispatchError> {
        let config = ctx.config();
        Ok(json!({
            "socket-path": config.socket_path,
            "request-timeout-ms": config.request_timeout_ms,
            "max-dirents": config.max_dirents,
            "connected": ctx.client().is_ok(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_listing() {
        let components = builtin_components().unwrap();
        let listed = components.list(true);
        let names: Vec<_> = listed.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["fs", "subprocess"]);

        let fs_ops: Vec<_> = listed[0].ops.iter().map(|op| op.name.as_str()).collect();
        assert_eq!(fs_ops, ["readdir", "readfile", "readlink", "stat", "tree", "writefile"]);
    }

    #[test]
    fn test_core_is_internal() {
        let components = builtin_components().unwrap();
        assert!(components.find("core", true).is_none());
        assert!(components.find("core", false).unwrap().ops.find("ping").is_some());
    }

    #[test]
    fn test_run_captures_by_default() {
        let params: RunParams = parse_params("subprocess.run", json!({"cmd": ["true"]})).unwrap();
        assert!(params.capture_output);
    }
}
