// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use sto_client::StoClient;
use sto_config::{discover_paths, load_all};
use sto_control::{builtin_components, client_options, dispatch, ControlRequest, OpContext};
use sto_logging::CliLoggingArgs;
use tokio::io::AsyncReadExt;
use tracing::debug;

#[derive(Parser, Debug)]
#[command(name = "stoctl", version, about = "Control utility for sto servers")]
struct Cli {
    /// Path to the server Unix socket (default: configured socket-path)
    #[arg(long)]
    socket_path: Option<PathBuf>,

    /// Extra configuration file, layered above the system and user files
    #[arg(long)]
    config: Option<PathBuf>,

    /// Per-request timeout in milliseconds; 0 waits forever
    #[arg(long)]
    timeout_ms: Option<u64>,

    #[command(flatten)]
    logging: CliLoggingArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print a remote directory tree as JSON
    Tree {
        path: String,
        /// Stop listing directories at this level; 0 means unlimited
        #[arg(long)]
        depth: Option<usize>,
        /// Leave out everything but directories
        #[arg(long)]
        only_dirs: bool,
        /// Entry names to skip (repeatable)
        #[arg(long)]
        exclude: Vec<String>,
        /// Stat the root instead of assuming it is a directory
        #[arg(long)]
        stat_root: bool,
    },
    /// List a remote directory
    Ls { path: String },
    /// Print a remote file
    Cat {
        path: String,
        /// Bytes to read; 0 reads the whole file
        #[arg(long, default_value_t = 0)]
        size: u32,
    },
    /// Print a remote symlink target
    Readlink { path: String },
    /// Show remote file metadata
    Stat { path: String },
    /// Replace a remote file with text from --content or stdin
    Write {
        path: String,
        #[arg(long)]
        content: Option<String>,
    },
    /// Run a command on the server
    Run {
        /// Discard the command's output
        #[arg(long)]
        no_capture: bool,
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        cmd: Vec<String>,
    },
    /// Send a raw request to any component operation
    Exec {
        component: String,
        op: String,
        /// JSON parameters
        #[arg(long, default_value = "{}")]
        params: String,
    },
    /// List available components and their operations
    Components {
        /// Include internal components
        #[arg(long)]
        all: bool,
    },
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        let _ = writeln!(io::stderr(), "stoctl: {err:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    let mut flags = Vec::new();
    if let Some(socket_path) = &cli.socket_path {
        flags.push(("socket-path", json!(socket_path)));
    }
    if let Some(timeout_ms) = cli.timeout_ms {
        flags.push(("request-timeout-ms", json!(timeout_ms)));
    }
    let resolved = load_all(&discover_paths(cli.config.clone()), &flags)?;
    let config = resolved.config;

    let mut logging = cli.logging.clone();
    logging.log_format = logging.log_format.or(Some(config.logging.log_format));
    logging.init("stoctl", config.logging.log_level)?;
    debug!(operation = "load_config", scopes = ?resolved.scopes, "configuration loaded");

    let components = builtin_components()?;

    let request = match cli.command {
        Command::Components { all } => {
            return print_json(&serde_json::to_value(components.list(!all))?);
        }
        command => to_request(command).await?,
    };

    let needs_server = components
        .find(&request.component, false)
        .is_some_and(|component| !component.internal);
    let client = if needs_server {
        let client = StoClient::connect(&config.socket_path, client_options(&config))
            .await
            .with_context(|| format!("cannot reach sto server at {}", config.socket_path.display()))?;
        Some(client)
    } else {
        None
    };

    let ctx = OpContext::new(config, client);
    let result = dispatch(&components, &ctx, request).await;
    ctx.shutdown().await;

    print_json(&result?)
}

async fn to_request(command: Command) -> Result<ControlRequest> {
    let request = match command {
        Command::Tree {
            path,
            depth,
            only_dirs,
            exclude,
            stat_root,
        } => {
            let mut params = json!({ "path": path });
            if let Some(depth) = depth {
                params["depth"] = json!(depth);
            }
            if only_dirs {
                params["only_dirs"] = json!(true);
            }
            if !exclude.is_empty() {
                params["exclude"] = json!(exclude);
            }
            if stat_root {
                params["stat_root"] = json!(true);
            }
            ControlRequest::new("fs", "tree", params)
        }
        Command::Ls { path } => ControlRequest::new("fs", "readdir", json!({ "path": path })),
        Command::Cat { path, size } => {
            ControlRequest::new("fs", "readfile", json!({ "path": path, "size": size }))
        }
        Command::Readlink { path } => {
            ControlRequest::new("fs", "readlink", json!({ "path": path }))
        }
        Command::Stat { path } => ControlRequest::new("fs", "stat", json!({ "path": path })),
        Command::Write { path, content } => {
            let content = match content {
                Some(content) => content,
                None => {
                    let mut buf = String::new();
                    tokio::io::stdin()
                        .read_to_string(&mut buf)
                        .await
                        .context("reading content from stdin")?;
                    buf
                }
            };
            ControlRequest::new("fs", "writefile", json!({ "path": path, "content": content }))
        }
        Command::Run { no_capture, cmd } => ControlRequest::new(
            "subprocess",
            "run",
            json!({ "cmd": cmd, "capture_output": !no_capture }),
        ),
        Command::Exec {
            component,
            op,
            params,
        } => {
            let params: Value =
                serde_json::from_str(&params).context("--params is not valid JSON")?;
            ControlRequest::new(component, op, params)
        }
        Command::Components { .. } => anyhow::bail!("components is handled locally"),
    };
    Ok(request)
}

fn print_json(value: &Value) -> Result<()> {
    writeln!(io::stdout(), "{}", serde_json::to_string_pretty(value)?)?;
    Ok(())
}
