// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Scripted in-process sto server for tests.
//!
//! [`FakeServer`] speaks the same newline-delimited JSON-RPC as the real
//! server. Each request is answered by a handler closure on its own task, so
//! delayed replies overtake earlier ones. [`FakeFs`] is a ready-made handler
//! backed by an in-memory directory tree.

use serde_json::{json, Value};
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use sto_proto::{decode_request, encode_reply, ReplyFrame, RequestFrame};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, DuplexStream};
use tokio::net::UnixListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// What the fake server does with one request
#[derive(Clone, Debug)]
pub enum Reply {
    Result(Value),
    Error { code: i32, message: String },
    /// Send the inner reply after a pause
    After(Duration, Box<Reply>),
    /// Write this line verbatim
    Raw(String),
    /// Never answer
    Ignore,
    /// Drop the connection without answering
    Hangup,
}

impl Reply {
    pub fn after(self, delay: Duration) -> Reply {
        Reply::After(delay, Box::new(self))
    }
}

type Handler = dyn Fn(&str, &Value) -> Reply + Send + Sync;

/// A scripted peer that records every request it receives
#[derive(Clone)]
pub struct FakeServer {
    handler: Arc<Handler>,
    requests: Arc<Mutex<Vec<RequestFrame>>>,
}

impl FakeServer {
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&str, &Value) -> Reply + Send + Sync + 'static,
    {
        Self {
            handler: Arc::new(handler),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Requests received so far, in arrival order
    pub fn requests(&self) -> Vec<RequestFrame> {
        self.requests.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Number of requests received for `method`
    pub fn count(&self, method: &str) -> usize {
        self.requests().iter().filter(|frame| frame.method == method).count()
    }

    /// Serve one in-memory connection and return the client end.
    pub fn connect_duplex(&self) -> DuplexStream {
        let (client, server) = tokio::io::duplex(64 * 1024);
        self.serve(server);
        client
    }

    /// Accept connections on a Unix socket until the returned task is aborted.
    pub fn listen(&self, socket_path: &Path) -> std::io::Result<JoinHandle<()>> {
        let listener = UnixListener::bind(socket_path)?;
        let server = self.clone();
        Ok(tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                server.serve(stream);
            }
        }))
    }

    /// Serve a single connection on a background task.
    pub fn serve<S>(&self, stream: S) -> JoinHandle<()>
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (read_half, mut write_half) = tokio::io::split(stream);
        let (tx, mut rx) = mpsc::unbounded_channel::<Vec<u8>>();

        let writer = tokio::spawn(async move {
            while let Some(line) = rx.recv().await {
                if write_half.write_all(&line).await.is_err() || write_half.flush().await.is_err() {
                    break;
                }
            }
        });

        let handler = Arc::clone(&self.handler);
        let requests = Arc::clone(&self.requests);
        tokio::spawn(async move {
            let mut lines = BufReader::new(read_half).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                let Ok(frame) = decode_request(&line) else {
                    continue;
                };
                requests.lock().unwrap_or_else(PoisonError::into_inner).push(frame.clone());

                let reply = handler(&frame.method, &frame.params);
                if matches!(reply, Reply::Hangup) {
                    writer.abort();
                    return;
                }

                let tx = tx.clone();
                tokio::spawn(send_reply(frame.id, reply, tx));
            }
        })
    }
}

async fn send_reply(id: u64, mut reply: Reply, tx: mpsc::UnboundedSender<Vec<u8>>) {
    let frame = loop {
        match reply {
            Reply::After(delay, inner) => {
                tokio::time::sleep(delay).await;
                reply = *inner;
            }
            Reply::Result(value) => break ReplyFrame::result(id, value),
            Reply::Error { code, message } => break ReplyFrame::error(id, code, message),
            Reply::Raw(mut line) => {
                line.push('\n');
                let _ = tx.send(line.into_bytes());
                return;
            }
            Reply::Ignore | Reply::Hangup => return,
        }
    };

    if let Ok(line) = encode_reply(&frame) {
        let _ = tx.send(line);
    }
}

pub const DIR_MODE: u32 = 0o040755;
pub const FILE_MODE: u32 = 0o100644;
pub const LINK_MODE: u32 = 0o120777;
pub const FIFO_MODE: u32 = 0o010644;

#[derive(Clone, Debug)]
enum FakeEntry {
    Dir,
    File(String),
    Link(String),
    Fifo,
}

impl FakeEntry {
    fn mode(&self) -> u32 {
        match self {
            FakeEntry::Dir => DIR_MODE,
            FakeEntry::File(_) => FILE_MODE,
            FakeEntry::Link(_) => LINK_MODE,
            FakeEntry::Fifo => FIFO_MODE,
        }
    }
}

/// In-memory filesystem answering the sto methods.
///
/// Directory listings come back in insertion order. Paths registered with
/// [`FakeFs::fail`] answer every method with the given `returncode`.
#[derive(Clone, Debug, Default)]
pub struct FakeFs {
    entries: Vec<(String, FakeEntry)>,
    failing: Vec<(String, i32)>,
}

impl FakeFs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dir(self, path: &str) -> Self {
        self.insert(path, FakeEntry::Dir)
    }

    pub fn file(self, path: &str, content: &str) -> Self {
        self.insert(path, FakeEntry::File(content.to_string()))
    }

    pub fn link(self, path: &str, target: &str) -> Self {
        self.insert(path, FakeEntry::Link(target.to_string()))
    }

    pub fn fifo(self, path: &str) -> Self {
        self.insert(path, FakeEntry::Fifo)
    }

    pub fn fail(mut self, path: &str, returncode: i32) -> Self {
        self.failing.push((path.to_string(), returncode));
        self
    }

    fn insert(mut self, path: &str, entry: FakeEntry) -> Self {
        self.entries.push((path.to_string(), entry));
        self
    }

    fn lookup(&self, path: &str) -> Option<&FakeEntry> {
        self.entries.iter().find(|(p, _)| p == path).map(|(_, entry)| entry)
    }

    fn children(&self, dir: &str) -> impl Iterator<Item = (&str, &FakeEntry)> + '_ {
        let dir = dir.to_string();
        self.entries.iter().filter_map(move |(path, entry)| {
            let (parent, name) = path.rsplit_once('/')?;
            let parent = if parent.is_empty() { "/" } else { parent };
            (parent == dir && !name.is_empty()).then_some((name, entry))
        })
    }

    pub fn into_server(self) -> FakeServer {
        FakeServer::new(move |method, params| self.handle(method, params))
    }

    /// Answer one request.
    pub fn handle(&self, method: &str, params: &Value) -> Reply {
        let path = ["dirpath", "filepath", "filename"]
            .iter()
            .find_map(|key| params.get(*key).and_then(Value::as_str))
            .unwrap_or_default();

        if let Some((_, returncode)) = self.failing.iter().find(|(p, _)| p == path) {
            return Reply::Result(json!({ "returncode": returncode }));
        }

        let entry = self.lookup(path);
        let result = match (method, entry) {
            ("readdir", Some(FakeEntry::Dir)) => {
                let skip_hidden = params.get("skip_hidden").and_then(Value::as_bool).unwrap_or(false);
                let dirents: Vec<Value> = self
                    .children(path)
                    .filter(|(name, _)| !(skip_hidden && name.starts_with('.')))
                    .map(|(name, entry)| json!({ "name": name, "mode": entry.mode() }))
                    .collect();
                json!({ "returncode": 0, "dirents": dirents })
            }
            ("readdir", Some(_)) => json!({ "returncode": -libc::ENOTDIR }),
            ("readfile", Some(FakeEntry::File(content))) => {
                json!({ "returncode": 0, "buf": content })
            }
            ("readfile", Some(FakeEntry::Dir)) => json!({ "returncode": -libc::EISDIR }),
            ("readlink", Some(FakeEntry::Link(target))) => {
                json!({ "returncode": 0, "buf": target })
            }
            ("readlink", Some(_)) | ("readfile", Some(_)) => json!({ "returncode": -libc::EINVAL }),
            ("fstat", Some(entry)) => {
                let size = match entry {
                    FakeEntry::File(content) => content.len(),
                    FakeEntry::Link(target) => target.len(),
                    FakeEntry::Dir => 4096,
                    FakeEntry::Fifo => 0,
                };
                json!({ "returncode": 0, "st_mode": entry.mode(), "st_size": size })
            }
            ("writefile", _) => json!({ "returncode": 0 }),
            ("subprocess", _) => run_fake_command(params),
            ("readdir" | "readfile" | "readlink" | "fstat", None) => {
                json!({ "returncode": -libc::ENOENT })
            }
            _ => {
                return Reply::Error {
                    code: -32601,
                    message: "Method not found".to_string(),
                }
            }
        };

        Reply::Result(result)
    }
}

fn run_fake_command(params: &Value) -> Value {
    let argv: Vec<&str> = params
        .get("cmd")
        .and_then(Value::as_array)
        .map(|cmd| cmd.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();
    let capture = params.get("capture_output").and_then(Value::as_bool).unwrap_or(false);

    let (returncode, output) = match argv.split_first() {
        Some((&"echo", args)) => (0, format!("{}\n", args.join(" "))),
        Some((&"true", _)) => (0, String::new()),
        Some((&"false", _)) => (1, String::new()),
        Some((cmd, _)) => (127, format!("{cmd}: command not found\n")),
        None => (-libc::EINVAL, String::new()),
    };

    if capture {
        json!({ "returncode": returncode, "output": output })
    } else {
        json!({ "returncode": returncode })
    }
}
