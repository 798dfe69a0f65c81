// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Connection, in-flight table and reply routing

use crate::error::{CommandError, QueueError};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::io;
use std::path::Path;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};
use std::time::Duration;
use sto_proto::{decode_reply, encode_request, ReplyPayload, RequestFrame};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Sleep;
use tracing::{debug, info, warn};

/// Directory listings larger than this are rejected unless configured otherwise
pub const DEFAULT_MAX_DIRENTS: usize = 256;

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// How long `close` waits for queued commands to reach the socket
const CLOSE_GRACE: Duration = Duration::from_secs(1);

/// Per-connection behaviour
#[derive(Clone, Debug)]
pub struct ClientOptions {
    /// Deadline applied to every command and to every socket write; `None`
    /// waits forever
    pub request_timeout: Option<Duration>,
    /// Ask the server to leave out dot-entries in `readdir`
    pub skip_hidden: bool,
    /// Upper bound on entries accepted from a single `readdir`
    pub max_dirents: usize,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            request_timeout: Some(DEFAULT_REQUEST_TIMEOUT),
            skip_hidden: true,
            max_dirents: DEFAULT_MAX_DIRENTS,
        }
    }
}

type Outcome = Result<Value, CommandError>;
type Completion = oneshot::Sender<Outcome>;

#[derive(Default)]
struct Table {
    next_id: u64,
    pending: HashMap<u64, Completion>,
    closed: bool,
}

/// State shared between the client handle, the reader task and every
/// outstanding [`PendingReply`]
#[derive(Default)]
struct Shared {
    table: Mutex<Table>,
}

impl Shared {
    fn table(&self) -> MutexGuard<'_, Table> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn register(&self) -> Result<(u64, oneshot::Receiver<Outcome>), QueueError> {
        let mut table = self.table();
        if table.closed {
            return Err(QueueError::Closed);
        }

        let id = loop {
            table.next_id = table.next_id.wrapping_add(1);
            if !table.pending.contains_key(&table.next_id) {
                break table.next_id;
            }
        };

        let (tx, rx) = oneshot::channel();
        table.pending.insert(id, tx);
        Ok((id, rx))
    }

    fn take(&self, id: u64) -> Option<Completion> {
        self.table().pending.remove(&id)
    }

    /// Route an outcome to its command. Returns false for unknown identifiers.
    fn complete(&self, id: u64, outcome: Outcome) -> bool {
        // entry leaves the table before the waiter can observe the outcome
        let Some(completion) = self.take(id) else {
            return false;
        };
        // the waiter may have been dropped in the meantime
        let _ = completion.send(outcome);
        true
    }

    /// Mark the connection closed and fail every in-flight command.
    fn fail_all(&self) -> usize {
        let drained: Vec<(u64, Completion)> = {
            let mut table = self.table();
            table.closed = true;
            table.pending.drain().collect()
        };

        let count = drained.len();
        for (id, completion) in drained {
            debug!(operation = "fail_pending", id, "completing command with connection-closed");
            let _ = completion.send(Err(CommandError::ConnectionClosed));
        }
        count
    }

    fn deliver(&self, line: &str) {
        match decode_reply(line) {
            Ok(frame) => {
                let id = frame.id;
                let outcome = match frame.into_payload() {
                    Ok(ReplyPayload::Result(value)) => Ok(value),
                    Ok(ReplyPayload::Error(err)) => Err(CommandError::Rpc {
                        code: err.code,
                        message: err.message,
                    }),
                    Err(err) => Err(CommandError::Malformed(err.to_string())),
                };
                if !self.complete(id, outcome) {
                    warn!(operation = "deliver_reply", id, "discarding reply for unknown command");
                }
            }
            Err(err) => {
                let id = serde_json::from_str::<Value>(line)
                    .ok()
                    .and_then(|value| value.get("id").and_then(Value::as_u64));
                match id {
                    Some(id) if self.complete(id, Err(CommandError::Malformed(err.to_string()))) => {
                        warn!(operation = "deliver_reply", id, error = %err, "malformed reply frame");
                    }
                    _ => {
                        warn!(operation = "deliver_reply", error = %err, "discarding undecodable reply frame");
                    }
                }
            }
        }
    }
}

async fn read_loop<R>(reader: R, shared: Arc<Shared>)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => {
                debug!(operation = "read_replies", "server closed the connection");
                break;
            }
            Ok(_) => match std::str::from_utf8(&buf) {
                Ok(line) if line.trim().is_empty() => {}
                Ok(line) => shared.deliver(line),
                Err(err) => {
                    warn!(operation = "read_replies", error = %err, "discarding reply frame that is not UTF-8");
                }
            },
            Err(err) => {
                warn!(operation = "read_replies", error = %err, "failed to read from server");
                break;
            }
        }
    }

    let failed = shared.fail_all();
    if failed > 0 {
        warn!(operation = "read_replies", failed, "connection lost with commands in flight");
    }
}

/// Writes queued frames in order. A write that fails or outlasts `limit`
/// leaves a partial frame on the wire, so the connection is failed as a whole.
async fn write_loop<W>(
    mut writer: W,
    mut queued: mpsc::UnboundedReceiver<Vec<u8>>,
    shared: Arc<Shared>,
    limit: Option<Duration>,
) where
    W: AsyncWrite + Unpin,
{
    while let Some(line) = queued.recv().await {
        let write = async {
            writer.write_all(&line).await?;
            writer.flush().await
        };
        let outcome = match limit {
            Some(limit) => tokio::time::timeout(limit, write).await.unwrap_or_else(|_| {
                Err(io::Error::new(io::ErrorKind::TimedOut, "server stopped reading"))
            }),
            None => write.await,
        };

        if let Err(err) = outcome {
            let failed = shared.fail_all();
            warn!(operation = "write_commands", error = %err, failed, "failed to write command, closing connection");
            return;
        }
    }

    if let Err(err) = writer.shutdown().await {
        debug!(operation = "write_commands", error = %err, "shutdown of write half failed");
    }
}

/// A command awaiting its reply.
///
/// Resolves exactly once: with the reply's `result`, or with a
/// [`CommandError`] when the server reports an error, the deadline passes or
/// the connection goes away. Dropping it before then removes the command from
/// the in-flight table; a late reply is then logged and discarded.
pub struct PendingReply {
    id: u64,
    rx: oneshot::Receiver<Outcome>,
    shared: Arc<Shared>,
    deadline: Option<(Duration, Pin<Box<Sleep>>)>,
    finished: bool,
}

impl PendingReply {
    fn new(
        id: u64,
        rx: oneshot::Receiver<Outcome>,
        shared: Arc<Shared>,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            id,
            rx,
            shared,
            deadline: timeout.map(|timeout| (timeout, Box::pin(tokio::time::sleep(timeout)))),
            finished: false,
        }
    }

    /// Identifier carried by the request frame
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl std::fmt::Debug for PendingReply {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingReply")
            .field("id", &self.id)
            .field("finished", &self.finished)
            .finish()
    }
}

impl Future for PendingReply {
    type Output = Outcome;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = &mut *self;
        if this.finished {
            return Poll::Ready(Err(CommandError::ConnectionClosed));
        }

        if let Poll::Ready(outcome) = Pin::new(&mut this.rx).poll(cx) {
            this.finished = true;
            return Poll::Ready(outcome.unwrap_or(Err(CommandError::ConnectionClosed)));
        }

        if let Some((timeout, sleep)) = this.deadline.as_mut() {
            if sleep.as_mut().poll(cx).is_ready() {
                this.finished = true;
                if this.shared.take(this.id).is_some() {
                    warn!(operation = "await_reply", id = this.id, ?timeout, "command timed out");
                    return Poll::Ready(Err(CommandError::TimedOut(*timeout)));
                }
                // the reply won the race against the deadline
                return Poll::Ready(
                    this.rx.try_recv().unwrap_or(Err(CommandError::ConnectionClosed)),
                );
            }
        }

        Poll::Pending
    }
}

impl Drop for PendingReply {
    fn drop(&mut self) {
        if !self.finished && self.shared.take(self.id).is_some() {
            debug!(operation = "drop_pending", id = self.id, "command abandoned by caller");
        }
    }
}

/// One connection to the sto server.
///
/// Many commands may be in flight at once; the handle can be shared behind an
/// `Arc` between tasks. After [`StoClient::close`], or once the server hangs
/// up, every `send` fails with [`QueueError::Closed`].
pub struct StoClient {
    shared: Arc<Shared>,
    /// Frames for the writer task; `None` once closed
    outgoing: Mutex<Option<mpsc::UnboundedSender<Vec<u8>>>>,
    writer: Mutex<Option<JoinHandle<()>>>,
    reader: Mutex<Option<JoinHandle<()>>>,
    options: ClientOptions,
}

impl StoClient {
    /// Connect to the server's Unix socket.
    pub async fn connect(
        socket_path: impl AsRef<Path>,
        options: ClientOptions,
    ) -> Result<Self, QueueError> {
        let socket_path = socket_path.as_ref();
        let stream =
            UnixStream::connect(socket_path).await.map_err(|source| QueueError::NotConnected {
                path: socket_path.to_path_buf(),
                source,
            })?;

        info!(operation = "connect", socket = %socket_path.display(), "connected to sto server");
        Ok(Self::from_stream(stream, options))
    }

    /// Wrap an already established byte stream. Must be called inside a
    /// tokio runtime; the reply reader and the command writer run as
    /// spawned tasks.
    pub fn from_stream<S>(stream: S, options: ClientOptions) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (read_half, write_half) = tokio::io::split(stream);
        let shared = Arc::new(Shared::default());
        let (outgoing, queued) = mpsc::unbounded_channel();

        let reader = tokio::spawn(read_loop(read_half, Arc::clone(&shared)));
        let writer = tokio::spawn(write_loop(
            write_half,
            queued,
            Arc::clone(&shared),
            options.request_timeout,
        ));

        Self {
            shared,
            outgoing: Mutex::new(Some(outgoing)),
            writer: Mutex::new(Some(writer)),
            reader: Mutex::new(Some(reader)),
            options,
        }
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    /// Number of commands currently awaiting a reply
    pub fn in_flight(&self) -> usize {
        self.shared.table().pending.len()
    }

    pub fn is_closed(&self) -> bool {
        self.shared.table().closed
    }

    /// Send a command whose parameters serialize with serde.
    pub async fn send<P>(&self, method: &str, params: &P) -> Result<PendingReply, QueueError>
    where
        P: Serialize + ?Sized,
    {
        self.send_raw(method, || serde_json::to_value(params)).await
    }

    /// Send a command with a caller-supplied parameter serializer.
    ///
    /// The frame is handed to the writer task whole, so dropping the returned
    /// future or the [`PendingReply`] never leaves a partial frame behind. On
    /// error nothing stays registered and no completion is delivered.
    pub async fn send_raw<F>(&self, method: &str, serialize: F) -> Result<PendingReply, QueueError>
    where
        F: FnOnce() -> Result<Value, serde_json::Error>,
    {
        let params = serialize().map_err(|source| QueueError::Serialize {
            method: method.to_string(),
            source,
        })?;

        let (id, rx) = self.shared.register()?;
        // from here on, dropping `pending` deregisters the command
        let pending =
            PendingReply::new(id, rx, Arc::clone(&self.shared), self.options.request_timeout);

        let frame = RequestFrame::new(id, method, params);
        let line = encode_request(&frame)
            .map_err(|err| QueueError::Io(io::Error::new(io::ErrorKind::InvalidData, err)))?;

        let queued = self
            .outgoing
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|outgoing| outgoing.send(line).is_ok());
        if !queued {
            return Err(QueueError::Closed);
        }

        debug!(operation = "send", id, method, "command queued");
        Ok(pending)
    }

    /// Callback form of [`StoClient::send`].
    ///
    /// `on_complete` runs exactly once on a spawned task, unless this call
    /// itself fails. Returns the command identifier.
    pub async fn send_with<P, F>(
        &self,
        method: &str,
        params: &P,
        on_complete: F,
    ) -> Result<u64, QueueError>
    where
        P: Serialize + ?Sized,
        F: FnOnce(Result<Value, CommandError>) + Send + 'static,
    {
        let pending = self.send(method, params).await?;
        let id = pending.id();
        tokio::spawn(async move {
            let outcome = pending.await;
            on_complete(outcome);
        });
        Ok(id)
    }

    /// Fail every in-flight command with [`CommandError::ConnectionClosed`]
    /// and tear the connection down.
    pub async fn close(&self) {
        let failed = self.shared.fail_all();
        if failed > 0 {
            info!(operation = "close", failed, "closed with commands in flight");
        }

        // the writer drains what is queued, then shuts the write half down
        drop(self.outgoing.lock().unwrap_or_else(PoisonError::into_inner).take());
        let writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(mut writer) = writer {
            if tokio::time::timeout(CLOSE_GRACE, &mut writer).await.is_err() {
                debug!(operation = "close", "writer still busy, aborting it");
                writer.abort();
            }
        }

        if let Some(reader) = self.reader.lock().unwrap_or_else(PoisonError::into_inner).take() {
            reader.abort();
        }
    }
}

impl Drop for StoClient {
    fn drop(&mut self) {
        self.shared.fail_all();
        drop(self.outgoing.lock().unwrap_or_else(PoisonError::into_inner).take());
        if let Some(writer) = self.writer.lock().unwrap_or_else(PoisonError::into_inner).take() {
            writer.abort();
        }
        if let Some(reader) = self.reader.lock().unwrap_or_else(PoisonError::into_inner).take() {
            reader.abort();
        }
    }
}
