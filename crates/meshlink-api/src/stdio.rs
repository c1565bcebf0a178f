//! Child-process transport speaking newline-delimited JSON over stdio.
//!
//! The backend is spawned with piped stdin/stdout. A single reader task
//! owns stdout: responses are matched to waiting callers by request id,
//! and push events are fanned out to every listener registered for that
//! event name, in arrival order. When stdout closes (process exit or
//! [`shutdown`](StdioTransport::shutdown)) every in-flight call fails with
//! [`Error::BackendUnavailable`] and every listener stream ends.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::channel::{EventChannel, EventKind};
use crate::error::Error;
use crate::protocol::{IncomingFrame, RequestFrame};
use crate::transport::Transport;

const NOT_RUNNING: &str = "backend process is not running";

/// How to launch the backend process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendProgram {
    pub program: PathBuf,
    #[serde(default)]
    pub args: Vec<String>,
}

impl BackendProgram {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }
}

type Responder = oneshot::Sender<Result<serde_json::Value, Error>>;
type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

struct PendingCall {
    command: String,
    responder: Responder,
}

struct Shared {
    writer: Mutex<BoxedWriter>,
    pending: DashMap<u64, PendingCall>,
    listeners: DashMap<EventKind, Vec<mpsc::UnboundedSender<serde_json::Value>>>,
    next_id: AtomicU64,
    /// Cancelled once the read side is gone; no new calls are accepted after.
    closed: CancellationToken,
    request_timeout: Option<Duration>,
}

/// [`Transport`] over a backend child process's stdin/stdout.
pub struct StdioTransport {
    shared: Arc<Shared>,
    /// Held so the process is killed when the transport is dropped.
    _child: Option<Child>,
}

impl StdioTransport {
    /// Spawn `program` and attach to its stdio.
    pub fn spawn(program: &BackendProgram, request_timeout: Option<Duration>) -> Result<Self, Error> {
        let mut child = Command::new(&program.program)
            .args(&program.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                Error::unavailable(format!(
                    "failed to start backend `{}`: {e}",
                    program.program.display()
                ))
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::unavailable("backend stdin was not captured"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::unavailable("backend stdout was not captured"))?;

        info!(program = %program.program.display(), pid = ?child.id(), "backend process started");

        let mut transport = Self::from_io(stdout, stdin, request_timeout);
        transport._child = Some(child);
        Ok(transport)
    }

    /// Attach to an already-open reader/writer pair.
    ///
    /// Must be called from within a tokio runtime; the reader task is
    /// spawned immediately.
    pub fn from_io<R, W>(reader: R, writer: W, request_timeout: Option<Duration>) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let shared = Arc::new(Shared {
            writer: Mutex::new(Box::new(writer)),
            pending: DashMap::new(),
            listeners: DashMap::new(),
            next_id: AtomicU64::new(1),
            closed: CancellationToken::new(),
            request_timeout,
        });

        tokio::spawn(read_loop(BufReader::new(reader), Arc::clone(&shared)));

        Self {
            shared,
            _child: None,
        }
    }

    /// Whether the read side is still open.
    pub fn is_running(&self) -> bool {
        !self.shared.closed.is_cancelled()
    }

    /// Stop reading from the backend. In-flight calls fail and listener
    /// streams end.
    pub fn shutdown(&self) {
        self.shared.closed.cancel();
    }
}

impl Drop for StdioTransport {
    fn drop(&mut self) {
        self.shared.closed.cancel();
    }
}

#[async_trait]
impl Transport for StdioTransport {
    async fn invoke(&self, command: &str, args: serde_json::Value) -> Result<serde_json::Value, Error> {
        self.shared.request(command, args).await
    }

    async fn listen(&self, kind: EventKind) -> Result<EventChannel, Error> {
        self.shared.subscribe(kind)
    }
}

// ── Request side ─────────────────────────────────────────────────────

impl Shared {
    async fn request(&self, command: &str, args: serde_json::Value) -> Result<serde_json::Value, Error> {
        if self.closed.is_cancelled() {
            return Err(Error::unavailable(NOT_RUNNING));
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.pending.insert(
            id,
            PendingCall {
                command: command.to_owned(),
                responder: tx,
            },
        );
        // The reader may have drained `pending` between the check above and the insert.
        if self.closed.is_cancelled() {
            self.pending.remove(&id);
            return Err(Error::unavailable(NOT_RUNNING));
        }

        trace!(id, command, "-> backend");
        let frame = RequestFrame {
            id,
            command,
            args: &args,
        };
        if let Err(e) = self.write_frame(&frame).await {
            self.pending.remove(&id);
            return Err(e);
        }

        let answer = match self.request_timeout {
            Some(limit) => {
                if let Ok(answer) = tokio::time::timeout(limit, rx).await {
                    answer
                } else {
                    self.pending.remove(&id);
                    return Err(Error::unavailable(format!(
                        "backend did not answer `{command}` within {}ms",
                        limit.as_millis()
                    )));
                }
            }
            None => rx.await,
        };

        answer.unwrap_or_else(|_| {
            Err(Error::unavailable(format!(
                "backend exited before answering `{command}`"
            )))
        })
    }

    async fn write_frame(&self, frame: &RequestFrame<'_>) -> Result<(), Error> {
        let mut line = serde_json::to_vec(frame).map_err(std::io::Error::from)?;
        line.push(b'\n');

        let mut writer = self.writer.lock().await;
        writer.write_all(&line).await?;
        writer.flush().await?;
        Ok(())
    }

    fn subscribe(&self, kind: EventKind) -> Result<EventChannel, Error> {
        let not_running = || Error::ChannelOpen {
            channel: kind,
            reason: NOT_RUNNING.into(),
        };

        if self.closed.is_cancelled() {
            return Err(not_running());
        }

        let (tx, rx) = mpsc::unbounded_channel();
        self.listeners.entry(kind).or_default().push(tx);
        if self.closed.is_cancelled() {
            self.listeners.remove(&kind);
            return Err(not_running());
        }

        debug!(channel = %kind, "event listener registered");
        Ok(EventChannel::new(kind, rx))
    }
}

// ── Read side ────────────────────────────────────────────────────────

async fn read_loop<R: AsyncRead + Unpin>(reader: BufReader<R>, shared: Arc<Shared>) {
    let mut lines = reader.lines();

    loop {
        tokio::select! {
            biased;
            () = shared.closed.cancelled() => break,
            line = lines.next_line() => match line {
                Ok(Some(line)) => shared.dispatch(&line),
                Ok(None) => {
                    debug!("backend closed its output");
                    break;
                }
                Err(e) => {
                    warn!(error = %e, "backend read failed");
                    break;
                }
            }
        }
    }

    shared.close();
}

impl Shared {
    fn dispatch(&self, line: &str) {
        let line = line.trim();
        if line.is_empty() {
            return;
        }

        match IncomingFrame::parse(line) {
            Ok(IncomingFrame::Event { event, payload }) => self.publish(&event, payload),
            Ok(IncomingFrame::Response { id, result, error }) => self.resolve(id, result, error),
            Err(e) => warn!(error = %e, line, "ignoring malformed backend frame"),
        }
    }

    fn publish(&self, event: &str, payload: serde_json::Value) {
        let Ok(kind) = event.parse::<EventKind>() else {
            debug!(event, "ignoring unknown backend event");
            return;
        };

        trace!(channel = %kind, "<- backend event");
        if let Some(mut senders) = self.listeners.get_mut(&kind) {
            // Abandoned subscriptions are pruned here.
            senders.retain(|tx| tx.send(payload.clone()).is_ok());
        }
    }

    fn resolve(&self, id: u64, result: serde_json::Value, error: Option<String>) {
        let Some((_, call)) = self.pending.remove(&id) else {
            debug!(id, "response for unknown or expired request");
            return;
        };

        trace!(id, command = %call.command, ok = error.is_none(), "<- backend");
        let outcome = match error {
            Some(message) => Err(Error::CommandRejected {
                command: call.command,
                message,
            }),
            None => Ok(result),
        };
        let _ = call.responder.send(outcome);
    }

    fn close(&self) {
        self.closed.cancel();

        let ids: Vec<u64> = self.pending.iter().map(|entry| *entry.key()).collect();
        for id in ids {
            if let Some((_, call)) = self.pending.remove(&id) {
                let _ = call.responder.send(Err(Error::unavailable(format!(
                    "backend exited before answering `{}`",
                    call.command
                ))));
            }
        }

        // Dropping the senders ends every listener stream.
        self.listeners.clear();
        debug!("backend transport closed");
    }
}
