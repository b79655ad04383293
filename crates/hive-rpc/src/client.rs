//! Full-duplex, line-delimited JSON-RPC client for one child process.
//!
//! Supervision pairs a shared `CancellationToken` with three tasks: one
//! reads stdout and dispatches frames, one drains stderr, and a third awaits
//! the child's exit status, so an unexpected death is detected exactly once
//! regardless of which task notices it first. `dispose()` cancels that
//! shared token so the same exit path is taken on a clean shutdown.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex as SyncMutex;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::{oneshot, Mutex as AsyncMutex};
use tokio_util::sync::CancellationToken;

use crate::errors::{Result, RpcError};
use crate::types::{
    classify_line, InboundFrame, JsonRpcErrorBody, OutboundFrame, OutboundResponse, RpcId,
    METHOD_NOT_FOUND, SERVER_ERROR,
};

/// Outcome of [`RpcCallbacks::on_request`] for one inbound child-originated
/// request.
pub enum RequestOutcome {
    /// Respond with this result value.
    Ok(Value),
    /// No handler recognizes `method`; responds with `-32601`.
    MethodNotFound,
    /// The handler ran but failed; responds with `-32000` and `message`.
    Failed(String),
}

type NotificationFn = dyn Fn(String, Option<Value>) + Send + Sync;
type RequestFn = dyn Fn(&str, Option<Value>) -> RequestOutcome + Send + Sync;
type ExitFn = dyn Fn(Option<RpcError>) + Send + Sync;
type StderrFn = dyn Fn(String) + Send + Sync;

/// Callbacks supplied at construction time.
#[derive(Clone)]
pub struct RpcCallbacks {
    pub on_notification: Arc<NotificationFn>,
    pub on_request: Arc<RequestFn>,
    pub on_exit: Arc<ExitFn>,
    pub on_stderr: Arc<StderrFn>,
}

struct PendingRequest {
    method: String,
    reply: oneshot::Sender<std::result::Result<Value, RpcError>>,
}

/// One child process and its duplex JSON-RPC channel.
pub struct JsonRpcClient {
    stdin: AsyncMutex<Option<ChildStdin>>,
    pending: SyncMutex<HashMap<i64, PendingRequest>>,
    next_id: AtomicI64,
    disposed: AtomicBool,
    cancel: CancellationToken,
    callbacks: RpcCallbacks,
}

impl JsonRpcClient {
    /// Spawn `command` with `args`/`cwd`/`envs` and start the duplex
    /// protocol. Returns [`RpcError::BinaryMissing`] on `ENOENT`.
    pub async fn spawn(
        command: &str,
        args: &[String],
        cwd: Option<&Path>,
        envs: &HashMap<String, String>,
        callbacks: RpcCallbacks,
    ) -> Result<Arc<Self>> {
        let mut cmd = Command::new(command);
        cmd.args(args)
            .envs(envs)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .kill_on_drop(true);
        if let Some(cwd) = cwd {
            cmd.current_dir(cwd);
        }

        let mut child = cmd.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                RpcError::BinaryMissing(command.to_owned())
            } else {
                RpcError::SpawnFailed(e)
            }
        })?;

        let stdin = child.stdin.take();
        let stdout = child.stdout.take().expect("piped stdout");
        let stderr = child.stderr.take().expect("piped stderr");

        let client = Arc::new(Self {
            stdin: AsyncMutex::new(stdin),
            pending: SyncMutex::new(HashMap::new()),
            next_id: AtomicI64::new(1),
            disposed: AtomicBool::new(false),
            cancel: CancellationToken::new(),
            callbacks,
        });

        tokio::spawn(Self::run_stdout(Arc::clone(&client), stdout));
        tokio::spawn(Self::run_stderr(Arc::clone(&client), stderr));
        tokio::spawn(Self::run_supervisor(Arc::clone(&client), child));

        Ok(client)
    }

    /// Send a request and await its matching response.
    ///
    /// `timeout_ms == 0` disables the timeout.
    pub async fn request(
        &self,
        method: impl Into<String>,
        params: Option<Value>,
        timeout_ms: u64,
    ) -> Result<Value> {
        let method = method.into();
        if self.disposed.load(Ordering::SeqCst) {
            return Err(RpcError::Disposed);
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(
            id,
            PendingRequest {
                method: method.clone(),
                reply: tx,
            },
        );

        let frame = OutboundFrame {
            id: Some(RpcId::Number(id)),
            method: method.clone(),
            params,
        };
        if let Err(err) = self.write_frame(&frame).await {
            self.pending.lock().remove(&id);
            return Err(err);
        }

        let outcome = if timeout_ms == 0 {
            rx.await
        } else {
            match tokio::time::timeout(std::time::Duration::from_millis(timeout_ms), rx).await {
                Ok(result) => result,
                Err(_) => {
                    self.pending.lock().remove(&id);
                    return Err(RpcError::Timeout {
                        id: RpcId::Number(id),
                        method,
                        timeout_ms,
                    });
                }
            }
        };

        match outcome {
            Ok(result) => result,
            Err(_) => Err(RpcError::Disposed),
        }
    }

    /// Best-effort fire-and-forget notification.
    pub async fn notify(&self, method: impl Into<String>, params: Option<Value>) -> Result<()> {
        if self.disposed.load(Ordering::SeqCst) {
            return Err(RpcError::Disposed);
        }
        let frame = OutboundFrame {
            id: None,
            method: method.into(),
            params,
        };
        self.write_frame(&frame).await
    }

    /// Close stdin, kill the child, and reject every pending request.
    /// Idempotent: subsequent calls are no-ops.
    pub async fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.reject_all_pending(RpcError::Disposed);
        *self.stdin.lock().await = None;
        self.cancel.cancel();
    }

    fn reject_all_pending(&self, make_err: RpcError) {
        let pending: Vec<PendingRequest> = self.pending.lock().drain().map(|(_, v)| v).collect();
        for entry in pending {
            let err = match &make_err {
                RpcError::Disposed => RpcError::Disposed,
                RpcError::UnexpectedExit { exit_code, signal } => RpcError::UnexpectedExit {
                    exit_code: *exit_code,
                    signal: *signal,
                },
                other => RpcError::RemoteError {
                    method: entry.method.clone(),
                    code: SERVER_ERROR,
                    message: other.to_string(),
                },
            };
            let _ = entry.reply.send(Err(err));
        }
    }

    async fn write_frame(&self, frame: &OutboundFrame) -> Result<()> {
        let mut line = serde_json::to_vec(frame)?;
        line.push(b'\n');
        let mut guard = self.stdin.lock().await;
        match guard.as_mut() {
            Some(stdin) => stdin.write_all(&line).await.map_err(RpcError::WriteFailed),
            None => Err(RpcError::Disposed),
        }
    }

    async fn write_response(&self, response: &OutboundResponse) -> Result<()> {
        let mut line = serde_json::to_vec(response)?;
        line.push(b'\n');
        let mut guard = self.stdin.lock().await;
        match guard.as_mut() {
            Some(stdin) => stdin.write_all(&line).await.map_err(RpcError::WriteFailed),
            None => Err(RpcError::Disposed),
        }
    }

    async fn run_stdout(self: Arc<Self>, stdout: tokio::process::ChildStdout) {
        let mut lines = BufReader::new(stdout).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => self.dispatch_line(line).await,
                Ok(None) | Err(_) => break,
            }
        }
    }

    async fn run_stderr(self: Arc<Self>, stderr: tokio::process::ChildStderr) {
        let mut lines = BufReader::new(stderr).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            (self.callbacks.on_stderr)(line);
        }
    }

    async fn run_supervisor(self: Arc<Self>, mut child: Child) {
        tokio::select! {
            status = child.wait() => {
                if self.disposed.swap(true, Ordering::SeqCst) {
                    // dispose() already ran; this exit was expected.
                    return;
                }
                let (exit_code, signal) = match status {
                    Ok(status) => (status.code(), exit_signal(&status)),
                    Err(_) => (None, None),
                };
                let err = RpcError::UnexpectedExit { exit_code, signal };
                self.reject_all_pending(RpcError::UnexpectedExit { exit_code, signal });
                (self.callbacks.on_exit)(Some(err));
            }
            () = self.cancel.cancelled() => {
                let _ = child.start_kill();
                let _ = child.wait().await;
            }
        }
    }

    async fn dispatch_line(&self, line: String) {
        let Ok(value) = serde_json::from_str::<Value>(&line) else {
            return;
        };
        let Some(frame) = classify_line(value) else {
            return;
        };
        match frame {
            InboundFrame::Response { id, result } => self.resolve_pending(&id, Ok(result)),
            InboundFrame::Error { id, error } => {
                let method = self
                    .pending
                    .lock()
                    .get(&id_as_key(&id).unwrap_or(-1))
                    .map(|p| p.method.clone())
                    .unwrap_or_default();
                self.resolve_pending(
                    &id,
                    Err(RpcError::RemoteError {
                        method,
                        code: error.code,
                        message: error.message,
                    }),
                );
            }
            InboundFrame::Request { id, method, params } => {
                self.handle_inbound_request(id, method, params).await;
            }
            InboundFrame::Notification { method, params } => {
                (self.callbacks.on_notification)(method, params);
            }
        }
    }

    fn resolve_pending(&self, id: &RpcId, outcome: std::result::Result<Value, RpcError>) {
        let Some(key) = id_as_key(id) else { return };
        if let Some(entry) = self.pending.lock().remove(&key) {
            let _ = entry.reply.send(outcome);
        }
    }

    async fn handle_inbound_request(&self, id: RpcId, method: String, params: Option<Value>) {
        let outcome = (self.callbacks.on_request)(&method, params);
        let response = match outcome {
            RequestOutcome::Ok(result) => OutboundResponse {
                id,
                result: Some(result),
                error: None,
            },
            RequestOutcome::MethodNotFound => OutboundResponse {
                id,
                result: None,
                error: Some(JsonRpcErrorBody {
                    code: METHOD_NOT_FOUND,
                    message: format!("method not found: {method}"),
                    data: None,
                }),
            },
            RequestOutcome::Failed(message) => OutboundResponse {
                id,
                result: None,
                error: Some(JsonRpcErrorBody {
                    code: SERVER_ERROR,
                    message,
                    data: None,
                }),
            },
        };
        let _ = self.write_response(&response).await;
    }
}

#[cfg(unix)]
fn exit_signal(status: &std::process::ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;
    status.signal()
}

#[cfg(not(unix))]
fn exit_signal(_status: &std::process::ExitStatus) -> Option<i32> {
    None
}

fn id_as_key(id: &RpcId) -> Option<i64> {
    match id {
        RpcId::Number(n) => Some(*n),
        RpcId::String(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop_callbacks() -> RpcCallbacks {
        RpcCallbacks {
            on_notification: Arc::new(|_, _| {}),
            on_request: Arc::new(|_, _| RequestOutcome::MethodNotFound),
            on_exit: Arc::new(|_| {}),
            on_stderr: Arc::new(|_| {}),
        }
    }

    #[tokio::test]
    async fn spawn_missing_binary_is_binary_missing() {
        let result = JsonRpcClient::spawn(
            "definitely-not-a-real-binary-xyz",
            &[],
            None,
            &HashMap::new(),
            noop_callbacks(),
        )
        .await;
        assert!(matches!(result, Err(RpcError::BinaryMissing(_))));
    }

    #[tokio::test]
    async fn request_after_dispose_is_rejected() {
        let client = JsonRpcClient::spawn(
            "cat",
            &[],
            None,
            &HashMap::new(),
            noop_callbacks(),
        )
        .await
        .unwrap();
        client.dispose().await;
        let result = client.request("turn/start", None, 1000).await;
        assert!(matches!(result, Err(RpcError::Disposed)));
    }

    #[tokio::test]
    async fn notify_after_dispose_is_rejected() {
        let client = JsonRpcClient::spawn(
            "cat",
            &[],
            None,
            &HashMap::new(),
            noop_callbacks(),
        )
        .await
        .unwrap();
        client.dispose().await;
        let result = client.notify("log", None).await;
        assert!(matches!(result, Err(RpcError::Disposed)));
    }

    #[tokio::test]
    async fn dispose_is_idempotent() {
        let client = JsonRpcClient::spawn(
            "cat",
            &[],
            None,
            &HashMap::new(),
            noop_callbacks(),
        )
        .await
        .unwrap();
        client.dispose().await;
        client.dispose().await;
    }

    #[tokio::test]
    async fn request_times_out_with_no_responder() {
        let client = JsonRpcClient::spawn(
            "cat",
            &[],
            None,
            &HashMap::new(),
            noop_callbacks(),
        )
        .await
        .unwrap();
        // `cat` echoes stdin back on stdout, but our frame has no `id` tied
        // to a response shape `cat` would produce, so this must time out.
        let result = client.request("ping", None, 50).await;
        assert!(matches!(result, Err(RpcError::Timeout { .. })));
        client.dispose().await;
    }
}
