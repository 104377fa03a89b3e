//! Newline-delimited JSON gateway over any async byte stream.
//!
//! One writer task serializes outbound frames; one reader task parses
//! inbound lines, forwards events, and resolves outstanding calls by id.
//! Because a single task handles both, every event written before a
//! response is forwarded before that response resolves its call.

use std::collections::HashMap;
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use parley_common::InferenceParameters;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use super::protocol::{BackendEvent, BackendMessage, BackendRequest, RequestFrame};
use super::{BackendGateway, GatewayEventSink, GatewayEvents};
use crate::error::GatewayError;
use crate::prompt::PromptTemplate;

type Waiter = oneshot::Sender<Result<(), GatewayError>>;

/// Outstanding calls keyed by request id.
#[derive(Default)]
struct PendingCalls {
    waiters: HashMap<u64, Waiter>,
    /// Set once the connection is gone; later calls fail immediately.
    closed: Option<String>,
}

impl PendingCalls {
    fn fail_all(&mut self, reason: &str) {
        self.closed = Some(reason.to_string());
        for (id, waiter) in self.waiters.drain() {
            debug!(id, "failing outstanding backend call: {reason}");
            let _ = waiter.send(Err(GatewayError::Transport(reason.to_string())));
        }
    }
}

#[derive(Clone, Default)]
struct SharedCalls(Arc<Mutex<PendingCalls>>);

impl SharedCalls {
    fn lock(&self) -> MutexGuard<'_, PendingCalls> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Gateway that talks to an inference backend over a JSON-lines stream.
pub struct IpcGateway {
    outbound: mpsc::UnboundedSender<String>,
    calls: SharedCalls,
    next_id: AtomicU64,
    events: Mutex<Option<GatewayEvents>>,
    template: Option<PromptTemplate>,
    shutdown: CancellationToken,
    child: Option<Mutex<Child>>,
}

impl IpcGateway {
    /// Connect to a backend reachable through `reader`/`writer`.
    ///
    /// Must be called inside a tokio runtime; the reader and writer tasks
    /// run until the stream closes or the gateway is dropped.
    pub fn connect<R, W>(reader: R, writer: W, template: Option<PromptTemplate>) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel::<String>();
        let (sink, events) = GatewayEvents::channel();
        let calls = SharedCalls::default();
        let shutdown = CancellationToken::new();

        tokio::spawn(write_loop(
            writer,
            outbound_rx,
            calls.clone(),
            shutdown.clone(),
        ));
        tokio::spawn(read_loop(reader, sink, calls.clone(), shutdown.clone()));

        Self {
            outbound: outbound_tx,
            calls,
            next_id: AtomicU64::new(1),
            events: Mutex::new(Some(events)),
            template,
            shutdown,
            child: None,
        }
    }

    /// Launch the backend process and connect to its stdin/stdout.
    ///
    /// The process is killed when the gateway is dropped.
    pub fn spawn(
        command: &str,
        args: &[String],
        template: Option<PromptTemplate>,
    ) -> Result<Self, GatewayError> {
        let mut child = Command::new(command)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| GatewayError::Transport(format!("failed to start {command}: {e}")))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| GatewayError::Transport("backend stdin unavailable".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| GatewayError::Transport("backend stdout unavailable".into()))?;

        info!(command, pid = child.id(), "backend process started");

        let mut gateway = Self::connect(stdout, stdin, template);
        gateway.child = Some(Mutex::new(child));
        Ok(gateway)
    }

    async fn call(&self, request: BackendRequest) -> Result<(), GatewayError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();

        {
            let mut calls = self.calls.lock();
            if let Some(ref reason) = calls.closed {
                return Err(GatewayError::Transport(reason.clone()));
            }
            calls.waiters.insert(id, tx);
        }

        let frame = RequestFrame {
            id: Some(id),
            request,
        };
        if let Err(e) = self.send_frame(&frame) {
            self.calls.lock().waiters.remove(&id);
            return Err(e);
        }

        rx.await.map_err(|_| {
            GatewayError::Transport("backend connection dropped the request".into())
        })?
    }

    fn send_frame(&self, frame: &RequestFrame) -> Result<(), GatewayError> {
        let line = serde_json::to_string(frame)
            .map_err(|e| GatewayError::Transport(format!("failed to encode request: {e}")))?;
        self.outbound
            .send(line)
            .map_err(|_| GatewayError::Transport("backend connection is closed".into()))
    }
}

impl Drop for IpcGateway {
    fn drop(&mut self) {
        self.shutdown.cancel();
        if let Some(ref child) = self.child {
            let mut child = child.lock().unwrap_or_else(PoisonError::into_inner);
            if let Err(e) = child.start_kill() {
                debug!("backend process already gone: {e}");
            }
        }
    }
}

#[async_trait]
impl BackendGateway for IpcGateway {
    async fn load_model(&self, path: &str) -> Result<(), GatewayError> {
        debug!(path, "load_model");
        self.call(BackendRequest::LoadModel {
            path: path.to_string(),
        })
        .await
    }

    async fn run_inference(
        &self,
        prompt: &str,
        params: &InferenceParameters,
    ) -> Result<(), GatewayError> {
        let prompt = match self.template {
            Some(ref template) => template.render(prompt),
            None => prompt.to_string(),
        };
        debug!(?params, "run_inference");
        self.call(BackendRequest::RunInference {
            prompt,
            params: params.clone(),
        })
        .await
    }

    fn request_cancel(&self) {
        let frame = RequestFrame {
            id: None,
            request: BackendRequest::RequestCancel,
        };
        if let Err(e) = self.send_frame(&frame) {
            warn!("cancel request not delivered: {e}");
        }
    }

    fn take_events(&self) -> Option<GatewayEvents> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

async fn write_loop<W>(
    mut writer: W,
    mut outbound: mpsc::UnboundedReceiver<String>,
    calls: SharedCalls,
    shutdown: CancellationToken,
) where
    W: AsyncWrite + Unpin,
{
    loop {
        let line = tokio::select! {
            _ = shutdown.cancelled() => break,
            line = outbound.recv() => match line {
                Some(line) => line,
                None => break,
            },
        };

        trace!(%line, "-> backend");
        let result = async {
            writer.write_all(line.as_bytes()).await?;
            writer.write_all(b"\n").await?;
            writer.flush().await
        }
        .await;

        if let Err(e) = result {
            warn!("failed to write to backend: {e}");
            calls.lock().fail_all(&format!("failed to write to backend: {e}"));
            break;
        }
    }
}

async fn read_loop<R>(
    reader: R,
    sink: GatewayEventSink,
    calls: SharedCalls,
    shutdown: CancellationToken,
) where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();

    let reason = loop {
        let line = tokio::select! {
            _ = shutdown.cancelled() => break "gateway shut down".to_string(),
            line = lines.next_line() => line,
        };

        let line = match line {
            Ok(Some(line)) => line,
            Ok(None) => break "backend closed the connection".to_string(),
            Err(e) => break format!("failed to read from backend: {e}"),
        };

        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        trace!(%line, "<- backend");

        match BackendMessage::parse(line) {
            Ok(BackendMessage::Event(BackendEvent::OnModelLoadProgress(progress))) => {
                sink.progress(progress);
            }
            Ok(BackendMessage::Event(BackendEvent::OnInferenceToken(token))) => {
                sink.token(token);
            }
            Ok(BackendMessage::Response(frame)) => {
                let waiter = calls.lock().waiters.remove(&frame.id);
                match waiter {
                    Some(waiter) => {
                        let result = match frame.error {
                            Some(failure) => Err(GatewayError::from(failure)),
                            None => Ok(()),
                        };
                        let _ = waiter.send(result);
                    }
                    None => warn!(id = frame.id, "response for unknown request"),
                }
            }
            Err(e) => warn!("ignoring malformed backend line: {e}"),
        }
    };

    info!("backend connection closed: {reason}");
    calls.lock().fail_all(&reason);
}
