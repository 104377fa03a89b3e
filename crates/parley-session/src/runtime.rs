//! The session actor: one task that owns the controller and serializes
//! every intent, gateway event and call resolution.
//!
//! Views talk to it through a [`SessionHandle`]: intents go in over an
//! mpsc channel, state comes out as [`SessionSnapshot`]s on a watch channel
//! and discrete [`SessionEvent`]s on the event bus.

use std::sync::Arc;

use parley_common::{EventBus, SessionEvent};
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::controller::{CallKind, Intent, PendingCall, SessionController};
use crate::error::{GatewayError, SessionClosed};
use crate::gateway::{BackendGateway, GatewayEvents, InferenceToken, ModelLoadProgress};
use crate::store::SessionSnapshot;

#[derive(Debug, Clone, Copy)]
pub struct RuntimeOptions {
    /// Intents buffered before [`SessionHandle::send`] waits.
    pub intent_capacity: usize,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            intent_capacity: 32,
        }
    }
}

/// Messages accepted by the actor, in send order.
enum Message {
    Intent(Intent),
    /// Answered once everything sent before it has been applied and published.
    Flush(oneshot::Sender<()>),
}

/// Start the session actor on the current tokio runtime.
///
/// Fails if the gateway's event streams were already taken.
pub fn spawn_session<G: BackendGateway>(
    controller: SessionController<G>,
    options: RuntimeOptions,
) -> Result<SessionHandle, GatewayError> {
    let events = controller
        .gateway()
        .take_events()
        .ok_or_else(|| GatewayError::Transport("gateway event streams already taken".into()))?;

    let (intent_tx, intent_rx) = mpsc::channel(options.intent_capacity.max(1));
    let (snapshot_tx, snapshot_rx) = watch::channel(controller.snapshot());
    let bus = Arc::clone(controller.event_bus());
    let shutdown = CancellationToken::new();

    let actor = SessionActor {
        published: controller.revision(),
        controller,
        events,
        intents: intent_rx,
        snapshots: snapshot_tx,
        shutdown: shutdown.clone(),
        pending: None,
    };
    let task = tokio::spawn(actor.run());

    Ok(SessionHandle {
        intents: intent_tx,
        snapshots: snapshot_rx,
        bus,
        shutdown,
        task,
    })
}

/// Client side of a running session.
pub struct SessionHandle {
    intents: mpsc::Sender<Message>,
    snapshots: watch::Receiver<SessionSnapshot>,
    bus: Arc<EventBus>,
    shutdown: CancellationToken,
    task: JoinHandle<()>,
}

impl SessionHandle {
    pub async fn send(&self, intent: Intent) -> Result<(), SessionClosed> {
        self.intents
            .send(Message::Intent(intent))
            .await
            .map_err(|_| SessionClosed)
    }

    /// Wait until every intent sent so far has been applied and the
    /// resulting snapshot published.
    pub async fn flush(&self) -> Result<(), SessionClosed> {
        let (tx, rx) = oneshot::channel();
        self.intents
            .send(Message::Flush(tx))
            .await
            .map_err(|_| SessionClosed)?;
        rx.await.map_err(|_| SessionClosed)
    }

    /// The most recently published state.
    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshots.borrow().clone()
    }

    /// Receiver notified on every state change.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshots.clone()
    }

    pub fn events(&self) -> broadcast::Receiver<SessionEvent> {
        self.bus.subscribe()
    }

    /// Stop the actor and wait for it to exit. An outstanding generation
    /// is asked to cancel first.
    pub async fn shutdown(self) {
        self.shutdown.cancel();
        if let Err(e) = self.task.await {
            warn!("session task ended abnormally: {e}");
        }
    }
}

enum Step {
    Progress(Option<ModelLoadProgress>),
    Token(Option<InferenceToken>),
    Resolved(CallKind, Result<(), GatewayError>),
    Message(Option<Message>),
    Shutdown,
}

struct SessionActor<G: BackendGateway> {
    controller: SessionController<G>,
    events: GatewayEvents,
    intents: mpsc::Receiver<Message>,
    snapshots: watch::Sender<SessionSnapshot>,
    shutdown: CancellationToken,
    pending: Option<PendingCall>,
    published: u64,
}

impl<G: BackendGateway> SessionActor<G> {
    async fn run(mut self) {
        info!("Session started");
        let mut progress_open = true;
        let mut tokens_open = true;

        loop {
            // Events before the call: a call's events are always delivered
            // before it resolves, and must be applied first.
            let step = tokio::select! {
                biased;
                event = self.events.progress.recv(), if progress_open => Step::Progress(event),
                token = self.events.tokens.recv(), if tokens_open => Step::Token(token),
                (kind, result) = outstanding(&mut self.pending) => Step::Resolved(kind, result),
                message = self.intents.recv() => Step::Message(message),
                _ = self.shutdown.cancelled() => Step::Shutdown,
            };

            match step {
                Step::Progress(Some(event)) => self.controller.on_model_load_progress(event),
                Step::Progress(None) => {
                    debug!("progress stream closed");
                    progress_open = false;
                }
                Step::Token(Some(token)) => self.controller.on_inference_token(token),
                Step::Token(None) => {
                    debug!("token stream closed");
                    tokens_open = false;
                }
                Step::Resolved(kind, result) => {
                    self.pending = None;
                    self.resolve(kind, result);
                }
                Step::Message(Some(Message::Intent(intent))) => self.apply(intent),
                Step::Message(Some(Message::Flush(done))) => {
                    self.publish();
                    let _ = done.send(());
                }
                Step::Message(None) => {
                    info!("All session handles dropped");
                    break;
                }
                Step::Shutdown => break,
            }

            self.publish();
        }

        self.stop();
    }

    fn resolve(&mut self, kind: CallKind, result: Result<(), GatewayError>) {
        for event in self.events.drain_progress() {
            self.controller.on_model_load_progress(event);
        }
        for token in self.events.drain_tokens() {
            self.controller.on_inference_token(token);
        }
        self.controller.complete(kind, result);
    }

    fn apply(&mut self, intent: Intent) {
        match self.controller.handle_intent(intent) {
            Ok(Some(call)) => {
                debug!(kind = %call.kind, request_id = %call.request_id, "gateway call issued");
                if let Some(previous) = self.pending.replace(call) {
                    warn!(kind = %previous.kind, "replaced an outstanding gateway call");
                }
            }
            Ok(None) => {}
            Err(violation) => {
                debug!(%violation, "intent rejected");
                self.controller
                    .event_bus()
                    .publish(SessionEvent::IntentRejected {
                        reason: violation.to_string(),
                    });
            }
        }
    }

    fn publish(&mut self) {
        let revision = self.controller.revision();
        if revision != self.published {
            self.published = revision;
            self.snapshots.send_replace(self.controller.snapshot());
        }
    }

    fn stop(&mut self) {
        if self.controller.status().is_generating() {
            info!("Cancelling generation before shutdown");
            self.controller.gateway().request_cancel();
        }
        self.pending = None;
        self.controller.event_bus().publish(SessionEvent::Shutdown);
        info!("Session stopped");
    }
}

/// Resolves with the outstanding call's result, or never if there is none.
async fn outstanding(pending: &mut Option<PendingCall>) -> (CallKind, Result<(), GatewayError>) {
    match pending {
        Some(call) => {
            let result = (&mut call.future).await;
            (call.kind, result)
        }
        None => std::future::pending().await,
    }
}
