//! Scripted gateway for driving the controller and runtime in tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use parley_common::InferenceParameters;
use tokio::sync::{oneshot, Notify};

use crate::error::GatewayError;
use crate::gateway::{
    BackendGateway, GatewayEventSink, GatewayEvents, InferenceToken, ModelLoadProgress,
};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum GatewayCall {
    LoadModel(String),
    RunInference {
        prompt: String,
        params: InferenceParameters,
    },
}

/// Resolves one outstanding scripted call.
pub(crate) struct Reply(oneshot::Sender<Result<(), GatewayError>>);

impl Reply {
    pub(crate) fn resolve(self, result: Result<(), GatewayError>) {
        let _ = self.0.send(result);
    }
}

/// A gateway whose calls stay outstanding until the test resolves them.
pub(crate) struct ScriptedGateway {
    sink: GatewayEventSink,
    events: Mutex<Option<GatewayEvents>>,
    calls: Mutex<Vec<GatewayCall>>,
    replies: Mutex<VecDeque<Reply>>,
    call_started: Notify,
    cancels: AtomicUsize,
}

impl ScriptedGateway {
    pub(crate) fn new() -> Arc<Self> {
        let (sink, events) = GatewayEvents::channel();
        Arc::new(Self {
            sink,
            events: Mutex::new(Some(events)),
            calls: Mutex::new(Vec::new()),
            replies: Mutex::new(VecDeque::new()),
            call_started: Notify::new(),
            cancels: AtomicUsize::new(0),
        })
    }

    pub(crate) fn progress(&self, progress: f32) {
        self.sink.progress(ModelLoadProgress {
            progress,
            message: None,
        });
    }

    pub(crate) fn token(&self, token: &str) {
        self.sink.token(InferenceToken {
            token: token.to_string(),
        });
    }

    pub(crate) fn calls(&self) -> Vec<GatewayCall> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn cancel_count(&self) -> usize {
        self.cancels.load(Ordering::SeqCst)
    }

    /// Wait until a call is outstanding and take its reply handle.
    pub(crate) async fn next_call(&self) -> Reply {
        loop {
            let notified = self.call_started.notified();
            if let Some(reply) = self.replies.lock().unwrap().pop_front() {
                return reply;
            }
            notified.await;
        }
    }

    async fn outstanding(&self, call: GatewayCall) -> Result<(), GatewayError> {
        let (tx, rx) = oneshot::channel();
        self.calls.lock().unwrap().push(call);
        self.replies.lock().unwrap().push_back(Reply(tx));
        self.call_started.notify_one();
        rx.await
            .unwrap_or_else(|_| Err(GatewayError::Transport("reply dropped".into())))
    }
}

#[async_trait]
impl BackendGateway for ScriptedGateway {
    async fn load_model(&self, path: &str) -> Result<(), GatewayError> {
        self.outstanding(GatewayCall::LoadModel(path.to_string()))
            .await
    }

    async fn run_inference(
        &self,
        prompt: &str,
        params: &InferenceParameters,
    ) -> Result<(), GatewayError> {
        self.outstanding(GatewayCall::RunInference {
            prompt: prompt.to_string(),
            params: params.clone(),
        })
        .await
    }

    fn request_cancel(&self) {
        self.cancels.fetch_add(1, Ordering::SeqCst);
    }

    fn take_events(&self) -> Option<GatewayEvents> {
        self.events.lock().unwrap().take()
    }
}
