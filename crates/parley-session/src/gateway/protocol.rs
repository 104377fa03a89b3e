//! Wire protocol between [`IpcGateway`](super::IpcGateway) and the backend
//! process: one JSON object per line in each direction.

use parley_common::InferenceParameters;
use serde::{Deserialize, Serialize};

use super::{InferenceToken, ModelLoadProgress};
use crate::error::GatewayError;

/// Calls sent to the backend.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "method", content = "params", rename_all = "snake_case")]
pub enum BackendRequest {
    LoadModel {
        path: String,
    },
    RunInference {
        prompt: String,
        params: InferenceParameters,
    },
    /// Fire-and-forget; sent without an id and never answered.
    RequestCancel,
}

/// A request line. Calls that expect an answer carry an id.
#[derive(Debug, Clone, Serialize)]
pub struct RequestFrame {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    #[serde(flatten)]
    pub request: BackendRequest,
}

/// Events pushed by the backend while a call is outstanding.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", content = "payload", rename_all = "snake_case")]
pub enum BackendEvent {
    OnModelLoadProgress(ModelLoadProgress),
    OnInferenceToken(InferenceToken),
}

/// Resolution of the call with the matching id.
#[derive(Debug, Clone, Deserialize)]
pub struct ResponseFrame {
    pub id: u64,
    #[serde(default)]
    pub error: Option<BackendFailure>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    #[default]
    Backend,
    Generation,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BackendFailure {
    #[serde(default)]
    pub kind: FailureKind,
    pub message: String,
}

impl From<BackendFailure> for GatewayError {
    fn from(failure: BackendFailure) -> Self {
        match failure.kind {
            FailureKind::Backend => GatewayError::Backend(failure.message),
            FailureKind::Generation => GatewayError::Generation(failure.message),
        }
    }
}

/// Any line the backend may write.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum BackendMessage {
    Event(BackendEvent),
    Response(ResponseFrame),
}

impl BackendMessage {
    pub fn parse(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_model_request_shape() {
        let frame = RequestFrame {
            id: Some(1),
            request: BackendRequest::LoadModel {
                path: "m.bin".into(),
            },
        };
        let json: serde_json::Value = serde_json::to_value(&frame).unwrap();
        assert_eq!(json["id"], 1);
        assert_eq!(json["method"], "load_model");
        assert_eq!(json["params"]["path"], "m.bin");
    }

    #[test]
    fn run_inference_request_carries_parameters() {
        let frame = RequestFrame {
            id: Some(2),
            request: BackendRequest::RunInference {
                prompt: "Hi".into(),
                params: InferenceParameters::default(),
            },
        };
        let json: serde_json::Value = serde_json::to_value(&frame).unwrap();
        assert_eq!(json["method"], "run_inference");
        assert_eq!(json["params"]["prompt"], "Hi");
        assert_eq!(json["params"]["params"]["top_k"], 40);
        assert!(json["params"]["params"]["max_token_count"].is_null());
    }

    #[test]
    fn cancel_request_has_no_id() {
        let frame = RequestFrame {
            id: None,
            request: BackendRequest::RequestCancel,
        };
        let json = serde_json::to_string(&frame).unwrap();
        assert_eq!(json, r#"{"method":"request_cancel"}"#);
    }

    #[test]
    fn parses_progress_event() {
        let msg = BackendMessage::parse(
            r#"{"event":"on_model_load_progress","payload":{"progress":0.3,"message":"tensor 3/10"}}"#,
        )
        .unwrap();
        match msg {
            BackendMessage::Event(BackendEvent::OnModelLoadProgress(p)) => {
                assert_eq!(p.progress, 0.3);
                assert_eq!(p.message.as_deref(), Some("tensor 3/10"));
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn parses_token_event() {
        let msg =
            BackendMessage::parse(r#"{"event":"on_inference_token","payload":{"token":"He"}}"#)
                .unwrap();
        assert!(matches!(
            msg,
            BackendMessage::Event(BackendEvent::OnInferenceToken(ref t)) if t.token == "He"
        ));
    }

    #[test]
    fn parses_success_and_failure_responses() {
        let ok = BackendMessage::parse(r#"{"id":4}"#).unwrap();
        assert!(matches!(ok, BackendMessage::Response(ResponseFrame { id: 4, error: None })));

        let failed = BackendMessage::parse(
            r#"{"id":5,"error":{"kind":"generation","message":"cancelled"}}"#,
        )
        .unwrap();
        let BackendMessage::Response(frame) = failed else {
            panic!("expected a response");
        };
        let err: GatewayError = frame.error.unwrap().into();
        assert_eq!(err, GatewayError::Generation("cancelled".into()));
    }

    #[test]
    fn failure_kind_defaults_to_backend() {
        let msg = BackendMessage::parse(r#"{"id":1,"error":{"message":"file not found"}}"#).unwrap();
        let BackendMessage::Response(frame) = msg else {
            panic!("expected a response");
        };
        let err: GatewayError = frame.error.unwrap().into();
        assert_eq!(err, GatewayError::Backend("file not found".into()));
    }

    #[test]
    fn rejects_garbage() {
        assert!(BackendMessage::parse("not json").is_err());
        assert!(BackendMessage::parse(r#"{"event":"on_inference_token"}"#).is_err());
    }
}
