//! # Frame dialects
//!
//! A frame is one JSON document carrying a discriminator and a value. Each
//! remote protocol spells that differently; [`FrameDialect`] names the ones
//! relay understands and maps each to a [`StreamEvent`].
//!
//! | Dialect  | Discriminator        | Value               |
//! |----------|----------------------|---------------------|
//! | `Tagged` | `type`               | `value`             |
//! | `Public` | `ResponseType` (int) | `Value`             |
//! | `A2a`    | `result.kind`        | the `result` object |
//!
//! Classification has three outcomes: an event, `Ok(None)` for a well-formed
//! frame with a discriminator relay does not know, or [`FrameError`] for
//! anything that does not parse. Callers drop the last two.

use relay_core::StreamEvent;
use serde::Deserialize;
use serde_json::{Map, Value, json};

/// Data line that ends a stream in every dialect.
pub const DONE_MARKER: &str = "[DONE]";

/// A frame that could not be interpreted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameError(pub String);

impl std::fmt::Display for FrameError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "malformed frame: {}", self.0)
    }
}

impl std::error::Error for FrameError {}

impl From<serde_json::Error> for FrameError {
    fn from(e: serde_json::Error) -> Self {
        Self(e.to_string())
    }
}

/// Wire format of the frames in a stream.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FrameDialect {
    /// `{"type": "message|status|meta|done|error", "value": ...}`.
    #[default]
    Tagged,
    /// Public agent API frames with numeric `ResponseType` codes.
    Public,
    /// A2A JSON-RPC streaming responses.
    A2a,
}

impl FrameDialect {
    /// Classify one frame payload.
    pub fn classify(self, payload: &str) -> Result<Option<StreamEvent>, FrameError> {
        if payload == DONE_MARKER {
            return Ok(Some(StreamEvent::Done));
        }
        match self {
            Self::Tagged => classify_tagged(payload),
            Self::Public => classify_public(payload),
            Self::A2a => classify_a2a(payload),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Shared value handling
// ─────────────────────────────────────────────────────────────────────────────

/// Text of a message/status value: strings as-is, null as empty, else JSON.
fn value_text(value: Option<Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s,
        Some(other) => other.to_string(),
    }
}

/// Meta payloads may arrive as an embedded JSON string; decode one level more.
fn meta_payload(value: Option<Value>) -> Result<Value, FrameError> {
    match value {
        Some(Value::String(raw)) => serde_json::from_str(&raw)
            .map_err(|e| FrameError(format!("meta value is not JSON: {e}"))),
        Some(Value::Null) | None => Err(FrameError("meta frame without value".into())),
        Some(other) => Ok(other),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tagged
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct TaggedFrame {
    #[serde(rename = "type", alias = "kind")]
    kind: String,
    #[serde(default)]
    value: Option<Value>,
}

fn classify_tagged(payload: &str) -> Result<Option<StreamEvent>, FrameError> {
    let frame: TaggedFrame = serde_json::from_str(payload)?;
    let event = match frame.kind.as_str() {
        "message" => StreamEvent::message(value_text(frame.value)),
        "status" => StreamEvent::status(value_text(frame.value)),
        "meta" => StreamEvent::Meta {
            payload: meta_payload(frame.value)?,
        },
        "done" => StreamEvent::Done,
        "error" => StreamEvent::error(error_reason(frame.value)),
        _ => return Ok(None),
    };
    Ok(Some(event))
}

fn error_reason(value: Option<Value>) -> String {
    match value {
        Some(Value::Object(map)) => map
            .get("message")
            .and_then(Value::as_str)
            .map_or_else(|| Value::Object(map.clone()).to_string(), str::to_owned),
        other => {
            let text = value_text(other);
            if text.is_empty() {
                "remote reported an error".to_string()
            } else {
                text
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Public API
// ─────────────────────────────────────────────────────────────────────────────

/// `ResponseType` codes used by the public agent API.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ResponseKind {
    Message,
    Status,
    Done,
    Meta,
}

impl ResponseKind {
    fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Self::Message),
            2 => Some(Self::Status),
            8 => Some(Self::Done),
            11 => Some(Self::Meta),
            _ => None,
        }
    }
}

#[derive(Deserialize)]
struct PublicFrame {
    #[serde(rename = "ResponseType")]
    response_type: i64,
    #[serde(rename = "Value", default)]
    value: Option<Value>,
}

fn classify_public(payload: &str) -> Result<Option<StreamEvent>, FrameError> {
    let frame: PublicFrame = serde_json::from_str(payload)?;
    let Some(kind) = ResponseKind::from_code(frame.response_type) else {
        return Ok(None);
    };
    let event = match kind {
        ResponseKind::Message => StreamEvent::message(value_text(frame.value)),
        ResponseKind::Status => StreamEvent::status(value_text(frame.value)),
        ResponseKind::Meta => StreamEvent::Meta {
            payload: meta_payload(frame.value)?,
        },
        ResponseKind::Done => StreamEvent::Done,
    };
    Ok(Some(event))
}

// ─────────────────────────────────────────────────────────────────────────────
// A2A
// ─────────────────────────────────────────────────────────────────────────────

/// Task states after which an A2A task will not produce output.
const FAILED_STATES: [&str; 3] = ["failed", "rejected", "canceled"];

fn classify_a2a(payload: &str) -> Result<Option<StreamEvent>, FrameError> {
    let frame: Value = serde_json::from_str(payload)?;
    let Value::Object(envelope) = frame else {
        return Err(FrameError("A2A frame is not an object".into()));
    };

    if let Some(error) = envelope.get("error") {
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("JSON-RPC error");
        let reason = match error.get("code").and_then(Value::as_i64) {
            Some(code) => format!("{message} (code {code})"),
            None => message.to_string(),
        };
        return Ok(Some(StreamEvent::error(reason)));
    }

    // Bare results (without the JSON-RPC envelope) are accepted too
    let result = match envelope.get("result") {
        Some(Value::Object(result)) => result,
        Some(_) => return Err(FrameError("A2A result is not an object".into())),
        None => &envelope,
    };
    let Some(kind) = result.get("kind").and_then(Value::as_str) else {
        return Err(FrameError("A2A result without kind".into()));
    };

    let event = match kind {
        "artifact-update" => {
            let text = result.get("artifact").map(parts_text).unwrap_or_default();
            if text.is_empty() {
                return Ok(None);
            }
            StreamEvent::message(text)
        }
        "message" => {
            let text = parts_text(&Value::Object(result.clone()));
            if text.is_empty() {
                return Ok(None);
            }
            StreamEvent::message(text)
        }
        "status-update" => status_update(result),
        "task" => StreamEvent::Meta {
            payload: task_meta(result),
        },
        _ => return Ok(None),
    };
    Ok(Some(event))
}

/// Concatenate the `text` parts of anything with a `parts` array.
fn parts_text(container: &Value) -> String {
    container
        .get("parts")
        .and_then(Value::as_array)
        .map(|parts| {
            parts
                .iter()
                .filter(|p| p.get("kind").and_then(Value::as_str) == Some("text"))
                .filter_map(|p| p.get("text").and_then(Value::as_str))
                .collect::<String>()
        })
        .unwrap_or_default()
}

fn status_update(result: &Map<String, Value>) -> StreamEvent {
    let status = result.get("status");
    let state = status
        .and_then(|s| s.get("state"))
        .and_then(Value::as_str)
        .unwrap_or("unknown");
    let text = status
        .and_then(|s| s.get("message"))
        .map(parts_text)
        .unwrap_or_default();
    let line = if text.is_empty() {
        state.to_string()
    } else {
        format!("{state} {text}")
    };

    let is_final = result.get("final").and_then(Value::as_bool).unwrap_or(false);
    if is_final && FAILED_STATES.contains(&state) {
        StreamEvent::error(format!("task {line}"))
    } else {
        StreamEvent::status(line)
    }
}

fn task_meta(result: &Map<String, Value>) -> Value {
    json!({
        "taskId": result.get("id").cloned().unwrap_or(Value::Null),
        "contextId": result.get("contextId").cloned().unwrap_or(Value::Null),
        "state": result
            .get("status")
            .and_then(|s| s.get("state"))
            .cloned()
            .unwrap_or(Value::Null),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    // ── Tagged ───────────────────────────────────────────────────────

    #[test]
    fn tagged_kinds() {
        let d = FrameDialect::Tagged;
        assert_eq!(
            d.classify(r#"{"type":"message","value":"hi"}"#).unwrap(),
            Some(StreamEvent::message("hi"))
        );
        assert_eq!(
            d.classify(r#"{"type":"status","value":"working"}"#).unwrap(),
            Some(StreamEvent::status("working"))
        );
        assert_eq!(d.classify(r#"{"type":"done"}"#).unwrap(), Some(StreamEvent::Done));
        assert_eq!(
            d.classify(r#"{"type":"error","value":{"message":"quota"}}"#).unwrap(),
            Some(StreamEvent::error("quota"))
        );
    }

    #[test]
    fn tagged_meta_object_and_embedded_string() {
        let d = FrameDialect::Tagged;
        let direct = d.classify(r#"{"type":"meta","value":{"taskId":"t1"}}"#).unwrap();
        let embedded = d
            .classify(r#"{"type":"meta","value":"{\"taskId\":\"t1\"}"}"#)
            .unwrap();
        assert_eq!(direct, embedded);
        assert_eq!(direct.unwrap().task_id().unwrap().as_str(), "t1");
    }

    #[test]
    fn tagged_meta_bad_embedded_json_is_malformed() {
        let err = FrameDialect::Tagged
            .classify(r#"{"type":"meta","value":"{not json"}"#)
            .unwrap_err();
        assert!(err.to_string().contains("meta value"));
    }

    #[test]
    fn tagged_unknown_type_is_ignored() {
        assert_eq!(
            FrameDialect::Tagged
                .classify(r#"{"type":"heartbeat","value":1}"#)
                .unwrap(),
            None
        );
    }

    #[test]
    fn tagged_missing_value_is_empty_text() {
        assert_eq!(
            FrameDialect::Tagged.classify(r#"{"type":"message"}"#).unwrap(),
            Some(StreamEvent::message(""))
        );
    }

    #[test]
    fn garbage_is_malformed() {
        for d in [FrameDialect::Tagged, FrameDialect::Public, FrameDialect::A2a] {
            assert!(d.classify("{\"type\":\"mess").is_err());
            assert!(d.classify("hello world").is_err());
        }
    }

    #[test]
    fn done_marker_in_every_dialect() {
        for d in [FrameDialect::Tagged, FrameDialect::Public, FrameDialect::A2a] {
            assert_eq!(d.classify("[DONE]").unwrap(), Some(StreamEvent::Done));
        }
    }

    // ── Public ───────────────────────────────────────────────────────

    #[test]
    fn public_codes() {
        let d = FrameDialect::Public;
        assert_eq!(
            d.classify(r#"{"ResponseType":0,"Value":"tok"}"#).unwrap(),
            Some(StreamEvent::message("tok"))
        );
        assert_eq!(
            d.classify(r#"{"ResponseType":2,"Value":"thinking"}"#).unwrap(),
            Some(StreamEvent::status("thinking"))
        );
        assert_eq!(d.classify(r#"{"ResponseType":8}"#).unwrap(), Some(StreamEvent::Done));
        assert_eq!(d.classify(r#"{"ResponseType":5,"Value":"x"}"#).unwrap(), None);
    }

    #[test]
    fn public_meta_is_parsed_twice() {
        let event = FrameDialect::Public
            .classify(r#"{"ResponseType":11,"Value":"{\"agentId\":\"a1\",\"cost\":3}"}"#)
            .unwrap()
            .unwrap();
        assert_matches!(event, StreamEvent::Meta { payload } if payload["agentId"] == "a1" && payload["cost"] == 3);
    }

    #[test]
    fn public_meta_bad_value_is_malformed() {
        assert!(
            FrameDialect::Public
                .classify(r#"{"ResponseType":11,"Value":"nope"}"#)
                .is_err()
        );
    }

    // ── A2A ──────────────────────────────────────────────────────────

    #[test]
    fn a2a_artifact_update_joins_text_parts() {
        let event = FrameDialect::A2a
            .classify(
                r#"{"jsonrpc":"2.0","id":1,"result":{"kind":"artifact-update","taskId":"t",
                   "artifact":{"parts":[{"kind":"text","text":"Hel"},{"kind":"data","data":{}},{"kind":"text","text":"lo"}]}}}"#,
            )
            .unwrap();
        assert_eq!(event, Some(StreamEvent::message("Hello")));
    }

    #[test]
    fn a2a_status_update() {
        let event = FrameDialect::A2a
            .classify(
                r#"{"result":{"kind":"status-update","status":{"state":"working",
                   "message":{"parts":[{"kind":"text","text":"searching"}]}},"final":false}}"#,
            )
            .unwrap();
        assert_eq!(event, Some(StreamEvent::status("working searching")));
    }

    #[test]
    fn a2a_final_failed_status_is_error() {
        let event = FrameDialect::A2a
            .classify(r#"{"result":{"kind":"status-update","status":{"state":"failed"},"final":true}}"#)
            .unwrap();
        assert_eq!(event, Some(StreamEvent::error("task failed")));
    }

    #[test]
    fn a2a_final_completed_status_is_status() {
        let event = FrameDialect::A2a
            .classify(r#"{"result":{"kind":"status-update","status":{"state":"completed"},"final":true}}"#)
            .unwrap();
        assert_eq!(event, Some(StreamEvent::status("completed")));
    }

    #[test]
    fn a2a_task_becomes_meta() {
        let event = FrameDialect::A2a
            .classify(r#"{"result":{"kind":"task","id":"task-9","contextId":"c-1","status":{"state":"submitted"}}}"#)
            .unwrap()
            .unwrap();
        assert_eq!(event.task_id().unwrap().as_str(), "task-9");
        assert_matches!(event, StreamEvent::Meta { payload } if payload["state"] == "submitted");
    }

    #[test]
    fn a2a_direct_message() {
        let event = FrameDialect::A2a
            .classify(r#"{"kind":"message","role":"agent","parts":[{"kind":"text","text":"hi"}]}"#)
            .unwrap();
        assert_eq!(event, Some(StreamEvent::message("hi")));
    }

    #[test]
    fn a2a_rpc_error() {
        let event = FrameDialect::A2a
            .classify(r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32001,"message":"Task not found"}}"#)
            .unwrap();
        assert_eq!(event, Some(StreamEvent::error("Task not found (code -32001)")));
    }

    #[test]
    fn a2a_unknown_kind_and_empty_artifact_are_ignored() {
        let d = FrameDialect::A2a;
        assert_eq!(d.classify(r#"{"result":{"kind":"push-config"}}"#).unwrap(), None);
        assert_eq!(
            d.classify(r#"{"result":{"kind":"artifact-update","artifact":{"parts":[]}}}"#)
                .unwrap(),
            None
        );
    }

    #[test]
    fn a2a_missing_kind_is_malformed() {
        assert!(FrameDialect::A2a.classify(r#"{"result":{"id":"x"}}"#).is_err());
        assert!(FrameDialect::A2a.classify("[1,2]").is_err());
    }
}
