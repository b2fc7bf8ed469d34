//! Stream events produced by the demultiplexer.
//!
//! A stream is a finite sequence of [`StreamEvent`] values in arrival order.
//! Exactly one terminal event ([`StreamEvent::Done`] or [`StreamEvent::Error`])
//! closes every stream, and nothing follows it.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ids::TaskId;

/// One classified frame of a remote agent response.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// Incremental text fragment. Concatenate in arrival order.
    Message {
        /// Text fragment.
        text: String,
    },

    /// Human-readable lifecycle note ("working", "input-required", ...).
    Status {
        /// Status text.
        text: String,
    },

    /// Structured out-of-band data, e.g. a newly created task id.
    Meta {
        /// Arbitrary JSON payload.
        payload: Value,
    },

    /// Successful completion. Terminal.
    Done,

    /// Abnormal termination. Terminal.
    Error {
        /// Failure description.
        reason: String,
    },
}

impl StreamEvent {
    /// Build a message event.
    pub fn message(text: impl Into<String>) -> Self {
        Self::Message { text: text.into() }
    }

    /// Build a status event.
    pub fn status(text: impl Into<String>) -> Self {
        Self::Status { text: text.into() }
    }

    /// Build an error event.
    pub fn error(reason: impl Into<String>) -> Self {
        Self::Error {
            reason: reason.into(),
        }
    }

    /// Whether this event ends the stream.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Error { .. })
    }

    /// Short kind name for logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Message { .. } => "message",
            Self::Status { .. } => "status",
            Self::Meta { .. } => "meta",
            Self::Done => "done",
            Self::Error { .. } => "error",
        }
    }

    /// Task identifier carried by a meta payload, if any.
    ///
    /// Accepts `taskId`, `task_id`, and a bare `id`.
    #[must_use]
    pub fn task_id(&self) -> Option<TaskId> {
        let Self::Meta { payload } = self else {
            return None;
        };
        ["taskId", "task_id", "id"]
            .iter()
            .find_map(|key| payload.get(*key).and_then(Value::as_str))
            .map(TaskId::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn terminal_kinds() {
        assert!(StreamEvent::Done.is_terminal());
        assert!(StreamEvent::error("boom").is_terminal());
        assert!(!StreamEvent::message("hi").is_terminal());
        assert!(!StreamEvent::status("working").is_terminal());
        assert!(
            !StreamEvent::Meta {
                payload: json!({})
            }
            .is_terminal()
        );
    }

    #[test]
    fn serializes_with_type_tag() {
        let json = serde_json::to_value(StreamEvent::message("hi")).unwrap();
        assert_eq!(json, json!({"type": "message", "text": "hi"}));
        let json = serde_json::to_value(StreamEvent::Done).unwrap();
        assert_eq!(json, json!({"type": "done"}));
    }

    #[test]
    fn task_id_from_meta() {
        let event = StreamEvent::Meta {
            payload: json!({"taskId": "t-1"}),
        };
        assert_eq!(event.task_id(), Some(TaskId::from("t-1")));

        let event = StreamEvent::Meta {
            payload: json!({"id": "t-2", "kind": "task"}),
        };
        assert_eq!(event.task_id(), Some(TaskId::from("t-2")));
    }

    #[test]
    fn task_id_absent() {
        let event = StreamEvent::Meta {
            payload: json!({"other": 1}),
        };
        assert_eq!(event.task_id(), None);
        assert_eq!(StreamEvent::message("x").task_id(), None);
    }

    #[test]
    fn kind_names() {
        assert_eq!(StreamEvent::Done.kind(), "done");
        assert_eq!(StreamEvent::error("x").kind(), "error");
    }
}
