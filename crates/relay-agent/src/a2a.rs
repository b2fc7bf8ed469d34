//! A2A JSON-RPC request bodies.

use relay_core::{MessageId, TaskId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// JSON-RPC method opening a streamed reply.
pub const METHOD_MESSAGE_STREAM: &str = "message/stream";
/// JSON-RPC method cancelling a task.
pub const METHOD_TASKS_CANCEL: &str = "tasks/cancel";

/// One content part of a message.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TextPart {
    /// Always `"text"`.
    pub kind: String,
    /// Text content.
    pub text: String,
    /// Caller-supplied metadata.
    pub metadata: Value,
}

/// A user message sent to an agent.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserMessage {
    /// Always `"message"`.
    pub kind: String,
    /// Unique per call.
    pub message_id: MessageId,
    /// Always `"user"`.
    pub role: String,
    /// Content parts.
    pub parts: Vec<TextPart>,
}

impl UserMessage {
    /// Single-part text message with a fresh id.
    pub fn text(input: &str, metadata: Option<Value>) -> Self {
        Self {
            kind: "message".to_string(),
            message_id: MessageId::new(),
            role: "user".to_string(),
            parts: vec![TextPart {
                kind: "text".to_string(),
                text: input.to_string(),
                metadata: metadata.unwrap_or_else(|| Value::Object(serde_json::Map::new())),
            }],
        }
    }
}

/// JSON-RPC 2.0 request envelope.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RpcRequest<P> {
    /// Always `"2.0"`.
    pub jsonrpc: String,
    /// Correlation id.
    pub id: String,
    /// Method name.
    pub method: String,
    /// Parameters.
    pub params: P,
}

impl<P> RpcRequest<P> {
    fn new(method: &str, params: P) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id: MessageId::new().into_inner(),
            method: method.to_string(),
            params,
        }
    }
}

/// Parameters of `message/stream`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MessageParams {
    /// The message.
    pub message: UserMessage,
}

/// Parameters of `tasks/cancel`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TaskIdParams {
    /// Task to cancel.
    pub id: TaskId,
}

/// Build a `message/stream` request.
pub fn message_stream_request(input: &str, metadata: Option<Value>) -> RpcRequest<MessageParams> {
    RpcRequest::new(
        METHOD_MESSAGE_STREAM,
        MessageParams {
            message: UserMessage::text(input, metadata),
        },
    )
}

/// Build a `tasks/cancel` request.
pub fn cancel_request(task_id: &TaskId) -> RpcRequest<TaskIdParams> {
    RpcRequest::new(
        METHOD_TASKS_CANCEL,
        TaskIdParams {
            id: task_id.clone(),
        },
    )
}

/// Whether `url` points at an agent card rather than an RPC endpoint.
pub fn is_card_url(url: &str) -> bool {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    path.contains("/.well-known/") || path.ends_with(".json")
}
