//! # Agent session
//!
//! One conversation with one A2A endpoint. The session owns the id of the
//! task currently streaming (set from `Meta` events, cleared on the terminal
//! event) so a later [`AgentSession::cancel_current`] can name it.
//!
//! Dropping a stream before its terminal event leaves the id in place: the
//! remote task may still be running, and it stays cancellable until a
//! cancel is acknowledged or the next stream replaces it.

use std::sync::Arc;

use futures::StreamExt;
use parking_lot::Mutex;
use relay_core::{AgentCard, StreamEvent, TaskId};
use relay_http::HttpClient;
use relay_stream::{EventStream, FrameDialect, demux};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::a2a::{self, METHOD_TASKS_CANCEL};
use crate::client::aggregate;
use crate::errors::AgentError;

/// A live connection to one agent endpoint.
#[derive(Clone)]
pub struct AgentSession {
    http: HttpClient,
    endpoint: String,
    card: Option<AgentCard>,
    current_task: Arc<Mutex<Option<TaskId>>>,
}

impl std::fmt::Debug for AgentSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentSession")
            .field("endpoint", &self.endpoint)
            .field("card", &self.card.as_ref().map(|c| c.name.as_str()))
            .field("current_task", &*self.current_task.lock())
            .finish_non_exhaustive()
    }
}

impl AgentSession {
    /// Session against a known RPC endpoint.
    pub fn new(http: HttpClient, endpoint: impl Into<String>) -> Self {
        Self {
            http,
            endpoint: endpoint.into(),
            card: None,
            current_task: Arc::new(Mutex::new(None)),
        }
    }

    /// Session against the endpoint advertised by `card`.
    pub fn from_card(http: HttpClient, card: AgentCard) -> Self {
        let mut session = Self::new(http, card.url.clone());
        session.card = Some(card);
        session
    }

    /// RPC endpoint messages are posted to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Agent card, when the session was opened from one.
    pub fn card(&self) -> Option<&AgentCard> {
        self.card.as_ref()
    }

    /// Task currently streaming, if any.
    pub fn current_task_id(&self) -> Option<TaskId> {
        self.current_task.lock().clone()
    }

    /// Send `input` and return the live event stream.
    ///
    /// Opening the stream is a single attempt; if it fails the stream holds
    /// one `Error` event.
    pub fn stream(&self, input: &str, metadata: Option<Value>) -> EventStream {
        let http = self.http.clone();
        let endpoint = self.endpoint.clone();
        let slot = Arc::clone(&self.current_task);
        let body = a2a::message_stream_request(input, metadata);

        Box::pin(async_stream::stream! {
            debug!(endpoint = %endpoint, message_id = %body.params.message.message_id, "opening agent stream");
            let source = match http.open_stream(&endpoint, &body).await {
                Ok(source) => source,
                Err(e) => {
                    warn!(endpoint = %endpoint, error = %e, category = e.category(), "agent stream failed to open");
                    yield StreamEvent::error(e.to_string());
                    return;
                }
            };

            let mut events = demux(source, FrameDialect::A2a);
            while let Some(event) = events.next().await {
                if let Some(task_id) = event.task_id() {
                    debug!(task_id = %task_id, "tracking task");
                    *slot.lock() = Some(task_id);
                }
                if event.is_terminal() {
                    *slot.lock() = None;
                    yield event;
                    return;
                }
                yield event;
            }
        })
    }

    /// Send `input` and return the concatenated reply text.
    pub async fn send(&self, input: &str, metadata: Option<Value>) -> Result<String, AgentError> {
        aggregate(self.stream(input, metadata)).await
    }

    /// Ask the agent to cancel `task_id`.
    ///
    /// Best effort: a stream still in flight ends on its own terms.
    pub async fn cancel(&self, task_id: &TaskId) -> Result<(), AgentError> {
        let request = a2a::cancel_request(task_id);
        let reply: Value = self.http.post_json(&self.endpoint, &request).await?;

        if let Some(error) = reply.get("error") {
            let code = error.get("code").and_then(Value::as_i64).unwrap_or_default();
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown error")
                .to_string();
            return Err(AgentError::Rpc {
                method: METHOD_TASKS_CANCEL.to_string(),
                code,
                message,
            });
        }

        let mut slot = self.current_task.lock();
        if slot.as_ref() == Some(task_id) {
            *slot = None;
        }
        info!(task_id = %task_id, "task cancel acknowledged");
        Ok(())
    }

    /// Cancel the tracked task. Returns whether a cancel request was sent.
    pub async fn cancel_current(&self) -> Result<bool, AgentError> {
        let Some(task_id) = self.current_task_id() else {
            return Ok(false);
        };
        self.cancel(&task_id).await?;
        Ok(true)
    }
}
