//! # Agent client
//!
//! Entry point for invoking agents by URL. [`AgentClient::connect`] resolves
//! agent cards to their RPC endpoint; [`AgentInvoker`] is the seam the
//! orchestrator drives steps through; [`aggregate`] folds a live stream into
//! its text.

use async_trait::async_trait;
use futures::StreamExt;
use relay_core::{AgentCard, StreamEvent};
use relay_http::HttpClient;
use relay_stream::EventStream;
use serde_json::Value;
use tracing::{debug, warn};

use crate::a2a::is_card_url;
use crate::errors::AgentError;
use crate::session::AgentSession;

/// Something that can invoke an agent endpoint in live mode.
#[async_trait]
pub trait AgentInvoker: Send + Sync {
    /// Invoke `endpoint` with `input`; the stream always ends with exactly
    /// one terminal event.
    async fn invoke(&self, endpoint: &str, input: &str, metadata: Option<Value>) -> EventStream;
}

/// Drive `events` to completion and concatenate its message text.
///
/// Status and meta events are discarded. An `Error` event becomes
/// [`AgentError::Stream`].
pub async fn aggregate(mut events: EventStream) -> Result<String, AgentError> {
    let mut text = String::new();
    while let Some(event) = events.next().await {
        match event {
            StreamEvent::Message { text: fragment } => text.push_str(&fragment),
            StreamEvent::Status { .. } | StreamEvent::Meta { .. } => {}
            StreamEvent::Done => break,
            StreamEvent::Error { reason } => return Err(AgentError::Stream { reason }),
        }
    }
    Ok(text)
}

/// Opens [`AgentSession`]s over a shared [`HttpClient`].
#[derive(Clone)]
pub struct AgentClient {
    http: HttpClient,
}

impl AgentClient {
    /// Create a client.
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }

    /// Fetch the agent card at `card_url`. Retried like any read.
    pub async fn fetch_card(&self, card_url: &str) -> Result<AgentCard, AgentError> {
        let card: AgentCard = self.http.get_json(card_url).await?;
        if card.url.trim().is_empty() {
            return Err(AgentError::InvalidRequest(format!(
                "agent card at {card_url} has no url"
            )));
        }
        debug!(card_url, endpoint = %card.url, agent = %card.name, "resolved agent card");
        Ok(card)
    }

    /// Open a session. Card URLs are resolved first; any other URL is
    /// treated as the RPC endpoint.
    pub async fn connect(&self, url: &str) -> Result<AgentSession, AgentError> {
        if is_card_url(url) {
            let card = self.fetch_card(url).await?;
            Ok(AgentSession::from_card(self.http.clone(), card))
        } else {
            Ok(AgentSession::new(self.http.clone(), url))
        }
    }

    /// Invoke `url` and return the aggregated reply text.
    pub async fn ask(&self, url: &str, input: &str, metadata: Option<Value>) -> Result<String, AgentError> {
        aggregate(self.invoke(url, input, metadata).await).await
    }
}

#[async_trait]
impl AgentInvoker for AgentClient {
    async fn invoke(&self, endpoint: &str, input: &str, metadata: Option<Value>) -> EventStream {
        match self.connect(endpoint).await {
            Ok(session) => session.stream(input, metadata),
            Err(e) => {
                warn!(endpoint, error = %e, category = e.category(), "agent connect failed");
                Box::pin(futures::stream::once(async move {
                    StreamEvent::error(e.to_string())
                }))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use relay_core::RetryConfig;
    use relay_http::{RequestExecutor, ReqwestTransport};
    use serde_json::json;
    use std::sync::Arc;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client() -> AgentClient {
        AgentClient::new(HttpClient::new(
            Arc::new(ReqwestTransport::new()),
            RequestExecutor::new(RetryConfig::default(), 5_000),
        ))
    }

    fn events(list: Vec<StreamEvent>) -> EventStream {
        Box::pin(futures::stream::iter(list))
    }

    fn sse_text(text: &str) -> String {
        let frame = json!({"result": {"kind": "artifact-update",
            "artifact": {"parts": [{"kind": "text", "text": text}]}}});
        format!("data: {frame}\n\n")
    }

    // ── aggregate ───────────────────────────────────────────────────────

    #[tokio::test]
    async fn aggregate_concatenates_and_ignores_status_meta() {
        let text = aggregate(events(vec![
            StreamEvent::status("working"),
            StreamEvent::message("a"),
            StreamEvent::Meta { payload: json!({"taskId": "t"}) },
            StreamEvent::message("b"),
            StreamEvent::Done,
        ]))
        .await
        .unwrap();
        assert_eq!(text, "ab");
    }

    #[tokio::test]
    async fn aggregate_error_event_fails() {
        let err = aggregate(events(vec![
            StreamEvent::message("partial"),
            StreamEvent::error("agent crashed"),
        ]))
        .await
        .unwrap_err();
        assert_matches!(err, AgentError::Stream { reason } if reason == "agent crashed");
    }

    // ── connect ─────────────────────────────────────────────────────────

    #[tokio::test]
    async fn connect_resolves_card_to_endpoint() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/.well-known/agent.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "Writer",
                "url": format!("{}/rpc", server.uri()),
                "skills": [{"id": "w", "name": "write"}]
            })))
            .mount(&server)
            .await;

        let session = client()
            .connect(&format!("{}/.well-known/agent.json", server.uri()))
            .await
            .unwrap();
        assert_eq!(session.endpoint(), format!("{}/rpc", server.uri()));
    }

    #[tokio::test]
    async fn connect_uses_plain_url_directly() {
        let session = client().connect("http://localhost:1/rpc").await.unwrap();
        assert_eq!(session.endpoint(), "http://localhost:1/rpc");
        assert!(session.card().is_none());
    }

    #[tokio::test]
    async fn card_fetch_is_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/agent.json"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .with_priority(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/agent.json"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"name": "A", "url": "http://a/rpc"})),
            )
            .with_priority(2)
            .mount(&server)
            .await;

        let card = client()
            .fetch_card(&format!("{}/agent.json", server.uri()))
            .await
            .unwrap();
        assert_eq!(card.url, "http://a/rpc");
    }

    // ── invoke ──────────────────────────────────────────────────────────

    #[tokio::test]
    async fn invoke_connect_failure_is_single_error_event() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let collected: Vec<StreamEvent> = client()
            .invoke(&format!("{}/agent.json", server.uri()), "hi", None)
            .await
            .collect()
            .await;
        assert_eq!(collected.len(), 1);
        assert!(collected[0].is_terminal());
        assert_eq!(collected[0].kind(), "error");
    }

    #[tokio::test]
    async fn ask_returns_aggregated_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rpc"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(format!("{}{}", sse_text("foo "), sse_text("bar"))),
            )
            .mount(&server)
            .await;

        let text = client()
            .ask(&format!("{}/rpc", server.uri()), "hi", None)
            .await
            .unwrap();
        assert_eq!(text, "foo bar");
    }
}
