//! # Public agent API
//!
//! Client for the hosted agent catalogue: listing agents and the two ask
//! endpoints, which stream `{"ResponseType": n, "Value": ...}` frames.

use async_trait::async_trait;
use futures::StreamExt;
use relay_core::constants::DEFAULT_USER_NAME;
use relay_core::{AgentDescriptor, StreamEvent};
use relay_http::HttpClient;
use relay_stream::{EventStream, FrameDialect, demux};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::client::{AgentInvoker, aggregate};
use crate::errors::AgentError;

/// Listing endpoint.
pub const AGENTS_PATH: &str = "/api/Public/agents";
/// Routed streaming ask endpoint.
pub const ASK_STREAMING_PATH: &str = "/api/Public/askstreaming";

// ─────────────────────────────────────────────────────────────────────────────
// Wire types
// ─────────────────────────────────────────────────────────────────────────────

/// Plugin attached to a public agent.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AgentPlugin {
    /// Plugin id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Image URL.
    pub image: String,
    /// Description.
    pub description: String,
}

/// Pricing and publication state of a public agent.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PublishProfile {
    /// One-off price.
    pub up_front: f64,
    /// Price per call.
    pub per_call: f64,
    /// Publication state code.
    pub publication_state: i64,
    /// Publication timestamp.
    pub publication_date: Option<String>,
    /// Publication fee transaction.
    pub publication_fee_tx: String,
}

/// One agent as returned by the listing endpoint.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PublicAgent {
    /// Agent id.
    pub id: String,
    /// Backing model service.
    pub ai_service_name: String,
    /// Owner wallet.
    pub owner: String,
    /// Display name.
    pub name: String,
    /// Description.
    pub description: String,
    /// Avatar URL.
    pub image_url: String,
    /// Attached plugins.
    pub plugins: Vec<AgentPlugin>,
    /// Publication state code.
    pub publication_state: i64,
    /// Average rating.
    pub rating: f64,
    /// Number of ratings.
    pub rating_count: u64,
    /// Listed publicly.
    pub is_public: bool,
    /// Example prompts grouped by intent.
    pub completions: Option<serde_json::Map<String, serde_json::Value>>,
    /// Accepts attachments.
    pub attachment: bool,
    /// Verified by the catalogue.
    pub is_verified: bool,
    /// Category labels.
    pub categories: Vec<String>,
    /// Primary category.
    pub category: String,
    /// Creation timestamp.
    pub created_at: String,
    /// Pricing.
    pub publish_profile: PublishProfile,
    /// Reachable through the routing endpoint.
    pub is_routed: bool,
    /// Banner image URL.
    pub banner: Option<String>,
}

impl PublicAgent {
    /// Descriptor for the orchestration layer.
    ///
    /// `url` is the agent's ask endpoint under `base_url`.
    pub fn into_descriptor(self, base_url: &str) -> AgentDescriptor {
        let url = format!("{}{AGENTS_PATH}/{}/askasync", base_url.trim_end_matches('/'), self.id);
        let mut capabilities = self.categories;
        if capabilities.is_empty() && !self.category.is_empty() {
            capabilities.push(self.category);
        }
        AgentDescriptor {
            id: self.id,
            name: self.name,
            url,
            description: (!self.description.is_empty()).then_some(self.description),
            capabilities,
        }
    }
}

/// Key/value pair passed through to the agent.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AskVariable {
    /// Variable name.
    pub key: String,
    /// Variable value.
    pub value: String,
}

/// Body of both ask endpoints.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AskRequest {
    /// Prompt text. Required.
    pub input: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    /// Attachment reference.
    pub attachment: Option<String>,
    /// Caller display name. Required.
    pub user_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    /// Caller id.
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    /// Target agent; set by [`PublicApiClient::ask_stream`].
    pub agent_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    /// Message type hint.
    pub message_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    /// Template variables.
    pub variables: Option<Vec<AskVariable>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    /// Account paying the call fee.
    pub fee_payer: Option<String>,
}

impl AskRequest {
    /// Request with the two required fields.
    pub fn new(input: impl Into<String>, user_name: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            user_name: user_name.into(),
            ..Self::default()
        }
    }

    /// Set the caller id.
    #[must_use]
    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Append one variable per metadata entry. Non-string values are sent
    /// as their JSON text. Anything but an object is ignored.
    #[must_use]
    pub fn with_metadata(mut self, metadata: Option<&Value>) -> Self {
        if let Some(Value::Object(entries)) = metadata {
            for (key, value) in entries {
                let value = match value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                self = self.with_variable(key.clone(), value);
            }
        }
        self
    }

    /// Append a variable.
    #[must_use]
    pub fn with_variable(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.variables.get_or_insert_with(Vec::new).push(AskVariable {
            key: key.into(),
            value: value.into(),
        });
        self
    }

    /// Reject requests missing `input` or `userName`.
    pub fn validate(&self) -> Result<(), AgentError> {
        if self.input.trim().is_empty() || self.user_name.trim().is_empty() {
            return Err(AgentError::InvalidRequest(
                "missing required fields 'input' and 'userName'".to_string(),
            ));
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Client
// ─────────────────────────────────────────────────────────────────────────────

/// Client for the public agent API.
///
/// Also an [`AgentInvoker`] for the `askasync` URLs its own listing hands
/// out, asking as the configured caller.
#[derive(Clone)]
pub struct PublicApiClient {
    http: HttpClient,
    base_url: String,
    user_name: String,
    user_id: Option<String>,
}

impl PublicApiClient {
    /// Create a client; `api_key` is sent as `X-Api-Key` on every call.
    pub fn new(http: HttpClient, base_url: &str, api_key: Option<&str>) -> Result<Self, AgentError> {
        let http = match api_key {
            Some(key) => http.with_default_header("x-api-key", key)?,
            None => http,
        };
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            user_name: DEFAULT_USER_NAME.to_string(),
            user_id: None,
        })
    }

    /// Caller identity used when invoked as an [`AgentInvoker`].
    #[must_use]
    pub fn with_caller(mut self, user_name: impl Into<String>, user_id: Option<String>) -> Self {
        self.user_name = user_name.into();
        self.user_id = user_id;
        self
    }

    /// Base URL without a trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Agent id of a `{base}/api/Public/agents/{id}/askasync` URL.
    pub fn agent_id_for<'a>(&self, url: &'a str) -> Option<&'a str> {
        let id = url
            .strip_prefix(self.base_url.as_str())?
            .strip_prefix(AGENTS_PATH)?
            .strip_prefix('/')?
            .strip_suffix("/askasync")?;
        (!id.is_empty() && !id.contains('/')).then_some(id)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// `GET /api/Public/agents`. Retried.
    pub async fn list_public_agents(&self) -> Result<Vec<PublicAgent>, AgentError> {
        let agents: Vec<PublicAgent> = self.http.get_json(&self.url(AGENTS_PATH)).await?;
        debug!(count = agents.len(), "listed public agents");
        Ok(agents)
    }

    /// Stream an ask against one agent.
    ///
    /// Validation failures are returned before anything is sent.
    pub fn ask_stream(&self, agent_id: &str, mut request: AskRequest) -> Result<EventStream, AgentError> {
        request.validate()?;
        if agent_id.is_empty() || agent_id.contains(['/', '?', '#', ' ']) {
            return Err(AgentError::InvalidRequest(format!("invalid agent id {agent_id:?}")));
        }
        request.agent_id = Some(agent_id.to_string());
        let url = self.url(&format!("{AGENTS_PATH}/{agent_id}/askasync"));
        Ok(self.open(url, request))
    }

    /// Stream an ask through the routing endpoint.
    pub fn ask_routed_stream(&self, request: AskRequest) -> Result<EventStream, AgentError> {
        request.validate()?;
        Ok(self.open(self.url(ASK_STREAMING_PATH), request))
    }

    /// Ask one agent and return the aggregated text.
    pub async fn ask(&self, agent_id: &str, request: AskRequest) -> Result<String, AgentError> {
        aggregate(self.ask_stream(agent_id, request)?).await
    }

    fn open(&self, url: String, request: AskRequest) -> EventStream {
        let http = self.http.clone();
        Box::pin(async_stream::stream! {
            match http.open_stream(&url, &request).await {
                Ok(source) => {
                    let mut events = demux(source, FrameDialect::Public);
                    while let Some(event) = events.next().await {
                        yield event;
                    }
                }
                Err(e) => {
                    warn!(url = %url, error = %e, category = e.category(), "ask stream failed to open");
                    yield StreamEvent::error(e.to_string());
                }
            }
        })
    }
}

#[async_trait]
impl AgentInvoker for PublicApiClient {
    async fn invoke(&self, endpoint: &str, input: &str, metadata: Option<Value>) -> EventStream {
        let opened = match self.agent_id_for(endpoint) {
            Some(agent_id) => {
                let mut request = AskRequest::new(input, self.user_name.as_str())
                    .with_metadata(metadata.as_ref());
                request.user_id.clone_from(&self.user_id);
                self.ask_stream(agent_id, request)
            }
            None => Err(AgentError::InvalidRequest(format!(
                "{endpoint} is not a public agent ask URL under {}",
                self.base_url
            ))),
        };
        match opened {
            Ok(events) => events,
            Err(e) => {
                warn!(endpoint, error = %e, category = e.category(), "public ask rejected");
                Box::pin(futures::stream::once(async move {
                    StreamEvent::error(e.to_string())
                }))
            }
        }
    }
}
