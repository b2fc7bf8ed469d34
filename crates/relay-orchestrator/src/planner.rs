//! # Planner
//!
//! [`PlanningOracle`] turns a free-form request into an
//! [`OrchestrationPlan`]. [`LlmPlanner`] asks an OpenAI-compatible chat
//! completions endpoint and treats the reply as untrusted input: it must
//! pass [`OrchestrationPlan::parse`] or the call fails.

use std::fmt::Write as _;

use async_trait::async_trait;
use relay_core::text::truncate_str;
use relay_core::{AgentDescriptor, OrchestrationPlan};
use relay_http::HttpClient;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::errors::OrchestrationError;

/// Produces a plan for a user request.
#[async_trait]
pub trait PlanningOracle: Send + Sync {
    /// Plan `user_prompt` over `agents`.
    async fn plan(
        &self,
        user_prompt: &str,
        agents: &[AgentDescriptor],
    ) -> Result<OrchestrationPlan, OrchestrationError>;
}

const SYSTEM_PROMPT: &str = "You are an internal AI orchestration planner. \
You decide which AI agents to invoke and in what sequence based on the user request.";

/// User message sent to the planner model.
pub fn build_planner_prompt(user_prompt: &str, agents: &[AgentDescriptor]) -> String {
    let mut prompt = String::from(
        "You are a reasoning engine that creates a multi-agent orchestration plan.\n\n\
         You have access only to the following agents:\n\n",
    );
    for agent in agents {
        let _ = writeln!(prompt, "- {} (url: {})", agent.name, agent.url);
        let _ = writeln!(
            prompt,
            "  Description: {}",
            agent.description.as_deref().unwrap_or("No description")
        );
        if agent.capabilities.is_empty() {
            prompt.push_str("  Skills: none\n");
        } else {
            let _ = writeln!(prompt, "  Skills: {}", agent.capabilities.join(", "));
        }
        prompt.push('\n');
    }
    let _ = write!(
        prompt,
        "---\n\nUSER REQUEST:\n\"{user_prompt}\"\n\n---\n\n\
         Analyze the request and decide whether it needs several agents.\n\
         - If the request is simple, use one agent.\n\
         - If it needs research, validation or several perspectives, use several agents in sequence.\n\
         - Reuse earlier outputs with {{{{lastOutput}}}}, {{{{allOutputs}}}} or {{{{stepN}}}} when later agents benefit from them.\n\n\
         Output format (MUST be valid JSON):\n\
         {{\"mode\": \"sequential\", \"steps\": [{{\"name\": \"<agent name>\", \"url\": \"<one of the listed agent URLs>\", \"input\": \"<instruction for this agent>\"}}]}}\n\n\
         Do not invent new agents or URLs. Always include at least one step. Respond with JSON only, no commentary or markdown."
    );
    prompt
}

/// Drop a surrounding Markdown code fence, if the model added one.
fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = rest.split_once('\n').map_or("", |(_, body)| body);
    body.strip_suffix("```").unwrap_or(body).trim()
}

// ─────────────────────────────────────────────────────────────────────────────
// Chat completions wire types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// LlmPlanner
// ─────────────────────────────────────────────────────────────────────────────

/// Planner backed by an OpenAI-compatible chat completions endpoint.
#[derive(Clone)]
pub struct LlmPlanner {
    http: HttpClient,
    endpoint: String,
    model: String,
}

impl LlmPlanner {
    /// Create a planner.
    pub fn new(http: HttpClient, endpoint: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            http,
            endpoint: endpoint.into(),
            model: model.into(),
        }
    }

    /// Authenticate with a bearer token.
    pub fn with_api_key(mut self, api_key: &str) -> Result<Self, OrchestrationError> {
        self.http = self
            .http
            .with_default_header("authorization", &format!("Bearer {api_key}"))?;
        Ok(self)
    }

    /// Model name sent with each request.
    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl PlanningOracle for LlmPlanner {
    async fn plan(
        &self,
        user_prompt: &str,
        agents: &[AgentDescriptor],
    ) -> Result<OrchestrationPlan, OrchestrationError> {
        let prompt = build_planner_prompt(user_prompt, agents);
        let request = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt,
                },
            ],
        };
        debug!(model = %self.model, agents = agents.len(), "requesting plan");

        let response: ChatResponse = self.http.post_json(&self.endpoint, &request).await?;
        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| OrchestrationError::Oracle("planner returned no content".into()))?;

        OrchestrationPlan::parse(strip_code_fence(&content)).map_err(|e| {
            warn!(error = %e, content = %truncate_str(&content, 200), "planner produced an invalid plan");
            OrchestrationError::Plan(e)
        })
    }
}
