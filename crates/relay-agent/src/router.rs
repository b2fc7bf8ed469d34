//! # Invoker routing
//!
//! A plan can mix agents from the public catalogue with A2A agents.
//! [`AgentRouter`] sends each step to the invoker that speaks its URL.

use async_trait::async_trait;
use relay_stream::EventStream;
use serde_json::Value;
use tracing::debug;

use crate::client::{AgentClient, AgentInvoker};
use crate::public::PublicApiClient;

/// Routes public `askasync` URLs to the [`PublicApiClient`] and everything
/// else to the A2A [`AgentClient`].
#[derive(Clone)]
pub struct AgentRouter {
    a2a: AgentClient,
    public: Option<PublicApiClient>,
}

impl AgentRouter {
    /// Router sending every URL over A2A.
    pub fn new(a2a: AgentClient) -> Self {
        Self { a2a, public: None }
    }

    /// Route URLs under `public`'s base to it.
    #[must_use]
    pub fn with_public(mut self, public: PublicApiClient) -> Self {
        self.public = Some(public);
        self
    }
}

#[async_trait]
impl AgentInvoker for AgentRouter {
    async fn invoke(&self, endpoint: &str, input: &str, metadata: Option<Value>) -> EventStream {
        match &self.public {
            Some(public) if public.agent_id_for(endpoint).is_some() => {
                debug!(endpoint, "routing step to public agent API");
                public.invoke(endpoint, input, metadata).await
            }
            _ => self.a2a.invoke(endpoint, input, metadata).await,
        }
    }
}
