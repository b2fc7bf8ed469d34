//! # Agent directories
//!
//! Where orchestration learns which agents exist. Listing is a read and is
//! retried by the HTTP layer where it goes over the network.

use async_trait::async_trait;
use relay_core::AgentDescriptor;
use tracing::warn;

use crate::client::AgentClient;
use crate::errors::AgentError;
use crate::public::PublicApiClient;

/// Source of [`AgentDescriptor`]s.
#[async_trait]
pub trait AgentDirectory: Send + Sync {
    /// All agents currently available.
    async fn list_agents(&self) -> Result<Vec<AgentDescriptor>, AgentError>;
}

/// Fixed list, usually from settings.
#[derive(Clone, Debug, Default)]
pub struct StaticDirectory {
    agents: Vec<AgentDescriptor>,
}

impl StaticDirectory {
    /// Directory over `agents`.
    pub fn new(agents: Vec<AgentDescriptor>) -> Self {
        Self { agents }
    }
}

#[async_trait]
impl AgentDirectory for StaticDirectory {
    async fn list_agents(&self) -> Result<Vec<AgentDescriptor>, AgentError> {
        Ok(self.agents.clone())
    }
}

/// Resolves a list of agent-card URLs into descriptors.
///
/// Cards that fail to resolve are skipped with a warning.
#[derive(Clone)]
pub struct CardDirectory {
    client: AgentClient,
    card_urls: Vec<String>,
}

impl CardDirectory {
    /// Directory over `card_urls`.
    pub fn new(client: AgentClient, card_urls: Vec<String>) -> Self {
        Self { client, card_urls }
    }
}

#[async_trait]
impl AgentDirectory for CardDirectory {
    async fn list_agents(&self) -> Result<Vec<AgentDescriptor>, AgentError> {
        let mut agents = Vec::with_capacity(self.card_urls.len());
        for url in &self.card_urls {
            match self.client.fetch_card(url).await {
                Ok(card) => agents.push(card.into_descriptor(url)),
                Err(e) => warn!(card_url = %url, error = %e, "skipping unresolvable agent card"),
            }
        }
        Ok(agents)
    }
}

#[async_trait]
impl AgentDirectory for PublicApiClient {
    async fn list_agents(&self) -> Result<Vec<AgentDescriptor>, AgentError> {
        let base_url = self.base_url().to_string();
        Ok(self
            .list_public_agents()
            .await?
            .into_iter()
            .map(|agent| agent.into_descriptor(&base_url))
            .collect())
    }
}
