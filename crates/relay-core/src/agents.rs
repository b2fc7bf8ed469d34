//! Agent descriptors and A2A agent cards.

use serde::{Deserialize, Serialize};

/// A remote agent the orchestrator may route steps to.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentDescriptor {
    /// Stable identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Endpoint or agent-card URL.
    pub url: String,
    /// Free-form description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Capability labels (skill names).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub capabilities: Vec<String>,
}

/// One skill advertised on an agent card.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AgentSkill {
    /// Skill identifier.
    pub id: String,
    /// Skill name.
    pub name: String,
    /// Description.
    pub description: Option<String>,
    /// Tags.
    pub tags: Vec<String>,
}

/// Self-description published by an A2A agent.
///
/// Only the fields relay uses are modelled; the rest are ignored.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentCard {
    /// Agent name.
    pub name: String,
    /// JSON-RPC endpoint.
    pub url: String,
    /// Description.
    #[serde(default)]
    pub description: Option<String>,
    /// Version string.
    #[serde(default)]
    pub version: Option<String>,
    /// Advertised skills.
    #[serde(default)]
    pub skills: Vec<AgentSkill>,
}

impl AgentCard {
    /// Convert into a descriptor keyed by the URL the card was fetched from.
    #[must_use]
    pub fn into_descriptor(self, card_url: &str) -> AgentDescriptor {
        AgentDescriptor {
            id: card_url.to_owned(),
            name: self.name,
            url: card_url.to_owned(),
            description: self.description,
            capabilities: self.skills.into_iter().map(|s| s.name).collect(),
        }
    }
}
