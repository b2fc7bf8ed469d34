//! Settings type definitions.
//!
//! Every section is `#[serde(rename_all = "camelCase", default)]` so a
//! partial JSON file only needs to name the values it changes.

use relay_core::constants::{DEFAULT_BASE_URL, DEFAULT_USER_NAME};
use relay_core::{AgentDescriptor, RetryConfig};
use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root settings type.
///
/// ```json
/// {
///   "api": { "apiKey": "...", "timeoutMs": 15000 },
///   "planner": { "model": "gpt-4.1-mini" },
///   "agents": [{ "id": "writer", "name": "Writer", "url": "http://localhost:4000/.well-known/agent.json" }]
/// }
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RelaySettings {
    /// Public agent API connection.
    pub api: ApiSettings,
    /// Retry policy for idempotent calls.
    pub retry: RetryConfig,
    /// Planning oracle.
    pub planner: PlannerSettings,
    /// x402 payment handling.
    pub payment: PaymentSettings,
    /// Statically configured agents available to the orchestrator.
    pub agents: Vec<AgentDescriptor>,
    /// Logging.
    pub logging: LoggingSettings,
}

impl RelaySettings {
    /// Reject values no component could work with.
    pub fn validate(&self) -> Result<()> {
        if !(self.api.base_url.starts_with("http://") || self.api.base_url.starts_with("https://"))
        {
            return Err(SettingsError::InvalidValue(format!(
                "api.baseUrl must be an http(s) URL, got {:?}",
                self.api.base_url
            )));
        }
        if self.api.timeout_ms == 0 {
            return Err(SettingsError::InvalidValue(
                "api.timeoutMs must be positive".into(),
            ));
        }
        if self.api.user_name.trim().is_empty() {
            return Err(SettingsError::InvalidValue(
                "api.userName must not be empty".into(),
            ));
        }
        if self.planner.timeout_ms == 0 {
            return Err(SettingsError::InvalidValue(
                "planner.timeoutMs must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// Public agent API connection settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApiSettings {
    /// Base URL of the public agent API.
    pub base_url: String,
    /// Value for the `X-Api-Key` header.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Per-attempt timeout in milliseconds.
    pub timeout_ms: u64,
    /// `userName` sent when orchestration asks public agents.
    pub user_name: String,
    /// `userId` sent when orchestration asks public agents.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: None,
            timeout_ms: 30_000,
            user_name: DEFAULT_USER_NAME.to_string(),
            user_id: None,
        }
    }
}

/// Planning oracle settings (OpenAI-compatible chat completions).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlannerSettings {
    /// Chat completions endpoint.
    pub endpoint: String,
    /// Bearer token.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Model name.
    pub model: String,
    /// Request timeout in milliseconds.
    pub timeout_ms: u64,
}

impl Default for PlannerSettings {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
            api_key: None,
            model: "o3-mini".to_string(),
            timeout_ms: 120_000,
        }
    }
}

/// x402 payment settings.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PaymentSettings {
    /// Whether 402 challenges are answered at all.
    pub enabled: bool,
    /// Preferred network (e.g. `base`, `solana`). First offer wins when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,
    /// External command producing the `X-PAYMENT` header value.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signer_command: Option<String>,
}

/// Logging settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default filter level when `RUST_LOG` is unset.
    pub level: String,
    /// Emit JSON lines instead of compact text.
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            json: false,
        }
    }
}
