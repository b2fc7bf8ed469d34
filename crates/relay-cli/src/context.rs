//! Wiring settings into clients.

use std::sync::Arc;

use anyhow::{Context, Result, bail};
use relay_agent::{AgentClient, AgentRouter, PublicApiClient};
use relay_http::{
    CommandSigner, HttpClient, PaymentMiddleware, Pipeline, RequestExecutor, ReqwestTransport,
    TracingMiddleware,
};
use relay_orchestrator::LlmPlanner;
use relay_settings::RelaySettings;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Everything a command needs, built once from settings.
pub struct AppContext {
    /// Resolved settings.
    pub settings: RelaySettings,
    http: HttpClient,
    cancel: CancellationToken,
}

impl AppContext {
    /// Build the HTTP stack described by `settings`.
    pub fn new(settings: RelaySettings, cancel: CancellationToken) -> Result<Self> {
        let pipeline = build_pipeline(&settings)?;
        let executor = RequestExecutor::new(settings.retry.clone(), settings.api.timeout_ms)
            .with_cancellation(cancel.clone());
        let http = HttpClient::new(Arc::new(pipeline), executor);
        Ok(Self {
            settings,
            http,
            cancel,
        })
    }

    /// Shared HTTP client.
    pub fn http(&self) -> HttpClient {
        self.http.clone()
    }

    /// Token fired on Ctrl-C.
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Client for the public agent API.
    pub fn public_api(&self) -> Result<PublicApiClient> {
        let api = &self.settings.api;
        Ok(PublicApiClient::new(self.http(), &api.base_url, api.api_key.as_deref())
            .context("Failed to configure public API client")?
            .with_caller(api.user_name.clone(), api.user_id.clone()))
    }

    /// Invoker for orchestration steps: public ask URLs go to the public
    /// API, everything else over A2A.
    pub fn step_invoker(&self) -> Result<AgentRouter> {
        Ok(AgentRouter::new(self.agent_client()).with_public(self.public_api()?))
    }

    /// Client for A2A agents.
    pub fn agent_client(&self) -> AgentClient {
        AgentClient::new(self.http())
    }

    /// Planner from the planner settings.
    pub fn planner(&self) -> Result<LlmPlanner> {
        let planner = &self.settings.planner;
        let Some(api_key) = planner.api_key.as_deref() else {
            bail!("No planner API key configured (set RELAY_PLANNER_API_KEY or OPENAI_API_KEY)");
        };
        let http = HttpClient::new(
            Arc::new(Pipeline::new(Arc::new(ReqwestTransport::new())).with(Arc::new(TracingMiddleware))),
            self.http.executor().clone().with_timeout_ms(planner.timeout_ms),
        );
        LlmPlanner::new(http, planner.endpoint.clone(), planner.model.clone())
            .with_api_key(api_key)
            .context("Failed to configure planner")
    }
}

/// Transport plus middleware chain: tracing outermost, payment innermost.
pub fn build_pipeline(settings: &RelaySettings) -> Result<Pipeline> {
    let mut pipeline =
        Pipeline::new(Arc::new(ReqwestTransport::new())).with(Arc::new(TracingMiddleware));

    let payment = &settings.payment;
    if payment.enabled {
        let Some(command) = payment.signer_command.as_deref() else {
            bail!("Payments are enabled but no signer command is configured (RELAY_PAYMENT_SIGNER)");
        };
        let signer = CommandSigner::from_command_line(command)
            .with_context(|| format!("Invalid signer command: {command}"))?;
        pipeline = pipeline
            .with(Arc::new(PaymentMiddleware::new(signer).with_network(payment.network.clone())));
        debug!(network = ?payment.network, "x402 payments enabled");
    }

    Ok(pipeline)
}
