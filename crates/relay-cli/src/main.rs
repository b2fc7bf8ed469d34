//! # relay
//!
//! Command-line client: lists and asks public agents, chats with an A2A
//! agent, and runs planned multi-agent orchestrations.

#![deny(unsafe_code)]

mod commands;
mod context;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use relay_agent::AskRequest;
use relay_settings::{RelaySettings, load_settings, load_settings_from_path};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::context::AppContext;

/// relay agent client.
#[derive(Parser, Debug)]
#[command(name = "relay", version, about = "Talk to remote agents and chain them together")]
struct Cli {
    /// Settings file (default: ~/.relay/settings.json).
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    /// API key for the public agent API (overrides settings).
    #[arg(short = 'k', long, global = true)]
    api_key: Option<String>,

    /// Base URL of the public agent API (overrides settings).
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Log at debug level.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List public agents.
    AgentsList {
        /// Print the full records as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Ask one public agent and stream the reply.
    Ask {
        /// Agent id.
        #[arg(short, long)]
        agent: String,
        #[command(flatten)]
        ask: AskArgs,
    },

    /// Ask through the routing endpoint and stream the reply.
    AskRouted {
        #[command(flatten)]
        ask: AskArgs,
    },

    /// Interactive chat with an A2A agent.
    Chat {
        /// Agent card URL or RPC endpoint.
        url: String,
        /// JSON metadata attached to every message.
        #[arg(long)]
        metadata: Option<String>,
    },

    /// Plan a request over the available agents and run the plan.
    Orchestrate {
        /// Free-form request.
        #[arg(short, long)]
        prompt: String,
        /// Extra agent card URLs to offer the planner (repeatable).
        #[arg(long = "card")]
        cards: Vec<String>,
        /// Also offer every agent in the public catalogue.
        #[arg(long)]
        public: bool,
    },
}

#[derive(clap::Args, Debug)]
struct AskArgs {
    /// Input text.
    #[arg(short, long)]
    input: String,
    /// User name.
    #[arg(short = 'n', long = "user")]
    user: String,
    /// Optional user id.
    #[arg(short = 'u', long = "userid")]
    user_id: Option<String>,
}

impl AskArgs {
    fn into_request(self) -> AskRequest {
        let request = AskRequest::new(self.input, self.user);
        match self.user_id {
            Some(id) => request.with_user_id(id),
            None => request,
        }
    }
}

impl Cli {
    fn resolve_settings(&self) -> Result<RelaySettings> {
        let mut settings = match &self.settings {
            Some(path) => load_settings_from_path(path)
                .with_context(|| format!("Failed to load settings from {}", path.display()))?,
            None => load_settings().context("Failed to load settings")?,
        };
        if let Some(key) = &self.api_key {
            settings.api.api_key = Some(key.clone());
        }
        if let Some(url) = &self.base_url {
            settings.api.base_url.clone_from(url);
        }
        settings.validate().context("Invalid settings")?;
        Ok(settings)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = cli.resolve_settings()?;
    relay_logging::init_from_settings(&settings.logging, cli.verbose);
    debug!(base_url = %settings.api.base_url, "settings resolved");

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    let _ = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c.cancel();
        }
    });

    let ctx = AppContext::new(settings, cancel)?;
    match cli.command {
        Command::AgentsList { json } => commands::agents_list(&ctx, json).await,
        Command::Ask { agent, ask } => commands::ask(&ctx, &agent, ask.into_request()).await,
        Command::AskRouted { ask } => commands::ask_routed(&ctx, ask.into_request()).await,
        Command::Chat { url, metadata } => {
            let metadata = metadata
                .map(|raw| serde_json::from_str(&raw))
                .transpose()
                .context("--metadata must be JSON")?;
            commands::chat(&ctx, &url, metadata).await
        }
        Command::Orchestrate { prompt, cards, public } => {
            commands::orchestrate(&ctx, &prompt, cards, public).await
        }
    }
}
