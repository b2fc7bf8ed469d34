//! Subcommand handlers.

use std::io::Write;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use futures::StreamExt;
use relay_agent::{AgentDirectory, AgentSession, AskRequest, CardDirectory, StaticDirectory};
use relay_core::{AgentDescriptor, StreamEvent};
use relay_orchestrator::{OrchestrationManager, SequentialOrchestrator, StdoutSink};
use relay_stream::EventStream;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::context::AppContext;

/// `agents-list`
pub async fn agents_list(ctx: &AppContext, json: bool) -> Result<()> {
    let agents = ctx
        .public_api()?
        .list_public_agents()
        .await
        .context("Failed to list agents")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&agents)?);
        return Ok(());
    }
    for agent in &agents {
        let description = agent.description.lines().next().unwrap_or_default();
        println!("{}\t{}\t{}", agent.id, agent.name, description);
    }
    Ok(())
}

/// `ask`
pub async fn ask(ctx: &AppContext, agent: &str, request: AskRequest) -> Result<()> {
    let events = ctx.public_api()?.ask_stream(agent, request)?;
    print_stream(events).await
}

/// `ask-routed`
pub async fn ask_routed(ctx: &AppContext, request: AskRequest) -> Result<()> {
    let events = ctx.public_api()?.ask_routed_stream(request)?;
    print_stream(events).await
}

/// Text to stdout as it arrives; status and meta to stderr.
async fn print_stream(mut events: EventStream) -> Result<()> {
    let mut stdout = std::io::stdout();
    while let Some(event) = events.next().await {
        match event {
            StreamEvent::Message { text } => {
                stdout.write_all(text.as_bytes())?;
                stdout.flush()?;
            }
            StreamEvent::Status { text } => eprintln!("[STATUS] {text}"),
            StreamEvent::Meta { payload } => eprintln!("[META] {}", meta_label(&payload)),
            StreamEvent::Done => {
                println!();
                return Ok(());
            }
            StreamEvent::Error { reason } => {
                println!();
                bail!("{reason}");
            }
        }
    }
    Ok(())
}

/// Short human label for a meta payload.
fn meta_label(payload: &Value) -> String {
    ["DisplayName", "Name", "name", "taskId"]
        .iter()
        .find_map(|key| payload.get(*key).and_then(Value::as_str))
        .map_or_else(|| payload.to_string(), str::to_owned)
}

/// `chat`
pub async fn chat(ctx: &AppContext, card_url: &str, metadata: Option<Value>) -> Result<()> {
    let session = ctx
        .agent_client()
        .connect(card_url)
        .await
        .with_context(|| format!("Failed to connect to {card_url}"))?;
    let name = session.card().map_or(card_url, |card| card.name.as_str()).to_string();
    eprintln!("[INFO] Connected to {name}. Type a message, /cancel to stop the current task, /quit to exit.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut running: Option<JoinHandle<()>> = None;

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            () = ctx.cancel_token().cancelled() => None,
        };
        let Some(line) = line else { break };

        match line.trim() {
            "" => {}
            "/quit" => break,
            "/cancel" => match session.cancel_current().await {
                Ok(true) => eprintln!("[INFO] Cancel requested."),
                Ok(false) => eprintln!("[WARN] No running task to cancel."),
                Err(e) => eprintln!("[ERROR] Failed to cancel task: {e}"),
            },
            text => {
                if running.as_ref().is_some_and(|task| !task.is_finished()) {
                    eprintln!("[WARN] A reply is still streaming; /cancel it or wait.");
                    continue;
                }
                running = Some(spawn_reply(&session, text, metadata.clone()));
            }
        }
    }

    if let Some(task) = running {
        task.abort();
    }
    eprintln!("[INFO] Exiting.");
    Ok(())
}

fn spawn_reply(session: &AgentSession, text: &str, metadata: Option<Value>) -> JoinHandle<()> {
    let events = session.stream(text, metadata);
    tokio::spawn(async move {
        if let Err(e) = print_stream(events).await {
            eprintln!("[ERROR] {e}");
        }
    })
}

/// `orchestrate`
pub async fn orchestrate(ctx: &AppContext, prompt: &str, cards: Vec<String>, public: bool) -> Result<()> {
    let mut agents: Vec<AgentDescriptor> = StaticDirectory::new(ctx.settings.agents.clone())
        .list_agents()
        .await?;
    if !cards.is_empty() {
        agents.extend(CardDirectory::new(ctx.agent_client(), cards).list_agents().await?);
    }
    if public {
        agents.extend(
            ctx.public_api()?
                .list_agents()
                .await
                .context("Failed to list public agents")?,
        );
    }
    if agents.is_empty() {
        bail!("No agents available: add `agents` to the settings file, pass --card, or pass --public");
    }
    info!(agents = agents.len(), "planning orchestration");

    let manager = OrchestrationManager::new(
        Arc::new(ctx.planner()?),
        SequentialOrchestrator::new(Arc::new(ctx.step_invoker()?)),
        Arc::new(StdoutSink),
    );
    match manager.run(prompt, &agents).await {
        Ok(_) => {
            println!();
            Ok(())
        }
        Err(e) => {
            warn!(error = %e, category = e.category(), "orchestration failed");
            Err(e.into())
        }
    }
}
