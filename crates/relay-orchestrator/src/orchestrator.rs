//! # Sequential orchestrator
//!
//! Runs a plan one step at a time: `Pending -> Running(i) -> {Running(i+1) |
//! Succeeded | Failed}`. Each step's input is resolved against the trimmed
//! outputs of the steps before it, so a step starts only after the previous
//! one reached its terminal event.

use std::sync::Arc;

use futures::StreamExt;
use relay_agent::AgentInvoker;
use relay_core::{OrchestrationPlan, PlanMode, StreamEvent};
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::errors::OrchestrationError;
use crate::placeholders::resolve_placeholders;

/// What happened inside a step.
#[derive(Clone, Debug, PartialEq)]
pub enum ProgressEvent {
    /// Lifecycle note (including the "Starting step" notice).
    Status(String),
    /// Text fragment, in arrival order.
    Text(String),
    /// Out-of-band data from the agent.
    Meta(Value),
    /// The step finished successfully.
    Done,
    /// The step failed; the run is about to abort.
    Error(String),
}

/// One progress notification.
#[derive(Clone, Debug, PartialEq)]
pub struct ProgressUpdate {
    /// Step name.
    pub step: String,
    /// 1-based step position.
    pub index: usize,
    /// Number of steps in the plan.
    pub total: usize,
    /// The event.
    pub event: ProgressEvent,
}

/// Executes [`OrchestrationPlan`]s through an [`AgentInvoker`].
#[derive(Clone)]
pub struct SequentialOrchestrator {
    invoker: Arc<dyn AgentInvoker>,
}

impl SequentialOrchestrator {
    /// Create an orchestrator.
    pub fn new(invoker: Arc<dyn AgentInvoker>) -> Self {
        Self { invoker }
    }

    /// Run `plan` without progress reporting.
    pub async fn run_quiet(&self, plan: &OrchestrationPlan) -> Result<String, OrchestrationError> {
        self.run(plan, |_| {}).await
    }

    /// Run `plan`, reporting every step event to `on_progress`.
    ///
    /// Returns the last step's trimmed output, or `""` for an empty plan.
    pub async fn run<F>(&self, plan: &OrchestrationPlan, mut on_progress: F) -> Result<String, OrchestrationError>
    where
        F: FnMut(ProgressUpdate) + Send,
    {
        if plan.mode != PlanMode::Sequential {
            warn!(mode = %plan.mode, "rejecting plan");
            return Err(OrchestrationError::UnsupportedPlanMode(plan.mode));
        }

        let total = plan.len();
        let mut outputs: Vec<String> = Vec::with_capacity(total);
        info!(steps = total, "orchestration started");

        for (i, step) in plan.steps.iter().enumerate() {
            let index = i + 1;
            let label = if step.name.trim().is_empty() { step.url.clone() } else { step.name.clone() };
            let mut report = |event: ProgressEvent| {
                on_progress(ProgressUpdate {
                    step: label.clone(),
                    index,
                    total,
                    event,
                });
            };

            let input = resolve_placeholders(&step.input, &outputs);
            report(ProgressEvent::Status(format!("Starting step {index}/{total}")));
            debug!(step = %label, index, url = %step.url, input_len = input.len(), "invoking step");

            let mut events = self
                .invoker
                .invoke(&step.url, &input, Some(json!({ "orchestrationStep": index })))
                .await;

            let mut text = String::new();
            let mut failure = None;
            while let Some(event) = events.next().await {
                match event {
                    StreamEvent::Message { text: fragment } => {
                        text.push_str(&fragment);
                        report(ProgressEvent::Text(fragment));
                    }
                    StreamEvent::Status { text: status } => report(ProgressEvent::Status(status)),
                    StreamEvent::Meta { payload } => report(ProgressEvent::Meta(payload)),
                    StreamEvent::Done => {
                        report(ProgressEvent::Done);
                        break;
                    }
                    StreamEvent::Error { reason } => {
                        report(ProgressEvent::Error(reason.clone()));
                        failure = Some(reason);
                        break;
                    }
                }
            }

            if let Some(reason) = failure {
                warn!(step = %label, index, reason = %reason, "step failed, aborting orchestration");
                return Err(OrchestrationError::StepFailed {
                    step: label,
                    index,
                    reason,
                    completed: outputs,
                });
            }

            outputs.push(text.trim().to_string());
            debug!(step = %label, index, output_len = outputs[i].len(), "step completed");
        }

        info!(steps = total, "orchestration finished");
        Ok(outputs.pop().unwrap_or_default())
    }
}
