//! # Orchestration manager
//!
//! Plans once, then runs the plan. Text fragments go to the [`OutputSink`]
//! as they arrive; status and error notes are logged and mirrored to the
//! sink. Failures propagate unchanged.

use std::sync::Arc;

use relay_core::AgentDescriptor;
use tracing::{error, info};

use crate::errors::OrchestrationError;
use crate::orchestrator::{ProgressEvent, SequentialOrchestrator};
use crate::planner::PlanningOracle;
use crate::sink::OutputSink;

/// Planner plus orchestrator plus sink.
#[derive(Clone)]
pub struct OrchestrationManager {
    planner: Arc<dyn PlanningOracle>,
    orchestrator: SequentialOrchestrator,
    sink: Arc<dyn OutputSink>,
}

impl OrchestrationManager {
    /// Create a manager.
    pub fn new(
        planner: Arc<dyn PlanningOracle>,
        orchestrator: SequentialOrchestrator,
        sink: Arc<dyn OutputSink>,
    ) -> Self {
        Self {
            planner,
            orchestrator,
            sink,
        }
    }

    /// Plan `user_prompt` over `agents` and run the plan.
    ///
    /// The plan is trusted as returned; agent URLs are not checked against
    /// `agents`.
    pub async fn run(&self, user_prompt: &str, agents: &[AgentDescriptor]) -> Result<String, OrchestrationError> {
        let plan = self.planner.plan(user_prompt, agents).await?;
        info!(mode = %plan.mode, steps = plan.len(), "plan received");

        let sink = Arc::clone(&self.sink);
        self.orchestrator
            .run(&plan, move |update| match update.event {
                ProgressEvent::Text(fragment) => sink.text(&fragment),
                ProgressEvent::Status(status) => {
                    info!(step = %update.step, index = update.index, status = %status, "step status");
                    sink.status(&status);
                }
                ProgressEvent::Error(reason) => {
                    error!(step = %update.step, index = update.index, reason = %reason, "step error");
                    sink.error(&reason);
                }
                ProgressEvent::Meta(_) | ProgressEvent::Done => {}
            })
            .await
    }
}
