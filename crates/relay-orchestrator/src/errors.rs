//! Orchestration errors.

use relay_core::{PlanError, PlanMode};
use relay_http::HttpError;

/// Failure of one orchestration run.
#[derive(Debug, thiserror::Error)]
pub enum OrchestrationError {
    /// The plan asks for a mode this orchestrator does not execute.
    #[error("unsupported plan mode: {0}")]
    UnsupportedPlanMode(PlanMode),

    /// The planner's reply is not a valid plan.
    #[error(transparent)]
    Plan(#[from] PlanError),

    /// A step's stream ended with an error; later steps were not run.
    #[error("step {index} ({step}) failed: {reason}")]
    StepFailed {
        /// Step name.
        step: String,
        /// 1-based step position.
        index: usize,
        /// Reason carried by the step's error event.
        reason: String,
        /// Trimmed outputs of the steps that finished before it.
        completed: Vec<String>,
    },

    /// The planner could not be reached or answered nonsense.
    #[error("planner failed: {0}")]
    Oracle(String),

    /// Transport failure talking to the planner.
    #[error(transparent)]
    Http(#[from] HttpError),
}

impl OrchestrationError {
    /// Error category string for log fields.
    pub fn category(&self) -> &'static str {
        match self {
            Self::UnsupportedPlanMode(_) => "unsupported_plan_mode",
            Self::Plan(_) => "plan_parse",
            Self::StepFailed { .. } => "step_failed",
            Self::Oracle(_) => "oracle",
            Self::Http(e) => e.category(),
        }
    }
}
