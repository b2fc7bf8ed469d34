//! # Orchestration plans
//!
//! A plan is an ordered list of steps plus an execution mode. Plans usually
//! come from a planning oracle as free-form text, so [`OrchestrationPlan::parse`]
//! treats the input as untrusted: it must be a single JSON object with exactly
//! the `mode` and `steps` fields, each step carrying exactly `name`, `url`, and
//! `input` strings.

use serde::{Deserialize, Serialize};

/// Execution mode declared by a plan.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanMode {
    /// Steps run one at a time, in order.
    Sequential,
    /// Steps run concurrently. Accepted as data, rejected at execution.
    Parallel,
}

impl PlanMode {
    /// Wire name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sequential => "sequential",
            Self::Parallel => "parallel",
        }
    }
}

impl std::fmt::Display for PlanMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One agent call within a plan.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OrchestrationStep {
    /// Step label (usually the agent name).
    pub name: String,
    /// Agent endpoint or card URL.
    pub url: String,
    /// Input template, may contain placeholders.
    pub input: String,
}

impl OrchestrationStep {
    /// Build a step.
    pub fn new(name: impl Into<String>, url: impl Into<String>, input: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            input: input.into(),
        }
    }
}

/// Ordered list of steps and the mode they run in.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OrchestrationPlan {
    /// Execution mode.
    pub mode: PlanMode,
    /// Steps in execution order.
    pub steps: Vec<OrchestrationStep>,
}

/// A plan could not be accepted.
#[derive(Debug, thiserror::Error)]
pub enum PlanError {
    /// The text is not JSON at all.
    #[error("plan is not valid JSON: {0}")]
    InvalidJson(#[source] serde_json::Error),

    /// The JSON does not match the plan schema.
    #[error("plan does not match schema: {0}")]
    Schema(String),
}

impl OrchestrationPlan {
    /// Build a sequential plan.
    #[must_use]
    pub fn sequential(steps: Vec<OrchestrationStep>) -> Self {
        Self {
            mode: PlanMode::Sequential,
            steps,
        }
    }

    /// Parse and validate an untrusted plan document.
    pub fn parse(text: &str) -> Result<Self, PlanError> {
        let value: serde_json::Value =
            serde_json::from_str(text.trim()).map_err(PlanError::InvalidJson)?;
        if !value.is_object() {
            return Err(PlanError::Schema("top level must be an object".into()));
        }
        let plan: Self =
            serde_json::from_value(value).map_err(|e| PlanError::Schema(e.to_string()))?;
        plan.validate()?;
        Ok(plan)
    }

    /// Check field contents that serde cannot express.
    pub fn validate(&self) -> Result<(), PlanError> {
        for (i, step) in self.steps.iter().enumerate() {
            if step.url.trim().is_empty() {
                return Err(PlanError::Schema(format!("step {} has an empty url", i + 1)));
            }
        }
        Ok(())
    }

    /// Number of steps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Whether the plan has no steps.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}
