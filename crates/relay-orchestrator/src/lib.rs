//! # relay-orchestrator
//!
//! Chains agents into a pipeline.
//!
//! - [`resolve_placeholders`]: `{{lastOutput}}`, `{{allOutputs}}`, `{{stepN}}`
//! - [`SequentialOrchestrator`]: runs a plan one step at a time
//! - [`PlanningOracle`] / [`LlmPlanner`]: turns a prompt into a plan
//! - [`OrchestrationManager`]: planner, then orchestrator, text to an [`OutputSink`]

#![deny(unsafe_code)]

pub mod errors;
pub mod manager;
pub mod orchestrator;
pub mod placeholders;
pub mod planner;
pub mod sink;

pub use errors::OrchestrationError;
pub use manager::OrchestrationManager;
pub use orchestrator::{ProgressEvent, ProgressUpdate, SequentialOrchestrator};
pub use placeholders::resolve_placeholders;
pub use planner::{LlmPlanner, PlanningOracle, build_planner_prompt};
pub use sink::{BufferSink, OutputSink, StdoutSink};
