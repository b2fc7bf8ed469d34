//! # relay-core
//!
//! Foundation types shared by every relay crate.
//!
//! - **Stream events**: the closed [`StreamEvent`] enum produced by the demultiplexer
//! - **Agents**: [`AgentDescriptor`] and the A2A [`AgentCard`]
//! - **Plans**: [`OrchestrationPlan`] with strict parsing via [`OrchestrationPlan::parse`]
//! - **Branded IDs**: [`MessageId`], [`TaskId`]
//! - **Retry math**: [`RetryConfig`] and [`calculate_backoff_delay`]

#![deny(unsafe_code)]

pub mod agents;
pub mod constants;
pub mod events;
pub mod ids;
pub mod plan;
pub mod retry;
pub mod text;

pub use agents::{AgentCard, AgentDescriptor, AgentSkill};
pub use events::StreamEvent;
pub use ids::{MessageId, TaskId};
pub use plan::{OrchestrationPlan, OrchestrationStep, PlanError, PlanMode};
pub use retry::{RetryConfig, calculate_backoff_delay};
