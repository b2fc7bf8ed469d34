//! # relay-agent
//!
//! Talking to remote agents.
//!
//! - [`AgentClient`] / [`AgentSession`]: invoke an A2A agent in live or
//!   aggregated mode, track its task id, cancel it
//! - [`AgentInvoker`]: the seam the orchestrator drives steps through
//! - [`PublicApiClient`]: the public agent API (listing, ask endpoints)
//! - [`AgentRouter`]: sends each step to the public API or A2A by URL
//! - [`AgentDirectory`]: where orchestration learns which agents exist

#![deny(unsafe_code)]

pub mod a2a;
pub mod client;
pub mod directory;
pub mod errors;
pub mod public;
pub mod router;
pub mod session;

pub use client::{AgentClient, AgentInvoker, aggregate};
pub use directory::{AgentDirectory, CardDirectory, StaticDirectory};
pub use errors::AgentError;
pub use public::{AskRequest, AskVariable, PublicAgent, PublicApiClient};
pub use router::AgentRouter;
pub use session::AgentSession;
