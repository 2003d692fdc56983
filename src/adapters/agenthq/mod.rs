//! AgentHQ agent service adapter.

pub mod client;
pub mod models;

pub use client::AgentHqClient;
pub use models::{AgentRunInput, AgentRunRequest, CreateRunResponse, RunStatusResponse};
