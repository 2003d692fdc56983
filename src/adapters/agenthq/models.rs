//! Wire-format types for the AgentHQ run API.
//!
//! These mirror the JSON bodies of `POST /v1/agents/runs`,
//! `GET /v1/agents/runs/{id}`, and the cancel endpoint. The simulator
//! serves the same shapes, so callers see one contract in both modes.

use serde::{Deserialize, Serialize};

use crate::domain::models::{AgentRun, RunStatus};

/// Input describing the ticket an agent run should fix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentRunInput {
    /// Kind of work requested; currently always `ticket_fix`
    pub task_type: String,
    /// Tracker ticket identifier (e.g. `PROJ-123`)
    pub ticket_id: String,
    /// Brief description of the issue
    pub ticket_summary: String,
    /// Full issue description
    pub ticket_description: String,
    /// Full URL of the tracker ticket
    pub ticket_url: String,
    /// Target repository (owner/repo)
    pub repository: String,
    /// Base branch for the fix PR
    pub branch_base: String,
    /// Branch the agent should push to
    pub branch_name: String,
}

impl AgentRunInput {
    /// Build the input for a ticket fix, deriving the branch name from the
    /// ticket id.
    pub fn new(
        ticket_id: impl Into<String>,
        ticket_summary: impl Into<String>,
        ticket_description: impl Into<String>,
        ticket_url: impl Into<String>,
        repository: impl Into<String>,
    ) -> Self {
        let ticket_id = ticket_id.into();
        Self {
            task_type: "ticket_fix".to_string(),
            branch_name: format!("fix/{ticket_id}"),
            ticket_id,
            ticket_summary: ticket_summary.into(),
            ticket_description: ticket_description.into(),
            ticket_url: ticket_url.into(),
            repository: repository.into(),
            branch_base: "main".to_string(),
        }
    }

    /// Override the base branch for the fix PR.
    pub fn with_branch_base(mut self, branch_base: impl Into<String>) -> Self {
        self.branch_base = branch_base.into();
        self
    }
}

/// Request body for run creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRunRequest {
    /// Agent to dispatch the run to
    pub agent_id: String,
    /// Ticket description the agent works from
    pub input: AgentRunInput,
    /// Callback URL the service notifies on completion
    #[serde(skip_serializing_if = "Option::is_none")]
    pub webhook_url: Option<String>,
    /// Free-form metadata echoed back in callbacks
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

/// Response body of a successful run creation (HTTP 201).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRunResponse {
    /// Assigned run identifier
    pub run_id: String,
    /// Initial status, normally `running`
    pub status: RunStatus,
    /// Echo of the ticket being fixed
    pub ticket_id: String,
    /// Estimated duration in seconds, when the service provides one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_duration: Option<u64>,
}

impl CreateRunResponse {
    /// Shape a simulated run the way the real API reports a creation.
    pub fn from_run(run: &AgentRun, estimated_duration: Option<u64>) -> Self {
        Self {
            run_id: run.run_id.clone(),
            status: run.status,
            ticket_id: run.ticket_id.clone(),
            estimated_duration,
        }
    }
}

/// Response body of a status poll (HTTP 200).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunStatusResponse {
    /// Run identifier
    pub run_id: String,
    /// Current status
    pub status: RunStatus,
    /// Completion fraction, present while running and on completion
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<f64>,
    /// Label of the step in progress
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_step: Option<String>,
    /// PR URL, present once completed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pr_url: Option<String>,
    /// Failure message, present once failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl RunStatusResponse {
    /// Shape a simulated run the way the real API reports a poll.
    pub fn from_run(run: &AgentRun) -> Self {
        Self {
            run_id: run.run_id.clone(),
            status: run.status,
            progress: Some(run.progress),
            current_step: Some(run.current_step.clone()),
            pr_url: run.result.as_ref().map(|r| r.pr_url.clone()),
            error_message: run.error_message.clone(),
        }
    }
}

/// Error body shapes the service is known to send.
#[derive(Debug, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub detail: Option<String>,
}

impl ApiErrorBody {
    /// Extract the most specific error message from a raw response body.
    pub fn extract_message(body: &str) -> String {
        serde_json::from_str::<Self>(body)
            .ok()
            .and_then(|parsed| parsed.error.or(parsed.detail))
            .unwrap_or_else(|| body.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_derives_branch_name() {
        let input = AgentRunInput::new(
            "PROJ-42",
            "Fix it",
            "Longer description",
            "https://tracker.example.com/browse/PROJ-42",
            "owner/repo",
        );
        assert_eq!(input.branch_name, "fix/PROJ-42");
        assert_eq!(input.branch_base, "main");
        assert_eq!(input.task_type, "ticket_fix");

        let input = input.with_branch_base("develop");
        assert_eq!(input.branch_base, "develop");
    }

    #[test]
    fn test_status_response_parses_service_json() {
        let json = r#"{
            "run_id": "run_abc123def456",
            "status": "running",
            "ticket_id": "PROJ-1",
            "progress": 0.5,
            "current_step": "Analyzing codebase",
            "updated_at": 1699564800.0
        }"#;
        let parsed: RunStatusResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.status, RunStatus::Running);
        assert_eq!(parsed.current_step.as_deref(), Some("Analyzing codebase"));
        assert!(parsed.pr_url.is_none());
    }

    #[test]
    fn test_error_body_extraction() {
        assert_eq!(
            ApiErrorBody::extract_message(r#"{"error": "invalid agent"}"#),
            "invalid agent"
        );
        assert_eq!(
            ApiErrorBody::extract_message(r#"{"detail": "Run run_x not found"}"#),
            "Run run_x not found"
        );
        assert_eq!(ApiErrorBody::extract_message("plain text"), "plain text");
    }
}
