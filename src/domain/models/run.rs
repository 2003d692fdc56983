//! Agent run domain model.
//!
//! A run is one unit of remote work: the agent service (real or simulated)
//! picking up a ticket and producing a fix. Runs move through a small state
//! machine and freeze once they reach a terminal status.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Status of an agent run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Run accepted but not yet executing
    Pending,
    /// Agent is actively working on the ticket
    Running,
    /// Run finished successfully
    Completed,
    /// Run failed during execution
    Failed,
    /// Run was cancelled before completing
    Cancelled,
    /// Run exceeded its execution deadline
    Timeout,
}

impl Default for RunStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
            Self::Timeout => "timeout",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "running" => Some(Self::Running),
            "completed" | "complete" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            "cancelled" | "canceled" => Some(Self::Cancelled),
            "timeout" => Some(Self::Timeout),
            _ => None,
        }
    }

    /// Check if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Failed | Self::Cancelled | Self::Timeout
        )
    }

    /// Check if this is an active (non-terminal) state.
    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }

    /// Valid transitions from this status.
    pub fn valid_transitions(&self) -> Vec<RunStatus> {
        match self {
            Self::Pending => vec![Self::Running, Self::Cancelled],
            Self::Running => vec![Self::Completed, Self::Failed, Self::Cancelled, Self::Timeout],
            Self::Completed | Self::Failed | Self::Cancelled | Self::Timeout => vec![],
        }
    }

    pub fn can_transition_to(&self, new_status: Self) -> bool {
        self.valid_transitions().contains(&new_status)
    }
}

/// Artifacts produced by a completed run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunResult {
    /// URL of the pull request containing the fix
    pub pr_url: String,
    /// Pull request number
    pub pr_number: u64,
    /// Branch the fix was pushed to
    pub branch_name: String,
    /// Short commit SHA of the fix
    pub commit_sha: String,
    /// Files touched by the fix
    pub files_changed: Vec<String>,
    /// Agent's summary of what was changed and why
    pub agent_analysis: String,
}

impl RunResult {
    /// Synthesize a deterministic result for a simulated run.
    ///
    /// The PR number is a stable hash of the run id so repeated simulations
    /// of the same run produce the same artifacts.
    pub fn synthesized(run_id: &str, ticket_id: &str, ticket_summary: &str, repository: &str) -> Self {
        let mut hasher = DefaultHasher::new();
        run_id.hash(&mut hasher);
        let pr_number = hasher.finish() % 1000 + 1;

        let files_changed = vec!["src/main.rs".to_string(), "tests/main_test.rs".to_string()];

        Self {
            pr_url: format!("https://github.com/{repository}/pull/{pr_number}"),
            pr_number,
            branch_name: format!("fix/{ticket_id}"),
            commit_sha: Uuid::new_v4().simple().to_string()[..7].to_string(),
            files_changed: files_changed.clone(),
            agent_analysis: format!(
                "Successfully fixed {ticket_id}: {ticket_summary}. Updated files: {}",
                files_changed.join(", ")
            ),
        }
    }
}

/// One unit of remote work tracked by id and status.
///
/// While a run is `Running` its fields are mutated exclusively by the
/// simulator's executor task; external callers only read snapshots or
/// request cancellation. Once a terminal status is reached every field is
/// frozen - the mutation methods below refuse further changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentRun {
    /// Opaque unique identifier, assigned at creation
    pub run_id: String,
    /// Ticket this run is fixing
    pub ticket_id: String,
    /// Short description of the ticket
    pub ticket_summary: String,
    /// Target repository (owner/repo)
    pub repository: String,
    /// Current status
    pub status: RunStatus,
    /// Completion fraction in [0.0, 1.0], non-decreasing while running
    pub progress: f64,
    /// Label of the step in progress; meaningful only while running
    pub current_step: String,
    /// When the run was created
    pub created_at: DateTime<Utc>,
    /// When any field last changed
    pub updated_at: DateTime<Utc>,
    /// When a terminal status was reached; set exactly once
    pub completed_at: Option<DateTime<Utc>>,
    /// Produced artifacts, present once completed
    pub result: Option<RunResult>,
    /// Failure message, present once failed
    pub error_message: Option<String>,
}

impl AgentRun {
    /// Create a new run in the `Running` state.
    pub fn new(
        run_id: impl Into<String>,
        ticket_id: impl Into<String>,
        ticket_summary: impl Into<String>,
        repository: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            run_id: run_id.into(),
            ticket_id: ticket_id.into(),
            ticket_summary: ticket_summary.into(),
            repository: repository.into(),
            status: RunStatus::Running,
            progress: 0.0,
            current_step: "Initializing".to_string(),
            created_at: now,
            updated_at: now,
            completed_at: None,
            result: None,
            error_message: None,
        }
    }

    /// Check if the run is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Transition to a new status, enforcing the state machine.
    ///
    /// Sets `completed_at` exactly once when a terminal status is reached.
    pub fn transition_to(&mut self, new_status: RunStatus) -> Result<(), String> {
        if !self.status.can_transition_to(new_status) {
            return Err(format!(
                "Cannot transition from {} to {}",
                self.status.as_str(),
                new_status.as_str()
            ));
        }

        self.status = new_status;
        self.updated_at = Utc::now();
        if new_status.is_terminal() {
            self.completed_at = Some(Utc::now());
        }
        Ok(())
    }

    /// Record progress into a step. Only valid while running; progress
    /// never decreases.
    pub fn advance(&mut self, step_label: impl Into<String>, progress: f64) -> Result<(), String> {
        if self.status != RunStatus::Running {
            return Err(format!(
                "Cannot advance a run in state {}",
                self.status.as_str()
            ));
        }
        self.current_step = step_label.into();
        self.progress = self.progress.max(progress.clamp(0.0, 1.0));
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Mark the run completed with its produced artifacts.
    pub fn complete(&mut self, result: RunResult) -> Result<(), String> {
        self.transition_to(RunStatus::Completed)?;
        self.progress = 1.0;
        self.current_step = "Completed".to_string();
        self.result = Some(result);
        Ok(())
    }

    /// Mark the run failed with an error message.
    pub fn fail(&mut self, error: impl Into<String>) -> Result<(), String> {
        self.transition_to(RunStatus::Failed)?;
        self.error_message = Some(error.into());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_creation() {
        let run = AgentRun::new("run_abc", "PROJ-123", "Fix login bug", "owner/repo");
        assert_eq!(run.status, RunStatus::Running);
        assert!((run.progress - 0.0).abs() < f64::EPSILON);
        assert_eq!(run.current_step, "Initializing");
        assert!(run.completed_at.is_none());
    }

    #[test]
    fn test_status_round_trip() {
        for status in [
            RunStatus::Pending,
            RunStatus::Running,
            RunStatus::Completed,
            RunStatus::Failed,
            RunStatus::Cancelled,
            RunStatus::Timeout,
        ] {
            assert_eq!(RunStatus::from_str(status.as_str()), Some(status));
        }
        assert_eq!(RunStatus::from_str("canceled"), Some(RunStatus::Cancelled));
        assert_eq!(RunStatus::from_str("bogus"), None);
    }

    #[test]
    fn test_terminal_states() {
        assert!(RunStatus::Completed.is_terminal());
        assert!(RunStatus::Failed.is_terminal());
        assert!(RunStatus::Cancelled.is_terminal());
        assert!(RunStatus::Timeout.is_terminal());
        assert!(RunStatus::Running.is_active());
        assert!(RunStatus::Pending.is_active());
    }

    #[test]
    fn test_terminal_transitions_are_exclusive() {
        let mut run = AgentRun::new("run_abc", "PROJ-1", "summary", "owner/repo");
        run.complete(RunResult::synthesized("run_abc", "PROJ-1", "summary", "owner/repo"))
            .unwrap();
        assert_eq!(run.status, RunStatus::Completed);
        assert!(run.completed_at.is_some());

        // No further transitions from a terminal state.
        assert!(run.transition_to(RunStatus::Cancelled).is_err());
        assert!(run.fail("too late").is_err());
    }

    #[test]
    fn test_advance_refused_after_terminal() {
        let mut run = AgentRun::new("run_abc", "PROJ-1", "summary", "owner/repo");
        run.advance("Analyzing", 0.25).unwrap();
        assert!((run.progress - 0.25).abs() < f64::EPSILON);

        run.transition_to(RunStatus::Cancelled).unwrap();
        let frozen_step = run.current_step.clone();
        let frozen_progress = run.progress;

        assert!(run.advance("Later step", 0.9).is_err());
        assert_eq!(run.current_step, frozen_step);
        assert!((run.progress - frozen_progress).abs() < f64::EPSILON);
    }

    #[test]
    fn test_progress_is_monotonic() {
        let mut run = AgentRun::new("run_abc", "PROJ-1", "summary", "owner/repo");
        run.advance("a", 0.5).unwrap();
        run.advance("b", 0.3).unwrap();
        assert!((run.progress - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_synthesized_result_is_deterministic() {
        let a = RunResult::synthesized("run_abc", "PROJ-1", "summary", "owner/repo");
        let b = RunResult::synthesized("run_abc", "PROJ-1", "summary", "owner/repo");
        assert_eq!(a.pr_number, b.pr_number);
        assert_eq!(a.pr_url, b.pr_url);
        assert!(a.pr_number >= 1 && a.pr_number <= 1000);
        assert_eq!(a.branch_name, "fix/PROJ-1");
        assert_eq!(a.commit_sha.len(), 7);
    }
}
