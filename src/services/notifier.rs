//! One-shot completion webhook delivery.
//!
//! When a run reaches a terminal state the notifier POSTs a single JSON
//! callback describing the outcome. Delivery is best-effort: failures and
//! timeouts are logged and dropped, never retried, and never surfaced to
//! the lifecycle that triggered them.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::domain::errors::{AgentApiError, RemoteResult};
use crate::domain::models::{AgentRun, RunStatus};

/// Outbound completion callback body.
///
/// Fields beyond `run_id`/`status`/`ticket_id` vary by terminal status:
/// a completed run carries its artifacts, a failed run carries the error
/// message, a cancelled run carries nothing extra.
#[derive(Debug, Clone, Serialize)]
pub struct CompletionPayload {
    pub run_id: String,
    pub status: RunStatus,
    pub ticket_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pr_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pr_number: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit_sha: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub files_changed: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_analysis: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl CompletionPayload {
    /// Build the payload for a terminal run snapshot.
    pub fn from_run(run: &AgentRun) -> Self {
        let mut payload = Self {
            run_id: run.run_id.clone(),
            status: run.status,
            ticket_id: run.ticket_id.clone(),
            pr_url: None,
            pr_number: None,
            branch_name: None,
            commit_sha: None,
            files_changed: None,
            agent_analysis: None,
            completed_at: None,
            error_message: None,
        };

        match run.status {
            RunStatus::Completed => {
                if let Some(result) = &run.result {
                    payload.pr_url = Some(result.pr_url.clone());
                    payload.pr_number = Some(result.pr_number);
                    payload.branch_name = Some(result.branch_name.clone());
                    payload.commit_sha = Some(result.commit_sha.clone());
                    payload.files_changed = Some(result.files_changed.clone());
                    payload.agent_analysis = Some(result.agent_analysis.clone());
                }
                payload.completed_at = run.completed_at;
            }
            RunStatus::Failed => {
                payload.error_message = run.error_message.clone();
            }
            _ => {}
        }

        payload
    }
}

/// Delivers one outbound notification per terminal run.
pub struct CompletionNotifier {
    http: reqwest::Client,
    webhook_url: Option<String>,
}

impl CompletionNotifier {
    /// Create a notifier for the given destination.
    ///
    /// When `webhook_url` is `None` every delivery is skipped; that is a
    /// valid configuration, not an error.
    pub fn new(webhook_url: Option<String>, timeout: Duration) -> RemoteResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                AgentApiError::Configuration(format!("Failed to build HTTP client: {e}"))
            })?;
        Ok(Self { http, webhook_url })
    }

    /// Deliver the completion callback for a terminal run.
    ///
    /// All failure modes are absorbed: a rejected, timed-out, or
    /// unreachable destination is logged and dropped. Notification failure
    /// never mutates run state and never propagates to the caller.
    pub async fn notify(&self, run: &AgentRun) {
        let Some(url) = &self.webhook_url else {
            debug!(run_id = %run.run_id, "no completion webhook configured, skipping");
            return;
        };

        if !run.status.is_terminal() {
            warn!(
                run_id = %run.run_id,
                status = run.status.as_str(),
                "refusing to notify for a non-terminal run"
            );
            return;
        }

        let payload = CompletionPayload::from_run(run);
        info!(
            run_id = %run.run_id,
            status = run.status.as_str(),
            url = %url,
            "sending completion webhook"
        );

        match self.http.post(url).json(&payload).send().await {
            Ok(resp) if matches!(resp.status().as_u16(), 200 | 201 | 204) => {
                info!(
                    run_id = %run.run_id,
                    status_code = resp.status().as_u16(),
                    "completion webhook delivered"
                );
            }
            Ok(resp) => {
                warn!(
                    run_id = %run.run_id,
                    status_code = resp.status().as_u16(),
                    "completion webhook rejected, dropping"
                );
            }
            Err(err) if err.is_timeout() => {
                error!(run_id = %run.run_id, "completion webhook timed out, dropping");
            }
            Err(err) => {
                error!(run_id = %run.run_id, error = %err, "completion webhook failed, dropping");
            }
        }
    }
}
