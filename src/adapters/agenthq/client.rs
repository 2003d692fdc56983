//! HTTP client for the AgentHQ agent service.
//!
//! Runs in one of two modes. In real mode every call is an authenticated
//! HTTP request against the configured base URL. In simulated mode calls
//! are served by an in-process [`RunSimulator`], returning the same wire
//! shapes so callers cannot tell the difference.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::domain::errors::{AgentApiError, RemoteResult};
use crate::domain::models::AgentHqConfig;
use crate::services::simulator::RunSimulator;

use super::models::{
    AgentRunInput, AgentRunRequest, ApiErrorBody, CreateRunResponse, RunStatusResponse,
};

const USER_AGENT: &str = concat!("fixbridge/", env!("CARGO_PKG_VERSION"));

/// Client for creating, polling, and cancelling agent runs.
pub struct AgentHqClient {
    config: AgentHqConfig,
    http: reqwest::Client,
    simulator: Option<Arc<RunSimulator>>,
}

impl AgentHqClient {
    /// Create a client in real mode, issuing HTTP requests to the service.
    pub fn new(config: AgentHqConfig) -> RemoteResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| {
                AgentApiError::Configuration(format!("Failed to build HTTP client: {e}"))
            })?;
        Ok(Self {
            config,
            http,
            simulator: None,
        })
    }

    /// Create a client in simulated mode, served by an in-process simulator.
    pub fn simulated(config: AgentHqConfig, simulator: Arc<RunSimulator>) -> RemoteResult<Self> {
        let mut client = Self::new(config)?;
        client.simulator = Some(simulator);
        Ok(client)
    }

    /// Whether calls are served by the in-process simulator.
    pub fn is_simulated(&self) -> bool {
        self.simulator.is_some()
    }

    /// Start an agent run for the given ticket.
    ///
    /// Returns `Configuration` when real mode is missing credentials,
    /// `Api` for non-201 service responses, `Timeout` when the request
    /// deadline elapses, and `Transport` for connection-level failures.
    pub async fn create_run(&self, input: AgentRunInput) -> RemoteResult<CreateRunResponse> {
        if let Some(sim) = &self.simulator {
            let run = sim.create_run(&input).await;
            info!(run_id = %run.run_id, ticket_id = %run.ticket_id, "created simulated run");
            return Ok(CreateRunResponse::from_run(&run, None));
        }

        let api_key = self.config.api_key.as_deref().ok_or_else(|| {
            AgentApiError::Configuration("api_key is required outside mock mode".to_string())
        })?;
        let agent_id = self.config.agent_id.clone().ok_or_else(|| {
            AgentApiError::Configuration("agent_id is required outside mock mode".to_string())
        })?;

        let metadata = serde_json::json!({
            "source": "tracker_webhook",
            "bridge_version": env!("CARGO_PKG_VERSION"),
            "ticket_id": input.ticket_id,
        });
        let request = AgentRunRequest {
            agent_id,
            webhook_url: self.config.webhook_url.clone(),
            metadata: Some(metadata),
            input,
        };

        debug!(
            ticket_id = %request.input.ticket_id,
            repository = %request.input.repository,
            "creating agent run"
        );
        let response = self
            .http
            .post(format!("{}/v1/agents/runs", self.config.base_url))
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| self.map_transport_error(&e))?;

        let status = response.status();
        if status.as_u16() != 201 {
            return Err(self.api_error(response).await);
        }
        let created: CreateRunResponse = response
            .json()
            .await
            .map_err(|e| AgentApiError::Transport(format!("invalid response body: {e}")))?;
        info!(
            run_id = %created.run_id,
            ticket_id = %created.ticket_id,
            "created agent run"
        );
        Ok(created)
    }

    /// Fetch the current status of a run.
    ///
    /// Unknown run ids map to `Api { code: 404 }`.
    pub async fn run_status(&self, run_id: &str) -> RemoteResult<RunStatusResponse> {
        if let Some(sim) = &self.simulator {
            let run = sim.run_status(run_id).await?;
            return Ok(RunStatusResponse::from_run(&run));
        }

        let api_key = self.config.api_key.as_deref().ok_or_else(|| {
            AgentApiError::Configuration("api_key is required outside mock mode".to_string())
        })?;

        let response = self
            .http
            .get(format!("{}/v1/agents/runs/{run_id}", self.config.base_url))
            .bearer_auth(api_key)
            .send()
            .await
            .map_err(|e| self.map_transport_error(&e))?;

        if !response.status().is_success() {
            return Err(self.api_error(response).await);
        }
        response
            .json()
            .await
            .map_err(|e| AgentApiError::Transport(format!("invalid response body: {e}")))
    }

    /// Request cancellation of a run.
    ///
    /// Returns true only when the service confirmed the transition to
    /// cancelled. Every failure mode maps to false; this call never errors.
    pub async fn cancel_run(&self, run_id: &str) -> bool {
        if let Some(sim) = &self.simulator {
            return sim.cancel_run(run_id).await;
        }

        let Some(api_key) = self.config.api_key.as_deref() else {
            warn!(run_id = %run_id, "cannot cancel run without api_key");
            return false;
        };

        let result = self
            .http
            .post(format!(
                "{}/v1/agents/runs/{run_id}/cancel",
                self.config.base_url
            ))
            .bearer_auth(api_key)
            .send()
            .await;
        match result {
            Ok(response) if response.status().is_success() => {
                info!(run_id = %run_id, "cancelled agent run");
                true
            }
            Ok(response) => {
                warn!(
                    run_id = %run_id,
                    code = response.status().as_u16(),
                    "cancel request rejected"
                );
                false
            }
            Err(e) => {
                warn!(run_id = %run_id, error = %e, "cancel request failed");
                false
            }
        }
    }

    fn map_transport_error(&self, error: &reqwest::Error) -> AgentApiError {
        if error.is_timeout() {
            AgentApiError::Timeout {
                seconds: self.config.timeout_secs,
            }
        } else {
            AgentApiError::Transport(error.to_string())
        }
    }

    async fn api_error(&self, response: reqwest::Response) -> AgentApiError {
        let code = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        let message = ApiErrorBody::extract_message(&body);
        warn!(code, message = %message, "agent service returned an error");
        AgentApiError::Api { code, message }
    }
}
