//! AgentHQ Client Integration Tests
//!
//! Drives the real-mode HTTP client against a mock server: authentication
//! headers, request/response bodies, and the mapping of HTTP failures
//! onto the error taxonomy.

use fixbridge::adapters::agenthq::{AgentHqClient, AgentRunInput};
use fixbridge::domain::errors::AgentApiError;
use fixbridge::domain::models::{AgentHqConfig, RunStatus};

fn real_config(base_url: String) -> AgentHqConfig {
    AgentHqConfig {
        api_key: Some("sk-test".to_string()),
        base_url,
        agent_id: Some("agent_copilot_fix".to_string()),
        webhook_url: Some("https://bridge.example.com/webhook".to_string()),
        mock_mode: false,
        timeout_secs: 5,
    }
}

fn sample_input() -> AgentRunInput {
    AgentRunInput::new(
        "PROJ-123",
        "Fix login bug",
        "Users cannot log in with SSO",
        "https://tracker.example.com/browse/PROJ-123",
        "owner/repo",
    )
}

#[tokio::test]
async fn create_run_sends_authenticated_request() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/agents/runs")
        .match_header("authorization", "Bearer sk-test")
        .match_header("content-type", "application/json")
        .match_body(mockito::Matcher::PartialJsonString(
            r#"{
                "agent_id": "agent_copilot_fix",
                "webhook_url": "https://bridge.example.com/webhook",
                "input": {
                    "task_type": "ticket_fix",
                    "ticket_id": "PROJ-123",
                    "repository": "owner/repo",
                    "branch_base": "main",
                    "branch_name": "fix/PROJ-123"
                }
            }"#
            .to_string(),
        ))
        .with_status(201)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{
                "run_id": "run_abc123def456",
                "status": "running",
                "ticket_id": "PROJ-123",
                "estimated_duration": 300
            }"#,
        )
        .expect(1)
        .create_async()
        .await;

    let client = AgentHqClient::new(real_config(server.url())).unwrap();
    let created = client.create_run(sample_input()).await.unwrap();

    assert_eq!(created.run_id, "run_abc123def456");
    assert_eq!(created.status, RunStatus::Running);
    assert_eq!(created.estimated_duration, Some(300));
    mock.assert_async().await;
}

#[tokio::test]
async fn create_run_maps_error_body() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/v1/agents/runs")
        .with_status(422)
        .with_body(r#"{"error": "unknown agent_id"}"#)
        .create_async()
        .await;

    let client = AgentHqClient::new(real_config(server.url())).unwrap();
    let err = client.create_run(sample_input()).await.unwrap_err();

    match err {
        AgentApiError::Api { code, message } => {
            assert_eq!(code, 422);
            assert_eq!(message, "unknown agent_id");
        }
        other => panic!("Expected Api error, got {other:?}"),
    }
}

#[tokio::test]
async fn run_status_parses_poll_response() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/v1/agents/runs/run_abc123def456")
        .match_header("authorization", "Bearer sk-test")
        .with_status(200)
        .with_body(
            r#"{
                "run_id": "run_abc123def456",
                "status": "running",
                "progress": 0.55,
                "current_step": "Applying fix"
            }"#,
        )
        .expect(1)
        .create_async()
        .await;

    let client = AgentHqClient::new(real_config(server.url())).unwrap();
    let status = client.run_status("run_abc123def456").await.unwrap();

    assert_eq!(status.status, RunStatus::Running);
    assert_eq!(status.progress, Some(0.55));
    assert_eq!(status.current_step.as_deref(), Some("Applying fix"));
    mock.assert_async().await;
}

#[tokio::test]
async fn run_status_maps_404_with_detail_body() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("GET", "/v1/agents/runs/run_missing")
        .with_status(404)
        .with_body(r#"{"detail": "Run run_missing not found"}"#)
        .create_async()
        .await;

    let client = AgentHqClient::new(real_config(server.url())).unwrap();
    let err = client.run_status("run_missing").await.unwrap_err();

    match err {
        AgentApiError::Api { code, message } => {
            assert_eq!(code, 404);
            assert_eq!(message, "Run run_missing not found");
        }
        other => panic!("Expected Api error, got {other:?}"),
    }
}

#[tokio::test]
async fn cancel_run_true_only_on_success() {
    let mut server = mockito::Server::new_async().await;
    let accepted = server
        .mock("POST", "/v1/agents/runs/run_live/cancel")
        .with_status(200)
        .with_body(r#"{"run_id": "run_live", "status": "cancelled"}"#)
        .create_async()
        .await;
    let rejected = server
        .mock("POST", "/v1/agents/runs/run_done/cancel")
        .with_status(409)
        .with_body(r#"{"error": "run already terminal"}"#)
        .create_async()
        .await;

    let client = AgentHqClient::new(real_config(server.url())).unwrap();
    assert!(client.cancel_run("run_live").await);
    assert!(!client.cancel_run("run_done").await);
    accepted.assert_async().await;
    rejected.assert_async().await;
}

#[tokio::test]
async fn connection_failure_maps_to_transport() {
    // Nothing listens on this port.
    let client = AgentHqClient::new(real_config("http://127.0.0.1:1".to_string())).unwrap();
    let err = client.create_run(sample_input()).await.unwrap_err();
    assert!(matches!(err, AgentApiError::Transport(_)));
    assert!(err.is_transient());

    assert!(!client.cancel_run("run_abc").await);
}
