//! Push webhook endpoint.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use pushci_core::event::PushEvent;
use serde::Serialize;
use tracing::info;

use crate::AppState;
use crate::error::ApiError;

pub fn router() -> Router<AppState> {
    Router::new().route("/webhook", post(push_webhook))
}

/// Acknowledgement returned for every accepted delivery.
#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
}

impl WebhookResponse {
    fn ack(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            job_id: None,
        }
    }
}

/// Handle a GitHub webhook delivery.
///
/// Push events start a job in the background; the response does not wait
/// for it. Other event types are acknowledged and ignored.
async fn push_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<WebhookResponse>), ApiError> {
    // Deliveries without the header are treated as pushes.
    let event_type = headers
        .get("X-GitHub-Event")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("push");

    let payload: serde_json::Value = serde_json::from_slice(&body)
        .map_err(|e| ApiError::BadRequest(format!("Invalid JSON: {}", e)))?;

    match event_type {
        "push" => {}
        "ping" => {
            info!("Ping event received - webhook is configured correctly");
            return Ok((StatusCode::ACCEPTED, Json(WebhookResponse::ack("pong"))));
        }
        other => {
            info!(event = %other, "Ignoring event");
            return Ok((
                StatusCode::ACCEPTED,
                Json(WebhookResponse::ack(format!("Ignored {} event", other))),
            ));
        }
    }

    let event = PushEvent::from_github_payload(&payload)
        .ok_or_else(|| ApiError::BadRequest("Payload is not a push event".to_string()))?;

    info!(
        repo = %event.repository.full_name,
        git_ref = %event.ref_name(),
        before = %event.before,
        sha = %event.after,
        commits = event.commits.len(),
        pusher = %event.pusher,
        "Received push"
    );

    let response = match state.orchestrator.submit(event) {
        Some(job_id) => WebhookResponse {
            success: true,
            message: "Webhook received and is being processed.".to_string(),
            job_id: Some(job_id.to_string()),
        },
        None => WebhookResponse::ack("Ref created without commits, nothing to check."),
    };

    Ok((StatusCode::ACCEPTED, Json(response)))
}

#[cfg(test)]
mod tests {
    use crate::routes::test_support::{body_json, test_state};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use pushci_core::{JobId, JobStatus};
    use pushci_store::JobStore;
    use serde_json::{Value, json};
    use std::time::Duration;
    use tower::ServiceExt;

    fn push_payload(created: bool, commits: Value) -> Value {
        json!({
            "ref": "refs/heads/main",
            "before": "1111111111111111111111111111111111111111",
            "after": "2222222222222222222222222222222222222222",
            "created": created,
            "deleted": false,
            "commits": commits,
            "repository": {
                "name": "widgets",
                "full_name": "octo/widgets",
                "clone_url": "https://github.com/octo/widgets.git",
                "owner": { "login": "octo" }
            },
            "pusher": { "name": "octocat" }
        })
    }

    fn webhook(event: Option<&str>, body: String) -> Request<Body> {
        let mut request = Request::post("/webhook").header("Content-Type", "application/json");
        if let Some(event) = event {
            request = request.header("X-GitHub-Event", event);
        }
        request.body(Body::from(body)).unwrap()
    }

    #[tokio::test]
    async fn test_push_is_accepted_and_run() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path()).await;
        let app = crate::routes::router(state.clone());
        let payload = push_payload(false, json!([{ "id": "2222222" }]));

        let response = app
            .oneshot(webhook(Some("push"), payload.to_string()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::ACCEPTED);
        let body = body_json(response).await;
        assert_eq!(body["success"], true);
        let job_id: JobId = body["job_id"].as_str().unwrap().parse().unwrap();

        let mut stored = None;
        for _ in 0..200 {
            if let Ok(job) = state.store.get(job_id).await {
                stored = Some(job);
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        let job = stored.expect("job was never stored");
        assert_eq!(job.status, JobStatus::Error);
        assert_eq!(job.head_commit, "2222222222222222222222222222222222222222");
    }

    #[tokio::test]
    async fn test_branch_creation_without_commits_is_acknowledged() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path()).await;
        let app = crate::routes::router(state.clone());

        let response = app
            .oneshot(webhook(None, push_payload(true, json!([])).to_string()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::ACCEPTED);
        let body = body_json(response).await;
        assert_eq!(body["success"], true);
        assert!(body.get("job_id").is_none());
        assert!(state.store.list_ids().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_ping_and_other_events_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let app = crate::routes::router(test_state(dir.path()).await);

        let response = app
            .clone()
            .oneshot(webhook(Some("ping"), json!({ "zen": "Keep it simple." }).to_string()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert_eq!(body_json(response).await["message"], "pong");

        let response = app
            .oneshot(webhook(Some("issues"), json!({}).to_string()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert_eq!(body_json(response).await["message"], "Ignored issues event");
    }

    #[tokio::test]
    async fn test_malformed_payloads_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let app = crate::routes::router(test_state(dir.path()).await);

        let response = app
            .clone()
            .oneshot(webhook(Some("push"), "{not json".to_string()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app
            .oneshot(webhook(Some("push"), json!({ "ref": "refs/heads/main" }).to_string()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_json(response).await["message"].is_string());
    }
}
